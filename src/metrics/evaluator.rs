use crate::error::{Error, Result};
use crate::metrics::catalog;
use crate::metrics::descriptor::MetricDescriptor;
use crate::table::Table;

/// Which metrics were active for a table after gating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub active: Vec<String>,
    pub inactive: Vec<String>,
}

/// Computes derived metrics into a table, row by row.
///
/// Descriptors are evaluated in the order given; a descriptor that depends on
/// another descriptor must come after it.
#[derive(Debug, Clone)]
pub struct Evaluator {
    descriptors: Vec<MetricDescriptor>,
}

impl Evaluator {
    pub fn new(descriptors: Vec<MetricDescriptor>) -> Result<Self> {
        for (i, descriptor) in descriptors.iter().enumerate() {
            for dependent in descriptor.dependents() {
                let later = descriptors[i..].iter().any(|d| d.name() == dependent);
                if later {
                    return Err(Error::DependencyOrder {
                        metric: descriptor.name().to_string(),
                        dependency: dependent.clone(),
                    });
                }
            }
        }
        Ok(Self { descriptors })
    }

    /// Build an evaluator for metric names, resolving derived dependencies.
    pub fn for_metrics<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Self::new(catalog::resolve(names)?)
    }

    /// Run gating, row computation and temporary-column cleanup on `table`.
    ///
    /// Applying this twice to the same table leaves it as after the first run.
    pub fn evaluate(&self, table: &mut Table) -> Evaluation {
        let active: Vec<bool> = self
            .descriptors
            .iter()
            .map(|d| d.before_compute(table))
            .collect();

        for row in table.rows_mut() {
            for (descriptor, _) in self.descriptors.iter().zip(&active).filter(|(_, on)| **on) {
                if descriptor.requires_all_dependents()
                    && !descriptor.dependents().iter().all(|c| row.has(c))
                {
                    row.remove(descriptor.name());
                    continue;
                }
                let value = descriptor.compute(row);
                row.set(descriptor.name(), value);
            }
        }

        let mut evaluation = Evaluation::default();
        for (descriptor, on) in self.descriptors.iter().zip(&active) {
            if *on {
                table.delete_columns(descriptor.temporary());
                evaluation.active.push(descriptor.name().to_string());
            } else {
                evaluation.inactive.push(descriptor.name().to_string());
            }
        }

        log::debug!(
            "Evaluated {} rows: active {:?}, inactive {:?}",
            table.row_count(),
            evaluation.active,
            evaluation.inactive
        );
        evaluation
    }
}
