use crate::metrics::format::{FormatRule, RenderContext};
use crate::metrics::quotient::{round_to, safe_divide};
use crate::table::{Row, Table, Value};

/// How a derived metric is computed from its dependents.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeRule {
    /// `numerator / denominator` through [`safe_divide`].
    Quotient {
        numerator: String,
        denominator: String,
        precision: u32,
    },
    /// `numerator * 100 / denominator` through [`safe_divide`].
    Percentage {
        numerator: String,
        denominator: String,
        precision: u32,
    },
    /// Sum of every dependent's value. Absent dependents count as zero, so a
    /// composite built on gated-off metrics degrades instead of disappearing.
    SumOfDependents { precision: u32 },
}

/// Gating rule run once per table before any row is computed.
///
/// The metric is active when `trigger` sums to a strictly positive value over
/// all rows. Otherwise the `purge` columns are deleted and recorded in the
/// table's `empty_columns` metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub trigger: String,
    pub purge: Vec<String>,
}

/// Declarative description of a derived ("processed") metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    name: String,
    dependents: Vec<String>,
    temporary: Vec<String>,
    compute: ComputeRule,
    gate: Option<Gate>,
    format: FormatRule,
}

impl MetricDescriptor {
    pub fn new(
        name: &str,
        dependents: &[&str],
        compute: ComputeRule,
        format: FormatRule,
    ) -> Self {
        Self {
            name: name.to_string(),
            dependents: dependents.iter().map(|d| d.to_string()).collect(),
            temporary: Vec::new(),
            compute,
            gate: None,
            format,
        }
    }

    /// Dependents to delete from every row once this metric has been computed.
    pub fn with_temporary(mut self, columns: &[&str]) -> Self {
        self.temporary = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    pub fn temporary(&self) -> &[String] {
        &self.temporary
    }

    pub fn gate(&self) -> Option<&Gate> {
        self.gate.as_ref()
    }

    /// Whether every dependent must be present on a row for the metric to be computed.
    pub fn requires_all_dependents(&self) -> bool {
        !matches!(self.compute, ComputeRule::SumOfDependents { .. })
    }

    /// Compute the metric for one row.
    ///
    /// When [`requires_all_dependents`](Self::requires_all_dependents) is true
    /// the caller must have checked that every dependent is present.
    pub fn compute(&self, row: &Row) -> f64 {
        let num = |name: &str| row.number(name).unwrap_or(0.0);
        match &self.compute {
            ComputeRule::Quotient {
                numerator,
                denominator,
                precision,
            } => safe_divide(num(numerator.as_str()), num(denominator.as_str()), *precision),
            ComputeRule::Percentage {
                numerator,
                denominator,
                precision,
            } => safe_divide(
                num(numerator.as_str()) * 100.0,
                num(denominator.as_str()),
                *precision,
            ),
            ComputeRule::SumOfDependents { precision } => {
                let sum: f64 = self.dependents.iter().map(|d| num(d.as_str())).sum();
                round_to(sum, *precision)
            }
        }
    }

    /// Decide once per table whether this metric is active.
    ///
    /// An inactive gated metric purges its raw columns and records them in
    /// `empty_columns`, unless the table is empty or was processed before.
    /// A processed table either carries the metric's own column on some row
    /// or no longer carries the trigger column on any row.
    pub fn before_compute(&self, table: &mut Table) -> bool {
        let Some(gate) = &self.gate else {
            return true;
        };

        let total: f64 = table.column_values(&gate.trigger).sum();
        let has_data = total > 0.0;

        let processed = table.any_row_has(&self.name) || !table.any_row_has(&gate.trigger);
        if !has_data && !table.is_empty() && !processed {
            log::debug!(
                "No data for {} ({} sums to {total}); removing {:?}",
                self.name,
                gate.trigger,
                gate.purge
            );
            table.delete_columns(&gate.purge);
            table.metadata_mut().add_empty_columns(gate.purge.iter().cloned());
        }

        has_data
    }

    pub fn format(&self, value: &Value, context: RenderContext) -> String {
        self.format.render(value, context)
    }
}
