pub mod types;

pub use types::{
    ConversionRate, Dimension, DimensionRanking, EcommerceMetrics, GoalDefinition, GoalId,
    GoalMetrics, GoalReport, GoalsOverview, TopDimensionEntry,
};

use crate::config::{Capability, Settings};
use crate::error::{Error, Result};
use crate::metrics::catalog::CONVERSION_RATE;
use crate::metrics::format_percentage;
use crate::query::{Period, ReportApi, ReportRequest};
use crate::table::{Row, SortOrder};

/// Entries shown per dimension in the "top converting" lists.
pub const COUNT_TOP_ROWS_TO_DISPLAY: usize = 3;
/// Extra rows fetched per dimension in case some are filtered out.
pub const TOP_ROWS_MARGIN: usize = 2;

pub const GOALS_METHOD: &str = "Goals.get";
pub const SEGMENT_RETURNING: &str = "visitorType==returning,visitorType==returningCustomer";
pub const SEGMENT_NEW: &str = "visitorType==new";

/// Render a conversion rate as a percentage with one fractional digit.
///
/// A table-wrapped rate reads the first column of the first row; an empty
/// table counts as zero.
pub fn format_conversion_rate(rate: &ConversionRate) -> String {
    let value = match rate {
        ConversionRate::Scalar(v) => *v,
        ConversionRate::Table(table) => table
            .first_row()
            .and_then(|row| row.columns().next())
            .and_then(|(_, v)| v.as_number())
            .unwrap_or(0.0),
    };
    format_percentage(value)
}

/// Builds goal summaries and reports from a [`ReportApi`].
pub struct GoalsReporter<'a, A: ReportApi + ?Sized> {
    api: &'a A,
    settings: &'a Settings,
    period: Period,
}

impl<'a, A: ReportApi + ?Sized> GoalsReporter<'a, A> {
    pub fn new(api: &'a A, settings: &'a Settings, period: Period) -> Self {
        Self {
            api,
            settings,
            period,
        }
    }

    // ── Top dimensions ─────────────────────────────────────────────

    /// Best converting countries, keywords and websites for a goal.
    ///
    /// Dimensions whose capability is disabled are skipped. Each enabled
    /// dimension is listed, possibly with no entries.
    pub fn top_dimensions(&self, goal: &GoalId) -> Result<Vec<DimensionRanking>> {
        let count_column = format!("goal_{goal}_nb_conversions");
        let rate_column = format!("goal_{goal}_conversion_rate");

        let mut rankings = Vec::new();
        for dimension in Dimension::ALL {
            if !self.settings.capabilities.contains(dimension.capability()) {
                continue;
            }
            let request = ReportRequest::new(dimension.method(), self.period.clone())
                .sort(&count_column, SortOrder::Desc)
                .limit(COUNT_TOP_ROWS_TO_DISPLAY + TOP_ROWS_MARGIN)
                .metric(&rate_column);
            log::debug!("Querying {} for goal {goal}", dimension.method());
            let table = self.api.process(&request)?;

            let entries = table
                .rows()
                .iter()
                .filter(|row| row.number(&count_column).unwrap_or(0.0) > 0.0)
                .filter(|row| !self.is_excluded(dimension, row))
                .take(COUNT_TOP_ROWS_TO_DISPLAY)
                .map(|row| TopDimensionEntry {
                    name: row.label().unwrap_or_default().to_string(),
                    nb_conversions: row.number(&count_column).unwrap_or(0.0) as u64,
                    conversion_rate: format_percentage(row.number(&rate_column).unwrap_or(0.0)),
                    metadata: row.metadata().clone(),
                })
                .collect();

            rankings.push(DimensionRanking { dimension, entries });
        }
        Ok(rankings)
    }

    fn is_excluded(&self, dimension: Dimension, row: &Row) -> bool {
        dimension == Dimension::Keyword
            && row.label() == Some(self.settings.keyword_not_defined.as_str())
    }

    // ── Goal metrics ───────────────────────────────────────────────

    /// Summary metrics for one goal, or for all goals when `goal` is `None`.
    pub fn goal_metrics(&self, goal: Option<&GoalId>) -> Result<GoalMetrics> {
        let mut request =
            ReportRequest::new(GOALS_METHOD, self.period.clone()).metric(CONVERSION_RATE);
        if let Some(goal) = goal {
            request = request.goal(goal.clone());
        }
        let table = self.api.process(&request)?;

        let row = match table.first_row() {
            Some(row) => row.clone(),
            None => {
                log::warn!(
                    "{GOALS_METHOD} returned no rows for goal {}; reporting zeros",
                    goal.map(|g| g.to_string()).unwrap_or_else(|| "(all)".into())
                );
                Row::new()
            }
        };
        let num = |name: &str| row.number(name).unwrap_or(0.0);

        let nb_conversions = num("nb_conversions");
        let mut nb_visits_converted = num("nb_visits_converted");
        if nb_visits_converted == 0.0 {
            nb_visits_converted = nb_conversions;
        }

        let ecommerce = (goal == Some(&GoalId::EcommerceOrder)).then(|| EcommerceMetrics {
            revenue_subtotal: num("revenue_subtotal"),
            revenue_tax: num("revenue_tax"),
            revenue_shipping: num("revenue_shipping"),
            revenue_discount: num("revenue_discount"),
            items: num("items"),
            avg_order_revenue: num("avg_order_revenue"),
        });

        Ok(GoalMetrics {
            id: goal.cloned(),
            name: None,
            allow_multiple: None,
            nb_conversions: nb_conversions as u64,
            nb_visits_converted: nb_visits_converted as u64,
            conversion_rate: format_percentage(num(CONVERSION_RATE)),
            revenue: num("revenue"),
            ecommerce,
        })
    }

    /// Conversion rate of a goal restricted to a visitor segment.
    pub fn segment_conversion_rate(&self, goal: &GoalId, segment: &str) -> Result<ConversionRate> {
        let request = ReportRequest::new(GOALS_METHOD, self.period.clone())
            .goal(goal.clone())
            .segment(segment)
            .metric(CONVERSION_RATE)
            .columns(&[CONVERSION_RATE]);
        Ok(ConversionRate::Table(self.api.process(&request)?))
    }

    // ── Reports ────────────────────────────────────────────────────

    /// The full report for a single goal or the ecommerce order pseudo-goal.
    pub fn goal_report(&self, goal: &GoalId, definitions: &[GoalDefinition]) -> Result<GoalReport> {
        let (name, pattern, allow_multiple) = match goal {
            GoalId::EcommerceOrder => {
                if !self.settings.capabilities.contains(Capability::CustomVariables) {
                    return Err(Error::MissingCapability {
                        report: "ecommerce goal report".into(),
                        capability: Capability::CustomVariables.to_string(),
                    });
                }
                ("Ecommerce".to_string(), None, true)
            }
            GoalId::Id(id) => {
                let def = definitions
                    .iter()
                    .find(|d| d.id == *id)
                    .ok_or_else(|| Error::NotFound(format!("goal {id}")))?;
                (def.name.clone(), def.pattern.clone(), def.allow_multiple)
            }
            GoalId::EcommerceCart => return Err(Error::NotFound(format!("goal {goal}"))),
        };

        let metrics = self.goal_metrics(Some(goal))?;
        let abandoned_cart = if *goal == GoalId::EcommerceOrder {
            Some(self.goal_metrics(Some(&GoalId::EcommerceCart))?)
        } else {
            None
        };
        let top_dimensions = self.top_dimensions(goal)?;
        let returning = self.segment_conversion_rate(goal, SEGMENT_RETURNING)?;
        let new = self.segment_conversion_rate(goal, SEGMENT_NEW)?;

        Ok(GoalReport {
            goal: goal.clone(),
            name,
            pattern,
            allow_multiple,
            metrics,
            abandoned_cart,
            top_dimensions,
            conversion_rate_returning: format_conversion_rate(&returning),
            conversion_rate_new: format_conversion_rate(&new),
        })
    }

    /// Totals over all goals, followed by each defined goal's metrics.
    pub fn overview(&self, definitions: &[GoalDefinition]) -> Result<GoalsOverview> {
        let totals = self.goal_metrics(None)?;
        let goals = definitions
            .iter()
            .map(|def| {
                let mut metrics = self.goal_metrics(Some(&GoalId::Id(def.id)))?;
                metrics.name = Some(def.name.clone());
                metrics.allow_multiple = Some(def.allow_multiple);
                Ok(metrics)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GoalsOverview { totals, goals })
    }
}
