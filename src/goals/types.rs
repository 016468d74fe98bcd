use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::config::Capability;
use crate::error::{Error, Result};
use crate::table::Table;

/// A goal identifier: a numeric goal or one of the ecommerce pseudo-goals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GoalId {
    Id(u32),
    EcommerceOrder,
    EcommerceCart,
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalId::Id(id) => write!(f, "{id}"),
            GoalId::EcommerceOrder => write!(f, "ecommerceOrder"),
            GoalId::EcommerceCart => write!(f, "ecommerceAbandonedCart"),
        }
    }
}

impl FromStr for GoalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ecommerceOrder" => Ok(GoalId::EcommerceOrder),
            "ecommerceAbandonedCart" => Ok(GoalId::EcommerceCart),
            other => other
                .parse::<u32>()
                .map(GoalId::Id)
                .map_err(|_| Error::NotFound(format!("goal '{other}'"))),
        }
    }
}

impl Serialize for GoalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A goal configured for the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDefinition {
    pub id: u32,
    pub name: String,
    pub pattern: Option<String>,
    pub allow_multiple: bool,
}

/// A report dimension the goal pages break conversions down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    Country,
    Keyword,
    Website,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Country, Dimension::Keyword, Dimension::Website];

    /// Report method queried for this dimension.
    pub fn method(&self) -> &'static str {
        match self {
            Dimension::Country => "UserCountry.getCountry",
            Dimension::Keyword => "Referrers.getKeywords",
            Dimension::Website => "Referrers.getWebsites",
        }
    }

    /// Capability that must be enabled for the dimension to be queried.
    pub fn capability(&self) -> Capability {
        match self {
            Dimension::Country => Capability::UserCountry,
            Dimension::Keyword | Dimension::Website => Capability::Referrers,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Country => "Country",
            Dimension::Keyword => "Keyword",
            Dimension::Website => "Website",
        }
    }
}

/// One ranked dimension value in a goal report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDimensionEntry {
    pub name: String,
    pub nb_conversions: u64,
    pub conversion_rate: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Top entries for one dimension, in source rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionRanking {
    pub dimension: Dimension,
    pub entries: Vec<TopDimensionEntry>,
}

/// A conversion rate as returned by a report query: either a bare number or a
/// single-column table wrapping it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionRate {
    Scalar(f64),
    Table(Table),
}

/// Summary metrics for one goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoalMetrics {
    pub id: Option<GoalId>,
    pub name: Option<String>,
    pub allow_multiple: Option<bool>,
    pub nb_conversions: u64,
    pub nb_visits_converted: u64,
    pub conversion_rate: String,
    pub revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecommerce: Option<EcommerceMetrics>,
}

/// Extra order metrics reported for the ecommerce pseudo-goals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EcommerceMetrics {
    pub revenue_subtotal: f64,
    pub revenue_tax: f64,
    pub revenue_shipping: f64,
    pub revenue_discount: f64,
    pub items: f64,
    pub avg_order_revenue: f64,
}

/// Everything shown on a single goal's report page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalReport {
    pub goal: GoalId,
    pub name: String,
    pub pattern: Option<String>,
    pub allow_multiple: bool,
    pub metrics: GoalMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandoned_cart: Option<GoalMetrics>,
    pub top_dimensions: Vec<DimensionRanking>,
    pub conversion_rate_returning: String,
    pub conversion_rate_new: String,
}

/// Totals across all goals plus the per-goal breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalsOverview {
    pub totals: GoalMetrics,
    pub goals: Vec<GoalMetrics>,
}
