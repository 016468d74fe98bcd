use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::metrics::descriptor::{ComputeRule, Gate, MetricDescriptor};
use crate::metrics::format::FormatRule;

/// Fractional digits kept by every time average.
pub const TIME_PRECISION: u32 = 3;
/// Fractional digits kept by conversion rates (stored as percentages).
pub const CONVERSION_RATE_PRECISION: u32 = 1;
/// Fractional digits kept by revenue averages.
pub const REVENUE_PRECISION: u32 = 2;

pub const AVG_PAGE_LOAD_TIME: &str = "avg_page_load_time";
pub const CONVERSION_RATE: &str = "conversion_rate";
pub const AVG_ORDER_REVENUE: &str = "avg_order_revenue";

/// Performance timings whose averages add up to the page load time.
pub const PAGE_LOAD_COMPONENTS: [&str; 5] = [
    "time_latency",
    "time_transfer",
    "time_dom_processing",
    "time_dom_completion",
    "time_on_load",
];

static RE_AVG_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^avg_(time_[a-z_]+)$").unwrap());
static RE_GOAL_RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^goal_([A-Za-z0-9]+)_conversion_rate$").unwrap());

/// `avg_<id> = sum_<id> / nb_hits_with_<id>`.
///
/// `sum_<id>` is archiving-internal and removed once the average exists. When
/// no row has any `sum_<id>` the metric is gated off and its raw columns
/// (sum, hit count, min, max) are dropped from the table.
pub fn average_performance(id: &str) -> MetricDescriptor {
    let sum = format!("sum_{id}");
    let hits = format!("nb_hits_with_{id}");
    let min = format!("min_{id}");
    let max = format!("max_{id}");

    MetricDescriptor::new(
        &format!("avg_{id}"),
        &[sum.as_str(), hits.as_str()],
        ComputeRule::Quotient {
            numerator: sum.clone(),
            denominator: hits.clone(),
            precision: TIME_PRECISION,
        },
        FormatRule::Duration,
    )
    .with_temporary(&[sum.as_str()])
    .with_gate(Gate {
        trigger: sum.clone(),
        purge: vec![sum, hits, min, max],
    })
}

/// Total page load time: the sum of the component time averages.
pub fn average_page_load_time() -> MetricDescriptor {
    let dependents: Vec<String> = PAGE_LOAD_COMPONENTS
        .iter()
        .map(|id| format!("avg_{id}"))
        .collect();
    let dependents: Vec<&str> = dependents.iter().map(String::as_str).collect();

    MetricDescriptor::new(
        AVG_PAGE_LOAD_TIME,
        &dependents,
        ComputeRule::SumOfDependents {
            precision: TIME_PRECISION,
        },
        FormatRule::Duration,
    )
}

/// Share of visits that converted, as a percentage.
pub fn conversion_rate() -> MetricDescriptor {
    percentage(CONVERSION_RATE, "nb_visits_converted", "nb_visits")
}

/// Share of visits that converted a specific goal, as a percentage.
pub fn goal_conversion_rate(goal: &str) -> MetricDescriptor {
    percentage(
        &format!("goal_{goal}_conversion_rate"),
        &format!("goal_{goal}_nb_conversions"),
        "nb_visits",
    )
}

/// Average revenue per conversion.
pub fn average_order_revenue() -> MetricDescriptor {
    MetricDescriptor::new(
        AVG_ORDER_REVENUE,
        &["revenue", "nb_conversions"],
        ComputeRule::Quotient {
            numerator: "revenue".into(),
            denominator: "nb_conversions".into(),
            precision: REVENUE_PRECISION,
        },
        FormatRule::Number {
            precision: REVENUE_PRECISION as usize,
        },
    )
}

fn percentage(name: &str, numerator: &str, denominator: &str) -> MetricDescriptor {
    MetricDescriptor::new(
        name,
        &[numerator, denominator],
        ComputeRule::Percentage {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
            precision: CONVERSION_RATE_PRECISION,
        },
        FormatRule::Percentage,
    )
}

/// Look up the descriptor for a derived metric name.
///
/// Returns `None` for names that are not derived metrics (raw columns).
pub fn lookup(name: &str) -> Option<MetricDescriptor> {
    match name {
        AVG_PAGE_LOAD_TIME => return Some(average_page_load_time()),
        CONVERSION_RATE => return Some(conversion_rate()),
        AVG_ORDER_REVENUE => return Some(average_order_revenue()),
        _ => {}
    }
    if let Some(caps) = RE_AVG_TIME.captures(name) {
        return Some(average_performance(&caps[1]));
    }
    if let Some(caps) = RE_GOAL_RATE.captures(name) {
        return Some(goal_conversion_rate(&caps[1]));
    }
    None
}

/// Resolve requested metric names into descriptors in evaluation order.
///
/// Derived dependencies are pulled in transitively and always precede the
/// metrics that use them. Unknown names are rejected.
pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricDescriptor>> {
    resolve_with(names, lookup)
}

/// Like [`resolve`], with a caller-supplied lookup.
pub fn resolve_with<S, F>(names: &[S], lookup: F) -> Result<Vec<MetricDescriptor>>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<MetricDescriptor>,
{
    let mut ordered = Vec::new();
    let mut done: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    for name in names {
        let name = name.as_ref();
        let descriptor =
            lookup(name).ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
        visit(descriptor, &lookup, &mut done, &mut visiting, &mut ordered)?;
    }
    Ok(ordered)
}

fn visit<F>(
    descriptor: MetricDescriptor,
    lookup: &F,
    done: &mut HashSet<String>,
    visiting: &mut HashSet<String>,
    ordered: &mut Vec<MetricDescriptor>,
) -> Result<()>
where
    F: Fn(&str) -> Option<MetricDescriptor>,
{
    let name = descriptor.name().to_string();
    if done.contains(&name) {
        return Ok(());
    }
    if !visiting.insert(name.clone()) {
        return Err(Error::DependencyCycle(name));
    }

    for dependent in descriptor.dependents() {
        // Raw columns have no descriptor and need no ordering.
        if let Some(dep) = lookup(dependent.as_str()) {
            visit(dep, lookup, done, visiting, ordered)?;
        }
    }

    visiting.remove(&name);
    done.insert(name);
    ordered.push(descriptor);
    Ok(())
}
