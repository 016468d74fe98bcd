use regex::Regex;

use crate::error::Result;
use crate::goals::GoalId;
use crate::metrics::Evaluator;
use crate::query::period::Period;
use crate::table::{SortOrder, Table, LABEL_COLUMN};

/// Source of report tables, e.g. the local archive.
///
/// Implementations return a table for one request; the caller owns it and may
/// mutate it freely.
pub trait ReportApi {
    fn process(&self, request: &ReportRequest) -> Result<Table>;
}

/// A report query: which report, over which period and segment, and how the
/// resulting table should be computed, sorted and cut.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    method: String,
    period: Period,
    segment: Option<String>,
    goal: Option<GoalId>,
    label_pattern: Option<String>,
    sort_column: Option<String>,
    sort_order: SortOrder,
    limit: Option<usize>,
    metrics: Vec<String>,
    columns: Option<Vec<String>>,
}

impl ReportRequest {
    pub fn new(method: &str, period: Period) -> Self {
        Self {
            method: method.to_string(),
            period,
            segment: None,
            goal: None,
            label_pattern: None,
            sort_column: None,
            sort_order: SortOrder::Desc,
            limit: None,
            metrics: Vec::new(),
            columns: None,
        }
    }

    pub fn segment(mut self, segment: &str) -> Self {
        self.segment = Some(segment.to_string());
        self
    }

    pub fn goal(mut self, goal: GoalId) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Keep only rows whose label matches this regular expression.
    pub fn label_pattern(mut self, pattern: &str) -> Self {
        self.label_pattern = Some(pattern.to_string());
        self
    }

    pub fn sort(mut self, column: &str, order: SortOrder) -> Self {
        self.sort_column = Some(column.to_string());
        self.sort_order = order;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Derived metric to compute into the table.
    pub fn metric(mut self, name: &str) -> Self {
        self.metrics.push(name.to_string());
        self
    }

    /// Restrict the returned rows to these columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn period(&self) -> &Period {
        &self.period
    }

    pub fn segment_expr(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    pub fn goal_id(&self) -> Option<&GoalId> {
        self.goal.as_ref()
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metrics
    }

    pub fn sort_column(&self) -> Option<&str> {
        self.sort_column.as_deref()
    }

    pub fn limit_rows(&self) -> Option<usize> {
        self.limit
    }
}

/// Shape a raw table according to a request: label filter, derived metrics,
/// sort, limit and column projection, in that order.
pub fn apply_request(mut table: Table, request: &ReportRequest) -> Result<Table> {
    if let Some(pattern) = &request.label_pattern {
        let re = Regex::new(pattern)?;
        table.retain_rows(|row| row.get(LABEL_COLUMN).as_text().is_some_and(|l| re.is_match(l)));
    }

    if !request.metrics.is_empty() {
        let evaluator = Evaluator::for_metrics(&request.metrics)?;
        evaluator.evaluate(&mut table);
    }

    if let Some(column) = &request.sort_column {
        table.sort_by_column(column, request.sort_order);
    }

    if let Some(limit) = request.limit {
        table.truncate(limit);
    }

    if let Some(columns) = &request.columns {
        table.retain_columns(columns);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::table::Row;
    use chrono::NaiveDate;

    fn period() -> Period {
        Period::Day(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
    }

    fn keyword_table() -> Table {
        Table::from_rows(vec![
            Row::new()
                .with_column("label", "rust")
                .with_column("nb_visits", 10.0)
                .with_column("goal_1_nb_conversions", 2.0),
            Row::new()
                .with_column("label", "ruby")
                .with_column("nb_visits", 4.0)
                .with_column("goal_1_nb_conversions", 3.0),
            Row::new()
                .with_column("label", "go")
                .with_column("nb_visits", 5.0)
                .with_column("goal_1_nb_conversions", 0.0),
        ])
    }

    #[test]
    fn test_builder_defaults() {
        let req = ReportRequest::new("Referrers.getKeywords", period());
        assert_eq!(req.method(), "Referrers.getKeywords");
        assert!(req.segment_expr().is_none());
        assert!(req.goal_id().is_none());
        assert!(req.limit_rows().is_none());
        assert!(req.metric_names().is_empty());
    }

    #[test]
    fn test_apply_sort_limit_and_metrics() {
        let req = ReportRequest::new("Referrers.getKeywords", period())
            .metric("goal_1_conversion_rate")
            .sort("goal_1_nb_conversions", SortOrder::Desc)
            .limit(2);
        let table = apply_request(keyword_table(), &req).unwrap();

        let labels: Vec<&str> = table.rows().iter().filter_map(|r| r.label()).collect();
        assert_eq!(labels, ["ruby", "rust"]);
        assert_eq!(table.rows()[0].number("goal_1_conversion_rate"), Some(75.0));
        assert_eq!(table.rows()[1].number("goal_1_conversion_rate"), Some(20.0));
    }

    #[test]
    fn test_apply_label_pattern() {
        let req = ReportRequest::new("Referrers.getKeywords", period()).label_pattern("^ru");
        let table = apply_request(keyword_table(), &req).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_apply_invalid_label_pattern() {
        let req = ReportRequest::new("Referrers.getKeywords", period()).label_pattern("(");
        let err = apply_request(keyword_table(), &req).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn test_apply_column_projection() {
        let req = ReportRequest::new("Referrers.getKeywords", period()).columns(&["nb_visits"]);
        let table = apply_request(keyword_table(), &req).unwrap();
        for row in table.rows() {
            let names: Vec<&str> = row.columns().map(|(k, _)| k).collect();
            assert_eq!(names, ["nb_visits"]);
        }
    }

    #[test]
    fn test_apply_unknown_metric() {
        let req = ReportRequest::new("Referrers.getKeywords", period()).metric("bogus");
        assert!(matches!(
            apply_request(keyword_table(), &req),
            Err(Error::UnknownMetric(_))
        ));
    }
}
