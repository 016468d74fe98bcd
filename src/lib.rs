pub mod config;
pub mod date_util;
pub mod error;
pub mod goals;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod table;

pub use config::{Capabilities, Capability, Settings};
pub use error::{Error, Result};
pub use goals::{
    format_conversion_rate, ConversionRate, Dimension, DimensionRanking, GoalDefinition, GoalId,
    GoalMetrics, GoalReport, GoalsOverview, GoalsReporter, TopDimensionEntry,
};
pub use metrics::{Evaluation, Evaluator, FormatRule, MetricDescriptor, RenderContext};
pub use query::{Period, ReportApi, ReportRequest};
pub use storage::{Database, ImportFile, ImportReport};
pub use table::{Row, SortOrder, Table, TableMetadata, Value};

// Re-export repository types needed by the binary crate, but not the module itself
pub use storage::repository::{ArchiveKey, ArchiveSummary};

use serde::Serialize;
use storage::repository;

/// Counts shown by `metricsdw status`.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub archives: Vec<ArchiveSummary>,
    pub goals: usize,
    pub settings: Settings,
}

/// Main entry point for the metrics warehouse.
pub struct MetricsDW {
    db: Database,
    settings: Settings,
}

impl MetricsDW {
    /// Wrap a database and load its settings.
    pub fn new(db: Database) -> Result<Self> {
        let settings = Settings::load(db.conn())?;
        Ok(Self { db, settings })
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Reports ────────────────────────────────────────────────────

    /// Run a report query against the archive.
    pub fn report(&self, request: &ReportRequest) -> Result<Table> {
        self.db.process(request)
    }

    pub fn reporter(&self, period: Period) -> GoalsReporter<'_, Database> {
        GoalsReporter::new(&self.db, &self.settings, period)
    }

    pub fn top_dimensions(&self, period: Period, goal: &GoalId) -> Result<Vec<DimensionRanking>> {
        self.reporter(period).top_dimensions(goal)
    }

    pub fn goal_report(&self, period: Period, goal: &GoalId) -> Result<GoalReport> {
        let definitions = self.goals_list()?;
        self.reporter(period).goal_report(goal, &definitions)
    }

    pub fn goals_overview(&self, period: Period) -> Result<GoalsOverview> {
        let definitions = self.goals_list()?;
        self.reporter(period).overview(&definitions)
    }

    // ── Import ─────────────────────────────────────────────────────

    /// Import archived tables and goals from a JSON file.
    pub fn import_file(&self, path: impl AsRef<std::path::Path>) -> Result<ImportReport> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("cannot read {}: {e}", path.display())))?;
        self.db.import_json(&json)
    }

    // ── Goals ──────────────────────────────────────────────────────

    pub fn goals_list(&self) -> Result<Vec<GoalDefinition>> {
        Ok(repository::list_goals(self.db.conn())?)
    }

    pub fn goals_add(&self, goal: &GoalDefinition) -> Result<()> {
        Ok(repository::upsert_goal(self.db.conn(), goal)?)
    }

    pub fn goals_remove(&self, id: u32) -> Result<bool> {
        Ok(repository::remove_goal(self.db.conn(), id)?)
    }

    // ── Config commands ────────────────────────────────────────────

    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(repository::get_config(self.db.conn(), key)?)
    }

    /// Validate and store a config value, then reload settings.
    pub fn config_set(&mut self, key: &str, value: &str) -> Result<()> {
        Settings::validate(key, value)?;
        repository::set_config(self.db.conn(), key, value)?;
        self.settings = Settings::load(self.db.conn())?;
        Ok(())
    }

    pub fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(repository::list_config(self.db.conn())?)
    }

    // ── Status ─────────────────────────────────────────────────────

    pub fn status(&self) -> Result<Status> {
        Ok(Status {
            archives: repository::list_archives(self.db.conn())?,
            goals: self.goals_list()?.len(),
            settings: self.settings.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "archives": [
            {"method": "Goals.get", "period": "day", "date": "2025-01-15",
             "rows": [{"columns": {"nb_conversions": 10, "nb_visits_converted": 8, "nb_visits": 100, "revenue": 42.5}}]},
            {"method": "Goals.get", "period": "day", "date": "2025-01-15", "goal": "1",
             "rows": [{"columns": {"nb_conversions": 4, "nb_visits_converted": 4, "nb_visits": 100}}]},
            {"method": "Goals.get", "period": "day", "date": "2025-01-15", "goal": "1",
             "segment": "visitorType==new",
             "rows": [{"columns": {"nb_visits_converted": 1, "nb_visits": 40}}]},
            {"method": "Referrers.getKeywords", "period": "day", "date": "2025-01-15",
             "rows": [
                {"columns": {"label": "Keyword not defined", "nb_visits": 50, "goal_1_nb_conversions": 3}},
                {"columns": {"label": "metrics", "nb_visits": 20, "goal_1_nb_conversions": 1}}
             ]}
        ],
        "goals": [{"id": 1, "name": "Signup", "pattern": null, "allow_multiple": false}]
    }"#;

    fn dw() -> MetricsDW {
        let db = Database::open_memory().unwrap();
        db.import_json(FIXTURE).unwrap();
        MetricsDW::new(db).unwrap()
    }

    fn day() -> Period {
        Period::parse("day", "2025-01-15").unwrap()
    }

    #[test]
    fn test_goal_report_end_to_end() {
        let dw = dw();
        let report = dw.goal_report(day(), &GoalId::Id(1)).unwrap();

        assert_eq!(report.name, "Signup");
        assert_eq!(report.metrics.nb_conversions, 4);
        assert_eq!(report.metrics.conversion_rate, "4.0%");
        assert_eq!(report.conversion_rate_new, "2.5%");
        assert_eq!(report.conversion_rate_returning, "0.0%");

        let keywords = report
            .top_dimensions
            .iter()
            .find(|r| r.dimension == Dimension::Keyword)
            .unwrap();
        assert_eq!(keywords.entries.len(), 1);
        assert_eq!(keywords.entries[0].name, "metrics");
        assert_eq!(keywords.entries[0].conversion_rate, "5.0%");
    }

    #[test]
    fn test_overview_end_to_end() {
        let overview = dw().goals_overview(day()).unwrap();
        assert_eq!(overview.totals.nb_conversions, 10);
        assert_eq!(overview.totals.nb_visits_converted, 8);
        assert_eq!(overview.totals.conversion_rate, "8.0%");
        assert_eq!(overview.totals.revenue, 42.5);
        assert_eq!(overview.goals.len(), 1);
        assert_eq!(overview.goals[0].name.as_deref(), Some("Signup"));
    }

    #[test]
    fn test_config_set_reloads_settings() {
        let mut dw = dw();
        dw.config_set("keyword_not_defined", "metrics").unwrap();
        assert_eq!(dw.settings().keyword_not_defined, "metrics");

        let rankings = dw.top_dimensions(day(), &GoalId::Id(1)).unwrap();
        let keywords = rankings
            .iter()
            .find(|r| r.dimension == Dimension::Keyword)
            .unwrap();
        assert_eq!(keywords.entries[0].name, "Keyword not defined");
    }

    #[test]
    fn test_config_set_rejects_invalid_values() {
        let mut dw = dw();
        assert!(dw.config_set("capabilities", "Bogus").is_err());
        assert!(dw.config_get("capabilities").unwrap().is_none());
    }

    #[test]
    fn test_status() {
        let status = dw().status().unwrap();
        assert_eq!(status.archives.len(), 4);
        assert_eq!(status.goals, 1);
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");
        std::fs::write(&path, FIXTURE).unwrap();

        let dw = MetricsDW::new(Database::open_memory().unwrap()).unwrap();
        let report = dw.import_file(&path).unwrap();
        assert_eq!(report.archives, 4);
        assert_eq!(report.rows, 5);
        assert!(dw.import_file(dir.path().join("missing.json")).is_err());
    }
}
