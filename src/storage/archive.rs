use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::goals::GoalDefinition;
use crate::query::{apply_request, Period, ReportApi, ReportRequest};
use crate::storage::repository::{self, ArchiveKey};
use crate::storage::Database;
use crate::table::{Row, Table, TableMetadata};

/// One report table to store, as found in an import file.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveImport {
    pub method: String,
    pub period: String,
    pub date: String,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub metadata: TableMetadata,
    pub rows: Vec<Row>,
}

/// Contents of an import file: archived tables and goal definitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportFile {
    pub archives: Vec<ArchiveImport>,
    pub goals: Vec<GoalDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub archives: usize,
    pub rows: usize,
    pub goals: usize,
}

impl ArchiveKey {
    fn new(method: &str, period: &Period, segment: Option<&str>, goal: Option<String>) -> Self {
        Self {
            method: method.to_string(),
            period_key: period.to_key(),
            segment: segment.unwrap_or_default().to_string(),
            id_goal: goal.unwrap_or_default(),
        }
    }

    fn for_request(request: &ReportRequest) -> Self {
        Self::new(
            request.method(),
            request.period(),
            request.segment_expr(),
            request.goal_id().map(|g| g.to_string()),
        )
    }
}

impl Database {
    /// Replace the stored table for `key` with `table`.
    pub fn store_table(&self, key: &ArchiveKey, table: &Table) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        repository::delete_archive(&tx, key)?;
        repository::insert_archive_table(&tx, key, &serde_json::to_string(table.metadata())?)?;
        for (position, row) in table.rows().iter().enumerate() {
            repository::insert_archive_row(&tx, key, position, &serde_json::to_string(row)?)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Load a stored table. A table never archived loads as empty.
    pub fn load_table(&self, key: &ArchiveKey) -> Result<Table> {
        let Some(metadata) = repository::get_archive_metadata(self.conn(), key)? else {
            return Ok(Table::new());
        };
        let mut table = Table::new();
        *table.metadata_mut() = serde_json::from_str(&metadata)?;
        for json in repository::list_archive_rows(self.conn(), key)? {
            table.push(serde_json::from_str(&json)?);
        }
        Ok(table)
    }

    /// Store every archive and goal from an import file.
    pub fn import(&self, file: ImportFile) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for archive in file.archives {
            let period = Period::parse(&archive.period, &archive.date)?;
            let key = ArchiveKey::new(
                &archive.method,
                &period,
                archive.segment.as_deref(),
                archive.goal.clone(),
            );
            let mut table = Table::from_rows(archive.rows);
            *table.metadata_mut() = archive.metadata;
            self.store_table(&key, &table)?;

            log::info!(
                "Imported {} ({}) with {} rows",
                key.method,
                key.period_key,
                table.row_count()
            );
            report.archives += 1;
            report.rows += table.row_count();
        }

        for goal in &file.goals {
            repository::upsert_goal(self.conn(), goal)?;
            report.goals += 1;
        }
        if report.goals > 0 {
            log::info!("Imported {} goal definitions", report.goals);
        }

        Ok(report)
    }

    /// Parse an import file from JSON and store it.
    pub fn import_json(&self, json: &str) -> Result<ImportReport> {
        self.import(serde_json::from_str(json)?)
    }
}

impl ReportApi for Database {
    fn process(&self, request: &ReportRequest) -> Result<Table> {
        let key = ArchiveKey::for_request(request);
        log::debug!(
            "Processing {} for {} (segment '{}', goal '{}')",
            key.method,
            key.period_key,
            key.segment,
            key.id_goal
        );
        apply_request(self.load_table(&key)?, request)
    }
}
