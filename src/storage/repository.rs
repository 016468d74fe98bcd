use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::goals::GoalDefinition;

/// Identifies one archived report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveKey {
    pub method: String,
    pub period_key: String,
    /// Segment expression, empty for all visits.
    pub segment: String,
    /// Goal id, empty when the report is not goal specific.
    pub id_goal: String,
}

/// One archived table as listed by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub key: ArchiveKey,
    pub row_count: i64,
    pub imported_at: String,
}

// ── Archives ───────────────────────────────────────────────────────

/// Delete an archived table and its rows. Returns whether it existed.
pub fn delete_archive(conn: &Connection, key: &ArchiveKey) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "DELETE FROM archive_tables
         WHERE method = ?1 AND period_key = ?2 AND segment = ?3 AND id_goal = ?4",
        params![key.method, key.period_key, key.segment, key.id_goal],
    )?;
    Ok(count > 0)
}

pub fn insert_archive_table(
    conn: &Connection,
    key: &ArchiveKey,
    metadata_json: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO archive_tables (method, period_key, segment, id_goal, metadata_json, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
        params![key.method, key.period_key, key.segment, key.id_goal, metadata_json],
    )?;
    Ok(())
}

pub fn insert_archive_row(
    conn: &Connection,
    key: &ArchiveKey,
    position: usize,
    row_json: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO archive_rows (method, period_key, segment, id_goal, position, row_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            key.method,
            key.period_key,
            key.segment,
            key.id_goal,
            position as i64,
            row_json
        ],
    )?;
    Ok(())
}

pub fn get_archive_metadata(
    conn: &Connection,
    key: &ArchiveKey,
) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT metadata_json FROM archive_tables
         WHERE method = ?1 AND period_key = ?2 AND segment = ?3 AND id_goal = ?4",
        params![key.method, key.period_key, key.segment, key.id_goal],
        |row| row.get(0),
    )
    .optional()
}

/// Serialized rows of an archived table, in stored order.
pub fn list_archive_rows(conn: &Connection, key: &ArchiveKey) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT row_json FROM archive_rows
         WHERE method = ?1 AND period_key = ?2 AND segment = ?3 AND id_goal = ?4
         ORDER BY position",
    )?;
    let rows = stmt.query_map(
        params![key.method, key.period_key, key.segment, key.id_goal],
        |row| row.get(0),
    )?;
    rows.collect()
}

pub fn list_archives(conn: &Connection) -> Result<Vec<ArchiveSummary>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT t.method, t.period_key, t.segment, t.id_goal, t.imported_at,
                (SELECT COUNT(*) FROM archive_rows r
                 WHERE r.method = t.method AND r.period_key = t.period_key
                   AND r.segment = t.segment AND r.id_goal = t.id_goal)
         FROM archive_tables t
         ORDER BY t.method, t.period_key, t.segment, t.id_goal",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ArchiveSummary {
            key: ArchiveKey {
                method: row.get(0)?,
                period_key: row.get(1)?,
                segment: row.get(2)?,
                id_goal: row.get(3)?,
            },
            imported_at: row.get(4)?,
            row_count: row.get(5)?,
        })
    })?;
    rows.collect()
}

// ── Goals ──────────────────────────────────────────────────────────

pub fn upsert_goal(conn: &Connection, goal: &GoalDefinition) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO goals (id_goal, name, pattern, allow_multiple, updated_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))",
        params![goal.id, goal.name, goal.pattern, goal.allow_multiple],
    )?;
    Ok(())
}

pub fn remove_goal(conn: &Connection, id: u32) -> Result<bool, rusqlite::Error> {
    let count = conn.execute("DELETE FROM goals WHERE id_goal = ?1", params![id])?;
    Ok(count > 0)
}

pub fn list_goals(conn: &Connection) -> Result<Vec<GoalDefinition>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT id_goal, name, pattern, allow_multiple FROM goals ORDER BY id_goal")?;
    let rows = stmt.query_map([], |row| {
        Ok(GoalDefinition {
            id: row.get(0)?,
            name: row.get(1)?,
            pattern: row.get(2)?,
            allow_multiple: row.get(3)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn key(method: &str) -> ArchiveKey {
        ArchiveKey {
            method: method.to_string(),
            period_key: "2025-01-15".to_string(),
            segment: String::new(),
            id_goal: String::new(),
        }
    }

    #[test]
    fn test_config_round_trip() {
        let db = Database::open_memory().unwrap();
        let conn = db.conn();
        assert_eq!(get_config(conn, "capabilities").unwrap(), None);

        set_config(conn, "capabilities", "Referrers").unwrap();
        set_config(conn, "capabilities", "UserCountry").unwrap();
        set_config(conn, "keyword_not_defined", "-").unwrap();

        assert_eq!(
            get_config(conn, "capabilities").unwrap(),
            Some("UserCountry".to_string())
        );
        let all = list_config(conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "capabilities");
    }

    #[test]
    fn test_goals_upsert_and_list() {
        let db = Database::open_memory().unwrap();
        let conn = db.conn();
        let mut goal = GoalDefinition {
            id: 2,
            name: "Download".into(),
            pattern: None,
            allow_multiple: true,
        };
        upsert_goal(conn, &goal).unwrap();
        upsert_goal(
            conn,
            &GoalDefinition {
                id: 1,
                name: "Signup".into(),
                pattern: Some("/welcome".into()),
                allow_multiple: false,
            },
        )
        .unwrap();
        goal.name = "Download PDF".into();
        upsert_goal(conn, &goal).unwrap();

        let goals = list_goals(conn).unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].pattern.as_deref(), Some("/welcome"));
        assert_eq!(goals[1].name, "Download PDF");
        assert!(goals[1].allow_multiple);

        assert!(remove_goal(conn, 1).unwrap());
        assert!(!remove_goal(conn, 1).unwrap());
    }

    #[test]
    fn test_archive_rows_cascade_on_delete() {
        let db = Database::open_memory().unwrap();
        let conn = db.conn();
        let k = key("Goals.get");
        insert_archive_table(conn, &k, "{}").unwrap();
        insert_archive_row(conn, &k, 1, r#"{"columns":{"b":2}}"#).unwrap();
        insert_archive_row(conn, &k, 0, r#"{"columns":{"a":1}}"#).unwrap();

        let rows = list_archive_rows(conn, &k).unwrap();
        assert_eq!(rows, [r#"{"columns":{"a":1}}"#, r#"{"columns":{"b":2}}"#]);

        let summaries = list_archives(conn).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].row_count, 2);

        assert!(delete_archive(conn, &k).unwrap());
        assert!(list_archive_rows(conn, &k).unwrap().is_empty());
        assert_eq!(get_archive_metadata(conn, &k).unwrap(), None);
    }
}
