use anyhow::{Context, Result};
use rusqlite::Connection;

use super::DB_SCHEMA_VERSION;
use crate::util::now_utc_string;

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    Ok(())
}

pub fn drop_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            DROP TABLE IF EXISTS language_requirement;
            DROP TABLE IF EXISTS university;
            DROP TABLE IF EXISTS metadata;
            ",
        )
        .context("failed to drop schema")
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS university (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          semester TEXT,
          region TEXT NOT NULL,
          nation TEXT NOT NULL,
          name_kr TEXT NOT NULL,
          name_en TEXT NOT NULL,
          badge TEXT,
          min_gpa REAL,
          significant_note TEXT,
          remark TEXT,
          available_majors TEXT,
          website_url TEXT,
          has_review INTEGER NOT NULL DEFAULT 0,
          review_year TEXT,
          is_exchange INTEGER NOT NULL DEFAULT 0,
          is_visit INTEGER NOT NULL DEFAULT 0,
          UNIQUE(name_en, nation)
        );

        CREATE TABLE IF NOT EXISTS language_requirement (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          university_id INTEGER NOT NULL,
          language_group TEXT NOT NULL,
          exam_type TEXT NOT NULL,
          min_score REAL NOT NULL,
          level_code TEXT,
          is_available INTEGER NOT NULL DEFAULT 1,
          FOREIGN KEY(university_id) REFERENCES university(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_university_nation ON university(nation);
        CREATE INDEX IF NOT EXISTS idx_university_region ON university(region);
        CREATE INDEX IF NOT EXISTS idx_university_name_kr ON university(name_kr);
        CREATE INDEX IF NOT EXISTS idx_lang_req_university_id ON language_requirement(university_id);
        CREATE INDEX IF NOT EXISTS idx_lang_req_exam_type ON language_requirement(exam_type);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to run count query: {sql}"))?;
    Ok(count)
}
