use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::cli::QueryArgs;

#[derive(Debug, Serialize)]
struct UniversityMatch {
    name_kr: String,
    name_en: String,
    nation: String,
    region: String,
    exam_type: String,
    min_score: f64,
    level_code: Option<String>,
    min_gpa: Option<f64>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join("uniexchange.sqlite"));

    if !db_path.exists() {
        bail!("database not found at {}; run ingest first", db_path.display());
    }

    let connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let exam_type = args.exam_type.trim().to_uppercase();
    let matches = find_universities(
        &connection,
        &exam_type,
        args.score,
        args.nation.as_deref(),
        args.limit,
    )?;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&matches).context("failed to render query result")?;
        println!("{rendered}");
        return Ok(());
    }

    info!(
        exam_type = %exam_type,
        score = args.score,
        match_count = matches.len(),
        "query completed"
    );
    for entry in &matches {
        info!(
            name = %entry.name_en,
            nation = %entry.nation,
            region = %entry.region,
            required = entry.min_score,
            level_code = %entry.level_code.clone().unwrap_or_default(),
            "match"
        );
    }

    Ok(())
}

/// Universities whose stated minimum for the exam is at or below the
/// applicant's score. Requirements struck out by an exclusion note are
/// not offered as matches.
fn find_universities(
    connection: &Connection,
    exam_type: &str,
    score: f64,
    nation: Option<&str>,
    limit: usize,
) -> Result<Vec<UniversityMatch>> {
    let mut sql = String::from(
        "
        SELECT u.name_kr, u.name_en, u.nation, u.region,
               lr.exam_type, lr.min_score, lr.level_code, u.min_gpa
        FROM university u
        JOIN language_requirement lr ON lr.university_id = u.id
        WHERE lr.exam_type = ?1
          AND lr.min_score <= ?2
          AND lr.is_available = 1
        ",
    );
    if nation.is_some() {
        sql.push_str(" AND u.nation = ?3");
    }
    sql.push_str(" ORDER BY lr.min_score DESC, u.name_en ASC LIMIT ");
    sql.push_str(&limit.to_string());

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare university query")?;

    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<UniversityMatch> {
        Ok(UniversityMatch {
            name_kr: row.get(0)?,
            name_en: row.get(1)?,
            nation: row.get(2)?,
            region: row.get(3)?,
            exam_type: row.get(4)?,
            min_score: row.get(5)?,
            level_code: row.get(6)?,
            min_gpa: row.get(7)?,
        })
    };

    let rows = match nation {
        Some(nation) => statement
            .query_map(rusqlite::params![exam_type, score, nation], map_row)
            .context("failed to run university query")?,
        None => statement
            .query_map(rusqlite::params![exam_type, score], map_row)
            .context("failed to run university query")?,
    };

    let mut matches = Vec::new();
    for row in rows {
        matches.push(row.context("failed to read query row")?);
    }

    Ok(matches)
}
