use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::db_setup::{configure_connection, count_rows, drop_schema, ensure_schema};
use super::extract::{CanonicalRow, TableExtractor};
use super::load::{LoadStats, Loader};
use super::normalize::{NormalizeConfig, clean_rows};
use super::workbook::read_workbook;
use crate::cli::IngestArgs;
use crate::commands::inventory::{self, FileMetadata};
use crate::model::{IngestCounts, IngestPaths, IngestRunManifest, WorkbookInventoryManifest};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join("workbook_inventory.json"));
    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join("uniexchange.sqlite"));

    info!(data_root = %args.data_root.display(), run_id = %run_id, "starting ingest");

    let inventory = load_or_refresh_inventory(
        &args.data_root,
        &inventory_manifest_path,
        args.refresh_inventory,
    )?;

    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    if args.init_db {
        warn!("--init-db requested; dropping existing schema");
        drop_schema(&connection)?;
    }
    ensure_schema(&connection)?;

    let extractor = TableExtractor::new()?;
    let loader = Loader::new()?;
    let normalize_config = NormalizeConfig {
        excluded_institutions: args.excluded_institutions.clone(),
    };

    let mut counts = IngestCounts {
        workbook_count: inventory.workbook_count,
        ..IngestCounts::default()
    };
    let mut warnings = Vec::<String>::new();

    for entry in &inventory.workbooks {
        let path = args.data_root.join(&entry.filename);

        // Structural failures stop this file only; the batch keeps going.
        let grid = match read_workbook(&path) {
            Ok(grid) => grid,
            Err(err) => {
                warn!(file = %entry.filename, error = %err, "failed to read workbook");
                warnings.push(format!("failed to read {}: {err:#}", entry.filename));
                counts.failed_workbook_count += 1;
                continue;
            }
        };

        let table = extractor.extract(&grid);
        debug!(
            file = %entry.filename,
            columns = table.header.len(),
            rows = table.rows.len(),
            "extracted table"
        );
        if table.header_fallback {
            warn!(file = %entry.filename, "no header row found; using first row verbatim");
            warnings.push(format!(
                "no header row found in {}; synthetic column names used",
                entry.filename
            ));
            counts.header_fallback_count += 1;
        }

        let metadata = FileMetadata {
            semester: entry.semester.clone(),
            recruitment_round: entry.recruitment_round.clone(),
        };

        counts.rows_extracted += table.rows.len();
        let rows = clean_rows(table.rows, &metadata, &normalize_config);
        counts.rows_normalized += rows.len();

        if args.dry_run {
            info!(
                file = %entry.filename,
                rows = rows.len(),
                "dry-run; skipping database load"
            );
            counts.processed_workbook_count += 1;
            continue;
        }

        let stats = load_batch(&mut connection, &loader, &rows)
            .with_context(|| format!("failed to load {}", entry.filename))?;

        info!(
            file = %entry.filename,
            inserted = stats.inserted,
            updated = stats.updated,
            skipped = stats.skipped,
            requirements = stats.requirements,
            "loaded workbook"
        );

        counts.universities_inserted += stats.inserted;
        counts.universities_updated += stats.updated;
        counts.rows_skipped += stats.skipped;
        counts.requirements_inserted += stats.requirements;
        counts.processed_workbook_count += 1;
    }

    counts.universities_total = count_rows(&connection, "SELECT COUNT(*) FROM university")?;
    counts.requirements_total =
        count_rows(&connection, "SELECT COUNT(*) FROM language_requirement")?;

    let updated_at = now_utc_string();
    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        db_schema_version: super::DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at,
        dry_run: args.dry_run,
        command: render_ingest_command(&args),
        paths: IngestPaths {
            data_root: args.data_root.display().to_string(),
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts: counts.clone(),
        source_hashes: inventory.workbooks,
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        universities = counts.universities_total,
        requirements = counts.requirements_total,
        "ingest completed"
    );

    Ok(())
}

/// One transaction per file: a partial failure must not leave a university
/// with a stale requirement set.
fn load_batch(
    connection: &mut Connection,
    loader: &Loader,
    rows: &[CanonicalRow],
) -> Result<LoadStats> {
    let tx = connection.transaction()?;
    let stats = loader.load_rows(&tx, rows)?;
    tx.commit()?;
    Ok(stats)
}

fn load_or_refresh_inventory(
    data_root: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
) -> Result<WorkbookInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(data_root)?;
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            workbook_count = manifest.workbook_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let raw = fs::read(inventory_manifest_path)
        .with_context(|| format!("failed to read {}", inventory_manifest_path.display()))?;
    let manifest: WorkbookInventoryManifest = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", inventory_manifest_path.display()))?;

    info!(
        path = %inventory_manifest_path.display(),
        workbook_count = manifest.workbook_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut parts = vec![
        "uniexchange ingest".to_string(),
        format!("--data-root {}", args.data_root.display()),
        format!("--cache-root {}", args.cache_root.display()),
    ];
    if args.refresh_inventory {
        parts.push("--refresh-inventory".to_string());
    }
    if args.dry_run {
        parts.push("--dry-run".to_string());
    }
    if args.init_db {
        parts.push("--init-db".to_string());
    }
    parts.join(" ")
}
