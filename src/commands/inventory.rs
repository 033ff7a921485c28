use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::info;

use crate::cli::InventoryArgs;
use crate::model::{WorkbookEntry, WorkbookInventoryManifest};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.data_root)?;

    if args.dry_run {
        info!(
            workbook_count = manifest.workbook_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join("workbook_inventory.json")
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(workbook_count = manifest.workbook_count, "inventory completed");

    Ok(())
}

pub fn build_manifest(data_root: &Path) -> Result<WorkbookInventoryManifest> {
    let mut paths = discover_workbooks(data_root)?;
    paths.sort();

    if paths.is_empty() {
        bail!("no .xlsx workbooks found in {}", data_root.display());
    }

    let mut workbooks = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let metadata = FileMetadata::from_filename(&filename);
        let sha256 = sha256_file(&path)?;

        workbooks.push(WorkbookEntry {
            filename,
            semester: metadata.semester,
            recruitment_round: metadata.recruitment_round,
            sha256,
        });
    }

    workbooks.sort_by(|a, b| {
        b.semester
            .cmp(&a.semester)
            .then(a.filename.cmp(&b.filename))
    });

    Ok(WorkbookInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: data_root.display().to_string(),
        workbook_count: workbooks.len(),
        workbooks,
    })
}

fn discover_workbooks(data_root: &Path) -> Result<Vec<PathBuf>> {
    let mut workbooks = Vec::new();

    let entries = fs::read_dir(data_root)
        .with_context(|| format!("failed to read {}", data_root.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", data_root.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
            .unwrap_or(false);

        // Excel leaves ~$-prefixed lock files next to open workbooks.
        let is_lock_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("~$"))
            .unwrap_or(false);

        if is_xlsx && !is_lock_file {
            workbooks.push(path);
        }
    }

    Ok(workbooks)
}

/// Per-file metadata recovered from the export filename, e.g.
/// "2025-1 교환학생 모집 (2차).xlsx" -> semester "2025-1", round "2차".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub semester: Option<String>,
    pub recruitment_round: Option<String>,
}

static SEMESTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-?(\d)").expect("semester pattern compiles"));
static ROUND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d)차").expect("round pattern compiles"));

impl FileMetadata {
    pub fn from_filename(filename: &str) -> Self {
        let semester = SEMESTER_PATTERN
            .captures(filename)
            .map(|captures| format!("{}-{}", &captures[1], &captures[2]));
        let recruitment_round = ROUND_PATTERN
            .captures(filename)
            .map(|captures| format!("{}차", &captures[1]));

        Self {
            semester,
            recruitment_round,
        }
    }
}
