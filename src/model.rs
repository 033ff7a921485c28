use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookEntry {
    pub filename: String,
    /// Recruitment semester derived from the filename, e.g. "2025-1".
    pub semester: Option<String>,
    /// Recruitment round derived from the filename, e.g. "2차".
    pub recruitment_round: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub workbook_count: usize,
    pub workbooks: Vec<WorkbookEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub workbook_count: usize,
    pub processed_workbook_count: usize,
    pub failed_workbook_count: usize,
    pub header_fallback_count: usize,
    pub rows_extracted: usize,
    pub rows_normalized: usize,
    pub universities_inserted: usize,
    pub universities_updated: usize,
    pub rows_skipped: usize,
    pub requirements_inserted: usize,
    pub universities_total: i64,
    pub requirements_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub data_root: String,
    pub cache_root: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub dry_run: bool,
    pub command: String,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub source_hashes: Vec<WorkbookEntry>,
    pub warnings: Vec<String>,
}
