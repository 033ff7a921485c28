use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "uniexchange",
    version,
    about = "Exchange-program spreadsheet extraction and loading"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Ingest(IngestArgs),
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    /// Directory holding the raw .xlsx exports.
    #[arg(long, default_value = "data/raw")]
    pub data_root: PathBuf,

    #[arg(long, default_value = ".cache/uniexchange")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = "data/raw")]
    pub data_root: PathBuf,

    #[arg(long, default_value = ".cache/uniexchange")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    /// Extract and parse without writing to the database.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Drop and recreate the schema before loading.
    #[arg(long, default_value_t = false)]
    pub init_db: bool,

    /// Institution badge values treated as non-university consortium rows.
    #[arg(long = "exclude-institution", default_values_t = default_excluded_institutions())]
    pub excluded_institutions: Vec<String>,
}

fn default_excluded_institutions() -> Vec<String> {
    vec!["SAF".to_string(), "ACUCA".to_string()]
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = ".cache/uniexchange")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Exam type to match, e.g. TOEFL, IELTS, HSK.
    #[arg(long)]
    pub exam_type: String,

    /// The applicant's score; universities requiring at most this are returned.
    #[arg(long)]
    pub score: f64,

    #[arg(long)]
    pub nation: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/uniexchange")]
    pub cache_root: PathBuf,
}
