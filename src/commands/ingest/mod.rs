pub(crate) mod db_setup;
mod extract;
mod fields;
mod load;
mod normalize;
mod requirements;
mod run;
mod standards;
#[cfg(test)]
mod tests;
mod workbook;

pub use run::run;

pub(crate) const DB_SCHEMA_VERSION: &str = "0.1.0";
