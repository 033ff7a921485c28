use super::extract::{CanonicalField, CanonicalRow};
use crate::commands::inventory::FileMetadata;

/// Stamped when the filename carries no semester/round pattern; rows are
/// still loadable, just unattributed.
pub const UNKNOWN_METADATA: &str = "Unknown";

/// name_kr values containing any of these are spreadsheet footer or
/// section-header artifacts (totals, "N countries", repeated column titles).
const SUMMARY_ROW_MARKERS: &[&str] = &["합계", "소계", "총계", "대학명", "개국"];

/// Columns that rely on vertical merges in the source layout. Merge
/// resolution fills most gaps already; this forward fill is the second
/// safety net for sources that left real holes.
const FORWARD_FILL_FIELDS: &[CanonicalField] = &[
    CanonicalField::Nation,
    CanonicalField::Region,
    CanonicalField::ProgramType,
    CanonicalField::InstitutionBadge,
];

#[derive(Debug, Clone, Default)]
pub struct NormalizeConfig {
    /// Institution badge values that mark consortium bookkeeping rows,
    /// not real universities.
    pub excluded_institutions: Vec<String>,
}

pub fn clean_rows(
    rows: Vec<CanonicalRow>,
    metadata: &FileMetadata,
    config: &NormalizeConfig,
) -> Vec<CanonicalRow> {
    let mut kept: Vec<CanonicalRow> = rows
        .into_iter()
        .filter(|row| !row.is_empty())
        .filter(|row| !is_excluded_institution(row, config))
        .filter(is_data_row)
        .collect();

    forward_fill(&mut kept);

    let semester = metadata
        .semester
        .clone()
        .unwrap_or_else(|| UNKNOWN_METADATA.to_string());
    let recruitment_round = metadata
        .recruitment_round
        .clone()
        .unwrap_or_else(|| UNKNOWN_METADATA.to_string());

    for row in &mut kept {
        trim_cells(row);
        row.set(CanonicalField::Semester, semester.clone());
        row.set(CanonicalField::RecruitmentRound, recruitment_round.clone());
    }

    // Trimming can empty out whitespace-only rows that survived the first
    // pass; they carry only the stamped metadata at this point.
    kept.retain(|row| row.get(CanonicalField::NameKr).is_some());
    kept
}

fn is_excluded_institution(row: &CanonicalRow, config: &NormalizeConfig) -> bool {
    let Some(badge) = row.get(CanonicalField::InstitutionBadge) else {
        return false;
    };

    let badge = badge.trim();
    config
        .excluded_institutions
        .iter()
        .any(|excluded| badge == excluded)
}

fn is_data_row(row: &CanonicalRow) -> bool {
    let Some(name_kr) = row.get(CanonicalField::NameKr) else {
        return false;
    };

    if name_kr.trim().is_empty() {
        return false;
    }

    !SUMMARY_ROW_MARKERS
        .iter()
        .any(|marker| name_kr.contains(marker))
}

/// Propagate the last seen value downward in merge-prone columns.
fn forward_fill(rows: &mut [CanonicalRow]) {
    for field in FORWARD_FILL_FIELDS {
        let mut last_seen: Option<String> = None;
        for row in rows.iter_mut() {
            match row.get(*field) {
                Some(value) if !value.trim().is_empty() => {
                    last_seen = Some(value.to_string());
                }
                _ => {
                    if let Some(value) = &last_seen {
                        row.set(*field, value.clone());
                    }
                }
            }
        }
    }
}

/// Collapse internal whitespace runs and strip surrounding whitespace on
/// every cell; cells that become empty are dropped from the row.
fn trim_cells(row: &mut CanonicalRow) {
    for value in row.values_mut() {
        let collapsed = value.split_whitespace().collect::<Vec<&str>>().join(" ");
        *value = collapsed;
    }
    row.retain(|_, value| !value.is_empty());
}
