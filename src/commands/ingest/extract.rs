use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;

use super::workbook::RawGrid;

/// Header rows are searched within this many leading rows; exports put title
/// banners and legend rows above the table but never more than a handful.
const HEADER_SCAN_WINDOW: usize = 10;

/// A row is the primary header when its concatenated text contains any of
/// these. Vocabulary drifts release to release; these survive every known one.
const HEADER_KEYWORDS: &[&str] = &["대학명", "국가명", "프로그램", "구분", "일련번호"];

/// Secondary keywords marking a second header row (merged two-row headers).
const SUBHEADER_KEYWORDS: &[&str] = &[
    "최소",
    "학점",
    "어학",
    "성적",
    "특이사항",
    "유의사항",
    "참고",
    "사항",
    "비고",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    Nation,
    Region,
    ProgramType,
    NameKr,
    NameEn,
    InstitutionBadge,
    MinGpaRaw,
    LanguageRequirementRaw,
    SignificantNote,
    Remark,
    RemarkRef,
    AvailableMajors,
    WebsiteUrl,
    ReviewRaw,
    Semester,
    RecruitmentRound,
}

/// A discovered column: either mapped onto the canonical vocabulary or kept
/// under its normalized source label. Unmapped columns are never dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnLabel {
    Canonical(CanonicalField),
    Unmapped(String),
}

/// Raw-header keyword table, evaluated top to bottom after normalization.
/// Keys that are a superstring of another key must come first, so the most
/// specific wording wins.
const COLUMN_MAPPING: &[(&str, CanonicalField)] = &[
    ("수학가능학과/영어강의목록 등", CanonicalField::AvailableMajors),
    ("지원 자격 최소 학점", CanonicalField::MinGpaRaw),
    ("교환학생수기 여부", CanonicalField::ReviewRaw),
    ("FACTSHEET 여부", CanonicalField::ReviewRaw),
    ("프로그램 구분", CanonicalField::ProgramType),
    ("대학명(한글)", CanonicalField::NameKr),
    ("대학명(국문)", CanonicalField::NameKr),
    ("대학명(영문)", CanonicalField::NameEn),
    ("웹사이트 주소", CanonicalField::WebsiteUrl),
    ("수학가능학과", CanonicalField::AvailableMajors),
    ("최소 학점", CanonicalField::MinGpaRaw),
    ("지원 자격", CanonicalField::MinGpaRaw),
    ("학점조건", CanonicalField::MinGpaRaw),
    ("어학성적", CanonicalField::LanguageRequirementRaw),
    ("어학조건", CanonicalField::LanguageRequirementRaw),
    ("특이사항", CanonicalField::SignificantNote),
    ("유의사항", CanonicalField::Remark),
    ("참고사항", CanonicalField::RemarkRef),
    ("수기여부", CanonicalField::ReviewRaw),
    ("웹사이트", CanonicalField::WebsiteUrl),
    ("국가명", CanonicalField::Nation),
    ("국가", CanonicalField::Nation),
    // A lone 대학명 column carries the Korean name; the English name only
    // ever appears under an explicit (영문) qualifier.
    ("대학명", CanonicalField::NameKr),
    ("구분", CanonicalField::ProgramType),
    ("기관", CanonicalField::InstitutionBadge),
    ("뱃지", CanonicalField::InstitutionBadge),
    ("BADGE", CanonicalField::InstitutionBadge),
    ("지역", CanonicalField::Region),
    ("비고", CanonicalField::Remark),
];

/// One extracted data row: canonical (or unmapped) column -> raw cell text.
/// Absent cells are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRow {
    columns: BTreeMap<ColumnLabel, String>,
}

impl CanonicalRow {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.columns
            .get(&ColumnLabel::Canonical(field))
            .map(String::as_str)
    }

    pub fn set(&mut self, field: CanonicalField, value: String) {
        self.columns.insert(ColumnLabel::Canonical(field), value);
    }

    pub fn remove(&mut self, label: &ColumnLabel) -> Option<String> {
        self.columns.remove(label)
    }

    pub fn insert(&mut self, label: ColumnLabel, value: String) {
        self.columns.insert(label, value);
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.columns.values_mut()
    }

    pub fn retain<F: FnMut(&ColumnLabel, &mut String) -> bool>(&mut self, keep: F) {
        self.columns.retain(keep);
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedTable {
    pub header: Vec<ColumnLabel>,
    pub rows: Vec<CanonicalRow>,
    /// Set when no header row was found and the first row was used verbatim
    /// under synthetic labels. Surfaced as a run warning, never a hard error.
    pub header_fallback: bool,
}

pub struct TableExtractor {
    label_whitespace: Regex,
    label_reject: Regex,
}

impl TableExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            label_whitespace: Regex::new(r"\s+").context("failed to compile whitespace pattern")?,
            // Keep word chars, Korean syllables, whitespace, parens, slash, comma.
            label_reject: Regex::new(r"[^\w\s가-힣()/,]")
                .context("failed to compile label filter pattern")?,
        })
    }

    pub fn extract(&self, grid: &RawGrid) -> ExtractedTable {
        let Some(header_index) = find_header_row(grid) else {
            return self.extract_without_header(grid);
        };

        let mut raw_header: Vec<Option<String>> = grid[header_index].clone();
        let mut data_start = header_index + 1;

        // Two-row headers: merge the sub-header positionally, primary wins.
        if let Some(next_row) = grid.get(header_index + 1)
            && is_header_continuation(next_row)
        {
            raw_header = merge_header_rows(&raw_header, next_row);
            data_start = header_index + 2;
        }

        let data = &grid[data_start.min(grid.len())..];

        // Headers can under-report trailing sparse columns; size to the widest
        // data row and pad short rows on the right.
        let max_cols = data
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(raw_header.len())
            .max(raw_header.len());
        while raw_header.len() < max_cols {
            raw_header.push(None);
        }

        let header = self.normalize_header(&raw_header);
        let rows = data
            .iter()
            .map(|cells| build_row(&header, cells))
            .collect();

        ExtractedTable {
            header,
            rows,
            header_fallback: false,
        }
    }

    fn extract_without_header(&self, grid: &RawGrid) -> ExtractedTable {
        let max_cols = grid.iter().map(Vec::len).max().unwrap_or(0);
        let header: Vec<ColumnLabel> = (0..max_cols)
            .map(|index| ColumnLabel::Unmapped(format!("col_{index}")))
            .collect();

        let rows = grid
            .iter()
            .map(|cells| build_row(&header, cells))
            .collect();

        ExtractedTable {
            header,
            rows,
            header_fallback: true,
        }
    }

    /// Normalize each raw label and map it onto the canonical vocabulary.
    /// Duplicate targets keep their first position; `build_row` merges the
    /// cell values of duplicates into that position.
    fn normalize_header(&self, raw_header: &[Option<String>]) -> Vec<ColumnLabel> {
        raw_header
            .iter()
            .enumerate()
            .map(|(index, raw)| match raw {
                Some(text) if !text.trim().is_empty() => self.map_label(text, index),
                _ => ColumnLabel::Unmapped(format!("unnamed_{index}")),
            })
            .collect()
    }

    fn map_label(&self, raw: &str, index: usize) -> ColumnLabel {
        let normalized = self.normalize_label(raw);
        if normalized.is_empty() {
            return ColumnLabel::Unmapped(format!("unnamed_{index}"));
        }

        // Compare space-stripped: wrapped header text keeps its line-break
        // position as a space after normalization.
        let compact = normalized.replace(' ', "");
        for (key, field) in COLUMN_MAPPING {
            if compact.contains(&key.to_uppercase().replace(' ', "")) {
                return ColumnLabel::Canonical(*field);
            }
        }

        ColumnLabel::Unmapped(normalized)
    }

    pub(super) fn normalize_label(&self, raw: &str) -> String {
        let text = raw.replace(['\n', '\r'], " ");
        let text = self.label_whitespace.replace_all(text.trim(), " ");
        let text = self.label_reject.replace_all(&text, "");
        text.trim().to_uppercase()
    }
}

/// Collapse the cells of duplicate labels into one map entry per label,
/// space-joining values in column order and skipping nulls.
fn build_row(header: &[ColumnLabel], cells: &[Option<String>]) -> CanonicalRow {
    let mut row = CanonicalRow::default();

    for (label, cell) in header.iter().zip(
        cells
            .iter()
            .cloned()
            .chain(std::iter::repeat(None))
            .take(header.len()),
    ) {
        let Some(value) = cell else {
            continue;
        };

        match row.remove(label) {
            Some(existing) => row.insert(label.clone(), format!("{existing} {value}")),
            None => row.insert(label.clone(), value),
        }
    }

    row
}

fn find_header_row(grid: &RawGrid) -> Option<usize> {
    grid.iter()
        .take(HEADER_SCAN_WINDOW)
        .position(|row| row_contains_keyword(row, HEADER_KEYWORDS))
}

fn is_header_continuation(row: &[Option<String>]) -> bool {
    row_contains_keyword(row, SUBHEADER_KEYWORDS)
}

fn row_contains_keyword(row: &[Option<String>], keywords: &[&str]) -> bool {
    let joined = row
        .iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<&str>>()
        .join(" ");
    keywords.iter().any(|keyword| joined.contains(keyword))
}

fn merge_header_rows(
    primary: &[Option<String>],
    secondary: &[Option<String>],
) -> Vec<Option<String>> {
    let width = primary.len().max(secondary.len());
    (0..width)
        .map(|index| {
            let first = primary.get(index).and_then(|cell| cell.as_deref());
            let second = secondary.get(index).and_then(|cell| cell.as_deref());
            match first {
                Some(text) if !text.trim().is_empty() => Some(text.to_string()),
                _ => match second {
                    Some(text) if !text.trim().is_empty() => Some(text.to_string()),
                    _ => None,
                },
            }
        })
        .collect()
}
