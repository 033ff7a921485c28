use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};

/// Logical cell grid after merge resolution: row-major, trailing empty cells
/// trimmed per row, so rows may have differing lengths.
pub type RawGrid = Vec<Vec<Option<String>>>;

/// Sheets whose name contains this marker hold the main offering table.
const MAIN_SHEET_KEYWORD: &str = "지원가능대학";

pub fn read_workbook(path: &Path) -> Result<RawGrid> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("failed to open {}", path.display()))?;

    workbook
        .load_merged_regions()
        .with_context(|| format!("failed to load merged regions: {}", path.display()))?;

    let sheet_name = select_main_sheet(&workbook.sheet_names())
        .with_context(|| format!("no sheets in {}", path.display()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet {sheet_name} in {}", path.display()))?;

    let merges = match workbook.worksheet_merge_cells(&sheet_name) {
        Some(Ok(merges)) => merges,
        Some(Err(err)) => {
            return Err(err).with_context(|| {
                format!("failed to read merge ranges: {}", path.display())
            });
        }
        None => Vec::new(),
    };

    let Some(end) = range.end() else {
        return Ok(Vec::new());
    };

    // Every coordinate covered by a merge range takes the top-left value.
    let mut merged_values = HashMap::<(u32, u32), Option<String>>::new();
    for merge in &merges {
        let top_left = range.get_value((merge.start.0, merge.start.1));
        let value = top_left.and_then(cell_to_string);
        for row in merge.start.0..=merge.end.0 {
            for col in merge.start.1..=merge.end.1 {
                merged_values.insert((row, col), value.clone());
            }
        }
    }

    let mut grid = Vec::with_capacity(end.0 as usize + 1);
    for row in 0..=end.0 {
        let mut cells = Vec::with_capacity(end.1 as usize + 1);
        for col in 0..=end.1 {
            let value = match merged_values.get(&(row, col)) {
                Some(value) => value.clone(),
                None => range.get_value((row, col)).and_then(cell_to_string),
            };
            cells.push(value);
        }

        // Trim trailing empties but keep internal gaps.
        let last_populated = cells.iter().rposition(Option::is_some);
        match last_populated {
            Some(index) => cells.truncate(index + 1),
            None => cells.clear(),
        }
        grid.push(cells);
    }

    Ok(grid)
}

pub(super) fn select_main_sheet(sheet_names: &[String]) -> Option<String> {
    if sheet_names.is_empty() {
        return None;
    }

    sheet_names
        .iter()
        .find(|name| name.contains(MAIN_SHEET_KEYWORD))
        .or_else(|| sheet_names.first())
        .cloned()
}

fn cell_to_string(data: &Data) -> Option<String> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => {
            if text.trim().is_empty() {
                None
            } else {
                Some(text.clone())
            }
        }
        Data::Float(value) => Some(format_number(*value)),
        Data::Int(value) => Some(value.to_string()),
        Data::Bool(value) => Some(value.to_string()),
        Data::DateTime(value) => Some(value.to_string()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Some(text.clone()),
    }
}

/// Excel stores integers as floats; render "3.0" as "3" so downstream text
/// matching sees what the spreadsheet displayed.
pub(super) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
