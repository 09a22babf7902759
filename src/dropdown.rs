use serde::Serialize;
use std::time::Duration;

use crate::error::DropdownError;
use crate::schema::{ColumnSpan, REFERENCE_SHEET};
use crate::store::{RecordStore, bounded};

/// Reference data lives in columns A..F of the reference sheet.
pub const REFERENCE_SPAN: ColumnSpan = ColumnSpan::new(0, 5);

/// Option lists for the UI selection widgets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropdownOptions {
    pub box_types: Vec<String>,
    pub operators: Vec<String>,
    pub assembly_workers: Vec<String>,
    pub qc_inspectors: Vec<String>,
    pub pending_items: Vec<String>,
}

/// Non-empty values of `column`, deduplicated in first-seen order.
pub fn distinct_column(rows: &[Vec<String>], column: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for value in rows.iter().filter_map(|row| row.get(column)) {
        if !value.is_empty() && !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

/// Build the option lists from reference rows.
///
/// Column E is not offered to the UI. The sheet's header row is not skipped,
/// so its labels appear as the first option of each list.
pub fn aggregate(rows: &[Vec<String>]) -> Result<DropdownOptions, DropdownError> {
    if rows.is_empty() {
        return Err(DropdownError::EmptyReferenceData);
    }
    Ok(DropdownOptions {
        box_types: distinct_column(rows, 0),
        operators: distinct_column(rows, 1),
        assembly_workers: distinct_column(rows, 2),
        qc_inspectors: distinct_column(rows, 3),
        pending_items: distinct_column(rows, 5),
    })
}

/// Read the reference sheet and aggregate it.
pub async fn load_dropdowns(
    store: &dyn RecordStore,
    timeout: Duration,
) -> Result<DropdownOptions, DropdownError> {
    let rows = bounded(timeout, store.read_range(REFERENCE_SHEET, REFERENCE_SPAN)).await?;
    aggregate(&rows)
}
