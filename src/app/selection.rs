//! Caller-side record selection: id filters and a count limit.

use audiobook_core::BookRecord;

use crate::cli::SelectionArgs;

/// Applies `--id`, `--start-from`, `--end-at` then `--limit`, keeping
/// catalog order.
pub(crate) fn select_records(records: &[BookRecord], selection: &SelectionArgs) -> Vec<BookRecord> {
    let limit = selection
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

    records
        .iter()
        .filter(|record| selection.id.is_none_or(|id| record.id == id))
        .filter(|record| selection.start_from.is_none_or(|start| record.id >= start))
        .filter(|record| selection.end_at.is_none_or(|end| record.id <= end))
        .take(limit)
        .cloned()
        .collect()
}
