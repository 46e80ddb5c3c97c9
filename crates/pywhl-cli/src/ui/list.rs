//! Cache listing table.

use super::theme::format_size;
use comfy_table::presets::NOTHING;
use comfy_table::{CellAlignment, ContentArrangement, Table};
use pywhl_core::cache::CacheEntry;

/// Table of cache entries, one row each, in the order given.
pub fn cache_table(entries: &[CacheEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["file", "size", "modified"]);

    for entry in entries {
        table.add_row(vec![
            entry.filename.clone(),
            format_size(entry.size),
            entry.modified.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    table
}
