//! Read-only projection of the grid to a plain text table.
//!
//! Produces header + data rows as strings; the CLI owns the actual
//! delimited writer. Exports whatever the sheet currently shows, so a
//! previewed version exports the snapshot, not the live data.

use crate::sheet::Sheet;

/// Project the visible grid into rows of strings. First row is the header:
/// document title plus one column per sheet column.
pub fn sheet_to_rows(sheet: &Sheet) -> Vec<Vec<String>> {
    let columns = sheet.visible_columns();
    let mut out = Vec::with_capacity(sheet.visible_rows().len() + 1);

    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("Document".to_string());
    header.extend(columns.iter().map(|c| c.name.clone()));
    out.push(header);

    for row in sheet.visible_rows() {
        let mut line = Vec::with_capacity(columns.len() + 1);
        line.push(row.title.clone());
        for column in columns {
            let text = row
                .cell(&column.id)
                .map(|cell| cell.typed_value(column.column_type).display())
                .unwrap_or_default();
            line.push(text);
        }
        out.push(line);
    }

    out
}
