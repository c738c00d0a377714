use crate::cell::CellValue;
use crate::fields::SourceRow;
use serde::Serialize;

/// One row of cells, positionally aligned with a header
pub type RawRow = Vec<CellValue>;

/// A header row followed by data rows
///
/// Rows shorter than the header are padded with empty cells when pushed.
/// Cells past the end of the header are kept as they are; they travel to the
/// spreadsheet but no column name maps to them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HeaderedTable {
    pub header: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl HeaderedTable {
    pub fn new(header: Vec<String>) -> Self {
        HeaderedTable {
            header,
            rows: Vec::new(),
        }
    }

    /// Appends a data row, padding it out to the header width
    pub fn push_row(&mut self, mut row: RawRow) {
        if row.len() < self.header.len() {
            row.resize(self.header.len(), CellValue::Empty);
        }
        self.rows.push(row);
    }

    /// Number of data rows, header excluded
    pub fn data_len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_header_only(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drops every data row whose cells are all blank and returns how many
    /// rows were removed. The header is never touched.
    pub fn sanitize(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !is_blank_row(row));
        before - self.rows.len()
    }

    /// Looks up a cell by column name in the given data row
    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.header.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(col)
    }

    /// Header plus data rows as plain strings, the shape the spreadsheet
    /// itself shows back
    pub fn to_string_rows(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.header.clone());
        for row in &self.rows {
            out.push(row.iter().map(|c| c.to_string()).collect());
        }
        out
    }

    /// Data rows keyed by lowercased header name, the shape rows have when
    /// read back from the spreadsheet. Cells without a header are left out.
    pub fn to_source_rows(&self) -> Vec<SourceRow> {
        let keys: Vec<String> = self.header.iter().map(|h| h.trim().to_lowercase()).collect();
        self.rows
            .iter()
            .map(|row| {
                keys.iter()
                    .zip(row)
                    .filter(|(key, _)| !key.is_empty())
                    .map(|(key, cell)| (key.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }
}

pub fn is_blank_row(row: &[CellValue]) -> bool {
    row.iter().all(CellValue::is_blank)
}
