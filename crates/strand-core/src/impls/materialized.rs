//! Fully materialized result set.
//!
//! Connectors copy every row out of the driver before returning, so a
//! result set owns no driver state and can move to the host thread.

use crate::ports::ResultSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializedResult {
    fields: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    row_cursor: usize,
    field_cursor: u32,
}

impl MaterializedResult {
    pub fn new(fields: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            fields,
            rows,
            row_cursor: 0,
            field_cursor: 0,
        }
    }

    /// Result of a statement that returns no columns.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl ResultSet for MaterializedResult {
    fn num_rows(&self) -> u64 {
        self.rows.len() as u64
    }

    fn num_fields(&self) -> u32 {
        self.fields.len() as u32
    }

    fn field_seek(&mut self, offset: u32) -> u32 {
        std::mem::replace(&mut self.field_cursor, offset)
    }

    fn fetch_field(&mut self) -> Option<String> {
        let name = self.fields.get(self.field_cursor as usize)?.clone();
        self.field_cursor += 1;
        Some(name)
    }

    fn fetch_row(&mut self) -> Option<Vec<Option<String>>> {
        let row = self.rows.get(self.row_cursor)?.clone();
        self.row_cursor += 1;
        Some(row)
    }
}
