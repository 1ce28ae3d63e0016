//! # Column List
//!
//! Ordered `(name, type)` pairs persisted as `columns.txt`:
//!
//! ```text
//! columns format version: 1
//! 2 columns:
//! `id` UInt64
//! `name` String
//! ```

use crate::domain::errors::{PartStorageError, PartStorageResult};
use crate::domain::layout::COLUMNS_FILE;
use std::io::{Read, Write};

const FORMAT_HEADER: &str = "columns format version: 1";

/// A single column description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_name: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Columns stored in a part, in storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnList {
    columns: Vec<ColumnDescription>,
}

impl ColumnList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        self.columns.push(ColumnDescription::new(name, type_name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescription> {
        self.columns.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", FORMAT_HEADER)?;
        writeln!(out, "{} columns:", self.columns.len())?;
        for column in &self.columns {
            writeln!(
                out,
                "`{}` {}",
                column.name.replace('`', "\\`"),
                column.type_name
            )?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let _ = self.write(&mut buf);
        buf
    }

    pub fn read<R: Read>(input: &mut R) -> PartStorageResult<Self> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|e| PartStorageError::corrupted(COLUMNS_FILE, e.to_string()))?;

        let bad = |reason: String| PartStorageError::corrupted(COLUMNS_FILE, reason);
        let mut lines = text.lines();

        if lines.next() != Some(FORMAT_HEADER) {
            return Err(bad("unexpected header".to_string()));
        }
        let count_line = lines
            .next()
            .ok_or_else(|| bad("missing column count".to_string()))?;
        let count: usize = count_line
            .strip_suffix(" columns:")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| bad(format!("malformed column count {:?}", count_line)))?;

        let mut list = ColumnList::new();
        for _ in 0..count {
            let line = lines
                .next()
                .ok_or_else(|| bad("truncated column list".to_string()))?;
            let (name, type_name) =
                parse_column(line).ok_or_else(|| bad(format!("malformed column {:?}", line)))?;
            list.push(name, type_name);
        }
        Ok(list)
    }
}

/// Split "`name` Type" honoring escaped backquotes in the name.
fn parse_column(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('`')?;
    let mut name = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars.next()?;
                name.push(escaped);
            }
            '`' => {
                let type_name = rest[idx + 1..].strip_prefix(' ')?;
                if type_name.is_empty() {
                    return None;
                }
                return Some((name, type_name.to_string()));
            }
            other => name.push(other),
        }
    }
    None
}

impl FromIterator<(String, String)> for ColumnList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, type_name)| ColumnDescription { name, type_name })
                .collect(),
        }
    }
}
