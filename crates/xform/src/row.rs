//! Rows and tables of string cells.
//!
//! A [`Row`] maps column names to optional strings. A missing column, a `None` cell
//! and a cell containing only whitespace all mean "no value"; [`Row::value`] is the
//! single accessor that applies that rule.

use std::collections::{HashMap, HashSet};

use tracing::debug;

/// One uploaded row: column name to optional cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: HashMap<String, Option<String>>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style cell assignment.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, Some(value.into()));
        self
    }

    /// Sets a cell. Passing `None` records the column without a value.
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.insert(column.into(), value);
    }

    /// Returns the trimmed cell text, or `None` when absent or blank.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Returns the untrimmed cell text when the column carries one.
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.cells.get(column).and_then(|v| v.as_deref())
    }

    /// Returns true when the row carries the column (with or without a value).
    pub fn has_column(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    /// Removes a column and returns its cell.
    pub fn remove(&mut self, column: &str) -> Option<Option<String>> {
        self.cells.remove(column)
    }

    /// Returns true when no column carries a value.
    pub fn is_blank(&self) -> bool {
        self.cells
            .values()
            .all(|v| v.as_deref().is_none_or(|s| s.trim().is_empty()))
    }

    /// Iterates `(column, cell)` pairs in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub(crate) fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(cell) = self.cells.remove(from) {
            self.cells.insert(to.to_string(), cell);
        }
    }

    pub(crate) fn map_cell(&mut self, column: &str, f: impl Fn(&str) -> String) {
        if let Some(Some(cell)) = self.cells.get_mut(column) {
            *cell = f(cell.as_str());
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Option<String>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An uploaded table: ordered column names plus rows keyed by those names.
///
/// Column names are unique. A repeated header is renamed with a numeric suffix
/// (`a`, `a.1`, `a.2`) so every cell keeps its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given columns. Repeated names get a
    /// numeric suffix.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: dedup_column_names(columns),
            rows: Vec::new(),
        }
    }

    /// Builds a table from positional records. Empty cells become "no value";
    /// records shorter than the header leave the remaining columns empty.
    pub fn from_records<I, R, S>(columns: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for record in records {
            let mut cells: Vec<Option<String>> = record
                .into_iter()
                .map(Into::into)
                .map(|s: String| if s.is_empty() { None } else { Some(s) })
                .collect();
            cells.resize(table.columns.len(), None);
            let row = table
                .columns
                .iter()
                .cloned()
                .zip(cells)
                .collect::<Row>();
            table.rows.push(row);
        }
        table
    }

    /// Appends a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Keeps only the columns named in `allowed`, preserving table order.
    pub fn retain_columns(&mut self, allowed: &[String]) {
        let dropped: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !allowed.contains(c))
            .cloned()
            .collect();
        self.columns.retain(|c| allowed.contains(c));
        for row in &mut self.rows {
            for column in &dropped {
                row.remove(column);
            }
        }
    }

    /// Drops rows in which every cell is blank.
    pub fn drop_blank_rows(&mut self) {
        self.rows.retain(|row| !row.is_blank());
    }

    /// Trims surrounding whitespace from every column name.
    ///
    /// A trimmed name that collides with another column gets a numeric suffix
    /// instead, so the column already carrying that name keeps it.
    pub fn trim_column_names(&mut self) {
        for idx in 0..self.columns.len() {
            let trimmed = self.columns[idx].trim();
            if trimmed == self.columns[idx] {
                continue;
            }
            let columns = &self.columns;
            let taken = |name: &str| columns.iter().any(|c| c == name);
            let target = if taken(trimmed) {
                let renamed = next_free_name(trimmed, taken);
                debug!(column = %columns[idx], renamed = %renamed, "Trimmed column name already in use");
                renamed
            } else {
                trimmed.to_string()
            };
            for row in &mut self.rows {
                row.rename(&self.columns[idx], &target);
            }
            self.columns[idx] = target;
        }
    }

    /// Adds (or replaces) `target` with values derived from `source`.
    pub fn derive_column(&mut self, source: &str, target: &str, f: impl Fn(&str) -> String) {
        if !self.has_column(target) {
            self.columns.push(target.to_string());
        }
        for row in &mut self.rows {
            let derived = row.raw(source).map(&f);
            row.set(target, derived);
        }
    }

    /// Rewrites every present value in `column`.
    pub fn map_column(&mut self, column: &str, f: impl Fn(&str) -> String) {
        for row in &mut self.rows {
            row.map_cell(column, &f);
        }
    }
}

fn dedup_column_names(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut unique = Vec::with_capacity(columns.len());
    for name in columns {
        let name = if seen.contains(&name) {
            let renamed = next_free_name(&name, |candidate| seen.contains(candidate));
            debug!(column = %name, renamed = %renamed, "Renamed duplicate column");
            renamed
        } else {
            name
        };
        seen.insert(name.clone());
        unique.push(name);
    }
    unique
}

/// First of `base.1`, `base.2`, ... not rejected by `taken`.
fn next_free_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut n = 1usize;
    loop {
        let candidate = format!("{base}.{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
