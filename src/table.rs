//! In-memory gene attribute tables.
//!
//! A [`Table`] is an ordered list of uniquely named columns and rows of
//! [`Cell`] values. Every lookup, join and artifact in the pipeline goes
//! through this type, so absent values stay explicit (`Cell::Null`) from the
//! BioMart response all the way to the written TSV.

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};

use crate::error::KiraError;

const JOIN_SUFFIX: &str = "_y";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Null,
    Integer(i64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(value) => Some(*value),
            Cell::Text(value) => canonical_i64(value),
            Cell::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(value) => write!(f, "{value}"),
            Cell::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Integer(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self, KiraError> {
        ensure_unique(&columns)?;
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, KiraError> {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), KiraError> {
        if row.len() != self.columns.len() {
            return Err(KiraError::ColumnCountMismatch {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize, KiraError> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| KiraError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Cell> + '_, KiraError> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[index]))
    }

    pub fn cell(&self, row: usize, name: &str) -> Result<&Cell, KiraError> {
        let index = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|values| &values[index])
            .ok_or(KiraError::MissingRow {
                row,
                rows: self.rows.len(),
            })
    }

    /// Integer view of a column. Text values that are not canonical integers
    /// are rejected rather than silently dropped.
    pub fn integers(&self, name: &str) -> Result<Vec<Option<i64>>, KiraError> {
        self.column(name)?
            .map(|cell| match cell {
                Cell::Null => Ok(None),
                other => other.as_i64().map(Some).ok_or_else(|| {
                    KiraError::Tsv(format!("column {name} holds non-integer value {other}"))
                }),
            })
            .collect()
    }

    pub fn texts(&self, name: &str) -> Result<Vec<Option<String>>, KiraError> {
        Ok(self
            .column(name)?
            .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
            .collect())
    }

    /// Positional rename; the number of names must match the current width.
    pub fn with_columns(self, names: &[&str]) -> Result<Table, KiraError> {
        if names.len() != self.columns.len() {
            return Err(KiraError::ColumnCountMismatch {
                expected: self.columns.len(),
                found: names.len(),
            });
        }
        let columns = names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        ensure_unique(&columns)?;
        Ok(Table {
            columns,
            rows: self.rows,
        })
    }

    /// Left join on `self[left_on] == right[right_on]`.
    ///
    /// Every left row is emitted once per matching right row, or once with
    /// null right-hand cells when nothing matches. Null keys never match.
    /// Right-hand column names that collide with a left column get a `_y`
    /// suffix.
    pub fn left_join(
        &self,
        right: &Table,
        left_on: &str,
        right_on: &str,
    ) -> Result<Table, KiraError> {
        let left_key = self.column_index(left_on)?;
        let right_key = right.column_index(right_on)?;

        let mut index: HashMap<JoinKey<'_>, Vec<usize>> = HashMap::new();
        for (position, row) in right.rows.iter().enumerate() {
            if let Some(key) = JoinKey::of(&row[right_key]) {
                index.entry(key).or_default().push(position);
            }
        }

        let mut columns = self.columns.clone();
        for name in &right.columns {
            let mut candidate = name.clone();
            while columns.contains(&candidate) {
                candidate.push_str(JOIN_SUFFIX);
            }
            columns.push(candidate);
        }

        let null_right = vec![Cell::Null; right.columns.len()];
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let matches = JoinKey::of(&row[left_key]).and_then(|key| index.get(&key));
            match matches {
                Some(positions) => {
                    for &position in positions {
                        let mut joined = row.clone();
                        joined.extend(right.rows[position].iter().cloned());
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = row.clone();
                    joined.extend(null_right.iter().cloned());
                    rows.push(joined);
                }
            }
        }

        Ok(Table { columns, rows })
    }

    /// Splits rows into `(matching, rest)` by a predicate over one column.
    /// Both halves keep the full schema and the original relative order.
    pub fn partition_by<F>(&self, name: &str, predicate: F) -> Result<(Table, Table), KiraError>
    where
        F: Fn(&Cell) -> bool,
    {
        let index = self.column_index(name)?;
        let (matching, rest): (Vec<_>, Vec<_>) = self
            .rows
            .iter()
            .cloned()
            .partition(|row| predicate(&row[index]));
        Ok((
            Table {
                columns: self.columns.clone(),
                rows: matching,
            },
            Table {
                columns: self.columns.clone(),
                rows: rest,
            },
        ))
    }

    /// Vertical concatenation. The schema is the union of both column lists,
    /// in order of first appearance; missing cells are null.
    pub fn concat(&self, other: &Table) -> Table {
        let mut columns = self.columns.clone();
        for name in &other.columns {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }

        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        for source in [self, other] {
            let mapping = columns
                .iter()
                .map(|name| source.columns.iter().position(|column| column == name))
                .collect::<Vec<_>>();
            for row in &source.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|slot| slot.map(|i| row[i].clone()).unwrap_or(Cell::Null))
                        .collect(),
                );
            }
        }

        Table { columns, rows }
    }

    /// Appends a column holding each row's current position.
    pub fn with_row_index(&self, name: &str) -> Result<Table, KiraError> {
        if self.has_column(name) {
            return Err(KiraError::DuplicateColumn(name.to_string()));
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(position, row)| {
                let mut row = row.clone();
                row.push(Cell::Integer(position as i64));
                row
            })
            .collect();
        Ok(Table { columns, rows })
    }

    /// Stable sort on an integer column; nulls sort last.
    pub fn sort_by_integer(&self, name: &str) -> Result<Table, KiraError> {
        let keys = self.integers(name)?;
        let mut order = (0..self.rows.len()).collect::<Vec<_>>();
        order.sort_by_key(|&position| (keys[position].is_none(), keys[position]));
        Ok(Table {
            columns: self.columns.clone(),
            rows: order
                .into_iter()
                .map(|position| self.rows[position].clone())
                .collect(),
        })
    }

    pub fn drop_column(&self, name: &str) -> Result<Table, KiraError> {
        let index = self.column_index(name)?;
        let mut columns = self.columns.clone();
        columns.remove(index);
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.remove(index);
                row
            })
            .collect();
        Ok(Table { columns, rows })
    }

    /// Reads a tab-separated table whose first record is the header.
    pub fn read_tsv<R: Read>(reader: R) -> Result<Table, KiraError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let columns = reader
            .headers()
            .map_err(|err| KiraError::Tsv(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut raw = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| KiraError::Tsv(err.to_string()))?;
            raw.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        Self::from_raw(columns, raw)
    }

    /// Reads header-less, unquoted tab-separated records into the given
    /// columns. Every record must have exactly one field per column.
    pub fn read_tsv_with_columns<R: Read>(
        columns: Vec<String>,
        reader: R,
    ) -> Result<Table, KiraError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);
        let mut raw = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| KiraError::Tsv(err.to_string()))?;
            if record.len() != columns.len() {
                return Err(KiraError::ColumnCountMismatch {
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            raw.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        Self::from_raw(columns, raw)
    }

    /// Writes the table as TSV with a header. With `row_numbers` a leading
    /// unnamed column carries the 0-based row position.
    pub fn write_tsv<W: Write>(&self, writer: W, row_numbers: bool) -> Result<(), KiraError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        if row_numbers {
            header.push(String::new());
        }
        header.extend(self.columns.iter().cloned());
        writer
            .write_record(&header)
            .map_err(|err| KiraError::Tsv(err.to_string()))?;

        for (position, row) in self.rows.iter().enumerate() {
            let mut record = Vec::with_capacity(row.len() + 1);
            if row_numbers {
                record.push(position.to_string());
            }
            record.extend(row.iter().map(Cell::to_string));
            writer
                .write_record(&record)
                .map_err(|err| KiraError::Tsv(err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    fn from_raw(columns: Vec<String>, raw: Vec<Vec<String>>) -> Result<Table, KiraError> {
        ensure_unique(&columns)?;
        let integer_columns = (0..columns.len())
            .map(|index| {
                raw.iter()
                    .map(|row| row[index].as_str())
                    .filter(|value| !value.is_empty())
                    .all(|value| canonical_i64(value).is_some())
            })
            .collect::<Vec<_>>();

        let rows = raw
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&integer_columns)
                    .map(|(value, &integer)| {
                        if value.is_empty() {
                            Cell::Null
                        } else if integer {
                            canonical_i64(&value).map(Cell::Integer).unwrap_or(Cell::Null)
                        } else {
                            Cell::Text(value)
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(Table { columns, rows })
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum JoinKey<'a> {
    Integer(i64),
    Text(&'a str),
}

impl<'a> JoinKey<'a> {
    fn of(cell: &'a Cell) -> Option<Self> {
        match cell {
            Cell::Null => None,
            Cell::Integer(value) => Some(JoinKey::Integer(*value)),
            Cell::Text(value) => Some(
                canonical_i64(value)
                    .map(JoinKey::Integer)
                    .unwrap_or(JoinKey::Text(value)),
            ),
        }
    }
}

fn canonical_i64(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .filter(|parsed| parsed.to_string() == value)
}

fn ensure_unique(columns: &[String]) -> Result<(), KiraError> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(KiraError::DuplicateColumn(column.clone()));
        }
    }
    Ok(())
}
