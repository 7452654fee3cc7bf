//! Loads monthly outage spreadsheets and turns them into polars frames.
//!
//! Each sheet carries a 9-row preamble; row 9 (0-based) holds the column
//! headers and every later row is an outage record. Columns with an empty
//! header are named `Unnamed: <position>`.

use std::{fmt, path::Path};

use calamine::{open_workbook_auto, Data, DataType as _, Range, Reader};
use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::{
    error::PrepError,
    frame::{format_float, DATETIME_FORMAT},
};

pub const HEADER_ROW: u32 = 9;

/// Placeholder columns present in every monthly file.
pub const PLACEHOLDER_COLUMNS: [&str; 3] = ["Unnamed: 0", "Unnamed: 3", "Unnamed: 11"];

pub const RESOURCE_ID: &str = "RESOURCE ID";

pub const OTC_FLAG: &str = "isOTC";

/// Resources flagged as once-through cooling (OTC) units.
pub const OTC_RESOURCES: [&str; 11] = [
    "ALAMIT_2_PL1X3",
    "ALAMIT_7_UNIT 3",
    "ALAMIT_7_UNIT 4",
    "ALAMIT_7_UNIT 5",
    "HNTGBH_2_PL1X3",
    "HNTGBH_7_UNIT 2",
    "ORMOND_7_UNIT 1",
    "ORMOND_7_UNIT 2",
    "HARBGN_7_UNITS",
    "MOSSLD_2_PSP1",
    "MOSSLD_2_PSP2",
];

// Strings read as missing values
const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// Hidden companion of a mixed-type column, holding each cell's type
const KIND_PREFIX: &str = "__kind__";

/// A single non-missing spreadsheet value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn tag(&self) -> u32 {
        match self {
            Cell::Int(_) => 1,
            Cell::Float(_) => 2,
            Cell::Bool(_) => 3,
            Cell::DateTime(_) => 4,
            Cell::Text(_) => 5,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", format_float(*v)),
            Cell::Bool(true) => write!(f, "True"),
            Cell::Bool(false) => write!(f, "False"),
            Cell::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

/// The records of one spreadsheet, before any typing into columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutageSheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<Cell>>>,
}

impl OutageSheet {
    pub fn new(columns: Vec<String>) -> Self {
        OutageSheet {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Removes the named columns. Fails with the first name that is absent,
    /// leaving the sheet untouched.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<(), String> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            match self.column_index(name) {
                Some(idx) => indices.push(idx),
                None => return Err(name.to_string()),
            }
        }

        let keep = |i: &usize| !indices.contains(i);
        self.columns = retain_indices(std::mem::take(&mut self.columns), keep);
        for row in self.rows.iter_mut() {
            *row = retain_indices(std::mem::take(row), keep);
        }

        Ok(())
    }
}

fn retain_indices<T>(items: Vec<T>, keep: impl Fn(&usize) -> bool) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep(i))
        .map(|(_, item)| item)
        .collect()
}

/// Reads the first worksheet of a spreadsheet file.
pub fn read_outage_file(path: &Path) -> Result<OutageSheet, PrepError> {
    if !path.exists() {
        return Err(PrepError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PrepError::malformed(path, "workbook has no worksheets"))??;

    parse_sheet(&range, path)
}

/// Converts a worksheet into a sheet using the fixed header row.
pub fn parse_sheet(range: &Range<Data>, path: &Path) -> Result<OutageSheet, PrepError> {
    let (last_row, last_col) = range
        .end()
        .ok_or_else(|| PrepError::malformed(path, "worksheet is empty"))?;

    if last_row < HEADER_ROW {
        return Err(PrepError::malformed(
            path,
            format!("expected a header on row {}, sheet has {} rows", HEADER_ROW + 1, last_row + 1),
        ));
    }

    let width = last_col + 1;
    let headers: Vec<String> = (0..width)
        .map(|col| match range.get_value((HEADER_ROW, col)).and_then(to_cell) {
            Some(cell) => cell.to_string(),
            None => format!("Unnamed: {}", col),
        })
        .collect();

    let mut sheet = OutageSheet::new(dedupe_headers(headers));

    for row in (HEADER_ROW + 1)..=last_row {
        let cells: Vec<Option<Cell>> = (0..width)
            .map(|col| range.get_value((row, col)).and_then(to_cell))
            .collect();

        // Blank lines carry no record
        if cells.iter().all(Option::is_none) {
            continue;
        }
        sheet.rows.push(cells);
    }

    Ok(sheet)
}

/// Removes the placeholder columns, failing if the file lacks any of them.
pub fn prune_columns(sheet: &mut OutageSheet, path: &Path) -> Result<(), PrepError> {
    sheet.drop_columns(&PLACEHOLDER_COLUMNS).map_err(|missing| {
        PrepError::malformed(path, format!("expected column `{}` not found", missing))
    })
}

/// Storage type of a column, agreed over every sheet that has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Empty,
    Int,
    Float,
    Bool,
    DateTime,
    Text,
    /// Values of different types, stored as text with a hidden type column.
    Mixed,
}

impl ColumnKind {
    fn of(cell: &Cell) -> Self {
        match cell {
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Float,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::DateTime(_) => ColumnKind::DateTime,
            Cell::Text(_) => ColumnKind::Text,
        }
    }

    fn merge(self, other: Self) -> Self {
        use ColumnKind::*;

        match (self, other) {
            (Empty, kind) | (kind, Empty) => kind,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Mixed,
        }
    }
}

/// Union of the sheets' columns in first-seen order, with the kind of each.
pub fn column_kinds(sheets: &[OutageSheet]) -> Vec<(String, ColumnKind)> {
    let mut kinds: Vec<(String, ColumnKind)> = Vec::new();

    for sheet in sheets {
        for (idx, name) in sheet.columns.iter().enumerate() {
            let kind = sheet
                .rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(Option::as_ref))
                .fold(ColumnKind::Empty, |kind, cell| kind.merge(ColumnKind::of(cell)));

            match kinds.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = existing.merge(kind),
                None => kinds.push((name.clone(), kind)),
            }
        }
    }

    kinds
}

pub fn kind_column(name: &str) -> String {
    format!("{}{}", KIND_PREFIX, name)
}

/// Builds a frame with exactly the columns in `kinds`. Columns the sheet
/// lacks are all missing.
pub fn sheet_frame(sheet: &OutageSheet, kinds: &[(String, ColumnKind)]) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(kinds.len());

    for (name, kind) in kinds {
        let idx = sheet.column_index(name);
        let cells: Vec<Option<&Cell>> = sheet
            .rows
            .iter()
            .map(|row| idx.and_then(|i| row.get(i)).and_then(Option::as_ref))
            .collect();

        columns.push(typed_series(name, *kind, &cells));
        if *kind == ColumnKind::Mixed {
            let tags: Vec<Option<u32>> = cells.iter().map(|c| c.map(Cell::tag)).collect();
            columns.push(Series::new(kind_column(name).as_str().into(), tags));
        }
    }

    DataFrame::new(columns)
}

fn typed_series(name: &str, kind: ColumnKind, cells: &[Option<&Cell>]) -> Series {
    match kind {
        ColumnKind::Empty => Series::full_null(name.into(), cells.len(), &DataType::Null),
        ColumnKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Some(Cell::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    Some(Cell::Int(i)) => Some(*i as f64),
                    Some(Cell::Float(f)) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        ColumnKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    Some(Cell::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        ColumnKind::DateTime => DatetimeChunked::from_naive_datetime_options(
            name.into(),
            cells.iter().map(|c| match c {
                Some(Cell::DateTime(dt)) => Some(*dt),
                _ => None,
            }),
            TimeUnit::Milliseconds,
        )
        .into_series(),
        ColumnKind::Text | ColumnKind::Mixed => {
            let values: Vec<Option<String>> = cells.iter().map(|c| c.map(Cell::to_string)).collect();
            Series::new(name.into(), values)
        }
    }
}

/// `isOTC`: whether `RESOURCE ID` is exactly one of [`OTC_RESOURCES`].
pub fn otc_flag() -> Expr {
    col(RESOURCE_ID)
        .cast(DataType::String)
        .is_in(lit(Series::new("otc".into(), OTC_RESOURCES)))
        .alias(OTC_FLAG)
}

fn to_cell(data: &Data) -> Option<Cell> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            if NA_VALUES.contains(&s.as_str()) {
                None
            } else {
                Some(Cell::Text(s.clone()))
            }
        }
        Data::Int(i) => Some(Cell::Int(*i)),
        Data::Float(f) if f.is_nan() => None,
        // Whole numbers are stored as floats by the spreadsheet
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(Cell::Int(*f as i64)),
        Data::Float(f) => Some(Cell::Float(*f)),
        Data::Bool(b) => Some(Cell::Bool(*b)),
        Data::DateTime(_) | Data::DateTimeIso(_) => match data.as_datetime() {
            Some(dt) => Some(Cell::DateTime(dt)),
            None => Some(Cell::Text(data.to_string())),
        },
        Data::DurationIso(s) => Some(Cell::Text(s.clone())),
    }
}

// Repeated headers get a numeric suffix: `A`, `A.1`, `A.2`
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{}.{}", header, n);
            n += 1;
        }
        out.push(candidate);
    }

    out
}

// -- Tests ----------------------------------------------------------------------------
