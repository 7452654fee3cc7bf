//! Combine the monthly outage spreadsheets into `FullOutageData.csv`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use polars::prelude::{
    col, concat, DataFrame, Expr, IntoLazy, PolarsResult, UnionArgs, UniqueKeepStrategy,
};
use tracing::info;

use crate::{
    cli::create_progress_bar,
    error::PrepError,
    frame::write_csv,
    reading::outage::{
        column_kinds, otc_flag, prune_columns, read_outage_file, sheet_frame, OutageSheet,
        RESOURCE_ID,
    },
};

pub const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

pub async fn outages(input_dir: &Path, output: &Path) -> Result<String> {
    let mut files = Vec::new();
    for dir in month_dirs(input_dir) {
        files.extend(list_files(&dir)?);
    }
    info!(files = files.len(), "Found monthly outage files");

    let pb = create_progress_bar(files.len() as u64, "Processing files".to_string());
    let mut sheets = Vec::with_capacity(files.len());

    for file in &files {
        pb.set_message(format!(
            "Processing file: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        ));

        let mut sheet = read_outage_file(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        prune_columns(&mut sheet, file)?;
        sheets.push(sheet);

        pb.inc(1);
    }
    pb.finish_with_message("Files processed");

    info!("Combining data...");
    let combined = combine(&sheets, input_dir)?;

    write_csv(&combined, output).with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(output.to_string_lossy().to_string())
}

/// Stacks the sheets in order, removes duplicate and incomplete rows and
/// appends the `isOTC` flag.
pub fn combine(sheets: &[OutageSheet], input_dir: &Path) -> Result<DataFrame, PrepError> {
    let kinds = column_kinds(sheets);
    if !kinds.iter().any(|(name, _)| name == RESOURCE_ID) {
        return Err(PrepError::malformed(
            input_dir,
            format!("no outage file has a `{}` column", RESOURCE_ID),
        ));
    }

    let frames = sheets
        .iter()
        .map(|sheet| sheet_frame(sheet, &kinds).map(IntoLazy::lazy))
        .collect::<PolarsResult<Vec<_>>>()?;
    let total: usize = sheets.iter().map(OutageSheet::len).sum();

    let deduped = concat(frames, UnionArgs::default())?
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    let duplicates = total - deduped.height();

    // Hidden type columns are dropped here
    let mut columns: Vec<Expr> = kinds.iter().map(|(name, _)| col(name.as_str())).collect();
    columns.push(otc_flag());

    let combined = deduped.lazy().drop_nulls(None).select(columns).collect()?;

    info!(
        total,
        duplicates,
        incomplete = total - duplicates - combined.height(),
        kept = combined.height(),
        "Combined outage records"
    );

    Ok(combined)
}

pub fn month_dirs(input_dir: &Path) -> Vec<PathBuf> {
    MONTHS.iter().map(|month| input_dir.join(month)).collect()
}

/// Regular files directly inside `dir`, sorted by name. Hidden files are
/// skipped.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, PrepError> {
    if !dir.is_dir() {
        return Err(PrepError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true);

        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::reading::outage::{Cell, OTC_FLAG};

    use super::*;

    fn text(s: &str) -> Option<Cell> {
        Some(Cell::Text(s.to_string()))
    }

    fn outage_sheet(rows: &[(&str, Option<i64>)]) -> OutageSheet {
        OutageSheet {
            columns: vec!["RESOURCE ID".to_string(), "CURTAILMENT MW".to_string()],
            rows: rows
                .iter()
                .map(|(id, mw)| vec![text(id), mw.map(Cell::Int)])
                .collect(),
        }
    }

    fn strings(df: &DataFrame, name: &str) -> Vec<String> {
        df.column(name)
            .unwrap()
            .cast(&polars::prelude::DataType::String)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn should_list_month_dirs_in_calendar_order() {
        let dirs = month_dirs(Path::new("/outages"));

        assert_eq!(dirs.len(), 12);
        assert_eq!(dirs[0], PathBuf::from("/outages/jan"));
        assert_eq!(dirs[11], PathBuf::from("/outages/dec"));
    }

    #[test]
    fn should_list_files_sorted_without_recursing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.xlsx"), b"").unwrap();
        fs::write(dir.path().join("a.xlsx"), b"").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.xlsx"), b"").unwrap();

        let files = list_files(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a.xlsx"), dir.path().join("b.xlsx")]
        );
    }

    #[test]
    fn should_fail_on_missing_month_dir() {
        let dir = TempDir::new().unwrap();

        let err = list_files(&dir.path().join("jan")).unwrap_err();

        assert!(matches!(err, PrepError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn should_abort_when_a_month_is_missing() {
        let dir = TempDir::new().unwrap();
        for month in &MONTHS[..11] {
            fs::create_dir(dir.path().join(month)).unwrap();
        }
        let output = dir.path().join("FullOutageData.csv");

        let result = outages(dir.path(), &output).await;

        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn should_combine_with_dedup_null_drop_and_flag() {
        let first = outage_sheet(&[
            ("ALAMIT_7_UNIT 3", Some(10)),
            ("UNIT_A", Some(1)),
            ("UNIT_B", Some(2)),
            ("UNIT_C", Some(3)),
            ("UNIT_D", Some(4)),
        ]);
        let second = outage_sheet(&[
            ("UNIT_A", Some(1)),
            ("UNIT_E", None),
            ("HARBGN_7_UNITS", Some(5)),
            ("UNIT_F", Some(6)),
            ("harbgn_7_units", Some(7)),
        ]);

        let df = combine(&[first, second], Path::new("outages")).unwrap();

        assert_eq!(df.height(), 8);
        assert_eq!(df.get_column_names().last().unwrap().to_string(), OTC_FLAG);
        assert_eq!(
            strings(&df, "RESOURCE ID"),
            vec![
                "ALAMIT_7_UNIT 3",
                "UNIT_A",
                "UNIT_B",
                "UNIT_C",
                "UNIT_D",
                "HARBGN_7_UNITS",
                "UNIT_F",
                "harbgn_7_units"
            ]
        );
        assert_eq!(
            strings(&df, OTC_FLAG),
            vec!["true", "false", "false", "false", "false", "true", "false", "false"]
        );
        assert!(df.get_columns().iter().all(|c| c.null_count() == 0));
    }

    #[test]
    fn should_stack_sheets_with_column_union() {
        let first = OutageSheet {
            columns: vec!["RESOURCE ID".to_string(), "A".to_string()],
            rows: vec![vec![text("UNIT_A"), text("a")]],
        };
        let second = OutageSheet {
            columns: vec!["B".to_string(), "RESOURCE ID".to_string()],
            rows: vec![vec![text("b"), text("UNIT_B")]],
        };

        let kinds = column_kinds(&[first.clone(), second.clone()]);
        let names: Vec<&str> = kinds.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["RESOURCE ID", "A", "B"]);

        // Each row lacks one column, so nothing survives the null drop
        let df = combine(&[first, second], Path::new("outages")).unwrap();
        assert_eq!(df.height(), 0);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn should_keep_first_of_duplicate_rows() {
        let sheet = outage_sheet(&[
            ("UNIT_X", Some(1)),
            ("UNIT_Y", Some(2)),
            ("UNIT_X", Some(1)),
            ("UNIT_X", Some(3)),
        ]);

        let df = combine(&[sheet], Path::new("outages")).unwrap();

        assert_eq!(strings(&df, "RESOURCE ID"), vec!["UNIT_X", "UNIT_Y", "UNIT_X"]);
        assert_eq!(strings(&df, "CURTAILMENT MW"), vec!["1", "2", "3"]);
    }

    #[test]
    fn should_keep_rows_differing_only_in_value_type() {
        let sheet = OutageSheet {
            columns: vec!["RESOURCE ID".to_string(), "MW".to_string()],
            rows: vec![
                vec![text("UNIT_A"), Some(Cell::Int(5))],
                vec![text("UNIT_A"), text("5")],
                vec![text("UNIT_A"), Some(Cell::Bool(true))],
                vec![text("UNIT_A"), text("True")],
                vec![text("UNIT_A"), Some(Cell::Int(5))],
            ],
        };

        let df = combine(&[sheet], Path::new("outages")).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(strings(&df, "MW"), vec!["5", "5", "True", "True"]);
        assert!(df.column("__kind__MW").is_err());
    }

    #[test]
    fn should_combine_two_files_into_eight_rows() {
        let ids = |prefix: &str| -> Vec<(String, Option<i64>)> {
            (0..5).map(|i| (format!("{}{}", prefix, i), Some(i))).collect()
        };
        let first = ids("a");
        let mut second = ids("b");
        second[0] = ("a0".to_string(), Some(0));
        second[1].1 = None;
        let as_sheet = |rows: &[(String, Option<i64>)]| {
            let rows: Vec<(&str, Option<i64>)> = rows.iter().map(|(id, mw)| (id.as_str(), *mw)).collect();
            outage_sheet(&rows)
        };

        let df = combine(&[as_sheet(&first), as_sheet(&second)], Path::new("outages")).unwrap();

        assert_eq!(df.height(), 5 + 5 - 1 - 1);
    }

    #[test]
    fn should_name_input_dir_when_resource_column_is_missing() {
        let sheet = OutageSheet {
            columns: vec!["OTHER".to_string()],
            rows: vec![vec![text("x")]],
        };

        let err = combine(&[sheet], Path::new("outages")).unwrap_err();

        assert!(matches!(err, PrepError::MalformedInput { .. }));
        assert!(err.to_string().contains("outages"));
        assert!(err.to_string().contains(RESOURCE_ID));
        assert!(!err.to_string().contains("FullOutageData.csv"));
    }

    #[tokio::test]
    async fn should_fail_without_any_outage_files() {
        let dir = TempDir::new().unwrap();
        for month in MONTHS {
            fs::create_dir(dir.path().join(month)).unwrap();
        }
        let output = dir.path().join("FullOutageData.csv");

        let result = outages(dir.path(), &output).await;

        assert!(result.is_err());
        assert!(!output.exists());
    }

    #[test]
    fn should_write_combined_csv() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("FullOutageData.csv");
        let sheet = OutageSheet {
            columns: vec!["RESOURCE ID".to_string(), "MW".to_string(), "START".to_string()],
            rows: vec![vec![
                text("MOSSLD_2_PSP1"),
                Some(Cell::Float(12.5)),
                Some(Cell::DateTime(
                    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                        .unwrap()
                        .and_hms_opt(7, 30, 0)
                        .unwrap(),
                )),
            ]],
        };

        let df = combine(&[sheet], Path::new("outages")).unwrap();
        write_csv(&df, &output).unwrap();

        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "RESOURCE ID,MW,START,isOTC\nMOSSLD_2_PSP1,12.5,2024-03-01 07:30:00,True\n"
        );
    }
}
