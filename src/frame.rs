//! CSV output of polars frames, with values rendered as text: integral
//! floats keep a `.0`, booleans are `True`/`False` and date-times are
//! `YYYY-MM-DD HH:MM:SS`.

use std::path::Path;

use polars::prelude::*;

use crate::{
    error::PrepError,
    staging::{persist, staging_file},
};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a float so integral values keep a trailing `.0`.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// [`format_float`] for single precision values, without widening noise.
pub fn format_float32(v: f32) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e7 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// Text form of a column. Missing values stay missing.
pub fn render_column(series: &Series) -> PolarsResult<Series> {
    let name = series.name().to_string();

    let values: Vec<Option<String>> = match series.dtype() {
        DataType::String => return Ok(series.clone()),
        DataType::Null => vec![None; series.len()],
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { "True" } else { "False" }.to_string()))
            .collect(),
        DataType::Float32 => series
            .f32()?
            .into_iter()
            .map(|v| v.map(format_float32))
            .collect(),
        DataType::Float64 => series
            .f64()?
            .into_iter()
            .map(|v| v.map(format_float))
            .collect(),
        DataType::Datetime(_, _) => series
            .datetime()?
            .as_datetime_iter()
            .map(|v| v.map(|dt| dt.format(DATETIME_FORMAT).to_string()))
            .collect(),
        dtype if dtype.is_integer() => series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(|i| i.to_string()))
            .collect(),
        _ => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect(),
    };

    Ok(Series::new(name.as_str().into(), values))
}

pub fn render_frame(df: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(render_column)
        .collect::<PolarsResult<Vec<_>>>()?;

    DataFrame::new(columns)
}

/// Writes the frame as CSV with a header and no index column. The file only
/// appears at `path` once fully written.
pub fn write_csv(df: &DataFrame, path: &Path) -> Result<(), PrepError> {
    let mut rendered = render_frame(df)?;

    let mut file = staging_file(path)?;
    CsvWriter::new(file.as_file_mut())
        .include_header(true)
        .finish(&mut rendered)?;
    persist(file, path)?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn should_format_integral_floats_with_fraction() {
        assert_eq!(format_float(5.0), "5.0");
        assert_eq!(format_float(-118.25), "-118.25");
        assert_eq!(format_float32(280.0), "280.0");
        assert_eq!(format_float32(281.15), "281.15");
    }

    #[test]
    fn should_render_booleans_and_datetimes() {
        let flags = Series::new("isOTC".into(), &[Some(true), Some(false), None]);
        let times = DatetimeChunked::from_naive_datetime(
            "time".into(),
            [NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 0, 0)
                .unwrap()],
            TimeUnit::Milliseconds,
        )
        .into_series();

        let flags = render_column(&flags).unwrap();
        let times = render_column(&times).unwrap();

        let flags: Vec<Option<&str>> = flags.str().unwrap().into_iter().collect();
        assert_eq!(flags, vec![Some("True"), Some("False"), None]);
        assert_eq!(times.str().unwrap().get(0), Some("2024-01-02 03:00:00"));
    }

    #[test]
    fn should_write_csv_without_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let df = df!(
            "RESOURCE ID" => &["ALAMIT_7_UNIT 3", "PLANT, B"],
            "CURTAILMENT MW" => &[Some(5.0), None],
            "RESOURCE PMAX MW" => &[300i64, 250],
        )
        .unwrap();

        write_csv(&df, &path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "RESOURCE ID,CURTAILMENT MW,RESOURCE PMAX MW\n\
             ALAMIT_7_UNIT 3,5.0,300\n\
             \"PLANT, B\",,250\n"
        );
    }
}
