//! Left join of the plant registry with reloaded weather samples.

use std::path::Path;

use polars::prelude::*;

use crate::{error::PrepError, frame::write_csv, reading::registry::Plant};

pub const OUTPUT_COLUMNS: [&str; 10] = [
    "OBJECTID",
    "Plant_Code",
    "Plant_Name",
    "Utility_Name",
    "PrimSource",
    "Total_MW",
    "longitude",
    "latitude",
    "time",
    "t2m",
];

// Registry position, used to keep plants in file order
const ROW: &str = "__row";

fn text_column<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> Series {
    let values: Vec<Option<&str>> = values
        .map(|v| if v.is_empty() { None } else { Some(v) })
        .collect();

    Series::new(name.into(), values)
}

/// The descriptive registry columns with `Longitude`/`Latitude` renamed to
/// `longitude`/`latitude`. Empty text is missing.
pub fn plants_frame(plants: &[Plant]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        text_column("OBJECTID", plants.iter().map(|p| p.object_id.as_str())),
        text_column("Plant_Code", plants.iter().map(|p| p.plant_code.as_str())),
        text_column("Plant_Name", plants.iter().map(|p| p.plant_name.as_str())),
        text_column("Utility_Name", plants.iter().map(|p| p.utility_name.as_str())),
        text_column("PrimSource", plants.iter().map(|p| p.prim_source.as_str())),
        text_column("Total_MW", plants.iter().map(|p| p.total_mw.as_str())),
        Series::new(
            "longitude".into(),
            plants.iter().map(|p| p.longitude).collect::<Vec<_>>(),
        ),
        Series::new(
            "latitude".into(),
            plants.iter().map(|p| p.latitude).collect::<Vec<_>>(),
        ),
    ])
}

/// Every plant, in registry order, paired with each weather row at exactly
/// the same coordinate in time order. Plants without a match appear once
/// with missing `time` and `t2m`.
pub fn left_join(plants: DataFrame, weather: DataFrame) -> PolarsResult<DataFrame> {
    let keys = [col("longitude"), col("latitude")];

    plants
        .lazy()
        .with_row_index(ROW, None)
        .join(
            weather.lazy(),
            keys.clone(),
            keys,
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(
            [col(ROW), col("time")],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .select(OUTPUT_COLUMNS.map(|c| col(c)))
        .collect()
}

/// Writes the joined rows as CSV without an index column. Returns the row
/// count. The file only appears at `path` once fully written.
pub fn write_joined_csv(joined: &DataFrame, path: &Path) -> Result<usize, PrepError> {
    write_csv(joined, path)?;

    Ok(joined.height())
}

// -- Tests -------------------------------------------------------------------
