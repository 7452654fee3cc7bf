//! Power-plant registry (`All_Power_Plants.csv`).

use std::{collections::HashSet, fs::File, path::Path};

use serde::Deserialize;
use tracing::warn;

use crate::error::PrepError;

pub const REQUIRED_COLUMNS: [&str; 10] = [
    "x",
    "y",
    "OBJECTID",
    "Plant_Code",
    "Plant_Name",
    "Utility_Name",
    "PrimSource",
    "Total_MW",
    "Longitude",
    "Latitude",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Plant {
    #[serde(rename = "OBJECTID")]
    pub object_id: String,
    #[serde(rename = "Plant_Code")]
    pub plant_code: String,
    #[serde(rename = "Plant_Name")]
    pub plant_name: String,
    #[serde(rename = "Utility_Name")]
    pub utility_name: String,
    #[serde(rename = "PrimSource")]
    pub prim_source: String,
    #[serde(rename = "Total_MW")]
    pub total_mw: String,
    #[serde(rename = "Longitude", deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
    #[serde(rename = "Latitude", deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub y: Option<f64>,
}

impl Plant {
    /// The join coordinate, from the `Longitude`/`Latitude` columns.
    pub fn location(&self) -> Option<Coordinate> {
        match (self.longitude, self.latitude) {
            (Some(longitude), Some(latitude)) => Some(Coordinate::new(longitude, latitude)),
            _ => None,
        }
    }

    /// The sampling coordinate, from the `x`/`y` columns.
    pub fn sample_point(&self) -> Option<Coordinate> {
        match (self.x, self.y) {
            (Some(longitude), Some(latitude)) => Some(Coordinate::new(longitude, latitude)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

/// Exact-equality key for a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey(u64, u64);

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Coordinate {
            longitude,
            latitude,
        }
    }

    pub fn key(&self) -> CoordKey {
        CoordKey(canonical_bits(self.longitude), canonical_bits(self.latitude))
    }
}

// -0.0 and 0.0 compare equal
fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

pub fn read_registry(path: &Path) -> Result<Vec<Plant>, PrepError> {
    if !path.exists() {
        return Err(PrepError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(PrepError::malformed(
            path,
            format!("missing columns {:?}", missing),
        ));
    }

    let mut plants = Vec::new();
    for result in reader.deserialize() {
        let plant: Plant = result?;
        plants.push(plant);
    }

    Ok(plants)
}

/// Distinct sampling coordinates in first-seen order.
pub fn unique_coords(plants: &[Plant]) -> Vec<Coordinate> {
    let mut seen = HashSet::new();
    let mut coords = Vec::new();

    for plant in plants {
        match plant.sample_point() {
            Some(point) => {
                if seen.insert(point.key()) {
                    coords.push(point);
                }
            }
            None => warn!(
                object_id = %plant.object_id,
                "Plant has no x/y coordinate, skipping"
            ),
        }
    }

    coords
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str =
        "x,y,OBJECTID,Plant_Code,Plant_Name,Utility_Name,PrimSource,Total_MW,Longitude,Latitude";

    fn registry_file(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file
    }

    #[test]
    fn should_read_registry() {
        let file = registry_file(&[
            "-118.1,33.7,1,315,Alamitos,AES Alamitos LLC,natural gas,2010.5,-118.1,33.7",
            "-119.2,34.1,2,350,\"Ormond Beach, Unit\",GenOn,natural gas,1516,-119.2,34.1",
        ]);

        let plants = read_registry(file.path()).unwrap();

        assert_eq!(plants.len(), 2);
        assert_eq!(plants[0].object_id, "1");
        assert_eq!(plants[0].total_mw, "2010.5");
        assert_eq!(plants[1].plant_name, "Ormond Beach, Unit");
        assert_eq!(plants[1].location(), Some(Coordinate::new(-119.2, 34.1)));
    }

    #[test]
    fn should_report_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "x,y,OBJECTID").unwrap();
        writeln!(file, "1,2,3").unwrap();

        let err = read_registry(file.path()).unwrap_err();

        assert!(matches!(err, PrepError::MalformedInput { .. }));
        assert!(err.to_string().contains("Plant_Code"));
    }

    #[test]
    fn should_report_missing_file() {
        let err = read_registry(Path::new("does/not/exist.csv")).unwrap_err();

        assert!(matches!(err, PrepError::InputNotFound { .. }));
    }

    #[test]
    fn should_reduce_to_unique_coords_in_order() {
        let file = registry_file(&[
            "-118.1,33.7,1,315,A,U,gas,10,-118.1,33.7",
            "-119.2,34.1,2,350,B,U,gas,10,-119.2,34.1",
            "-118.1,33.7,3,316,C,U,solar,5,-118.1,33.7",
            ",,4,317,D,U,solar,5,,",
        ]);
        let plants = read_registry(file.path()).unwrap();

        let coords = unique_coords(&plants);

        assert_eq!(
            coords,
            vec![Coordinate::new(-118.1, 33.7), Coordinate::new(-119.2, 34.1)]
        );
        assert_eq!(plants[3].location(), None);
    }

    #[test]
    fn should_cover_every_registry_coordinate() {
        let file = registry_file(&[
            "-118.1,33.7,1,315,A,U,gas,10,-118.1,33.7",
            "-119.2,34.1,2,350,B,U,gas,10,-119.2,34.1",
            "-120.0,35.0,3,351,C,U,gas,10,-120.0,35.0",
            "-119.2,34.1,4,352,D,U,gas,10,-119.2,34.1",
        ]);
        let plants = read_registry(file.path()).unwrap();

        let coords = unique_coords(&plants);
        let keys: HashSet<CoordKey> = coords.iter().map(Coordinate::key).collect();

        for plant in &plants {
            assert!(keys.contains(&plant.sample_point().unwrap().key()));
        }
        assert_eq!(coords.len(), 3);
    }

    #[test]
    fn should_key_signed_zero_equally() {
        assert_eq!(
            Coordinate::new(0.0, 1.0).key(),
            Coordinate::new(-0.0, 1.0).key()
        );
        assert_ne!(
            Coordinate::new(1.0, 0.0).key(),
            Coordinate::new(0.0, 1.0).key()
        );
    }
}
