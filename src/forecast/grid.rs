//! Decoding of a single-field GRIB2 subset into grid values.

use std::io::Cursor;

use crate::error::PrepError;

/// One decoded field. Missing grid points are `NaN`.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    pub values: Vec<f32>,
    /// `(latitude, longitude)` for each value, longitudes in -180..180.
    /// Only decoded when requested, the HRRR grid never changes.
    pub latlons: Option<Vec<(f32, f32)>>,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `idx`, `None` for missing points.
    pub fn value(&self, idx: usize) -> Option<f32> {
        self.values.get(idx).copied().filter(|v| !v.is_nan())
    }
}

/// Decodes the first message of a GRIB2 byte buffer.
pub fn decode_grid(bytes: Vec<u8>, with_latlons: bool) -> Result<Grid, PrepError> {
    let grib2 = grib::from_reader(Cursor::new(bytes)).map_err(grib_error)?;
    let (_, submessage) = grib2
        .iter()
        .next()
        .ok_or_else(|| PrepError::Grib("subset contains no messages".to_string()))?;

    let latlons = if with_latlons {
        let points: Vec<(f32, f32)> = submessage
            .latlons()
            .map_err(grib_error)?
            .map(|(lat, lon)| (lat, normalise_longitude(lon)))
            .collect();
        Some(points)
    } else {
        None
    };

    let decoder = grib::Grib2SubmessageDecoder::from(submessage).map_err(grib_error)?;
    let values: Vec<f32> = decoder.dispatch().map_err(grib_error)?.collect();

    if let Some(points) = &latlons {
        if points.len() != values.len() {
            return Err(PrepError::Grib(format!(
                "{} grid points but {} values",
                points.len(),
                values.len()
            )));
        }
    }

    Ok(Grid { values, latlons })
}

pub fn normalise_longitude(lon: f32) -> f32 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

fn grib_error(e: impl std::fmt::Display) -> PrepError {
    PrepError::Grib(e.to_string())
}

// -- Tests -------------------------------------------------------------------
