pub mod outages;
pub mod weather;

use std::path::PathBuf;

pub use outages::outages;
pub use weather::weather;

/// Default location for downloaded GRIB2 subsets, `~/data`.
pub fn default_grib_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("data")
}
