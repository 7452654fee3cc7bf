//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod weather;

pub use weather::{load_weather, save_weather};
