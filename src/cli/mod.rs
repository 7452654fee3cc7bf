//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::forecast::hrrr::{DEFAULT_BASE_URL, TMP_2M};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Combine the monthly outage spreadsheets into one CSV
    Outages {
        /// Directory holding the `jan` ... `dec` folders
        #[arg(long, default_value = ".")]
        input_dir: PathBuf,
        #[arg(long, default_value = "FullOutageData.csv")]
        output: PathBuf,
    },
    /// Sample hourly HRRR temperatures at every power plant
    Weather(WeatherArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WeatherArgs {
    /// Power plant registry CSV
    #[arg(long, default_value = "All_Power_Plants.csv")]
    pub registry: PathBuf,
    #[arg(long, default_value = "fullWeatherData.csv")]
    pub output: PathBuf,
    /// Intermediate file holding the sampled weather
    #[arg(long, default_value = "weather_data.parquet")]
    pub intermediate: PathBuf,
    /// Calendar year to fetch, through midnight on 1 January of the next year
    #[arg(long, default_value_t = 2024)]
    pub year: i32,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Field search pattern matched against the `.idx` inventory
    #[arg(long, default_value = TMP_2M)]
    pub search: String,
    /// Where downloaded GRIB2 subsets are kept [default: ~/data]
    #[arg(long)]
    pub grib_dir: Option<PathBuf>,
    /// Do not keep downloaded GRIB2 subsets on disk
    #[arg(long)]
    pub no_keep_grib: bool,
    /// Number of hours fetched at once
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------
