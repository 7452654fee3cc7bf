//! Sample hourly HRRR 2 m temperature at every power plant and join the
//! samples onto the registry as `fullWeatherData.csv`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use futures::{stream, StreamExt};
use tracing::info;

use crate::{
    cli::{create_progress_bar, create_spinner, WeatherArgs},
    forecast::{year_range, Grid, HrrrFetcher},
    join::{left_join, plants_frame, write_joined_csv},
    parquet::{load_weather, save_weather},
    reading::registry::{read_registry, unique_coords, Coordinate},
    sampling::{pick_points, GridIndex, PointSeries, SampledPoint},
};

use super::default_grib_dir;

pub async fn weather(args: &WeatherArgs) -> Result<String> {
    let times = year_range(args.year)?;
    info!(year = args.year, hours = times.len(), "Built hourly time range");

    let plants = read_registry(&args.registry)
        .with_context(|| format!("Failed to read {}", args.registry.display()))?;
    let coords = unique_coords(&plants);
    info!(plants = plants.len(), points = coords.len(), "Read power plant registry");

    let grib_dir = args.grib_dir.clone().unwrap_or_else(default_grib_dir);
    let fetcher = HrrrFetcher::new(&args.base_url, grib_dir, !args.no_keep_grib, &args.search)?;

    let series = fetch_series(&fetcher, &times, &coords, args.concurrency).await?;

    save_weather(&series, &args.intermediate)
        .with_context(|| format!("Failed to write {}", args.intermediate.display()))?;
    drop(series);

    let bar = create_spinner(format!("Reading {}...", args.intermediate.display()));
    let weather_df = load_weather(&args.intermediate)
        .with_context(|| format!("Failed to read {}", args.intermediate.display()))?;
    bar.finish_with_message(format!("Read {} weather samples", weather_df.height()));

    let bar = create_spinner("Joining weather onto registry...".to_string());
    let joined = left_join(plants_frame(&plants)?, weather_df)
        .context("Failed to join weather onto registry")?;
    let rows = write_joined_csv(&joined, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    bar.finish_with_message("Weather joined onto registry");
    info!(rows, "Wrote joined weather data");

    Ok(args.output.to_string_lossy().to_string())
}

/// Fetches every hour in order and samples it at `coords`. The grid of the
/// first hour decides which grid point each coordinate maps to.
async fn fetch_series(
    fetcher: &HrrrFetcher,
    times: &[NaiveDateTime],
    coords: &[Coordinate],
    concurrency: usize,
) -> Result<PointSeries> {
    let pb = create_progress_bar(times.len() as u64, "Fetching HRRR analyses".to_string());

    let mut grids = stream::iter(times.iter().enumerate())
        .map(|(i, &time)| async move { (time, fetcher.fetch_grid(time, i == 0).await) })
        .buffered(concurrency.max(1));

    let mut series = PointSeries::default();
    let mut grid_size = None;

    while let Some((time, grid)) = grids.next().await {
        let grid = grid.with_context(|| format!("Failed to fetch HRRR analysis for {}", time))?;

        match grid_size {
            None => {
                series = PointSeries::new(match_points(&grid, coords)?);
                grid_size = Some(grid.len());
            }
            Some(size) if size != grid.len() => bail!(
                "HRRR grid for {} has {} points, expected {}",
                time,
                grid.len(),
                size
            ),
            Some(_) => {}
        }

        series.push(time, &grid);
        pb.inc(1);
    }
    pb.finish_with_message("HRRR analyses fetched");

    Ok(series)
}

fn match_points(grid: &Grid, coords: &[Coordinate]) -> Result<Vec<SampledPoint>> {
    let latlons = grid
        .latlons
        .as_ref()
        .ok_or_else(|| anyhow!("Grid was decoded without coordinates"))?;

    let bar = create_spinner(format!("Matching {} points to the grid...", coords.len()));
    let index = GridIndex::new(latlons);
    let points = pick_points(&index, latlons, coords);
    bar.finish_with_message("Points matched to the grid");

    Ok(points)
}

// -- Tests -------------------------------------------------------------------
