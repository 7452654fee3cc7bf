//! Save sampled weather to a parquet file and read it back as flat rows.

use std::{fs::File, path::Path, sync::Arc};

use arrow::{
    array::{Float32Builder, Float64Builder, TimestampMillisecondBuilder},
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use polars::prelude::{col, DataFrame, IntoLazy, ParquetReader, SerReader};

use crate::{
    cli::create_progress_bar,
    error::PrepError,
    sampling::PointSeries,
};

const CHUNK_SIZE: usize = 100_000;

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("time", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("point_longitude", DataType::Float64, false),
        Field::new("point_latitude", DataType::Float64, false),
        Field::new("longitude", DataType::Float64, false),
        Field::new("latitude", DataType::Float64, false),
        Field::new("t2m", DataType::Float32, true),
    ]))
}

struct Builders {
    time: TimestampMillisecondBuilder,
    point_longitude: Float64Builder,
    point_latitude: Float64Builder,
    longitude: Float64Builder,
    latitude: Float64Builder,
    t2m: Float32Builder,
}

impl Builders {
    fn new() -> Self {
        Builders {
            time: TimestampMillisecondBuilder::with_capacity(CHUNK_SIZE),
            point_longitude: Float64Builder::with_capacity(CHUNK_SIZE),
            point_latitude: Float64Builder::with_capacity(CHUNK_SIZE),
            longitude: Float64Builder::with_capacity(CHUNK_SIZE),
            latitude: Float64Builder::with_capacity(CHUNK_SIZE),
            t2m: Float32Builder::with_capacity(CHUNK_SIZE),
        }
    }

    fn write(&mut self, writer: &mut ArrowWriter<File>, schema: &Arc<Schema>) -> Result<(), PrepError> {
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(self.time.finish()),
                Arc::new(self.point_longitude.finish()),
                Arc::new(self.point_latitude.finish()),
                Arc::new(self.longitude.finish()),
                Arc::new(self.latitude.finish()),
                Arc::new(self.t2m.finish()),
            ],
        )?;

        writer.write(&batch)?;
        Ok(())
    }
}

/// Writes one row per `(time, point)`, time-major. Overwrites `file_path`.
pub fn save_weather(series: &PointSeries, file_path: &Path) -> Result<(), PrepError> {
    let file = File::create(file_path)?;
    let schema = schema();

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
    let pb = create_progress_bar(series.len() as u64, "Writing weather samples".to_string());

    let mut builders = Builders::new();
    let mut current_batch_rows = 0;

    for (time, values) in series.times.iter().zip(series.values.iter()) {
        let millis = time.and_utc().timestamp_millis();

        for (point, value) in series.points.iter().zip(values.iter()) {
            builders.time.append_value(millis);
            builders.point_longitude.append_value(point.point.longitude);
            builders.point_latitude.append_value(point.point.latitude);
            builders.longitude.append_value(point.grid_longitude as f64);
            builders.latitude.append_value(point.grid_latitude as f64);
            builders.t2m.append_option(*value);

            current_batch_rows += 1;
            if current_batch_rows >= CHUNK_SIZE {
                builders.write(&mut writer, &schema)?;
                pb.inc(current_batch_rows as u64);
                current_batch_rows = 0;
            }
        }
    }

    if current_batch_rows > 0 {
        builders.write(&mut writer, &schema)?;
        pb.inc(current_batch_rows as u64);
    }

    pb.finish_with_message("Weather samples written");
    writer.close()?;

    Ok(())
}

/// Reads a file written by [`save_weather`] back as flat
/// `time, t2m, longitude, latitude` rows, where the coordinates are the
/// requested points rather than the grid points.
pub fn load_weather(file_path: &Path) -> Result<DataFrame, PrepError> {
    let file = File::open(file_path)?;
    let df = ParquetReader::new(file).finish()?;

    let flat = df
        .lazy()
        .select([
            col("time"),
            col("t2m"),
            col("point_longitude").alias("longitude"),
            col("point_latitude").alias("latitude"),
        ])
        .collect()?;

    Ok(flat)
}

// -- Tests -------------------------------------------------------------------
