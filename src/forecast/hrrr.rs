//! HRRR archive layout and subset download.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use regex::Regex;
use reqwest::{header::RANGE, Client};
use tracing::{debug, warn};

use crate::{
    error::PrepError,
    staging::{persist, staging_file},
};

use super::{
    grid::{decode_grid, Grid},
    index::{parse_index, search},
};

pub const DEFAULT_BASE_URL: &str = "https://noaa-hrrr-bdp-pds.s3.amazonaws.com";

/// Search pattern for the 2 metre temperature field.
pub const TMP_2M: &str = ":TMP:2 m";

/// A single HRRR surface file: one model run and one lead time.
#[derive(Debug, Clone, PartialEq)]
pub struct HrrrRequest {
    pub run: NaiveDateTime,
    pub fxx: u32,
}

impl HrrrRequest {
    pub fn new(run: NaiveDateTime, fxx: u32) -> Self {
        HrrrRequest { run, fxx }
    }

    pub fn file_name(&self) -> String {
        format!("hrrr.t{}z.wrfsfcf{:02}.grib2", self.run.format("%H"), self.fxx)
    }

    pub fn grib_url(&self, base_url: &str) -> String {
        format!(
            "{}/hrrr.{}/conus/{}",
            base_url.trim_end_matches('/'),
            self.run.format("%Y%m%d"),
            self.file_name()
        )
    }

    pub fn index_url(&self, base_url: &str) -> String {
        format!("{}.idx", self.grib_url(base_url))
    }

    /// Local path of the cached subset for `label`, e.g.
    /// `~/data/hrrr/20240101/subset_TMP_2m__hrrr.t00z.wrfsfcf00.grib2`.
    pub fn subset_path(&self, grib_dir: &Path, label: &str) -> PathBuf {
        grib_dir
            .join("hrrr")
            .join(self.run.format("%Y%m%d").to_string())
            .join(format!("subset_{}__{}", label, self.file_name()))
    }
}

/// Downloads field subsets for HRRR runs, reusing cached subsets on disk.
pub struct HrrrFetcher {
    client: Client,
    base_url: String,
    grib_dir: PathBuf,
    keep_grib: bool,
    pattern: Regex,
    label: String,
}

impl HrrrFetcher {
    pub fn new(
        base_url: &str,
        grib_dir: PathBuf,
        keep_grib: bool,
        search_pattern: &str,
    ) -> Result<Self, PrepError> {
        let pattern = Regex::new(search_pattern).map_err(|e| {
            PrepError::malformed(search_pattern, format!("invalid search pattern: {}", e))
        })?;

        Ok(HrrrFetcher {
            client: Client::new(),
            base_url: base_url.to_string(),
            grib_dir,
            keep_grib,
            pattern,
            label: subset_label(search_pattern),
        })
    }

    /// Fetches and decodes the analysis (lead time 0) valid at `time`. A
    /// cached subset that fails to decode is removed and downloaded again.
    pub async fn fetch_grid(&self, time: NaiveDateTime, with_latlons: bool) -> Result<Grid, PrepError> {
        let request = HrrrRequest::new(time, 0);

        if let Some(bytes) = self.cached_subset(&request)? {
            match decode(bytes, with_latlons).await {
                Ok(grid) => return Ok(grid),
                Err(e) => {
                    let cache_path = request.subset_path(&self.grib_dir, &self.label);
                    warn!(path = %cache_path.display(), error = %e, "Discarding unreadable cached subset");
                    fs::remove_file(&cache_path)?;
                }
            }
        }

        let bytes = self.download_subset(&request).await?;

        decode(bytes, with_latlons).await
    }

    /// Bytes of a previously downloaded subset, if one is on disk.
    pub fn cached_subset(&self, request: &HrrrRequest) -> Result<Option<Vec<u8>>, PrepError> {
        let cache_path = request.subset_path(&self.grib_dir, &self.label);
        if !cache_path.exists() {
            return Ok(None);
        }

        debug!(path = %cache_path.display(), "Using cached subset");
        Ok(Some(fs::read(&cache_path)?))
    }

    /// Downloads the byte ranges of every matching message. When keeping
    /// GRIB files the subset is cached, appearing on disk only once complete.
    pub async fn download_subset(&self, request: &HrrrRequest) -> Result<Vec<u8>, PrepError> {
        let index_url = request.index_url(&self.base_url);
        let index_text = self.get_text(&index_url).await?;
        let entries = parse_index(&index_text, &index_url)?;
        let mut matches = search(&entries, &self.pattern);
        matches.dedup_by_key(|e| e.start);

        if matches.is_empty() {
            return Err(PrepError::RemoteFetch {
                url: index_url,
                reason: format!("no message matches `{}`", self.pattern),
            });
        }

        let grib_url = request.grib_url(&self.base_url);
        let mut bytes = Vec::new();
        for entry in matches {
            let chunk = self.get_range(&grib_url, &entry.range_header()).await?;
            bytes.extend_from_slice(&chunk);
        }

        if self.keep_grib {
            let cache_path = request.subset_path(&self.grib_dir, &self.label);
            let mut file = staging_file(&cache_path)?;
            file.write_all(&bytes)?;
            persist(file, &cache_path)?;
        }

        Ok(bytes)
    }

    async fn get_text(&self, url: &str) -> Result<String, PrepError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        if !response.status().is_success() {
            return Err(fetch_error(url, response.status()));
        }

        response.text().await.map_err(|e| fetch_error(url, e))
    }

    async fn get_range(&self, url: &str, range: &str) -> Result<Vec<u8>, PrepError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, range)
            .send()
            .await
            .map_err(|e| fetch_error(url, e))?;

        if !response.status().is_success() {
            return Err(fetch_error(url, response.status()));
        }

        let bytes = response.bytes().await.map_err(|e| fetch_error(url, e))?;

        Ok(bytes.to_vec())
    }
}

// File-name-safe form of a search pattern, `:TMP:2 m` -> `TMP_2m`
fn subset_label(pattern: &str) -> String {
    pattern
        .split(':')
        .filter(|part| !part.is_empty())
        .map(|part| part.replace(' ', ""))
        .map(|part| part.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>())
        .collect::<Vec<_>>()
        .join("_")
}

async fn decode(bytes: Vec<u8>, with_latlons: bool) -> Result<Grid, PrepError> {
    tokio::task::spawn_blocking(move || decode_grid(bytes, with_latlons))
        .await
        .map_err(|e| PrepError::Grib(e.to_string()))?
}

fn fetch_error(url: &str, reason: impl std::fmt::Display) -> PrepError {
    PrepError::RemoteFetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

// -- Tests -------------------------------------------------------------------
