//! Parsing of GRIB2 `.idx` inventory files.
//!
//! Each line looks like `71:41967245:d=2024010100:TMP:2 m above ground:anl:`,
//! i.e. message number, byte offset, reference date, variable, level and
//! forecast description.

use regex::Regex;

use crate::error::PrepError;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Message number; submessages appear as `n.m`.
    pub message: String,
    pub start: u64,
    /// Inclusive end byte, `None` for the last message in the file.
    pub end: Option<u64>,
    pub reference: String,
    pub variable: String,
    pub level: String,
    pub forecast: String,
}

impl IndexEntry {
    /// The string patterns are matched against, e.g. `:TMP:2 m above ground:anl`.
    pub fn search_key(&self) -> String {
        format!(":{}:{}:{}", self.variable, self.level, self.forecast)
    }

    pub fn range_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

pub fn parse_index(text: &str, source: &str) -> Result<Vec<IndexEntry>, PrepError> {
    let mut entries = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return Err(malformed(source, line));
        }

        let message = fields[0].trim().to_string();
        let start = fields[1].trim().parse().map_err(|_| malformed(source, line))?;

        entries.push(IndexEntry {
            message,
            start,
            end: None,
            reference: fields[2].trim_start_matches("d=").to_string(),
            variable: fields[3].to_string(),
            level: fields[4].to_string(),
            forecast: fields[5].to_string(),
        });
    }

    // A message ends where the next one with a larger offset begins
    for i in 0..entries.len() {
        let start = entries[i].start;
        entries[i].end = entries[i + 1..]
            .iter()
            .map(|e| e.start)
            .find(|&next| next > start)
            .map(|next| next - 1);
    }

    Ok(entries)
}

pub fn search<'a>(entries: &'a [IndexEntry], pattern: &Regex) -> Vec<&'a IndexEntry> {
    entries
        .iter()
        .filter(|e| pattern.is_match(&e.search_key()))
        .collect()
}

fn malformed(source: &str, line: &str) -> PrepError {
    PrepError::RemoteFetch {
        url: source.to_string(),
        reason: format!("malformed index line `{}`", line),
    }
}

// -- Tests -------------------------------------------------------------------
