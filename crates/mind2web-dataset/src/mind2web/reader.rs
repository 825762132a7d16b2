// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Streaming Mind2Web record readers.
//!
//! Records are read from JSON Lines exports or HuggingFace Parquet shards.
//! Screenshots are decoded one record at a time as the iterator advances so
//! a full split never has to be held in memory as bitmaps.

use super::types::Record;
use crate::Error;
use base64::Engine as _;
use image::DynamicImage;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

/// Boxed record stream returned by [`RecordReader::read`].
pub type Records = Box<dyn Iterator<Item = Result<Record, Error>>>;

/// Options for record reading.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Maximum number of records to read (0 = unlimited).
    pub max_records: usize,
}

/// Mind2Web record reader.
///
/// # Example
///
/// ```rust,no_run
/// use mind2web_dataset::mind2web::{ReadOptions, RecordReader};
///
/// let reader = RecordReader::with_options(ReadOptions { max_records: 100 });
/// for record in reader.read("data/test_task")? {
///     let record = record?;
///     println!("{} -> {}", record.action_uid, record.target_action_reprs);
/// }
/// # Ok::<(), mind2web_dataset::Error>(())
/// ```
pub struct RecordReader {
    options: ReadOptions,
}

impl RecordReader {
    /// Create a new reader with default options.
    pub fn new() -> Self {
        Self {
            options: ReadOptions::default(),
        }
    }

    /// Create a new reader with custom options.
    pub fn with_options(options: ReadOptions) -> Self {
        Self { options }
    }

    /// Read records from a file or a directory of shards.
    ///
    /// Files are dispatched on their extension (`.jsonl`, `.json`,
    /// `.parquet`). Directories are walked for such files, which are read in
    /// sorted path order.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<Records, Error> {
        let path = path.as_ref();
        let files = if path.is_dir() {
            let shards = list_shards(path);
            if shards.is_empty() {
                return Err(Error::MissingField(format!(
                    "no .jsonl or .parquet files under {:?}",
                    path
                )));
            }
            shards
        } else {
            vec![path.to_path_buf()]
        };

        if let Some(file) = files.iter().find(|f| shard_kind(f).is_none()) {
            return Err(Error::UnsupportedFormat(format!(
                "{:?} is neither JSON Lines nor Parquet",
                file
            )));
        }

        // Only the first shard is opened here, the rest as iteration reaches them
        let mut files = files.into_iter();
        let current = match files.next() {
            Some(first) => Some(self.open_shard(&first)?),
            None => None,
        };

        let mut records: Records = Box::new(Shards {
            reader: RecordReader::with_options(self.options.clone()),
            files,
            current,
        });

        if self.options.max_records > 0 {
            records = Box::new(records.take(self.options.max_records));
        }
        Ok(records)
    }

    fn open_shard(&self, file: &Path) -> Result<Records, Error> {
        match shard_kind(file) {
            Some(ShardKind::Jsonl) => Ok(Box::new(self.read_jsonl(file)?)),
            Some(ShardKind::Parquet) => Ok(Box::new(self.read_parquet(file)?)),
            None => Err(Error::UnsupportedFormat(format!(
                "{:?} is neither JSON Lines nor Parquet",
                file
            ))),
        }
    }

    /// Stream records from a JSON Lines file.
    pub fn read_jsonl<P: AsRef<Path>>(&self, path: P) -> Result<JsonlRecords, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!("Reading JSON Lines records from {:?}", path);

        Ok(JsonlRecords {
            path: path.to_path_buf(),
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            lines: BufReader::with_capacity(64 * 1024, file).lines(),
            line: 0,
        })
    }

    /// Read a Parquet shard in the HuggingFace Mind2Web layout.
    ///
    /// Column values are extracted up front; screenshots stay encoded until
    /// their record is yielded.
    pub fn read_parquet<P: AsRef<Path>>(&self, path: P) -> Result<ParquetRecords, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut df = ParquetReader::new(file).finish()?;
        if self.options.max_records > 0 && df.height() > self.options.max_records {
            df = df.slice(0, self.options.max_records);
        }
        debug!("Read {} rows from {:?}", df.height(), path);

        ParquetRecords::from_dataframe(&df, path.parent().unwrap_or(Path::new("")))
    }
}

impl Default for RecordReader {
    fn default() -> Self {
        Self::new()
    }
}

enum ShardKind {
    Jsonl,
    Parquet,
}

fn shard_kind(path: &Path) -> Option<ShardKind> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jsonl" | "json" => Some(ShardKind::Jsonl),
        "parquet" => Some(ShardKind::Parquet),
        _ => None,
    }
}

/// Records of several shards in order, opening each shard once the previous
/// one is exhausted.
struct Shards {
    reader: RecordReader,
    files: std::vec::IntoIter<PathBuf>,
    current: Option<Records>,
}

impl Iterator for Shards {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = &mut self.current {
                if let Some(record) = records.next() {
                    return Some(record);
                }
                self.current = None;
            }

            let file = self.files.next()?;
            debug!("Opening shard {:?}", file);
            match self.reader.open_shard(&file) {
                Ok(records) => self.current = Some(records),
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self
            .current
            .as_ref()
            .map_or((0, Some(0)), |records| records.size_hint());
        if self.files.len() == 0 {
            (lower, upper)
        } else {
            (lower, None)
        }
    }
}

fn list_shards(dir: &Path) -> Vec<PathBuf> {
    let mut shards: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && shard_kind(e.path()).is_some())
        .map(|e| e.into_path())
        .collect();
    shards.sort();
    shards
}

// =============================================================================
// Screenshots
// =============================================================================

/// Decode screenshot bytes, or load them from `path` when no bytes are
/// embedded. Relative paths resolve against `base_dir`.
fn decode_screenshot(
    bytes: Option<&[u8]>,
    path: Option<&str>,
    base_dir: &Path,
) -> Result<Option<DynamicImage>, Error> {
    match (bytes, path) {
        (Some(bytes), _) => Ok(Some(image::load_from_memory(bytes)?)),
        (None, Some(path)) if !path.is_empty() => {
            let path = base_dir.join(path);
            Ok(Some(image::ImageReader::open(&path)?.with_guessed_format()?.decode()?))
        }
        _ => Ok(None),
    }
}

/// Screenshot as stored in a JSON record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScreenshot {
    /// Base64 encoded image bytes.
    Encoded(String),
    /// HuggingFace image feature layout.
    Feature {
        #[serde(default)]
        bytes: Option<String>,
        #[serde(default)]
        path: Option<String>,
    },
}

impl RawScreenshot {
    fn decode(self, base_dir: &Path) -> Result<Option<DynamicImage>, Error> {
        let engine = base64::engine::general_purpose::STANDARD;
        match self {
            RawScreenshot::Encoded(data) => {
                let bytes = engine.decode(data.trim())?;
                decode_screenshot(Some(&bytes), None, base_dir)
            }
            RawScreenshot::Feature { bytes, path } => {
                let bytes = bytes.map(|b| engine.decode(b.trim())).transpose()?;
                decode_screenshot(bytes.as_deref(), path.as_deref(), base_dir)
            }
        }
    }
}

// =============================================================================
// JSON Lines
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawRecord {
    action_uid: String,
    annotation_id: String,
    #[serde(deserialize_with = "string_or_number")]
    target_action_index: String,
    #[serde(default)]
    screenshot: Option<RawScreenshot>,
    pos_candidates: Vec<String>,
    target_action_reprs: String,
    action_reprs: Vec<String>,
    website: String,
    domain: String,
    subdomain: String,
    confirmed_task: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

/// Iterator over the records of one JSON Lines file.
pub struct JsonlRecords {
    path: PathBuf,
    base_dir: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl JsonlRecords {
    fn parse(&self, text: &str) -> Result<Record, Error> {
        let location = || format!("{}:{}", self.path.display(), self.line);

        let raw: RawRecord = serde_json::from_str(text)
            .map_err(|e| Error::InvalidRecord(format!("{}: {}", location(), e)))?;

        let screenshot = match raw.screenshot {
            Some(screenshot) => screenshot.decode(&self.base_dir)?,
            None => None,
        };

        Ok(Record {
            action_uid: raw.action_uid,
            annotation_id: raw.annotation_id,
            target_action_index: raw.target_action_index,
            screenshot,
            pos_candidates: raw.pos_candidates,
            target_action_reprs: raw.target_action_reprs,
            action_reprs: raw.action_reprs,
            website: raw.website,
            domain: raw.domain,
            subdomain: raw.subdomain,
            confirmed_task: raw.confirmed_task,
            prev_actions: Vec::new(),
        })
    }
}

impl Iterator for JsonlRecords {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            return Some(self.parse(&text));
        }
    }
}

// =============================================================================
// Parquet
// =============================================================================

/// Iterator over the rows of one Parquet shard.
pub struct ParquetRecords {
    base_dir: PathBuf,
    row: usize,
    action_uids: Vec<Option<String>>,
    annotation_ids: Vec<Option<String>>,
    target_action_indices: Vec<Option<String>>,
    screenshots: Vec<(Option<Vec<u8>>, Option<String>)>,
    pos_candidates: Vec<Vec<String>>,
    target_action_reprs: Vec<Option<String>>,
    action_reprs: Vec<Vec<String>>,
    websites: Vec<Option<String>>,
    domains: Vec<Option<String>>,
    subdomains: Vec<Option<String>>,
    confirmed_tasks: Vec<Option<String>>,
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, Error> {
    df.column(name)
        .map_err(|_| Error::MissingField(format!("column {}", name)))
}

/// Extract a column as strings, casting numeric columns.
fn extract_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, Error> {
    let col = column(df, name)?.cast(&DataType::String)?;
    Ok(col
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

/// Extract a `list<string>` column; null lists become empty, null entries
/// inside a list are an error since positions matter.
fn extract_string_lists(df: &DataFrame, name: &str) -> Result<Vec<Vec<String>>, Error> {
    let list = column(df, name)?.list()?;
    let mut result = Vec::with_capacity(list.len());

    for row in 0..list.len() {
        let values = match list.get_as_series(row) {
            Some(series) => series
                .str()?
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    value.map(str::to_owned).ok_or_else(|| {
                        Error::MissingField(format!("{}[{}] (row {})", name, i, row))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
        };
        result.push(values);
    }

    Ok(result)
}

/// Extract the screenshot column, either a `struct{bytes, path}` image
/// feature or plain binary.
fn extract_screenshots(
    df: &DataFrame,
    name: &str,
) -> Result<Vec<(Option<Vec<u8>>, Option<String>)>, Error> {
    let series = column(df, name)?.as_materialized_series();

    match series.dtype() {
        DataType::Struct(_) => {
            let fields = series.struct_()?;
            let bytes = fields.field_by_name("bytes")?;
            let paths = fields.field_by_name("path").ok();

            let paths: Vec<Option<String>> = match paths {
                Some(paths) => paths
                    .cast(&DataType::String)?
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_owned))
                    .collect(),
                None => vec![None; bytes.len()],
            };

            Ok(bytes
                .binary()?
                .into_iter()
                .zip(paths)
                .map(|(b, p)| (b.map(<[u8]>::to_vec), p))
                .collect())
        }
        DataType::Binary => Ok(series
            .binary()?
            .into_iter()
            .map(|b| (b.map(<[u8]>::to_vec), None))
            .collect()),
        other => Err(Error::UnsupportedFormat(format!(
            "column {} has type {}, expected an image struct or binary",
            name, other
        ))),
    }
}

impl ParquetRecords {
    fn from_dataframe(df: &DataFrame, base_dir: &Path) -> Result<Self, Error> {
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            row: 0,
            action_uids: extract_strings(df, "action_uid")?,
            annotation_ids: extract_strings(df, "annotation_id")?,
            target_action_indices: extract_strings(df, "target_action_index")?,
            screenshots: extract_screenshots(df, "screenshot")?,
            pos_candidates: extract_string_lists(df, "pos_candidates")?,
            target_action_reprs: extract_strings(df, "target_action_reprs")?,
            action_reprs: extract_string_lists(df, "action_reprs")?,
            websites: extract_strings(df, "website")?,
            domains: extract_strings(df, "domain")?,
            subdomains: extract_strings(df, "subdomain")?,
            confirmed_tasks: extract_strings(df, "confirmed_task")?,
        })
    }

    pub fn len(&self) -> usize {
        self.action_uids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action_uids.is_empty()
    }

    fn build(&mut self, row: usize) -> Result<Record, Error> {
        fn required(values: &mut [Option<String>], name: &str, row: usize) -> Result<String, Error> {
            values[row]
                .take()
                .ok_or_else(|| Error::MissingField(format!("{} (row {})", name, row)))
        }

        let (bytes, path) = std::mem::take(&mut self.screenshots[row]);
        let screenshot = decode_screenshot(bytes.as_deref(), path.as_deref(), &self.base_dir)?;

        Ok(Record {
            action_uid: required(&mut self.action_uids, "action_uid", row)?,
            annotation_id: required(&mut self.annotation_ids, "annotation_id", row)?,
            target_action_index: required(
                &mut self.target_action_indices,
                "target_action_index",
                row,
            )?,
            screenshot,
            pos_candidates: std::mem::take(&mut self.pos_candidates[row]),
            target_action_reprs: required(
                &mut self.target_action_reprs,
                "target_action_reprs",
                row,
            )?,
            action_reprs: std::mem::take(&mut self.action_reprs[row]),
            website: required(&mut self.websites, "website", row)?,
            domain: required(&mut self.domains, "domain", row)?,
            subdomain: required(&mut self.subdomains, "subdomain", row)?,
            confirmed_task: required(&mut self.confirmed_tasks, "confirmed_task", row)?,
            prev_actions: Vec::new(),
        })
    }
}

impl Iterator for ParquetRecords {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.len() {
            return None;
        }
        let row = self.row;
        self.row += 1;
        Some(self.build(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len().saturating_sub(self.row);
        (remaining, Some(remaining))
    }
}
