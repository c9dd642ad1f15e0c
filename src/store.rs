//! Insert-only persistence of annotation records.
//!
//! The annotator only ever calls [`RecordWriter::insert`]; which backend sits
//! behind it is decided when the writer is constructed.

use crate::error::{AnnotateError, Result};
use crate::ir::{BoundingBox, GeoPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Record fields supplied by the caller; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub image_reference: String,
    pub bbox: BoundingBox,
    pub geo: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

impl NewRecord {
    pub fn new(image_reference: impl Into<String>, bbox: BoundingBox, geo: Option<GeoPoint>) -> Self {
        Self {
            image_reference: image_reference.into(),
            bbox,
            geo,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: u64,
    pub image_reference: String,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub name: String,
    pub date: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl AnnotationRecord {
    fn from_new(id: u64, record: NewRecord) -> Self {
        Self {
            id,
            image_reference: record.image_reference,
            x1: record.bbox.x1,
            y1: record.bbox.y1,
            x2: record.bbox.x2,
            y2: record.bbox.y2,
            name: record.bbox.name,
            date: record.bbox.date,
            latitude: record.geo.map(|geo| geo.latitude),
            longitude: record.geo.map(|geo| geo.longitude),
            created_at: record.created_at,
        }
    }
}

pub trait RecordWriter {
    fn insert(&mut self, record: NewRecord) -> Result<AnnotationRecord>;
}

/// Keeps records in memory; useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<AnnotationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }
}

impl RecordWriter for MemoryStore {
    fn insert(&mut self, record: NewRecord) -> Result<AnnotationRecord> {
        let id = self.records.len() as u64 + 1;
        let stored = AnnotationRecord::from_new(id, record);
        self.records.push(stored.clone());
        Ok(stored)
    }
}

/// Appends one JSON object per line. Ids continue from the last record
/// already in the file.
pub struct JsonLinesStore {
    path: PathBuf,
    file: File,
    next_id: u64,
}

impl JsonLinesStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| persistence(&path, err))?;
        }
        let next_id = match File::open(&path) {
            Ok(existing) => last_id(BufReader::new(existing), &path)? + 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 1,
            Err(err) => return Err(persistence(&path, err)),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| persistence(&path, err))?;
        log::debug!("record store {} opened, next id {}", path.display(), next_id);
        Ok(Self {
            path,
            file,
            next_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, in insertion order.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AnnotationRecord>> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).map_err(|err| persistence(path, err))?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|err| persistence(path, err))?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl RecordWriter for JsonLinesStore {
    fn insert(&mut self, record: NewRecord) -> Result<AnnotationRecord> {
        let stored = AnnotationRecord::from_new(self.next_id, record);
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|err| persistence(&self.path, err))?;
        self.next_id += 1;
        Ok(stored)
    }
}

fn last_id(reader: impl BufRead, path: &Path) -> Result<u64> {
    let mut last = 0;
    for line in reader.lines() {
        let line = line.map_err(|err| persistence(path, err))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AnnotationRecord = serde_json::from_str(&line).map_err(|err| {
            AnnotateError::Persistence(format!("{}: corrupt record: {err}", path.display()))
        })?;
        last = last.max(record.id);
    }
    Ok(last)
}

fn persistence(path: &Path, err: std::io::Error) -> AnnotateError {
    AnnotateError::Persistence(format!("{}: {err}", path.display()))
}
