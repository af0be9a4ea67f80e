//! Tensor record store.
//!
//! A store named by a path stem is a pair of files: `<stem>.rec` holds
//! fixed-shape records as contiguous little-endian bytes, `<stem>.meta` a
//! small JSON document with the record shape, element type and count.

mod reader;
mod writer;

pub use reader::{RecordIter, RecordReader};
pub use writer::RecordWriter;

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use blobnet_core::{BlobNetError, DType, Tensor};
use serde::{Deserialize, Serialize};

pub const RECORDS_EXTENSION: &str = "rec";
pub const META_EXTENSION: &str = "meta";

/// Contents of the `.meta` side file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Shape of a single record.
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub num_records: usize,
}

impl StoreMeta {
    /// Bytes taken by one record in the `.rec` file.
    pub fn record_bytes(&self) -> usize {
        self.shape.iter().product::<usize>() * self.dtype.size_of()
    }

    fn read(stem: &Path) -> Result<StoreMeta, BlobNetError> {
        let file = File::open(meta_path(stem))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write(&self, stem: &Path) -> Result<(), BlobNetError> {
        let mut writer = BufWriter::new(File::create(meta_path(stem))?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Drops a trailing `.rec` so both `data/train` and `data/train.rec` name the
/// same store.
pub fn normalize_stem(stem: &Path) -> PathBuf {
    match stem.extension() {
        Some(ext) if ext == RECORDS_EXTENSION => stem.with_extension(""),
        _ => stem.to_path_buf(),
    }
}

fn with_suffix(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

pub fn records_path(stem: &Path) -> PathBuf {
    with_suffix(stem, RECORDS_EXTENSION)
}

pub fn meta_path(stem: &Path) -> PathBuf {
    with_suffix(stem, META_EXTENSION)
}

/// Writes `tensor` as a store of `tensor.shape()[0]` records.
pub fn write_store(tensor: &Tensor, stem: impl AsRef<Path>) -> Result<StoreMeta, BlobNetError> {
    let mut writer = RecordWriter::create(stem)?;
    writer.write_batch(tensor)?;
    writer.finish()
}

/// Concatenates stores into `output`, in the lexicographic order of their
/// stems. Each input is copied whole, or in chunks of at most `batch_size`
/// records.
pub fn merge_stores<P: AsRef<Path>>(
    stems: &[P],
    output: impl AsRef<Path>,
    batch_size: Option<usize>,
) -> Result<StoreMeta, BlobNetError> {
    if batch_size == Some(0) {
        return Err(BlobNetError::UnsupportedOperation(
            "merge_stores with a batch size of 0".to_string(),
        ));
    }
    let mut sorted: Vec<PathBuf> = stems.iter().map(|s| normalize_stem(s.as_ref())).collect();
    sorted.sort();

    let mut writer = RecordWriter::create(output)?;
    for stem in &sorted {
        let mut reader = RecordReader::open(stem, None)?;
        match batch_size {
            None => writer.write_batch(&reader.read_all()?)?,
            Some(batch) => {
                let mut remaining = reader.num_local_records();
                while remaining > 0 {
                    let count = batch.min(remaining);
                    writer.write_batch(&reader.read(count)?)?;
                    remaining -= count;
                }
            }
        }
    }
    writer.finish()
}

/// How [`map_store`] writes what the function returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMode {
    /// One output record per input record.
    #[default]
    Single,
    /// The function returns a batch `[n, ..shape]`, possibly empty.
    Batch,
}

/// Applies `func` to every record in the reader's range and writes the
/// results to a new store.
pub fn map_store<F>(
    reader: &mut RecordReader,
    output: impl AsRef<Path>,
    mut func: F,
    mode: MapMode,
) -> Result<StoreMeta, BlobNetError>
where
    F: FnMut(Tensor) -> Result<Tensor, BlobNetError>,
{
    let mut writer = RecordWriter::create(output)?;
    for record in reader.iter() {
        let mapped = func(record?)?;
        match mode {
            MapMode::Single => writer.write_single(&mapped)?,
            MapMode::Batch => writer.write_batch(&mapped)?,
        }
    }
    writer.finish()
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
