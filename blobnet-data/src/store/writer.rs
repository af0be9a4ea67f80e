use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use blobnet_core::{BlobNetError, DType, Tensor};

use super::{normalize_stem, records_path, StoreMeta};

/// Streams records into a new store. Nothing is readable until
/// [`finish`](RecordWriter::finish) writes the metadata.
#[derive(Debug)]
pub struct RecordWriter {
    stem: PathBuf,
    file: BufWriter<File>,
    layout: Option<(Vec<usize>, DType)>,
    num_records: usize,
}

impl RecordWriter {
    /// Creates (or truncates) `<stem>.rec`.
    pub fn create(stem: impl AsRef<Path>) -> Result<Self, BlobNetError> {
        let stem = normalize_stem(stem.as_ref());
        let file = File::create(records_path(&stem))?;
        Ok(RecordWriter {
            stem,
            file: BufWriter::new(file),
            layout: None,
            num_records: 0,
        })
    }

    /// Records written so far.
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// The first write fixes the record shape and type; later ones must match.
    fn check_layout(&mut self, shape: &[usize], dtype: DType) -> Result<(), BlobNetError> {
        match &self.layout {
            None => {
                self.layout = Some((shape.to_vec(), dtype));
                Ok(())
            }
            Some((expected_shape, expected_dtype))
                if expected_shape.as_slice() == shape && *expected_dtype == dtype =>
            {
                Ok(())
            }
            Some((expected_shape, expected_dtype)) => Err(BlobNetError::InconsistentRecord {
                expected_shape: expected_shape.clone(),
                expected_dtype: *expected_dtype,
                actual_shape: shape.to_vec(),
                actual_dtype: dtype,
            }),
        }
    }

    /// Appends one record.
    pub fn write_single(&mut self, record: &Tensor) -> Result<(), BlobNetError> {
        self.check_layout(record.shape(), record.dtype())?;
        self.file.write_all(&record.to_le_bytes()?)?;
        self.num_records += 1;
        Ok(())
    }

    /// Appends `batch.shape()[0]` records of shape `batch.shape()[1..]`.
    pub fn write_batch(&mut self, batch: &Tensor) -> Result<(), BlobNetError> {
        let (count, record_shape) = match batch.shape().split_first() {
            Some((count, rest)) => (*count, rest),
            None => {
                return Err(BlobNetError::UnsupportedOperation(
                    "write_batch needs a leading batch axis".to_string(),
                ))
            }
        };
        self.check_layout(record_shape, batch.dtype())?;
        self.file.write_all(&batch.to_le_bytes()?)?;
        self.num_records += count;
        Ok(())
    }

    /// Flushes the records and writes the metadata.
    pub fn finish(mut self) -> Result<StoreMeta, BlobNetError> {
        let (shape, dtype) = match self.layout.take() {
            Some(layout) if self.num_records > 0 => layout,
            _ => return Err(BlobNetError::EmptyStore(self.stem.display().to_string())),
        };
        self.file.flush()?;
        let meta = StoreMeta {
            shape,
            dtype,
            num_records: self.num_records,
        };
        meta.write(&self.stem)?;
        log::debug!(
            "Finished store {}: {} records of {:?} {:?}",
            self.stem.display(),
            meta.num_records,
            meta.shape,
            meta.dtype
        );
        Ok(meta)
    }
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod tests;
