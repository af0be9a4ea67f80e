use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use blobnet_core::{BlobNetError, DType, Tensor};

use super::{normalize_stem, records_path, StoreMeta};

/// Reads records from a store, restricted to a local range.
///
/// Reads are circular within the range: reaching its end seeks back to its
/// start, and a read crossing the end continues from the start.
#[derive(Debug)]
pub struct RecordReader {
    stem: PathBuf,
    file: BufReader<File>,
    meta: StoreMeta,
    start: usize,
    end: usize,
    position: usize,
}

impl RecordReader {
    /// Opens the store at `stem`, reading `range` or every record.
    pub fn open(stem: impl AsRef<Path>, range: Option<Range<usize>>) -> Result<Self, BlobNetError> {
        let stem = normalize_stem(stem.as_ref());
        let meta = StoreMeta::read(&stem)?;
        let file = File::open(records_path(&stem))?;

        let record_bytes = meta.record_bytes();
        let file_len = file.metadata()?.len() as usize;
        let actual = if record_bytes == 0 {
            meta.num_records
        } else {
            file_len / record_bytes
        };
        if actual != meta.num_records || (record_bytes != 0 && file_len % record_bytes != 0) {
            return Err(BlobNetError::RecordCountMismatch {
                path: records_path(&stem).display().to_string(),
                expected: meta.num_records,
                actual,
            });
        }

        let range = range.unwrap_or(0..meta.num_records);
        if range.start >= range.end || range.end > meta.num_records {
            return Err(BlobNetError::InvalidRange {
                start: range.start,
                end: range.end,
                num_records: meta.num_records,
            });
        }

        log::debug!(
            "Opened store {} ({} records of {:?} {:?}), range {:?}",
            stem.display(),
            meta.num_records,
            meta.shape,
            meta.dtype,
            range
        );
        let mut reader = RecordReader {
            stem,
            file: BufReader::new(file),
            meta,
            start: range.start,
            end: range.end,
            position: range.start,
        };
        reader.seek(range.start)?;
        Ok(reader)
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    /// Shape of a single record.
    pub fn shape(&self) -> &[usize] {
        &self.meta.shape
    }

    pub fn dtype(&self) -> DType {
        self.meta.dtype
    }

    /// Records in the whole store.
    pub fn num_records(&self) -> usize {
        self.meta.num_records
    }

    /// Records in the local range.
    pub fn num_local_records(&self) -> usize {
        self.end - self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Index of the next record to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves to record `index`, which must lie in the local range.
    pub fn seek(&mut self, index: usize) -> Result<(), BlobNetError> {
        if index < self.start || index >= self.end {
            return Err(BlobNetError::OutOfRange {
                index,
                start: self.start,
                end: self.end,
            });
        }
        let offset = (index * self.meta.record_bytes()) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.position = index;
        Ok(())
    }

    /// Back to the start of the local range.
    pub fn reset(&mut self) -> Result<(), BlobNetError> {
        self.seek(self.start)
    }

    /// Reads `count` records as one tensor of shape `[count, ..shape]`.
    pub fn read(&mut self, count: usize) -> Result<Tensor, BlobNetError> {
        let limit = self.num_local_records();
        if count > limit {
            return Err(BlobNetError::NotEnoughRecords { count, limit });
        }
        if self.position + count > self.end {
            let head = self.end - self.position;
            let first = self.read(head)?;
            let second = self.read(count - head)?;
            return Tensor::cat_rows(&[first, second]);
        }

        let mut bytes = vec![0u8; count * self.meta.record_bytes()];
        self.file.read_exact(&mut bytes)?;
        self.position += count;
        if self.position == self.end {
            self.seek(self.start)?;
        }
        let mut shape = Vec::with_capacity(self.meta.shape.len() + 1);
        shape.push(count);
        shape.extend_from_slice(&self.meta.shape);
        Tensor::from_le_bytes(self.meta.dtype, shape, &bytes)
    }

    /// Every record of the local range, starting from its first.
    pub fn read_all(&mut self) -> Result<Tensor, BlobNetError> {
        self.reset()?;
        self.read(self.num_local_records())
    }

    /// Iterates once over the local range, from its start, one record
    /// (without the leading axis) at a time.
    pub fn iter(&mut self) -> RecordIter<'_> {
        let remaining = self.num_local_records();
        let pending = self.reset().err();
        RecordIter {
            reader: self,
            remaining,
            pending,
        }
    }
}

/// Iterator returned by [`RecordReader::iter`].
#[derive(Debug)]
pub struct RecordIter<'a> {
    reader: &'a mut RecordReader,
    remaining: usize,
    pending: Option<BlobNetError>,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Tensor, BlobNetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            self.remaining = 0;
            return Some(Err(err));
        }
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let shape = self.reader.shape().to_vec();
        Some(self.reader.read(1).and_then(|batch| batch.reshape(&shape)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
#[path = "reader_test.rs"]
mod tests;
