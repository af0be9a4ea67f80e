use super::*;
use crate::store::write_store;
use std::fs::OpenOptions;
use std::io::Write;
use tempfile::TempDir;

/// Five records of shape [2]: record i holds [2i, 2i + 1].
fn five_records(dir: &TempDir) -> Result<PathBuf, BlobNetError> {
    let stem = dir.path().join("five");
    let values: Vec<f64> = (0..10).map(f64::from).collect();
    write_store(&Tensor::from_f64(values, vec![5, 2])?, &stem)?;
    Ok(stem)
}

fn rows(records: &[usize]) -> Vec<f64> {
    records
        .iter()
        .flat_map(|&r| [2.0 * r as f64, 2.0 * r as f64 + 1.0])
        .collect()
}

#[test]
fn test_accessors() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let stem = five_records(&dir)?;
    let reader = RecordReader::open(&stem, Some(1..4))?;
    assert_eq!(reader.shape(), &[2]);
    assert_eq!(reader.dtype(), DType::F64);
    assert_eq!(reader.num_records(), 5);
    assert_eq!(reader.num_local_records(), 3);
    assert_eq!(reader.range(), 1..4);
    assert_eq!(reader.position(), 1);
    assert_eq!(reader.stem(), stem.as_path());
    Ok(())
}

#[test]
fn test_read_advances_and_wraps() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let mut reader = RecordReader::open(five_records(&dir)?, None)?;

    let batch = reader.read(2)?;
    assert_eq!(batch.shape(), &[2, 2]);
    assert_eq!(batch.get_f64_data()?, rows(&[0, 1]));
    assert_eq!(reader.read(3)?.get_f64_data()?, rows(&[2, 3, 4]));
    // Reaching the end went back to the start.
    assert_eq!(reader.position(), 0);
    reader.seek(3)?;
    assert_eq!(reader.read(4)?.get_f64_data()?, rows(&[3, 4, 0, 1]));
    assert_eq!(reader.position(), 2);
    Ok(())
}

#[test]
fn test_wraparound_matches_split_reads() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let stem = five_records(&dir)?;
    let mut wrapped = RecordReader::open(&stem, Some(1..5))?;
    let mut split = RecordReader::open(&stem, Some(1..5))?;
    for position in 1..5 {
        for count in (5 - position + 1)..=4 {
            wrapped.seek(position)?;
            let whole = wrapped.read(count)?;

            split.seek(position)?;
            let head = split.read(5 - position)?;
            let tail = split.read(count - (5 - position))?;
            assert_eq!(whole, Tensor::cat_rows(&[head, tail])?, "at {} reading {}", position, count);
            assert_eq!(wrapped.position(), split.position());
        }
    }
    Ok(())
}

#[test]
fn test_ranged_reads() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let mut reader = RecordReader::open(five_records(&dir)?, Some(1..4))?;
    assert_eq!(reader.read_all()?.get_f64_data()?, rows(&[1, 2, 3]));
    assert_eq!(
        reader.seek(0).unwrap_err(),
        BlobNetError::OutOfRange {
            index: 0,
            start: 1,
            end: 4
        }
    );
    assert!(reader.seek(4).is_err());
    assert_eq!(
        reader.read(4).unwrap_err(),
        BlobNetError::NotEnoughRecords { count: 4, limit: 3 }
    );
    Ok(())
}

#[test]
fn test_invalid_ranges() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let stem = five_records(&dir)?;
    for range in [3..3, 4..2, 2..6] {
        assert_eq!(
            RecordReader::open(&stem, Some(range.clone())).unwrap_err(),
            BlobNetError::InvalidRange {
                start: range.start,
                end: range.end,
                num_records: 5
            }
        );
    }
    Ok(())
}

#[test]
fn test_iter_visits_range_once() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let mut reader = RecordReader::open(five_records(&dir)?, Some(2..5))?;
    reader.seek(3)?;
    let records = reader.iter().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].shape(), &[2]);
    assert_eq!(records[0].get_f64_data()?, rows(&[2]));
    assert_eq!(records[2].get_f64_data()?, rows(&[4]));
    assert_eq!(reader.position(), 2);
    assert_eq!(reader.iter().count(), 3);
    Ok(())
}

#[test]
fn test_record_count_mismatch() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let stem = five_records(&dir)?;
    let mut file = OpenOptions::new()
        .append(true)
        .open(crate::store::records_path(&stem))?;
    file.write_all(&[0u8; 16])?;
    drop(file);
    assert!(matches!(
        RecordReader::open(&stem, None),
        Err(BlobNetError::RecordCountMismatch {
            expected: 5,
            actual: 6,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_missing_store_is_io_error() {
    assert!(matches!(
        RecordReader::open("/nonexistent/blobnet/store", None),
        Err(BlobNetError::Io(_))
    ));
}
