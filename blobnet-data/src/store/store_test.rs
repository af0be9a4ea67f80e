use super::*;

fn sequence(start: i64, count: usize) -> Result<Tensor, BlobNetError> {
    let values: Vec<i64> = (start..start + count as i64).collect();
    Tensor::from_i64(values, vec![count, 1])
}

#[test]
fn test_paths_append_extensions() {
    let stem = Path::new("data/train.v1");
    assert_eq!(records_path(stem), PathBuf::from("data/train.v1.rec"));
    assert_eq!(meta_path(stem), PathBuf::from("data/train.v1.meta"));
    assert_eq!(normalize_stem(Path::new("data/train.rec")), PathBuf::from("data/train"));
}

#[test]
fn test_merge_sorts_by_stem() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("part_a");
    let b = dir.path().join("part_b");
    write_store(&sequence(10, 2)?, &b)?;
    write_store(&sequence(0, 3)?, &a)?;

    let expected = Tensor::from_i64(vec![0, 1, 2, 10, 11], vec![5, 1])?;
    for (i, batch_size) in [None, Some(2), Some(10)].into_iter().enumerate() {
        let output = dir.path().join(format!("merged_{}", i));
        let meta = merge_stores(&[&b, &a], &output, batch_size)?;
        assert_eq!(meta.num_records, 5);
        assert_eq!(RecordReader::open(&output, None)?.read_all()?, expected);
    }
    assert!(matches!(
        merge_stores(&[&a], dir.path().join("never"), Some(0)),
        Err(BlobNetError::UnsupportedOperation(_))
    ));
    Ok(())
}

#[test]
fn test_merge_rejects_mixed_layouts() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    write_store(&sequence(0, 2)?, &a)?;
    write_store(&Tensor::from_f32(vec![1.0, 2.0], vec![2, 1])?, &b)?;
    assert!(matches!(
        merge_stores(&[&a, &b], dir.path().join("out"), None),
        Err(BlobNetError::InconsistentRecord { .. })
    ));
    Ok(())
}

#[test]
fn test_map_single_over_a_range() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input");
    write_store(&Tensor::from_f64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2])?, &input)?;

    let mut reader = RecordReader::open(&input, Some(1..3))?;
    let output = dir.path().join("squared");
    let meta = map_store(
        &mut reader,
        &output,
        |record| {
            let squared: Vec<f64> = record.get_f64_data()?.iter().map(|v| v * v).collect();
            Tensor::from_f64(squared, record.shape().to_vec())
        },
        MapMode::Single,
    )?;
    assert_eq!(meta.shape, vec![2]);
    assert_eq!(
        RecordReader::open(&output, None)?.read_all()?.get_f64_data()?,
        vec![9.0, 16.0, 25.0, 36.0]
    );
    Ok(())
}

#[test]
fn test_map_batch_is_one_to_many() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input");
    write_store(&sequence(1, 3)?, &input)?;

    let mut reader = RecordReader::open(&input, None)?;
    let output = dir.path().join("repeated");
    // Record n becomes n copies of itself.
    let meta = map_store(
        &mut reader,
        &output,
        |record| {
            let n = record.to_f64_vec()?[0] as i64;
            Tensor::from_i64(vec![n; n as usize], vec![n as usize, 1])
        },
        MapMode::Batch,
    )?;
    assert_eq!(meta.num_records, 6);
    assert_eq!(
        RecordReader::open(&output, None)?.read_all()?.to_f64_vec()?,
        vec![1.0, 2.0, 2.0, 3.0, 3.0, 3.0]
    );
    Ok(())
}
