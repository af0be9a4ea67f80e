use super::*;

#[test]
fn test_init_value_reuses_storage_of_same_shape() -> Result<(), BlobNetError> {
    let blob = Blob::new();
    let first = blob.init_value(&[2, 2], DType::F64)?;
    first.fill(3.0)?;
    let second = blob.init_value(&[2, 2], DType::F64)?;
    assert!(first.shares_storage(&second), "same shape and dtype must reuse storage");
    assert_eq!(first.get_f64_data()?, vec![0.0; 4], "reuse must zero the value");

    let third = blob.init_value(&[4], DType::F64)?;
    assert!(!third.shares_storage(&first));
    let fourth = blob.init_value(&[4], DType::F32)?;
    assert_eq!(fourth.dtype(), DType::F32);
    Ok(())
}

#[test]
fn test_filler_runs_on_every_init() -> Result<(), BlobNetError> {
    let blob = Blob::with_filler(Filler::Constant { value: 0.5 });
    let v = blob.init_value(&[3], DType::F32)?;
    assert_eq!(v.get_f32_data()?, vec![0.5; 3]);
    v.fill(9.0)?;
    let v = blob.init_value(&[3], DType::F32)?;
    assert_eq!(v.get_f32_data()?, vec![0.5; 3]);
    Ok(())
}

#[test]
fn test_init_gradient_requires_value() {
    let blob = Blob::new();
    assert_eq!(
        blob.init_gradient().unwrap_err(),
        BlobNetError::ValueNotInitialized {
            operation: "init_gradient".to_string()
        }
    );
}

#[test]
fn test_init_gradient_matches_value_and_zeroes() -> Result<(), BlobNetError> {
    let blob = Blob::new();
    blob.init_value(&[2, 3], DType::F32)?;
    let g = blob.init_gradient()?;
    assert_eq!(g.shape(), &[2, 3]);
    assert_eq!(g.dtype(), DType::F32);
    g.fill(1.0)?;
    let g2 = blob.init_gradient()?;
    assert!(g.shares_storage(&g2));
    assert_eq!(g2.get_f32_data()?, vec![0.0; 6]);
    Ok(())
}

#[test]
fn test_gradient_dropped_when_value_shape_changes() -> Result<(), BlobNetError> {
    let blob = Blob::new();
    blob.init_value(&[2], DType::F64)?;
    blob.init_gradient()?;
    blob.init_value(&[3], DType::F64)?;
    assert!(!blob.has_gradient());
    Ok(())
}

#[test]
fn test_mirror_aliases_both_ways() -> Result<(), BlobNetError> {
    let source = Blob::from_tensor(Tensor::from_f64(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2])?);
    let view = Blob::new();
    view.mirror(&source, Some(&[4]))?;

    let v = view.value().unwrap();
    assert_eq!(v.shape(), &[4]);
    v.assign_f64(&[5.0, 6.0, 7.0, 8.0])?;
    assert_eq!(source.value().unwrap().get_f64_data()?, vec![5.0, 6.0, 7.0, 8.0]);

    source.value().unwrap().fill(0.0)?;
    assert_eq!(view.value().unwrap().get_f64_data()?, vec![0.0; 4]);
    Ok(())
}

#[test]
fn test_init_value_detaches_a_mirror() -> Result<(), BlobNetError> {
    let source = Blob::from_tensor(Tensor::from_f32(vec![1.0, 2.0], vec![2])?);
    let view = Blob::new();
    view.mirror(&source, None)?;
    let own = view.init_value(&[2], DType::F32)?;
    assert!(!own.shares_storage(&source.value().unwrap()));
    assert_eq!(source.value().unwrap().get_f32_data()?, vec![1.0, 2.0]);
    Ok(())
}

#[test]
fn test_mirror_gradient_with_reshape() -> Result<(), BlobNetError> {
    let top = Blob::new();
    top.init_value(&[2, 3], DType::F64)?;
    top.init_gradient()?.assign_f64(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])?;

    let bottom = Blob::new();
    bottom.init_value(&[2, 1, 3], DType::F64)?;
    bottom.mirror_gradient(&top, Some(&[2, 1, 3]))?;
    let g = bottom.gradient().unwrap();
    assert_eq!(g.shape(), &[2, 1, 3]);
    assert!(g.shares_storage(&top.gradient().unwrap()));

    let err = bottom.mirror_gradient(&top, None).unwrap_err();
    assert!(matches!(err, BlobNetError::ShapeMismatch { .. }));
    Ok(())
}

#[test]
fn test_apply_update_subtracts_gradient() -> Result<(), BlobNetError> {
    let shapes: Vec<Vec<usize>> = vec![vec![1], vec![3], vec![2, 2], vec![2, 1, 3]];
    for shape in shapes {
        let n: usize = shape.iter().product();
        let before: Vec<f64> = (0..n).map(|i| i as f64 * 0.5).collect();
        let grad: Vec<f64> = (0..n).map(|i| 1.0 - i as f64).collect();
        let blob = Blob::from_tensor(Tensor::from_f64(before.clone(), shape.clone())?);
        blob.init_gradient()?.assign_f64(&grad)?;
        blob.apply_update()?;
        let after = blob.value().unwrap().get_f64_data()?;
        for i in 0..n {
            approx::assert_abs_diff_eq!(after[i], before[i] - grad[i], epsilon = 1e-12);
        }
    }
    Ok(())
}

#[test]
fn test_apply_update_requires_gradient() -> Result<(), BlobNetError> {
    let blob = Blob::from_tensor(Tensor::from_f32(vec![1.0], vec![1])?);
    assert!(matches!(
        blob.apply_update(),
        Err(BlobNetError::GradientNotInitialized { .. })
    ));
    Ok(())
}

#[test]
fn test_snapshot_excludes_gradient() -> Result<(), BlobNetError> {
    let blob = Blob::new();
    assert_eq!(blob.snapshot()?, None);
    blob.init_value(&[2], DType::F32)?;
    blob.init_gradient()?.fill(4.0)?;
    let record = blob.snapshot()?.unwrap();
    assert_eq!(record.shape, vec![2]);
    assert_eq!(record.data, crate::buffer::Buffer::F32(vec![0.0, 0.0]));
    Ok(())
}
