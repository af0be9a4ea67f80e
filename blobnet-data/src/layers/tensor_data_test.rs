use super::*;

fn column(values: &[f64]) -> Result<Tensor, BlobNetError> {
    Tensor::from_f64(values.to_vec(), vec![values.len(), 1])
}

#[test]
fn test_sequential_batches_wrap_across_epochs() -> Result<(), BlobNetError> {
    let data = column(&[0.0, 1.0, 2.0, 3.0, 4.0])?;
    let labels = column(&[10.0, 11.0, 12.0, 13.0, 14.0])?;
    let mut layer = TensorDataLayer::new("data", vec![data, labels], 2, SamplerConfig::Sequential)?;
    assert_eq!(layer.kind(), LayerKind::DataSource);
    assert_eq!(layer.num_records(), 5);

    let outputs = vec![Blob::new(), Blob::new()];
    let mut seen = Vec::new();
    for _ in 0..3 {
        layer.forward(&[], &outputs)?;
        let batch = outputs[0].value().unwrap();
        assert_eq!(batch.shape(), &[2, 1]);
        seen.extend(batch.get_f64_data()?);
    }
    assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
    assert_eq!(layer.epoch(), 2);
    // Rows stay paired across sources.
    assert_eq!(outputs[1].value().unwrap().get_f64_data()?, vec![14.0, 10.0]);
    Ok(())
}

#[test]
fn test_random_epoch_covers_every_row() -> Result<(), BlobNetError> {
    let values: Vec<f64> = (0..6).map(f64::from).collect();
    let sampler = SamplerConfig::Random {
        replacement: false,
        seed: Some(3),
    };
    let mut layer = TensorDataLayer::new("data", vec![column(&values)?], 3, sampler)?;
    let outputs = vec![Blob::new()];
    let mut seen = Vec::new();
    for _ in 0..2 {
        layer.forward(&[], &outputs)?;
        seen.extend(outputs[0].value().unwrap().get_f64_data()?);
    }
    seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(seen, values);
    assert_eq!(layer.epoch(), 1);
    Ok(())
}

#[test]
fn test_construction_checks() -> Result<(), BlobNetError> {
    let five = column(&[0.0; 5])?;
    let four = column(&[0.0; 4])?;
    for result in [
        TensorDataLayer::new("d", vec![five.clone()], 0, SamplerConfig::default()),
        TensorDataLayer::new("d", vec![], 1, SamplerConfig::default()),
        TensorDataLayer::new("d", vec![five, four], 1, SamplerConfig::default()),
        TensorDataLayer::new("d", vec![column(&[])?], 1, SamplerConfig::default()),
    ] {
        assert!(matches!(result, Err(BlobNetError::InvalidLayerConfig { .. })));
    }
    Ok(())
}

#[test]
fn test_arity_and_backward() -> Result<(), BlobNetError> {
    let mut layer = TensorDataLayer::new("data", vec![column(&[1.0])?], 1, SamplerConfig::default())?;
    assert!(matches!(
        layer.forward(&[], &[Blob::new(), Blob::new()]),
        Err(BlobNetError::ArityMismatch { .. })
    ));
    assert_eq!(
        layer.backward(&[], &[], false).unwrap_err(),
        BlobNetError::BackwardOnDataLayer {
            layer: "data".to_string()
        }
    );
    Ok(())
}

#[test]
fn test_config_round_trip() -> Result<(), BlobNetError> {
    let sampler = SamplerConfig::Random {
        replacement: true,
        seed: None,
    };
    let layer = TensorDataLayer::new("data", vec![column(&[1.0, 2.0])?], 2, sampler.clone())?;
    let config: TensorDataConfig = serde_json::from_value(layer.config()?)?;
    assert_eq!(config.batch_size, 2);
    assert_eq!(config.sampler, sampler);
    let rebuilt = TensorDataLayer::from_config("data", config)?;
    assert_eq!(rebuilt.sources, layer.sources);
    Ok(())
}
