use super::*;
use crate::store::write_store;
use blobnet_core::Tensor;

fn store_of_four(dir: &tempfile::TempDir) -> Result<PathBuf, BlobNetError> {
    let stem = dir.path().join("four");
    write_store(&Tensor::from_f32(vec![0.0, 1.0, 2.0, 3.0], vec![4, 1])?, &stem)?;
    Ok(stem)
}

#[test]
fn test_forward_streams_with_wraparound() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let config = StoreDataConfig {
        stem: store_of_four(&dir)?,
        batch_size: 3,
        range: None,
    };
    let mut layer = StoreDataLayer::new("store", config)?;
    assert_eq!(layer.kind(), LayerKind::DataSource);

    let output = [Blob::new()];
    layer.forward(&[], &output)?;
    assert_eq!(output[0].value().unwrap().get_f32_data()?, vec![0.0, 1.0, 2.0]);
    layer.forward(&[], &output)?;
    assert_eq!(output[0].value().unwrap().get_f32_data()?, vec![3.0, 0.0, 1.0]);
    assert_eq!(layer.reader().position(), 2);
    Ok(())
}

#[test]
fn test_range_limits_the_batch() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let stem = store_of_four(&dir)?;
    let config = StoreDataConfig {
        stem: stem.clone(),
        batch_size: 3,
        range: Some(2..4),
    };
    assert!(matches!(
        StoreDataLayer::new("store", config),
        Err(BlobNetError::InvalidLayerConfig { .. })
    ));
    let zero = StoreDataConfig {
        stem,
        batch_size: 0,
        range: None,
    };
    assert!(StoreDataLayer::new("store", zero).is_err());
    Ok(())
}

#[test]
fn test_config_round_trip() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let config = StoreDataConfig {
        stem: store_of_four(&dir)?,
        batch_size: 2,
        range: Some(1..3),
    };
    let mut layer = StoreDataLayer::new("store", config.clone())?;
    let parsed: StoreDataConfig = serde_json::from_value(layer.config()?)?;
    assert_eq!(parsed, config);
    assert_eq!(
        layer.backward(&[], &[], true).unwrap_err(),
        BlobNetError::BackwardOnDataLayer {
            layer: "store".to_string()
        }
    );
    Ok(())
}
