use approx::assert_abs_diff_eq;
use blobnet_core::nn::layers::{InnerProductConfig, InnerProductLayer};
use blobnet_core::nn::losses::{SquaredLossConfig, SquaredLossLayer};
use blobnet_core::{
    BlobNames, BlobNetError, Filler, LayerRegistry, Net, SaveMode, SgdConfig, SgdSolver, Solver,
    Tensor,
};
use blobnet_data::{
    registry, write_store, SamplerConfig, StoreDataConfig, StoreDataLayer, TensorDataLayer,
};

/// Rows of x and targets of y = x0 + 2 * x1.
fn regression_data() -> Result<(Tensor, Tensor), BlobNetError> {
    Ok((
        Tensor::from_f64(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, -1.0], vec![4, 2])?,
        Tensor::from_f64(vec![1.0, 2.0, 3.0, 0.0], vec![4, 1])?,
    ))
}

fn add_model(net: &mut Net) -> Result<(), BlobNetError> {
    let mut config = InnerProductConfig::new(1);
    config.weight_filler = Filler::Zero;
    net.add_layer(InnerProductLayer::new("fc", config)?, "x", "y")?;
    net.add_layer(
        SquaredLossLayer::new("loss", SquaredLossConfig::default())?,
        ["y", "t"],
        BlobNames::none(),
    )?;
    Ok(())
}

fn solver() -> Result<SgdSolver, BlobNetError> {
    SgdSolver::new(SgdConfig {
        base_lr: 0.1,
        momentum: 0.9,
        max_iter: 500,
        regularizer: None,
    })
}

#[test]
fn test_train_from_record_stores() -> Result<(), BlobNetError> {
    let dir = tempfile::tempdir()?;
    let (x, t) = regression_data()?;
    write_store(&x, dir.path().join("x"))?;
    write_store(&t, dir.path().join("t"))?;

    let mut net = Net::new("from_stores");
    for (layer, blob) in [("x_source", "x"), ("t_source", "t")] {
        let config = StoreDataConfig {
            stem: dir.path().join(blob),
            batch_size: 4,
            range: None,
        };
        net.add_layer(StoreDataLayer::new(layer, config)?, BlobNames::none(), blob)?;
    }
    add_model(&mut net)?;
    net.finish()?;
    assert_eq!(net.backward_order()?, vec!["loss".to_string(), "fc".to_string()]);

    let loss = solver()?.solve(&mut net)?;
    assert!(loss < 1e-6, "final loss {}", loss);

    // The full save keeps the data layers; only the extended registry knows them.
    let path = dir.path().join("net.json");
    net.save(&path, SaveMode::Full)?;
    assert_eq!(
        Net::load(&path, &LayerRegistry::default()).unwrap_err(),
        BlobNetError::UnknownLayerType("store_data".to_string())
    );
    let mut restored = Net::load(&path, &registry())?;
    assert_abs_diff_eq!(restored.forward_backward()?, loss, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_train_from_sequential_minibatches() -> Result<(), BlobNetError> {
    let (x, t) = regression_data()?;
    let mut net = Net::new("from_tensors");
    net.add_layer(
        TensorDataLayer::new("data", vec![x, t], 4, SamplerConfig::Sequential)?,
        BlobNames::none(),
        ["x", "t"],
    )?;
    add_model(&mut net)?;
    net.finish()?;

    let loss = solver()?.solve(&mut net)?;
    assert!(loss < 1e-6, "final loss {}", loss);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("net.json");
    net.save(&path, SaveMode::Pruned)?;
    let mut model = Net::load(&path, &registry())?;
    let out = model.predict([("x", Tensor::from_f64(vec![3.0, 1.0], vec![1, 2])?)])?;
    assert_abs_diff_eq!(out["y"].get_f64_data()?[0], 5.0, epsilon = 1e-3);
    Ok(())
}
