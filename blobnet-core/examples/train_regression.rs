//! Fits y = 2 * x0 - x1 + 0.5 with a two-layer net, then saves the model and
//! predicts with the reloaded copy.

use blobnet_core::nn::layers::{InnerProductConfig, InnerProductLayer, NdarrayDataLayer, ReluLayer};
use blobnet_core::nn::losses::{SquaredLossConfig, SquaredLossLayer};
use blobnet_core::{
    BlobNames, BlobNetError, L2Regularizer, LayerRegistry, Net, SaveMode, SgdConfig, SgdSolver,
    Solver, Tensor,
};

fn main() -> Result<(), BlobNetError> {
    let rows: Vec<[f64; 2]> = (0..16)
        .map(|i| [(i % 4) as f64 / 2.0 - 0.75, (i / 4) as f64 / 2.0 - 0.75])
        .collect();
    let x: Vec<f64> = rows.iter().flatten().copied().collect();
    let t: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] - r[1] + 0.5).collect();

    let mut net = Net::new("regression");
    net.add_layer(
        NdarrayDataLayer::new(
            "data",
            vec![Tensor::from_f64(x, vec![16, 2])?, Tensor::from_f64(t, vec![16, 1])?],
        )?,
        BlobNames::none(),
        ["x", "t"],
    )?;
    net.add_layer(InnerProductLayer::new("hidden", InnerProductConfig::new(8))?, "x", "h")?;
    net.add_layer(ReluLayer::new("relu"), "h", "a")?;
    net.add_layer(InnerProductLayer::new("out", InnerProductConfig::new(1))?, "a", "y")?;
    net.add_layer(
        SquaredLossLayer::new("loss", SquaredLossConfig::default())?,
        ["y", "t"],
        BlobNames::none(),
    )?;
    net.finish()?;
    println!("Forward order: {:?}", net.forward_order()?);

    let mut solver = SgdSolver::new(SgdConfig {
        base_lr: 0.05,
        momentum: 0.9,
        max_iter: 100,
        regularizer: Some(L2Regularizer::new(1e-4)?),
    })?;
    for round in 1..=5 {
        let loss = solver.solve(&mut net)?;
        println!("Iteration {}: loss {:.6}", round * 100, loss);
    }

    let path = std::env::temp_dir().join("blobnet_regression.json");
    net.save(&path, SaveMode::Pruned)?;
    let mut model = Net::load(&path, &LayerRegistry::default())?;
    let out = model.predict([("x", Tensor::from_f64(vec![0.5, -0.5], vec![1, 2])?)])?;
    println!("f(0.5, -0.5) = {:.4} (expected 2.0)", out["y"].get_f64_data()?[0]);
    Ok(())
}
