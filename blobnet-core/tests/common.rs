use blobnet_core::nn::layers::{InnerProductConfig, InnerProductLayer, NdarrayDataLayer};
use blobnet_core::nn::losses::{SquaredLossConfig, SquaredLossLayer};
use blobnet_core::{BlobNames, BlobNetError, Filler, Net, Tensor};

// Shared by several scenario files; not every file uses every helper.
#[allow(dead_code)]
pub fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// An inner product layer whose weights are all `value`.
#[allow(dead_code)]
pub fn constant_fc(name: &str, num_output: usize, value: f64) -> Result<InnerProductLayer, BlobNetError> {
    let mut config = InnerProductConfig::new(num_output);
    config.weight_filler = Filler::Constant { value };
    InnerProductLayer::new(name, config)
}

/// data -> x, t ; fc(x) -> y ; loss(y, t), learning y = x0 + 2 * x1.
#[allow(dead_code)]
pub fn linear_regression_net() -> Result<Net, BlobNetError> {
    let x = Tensor::from_f64(
        vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, -1.0],
        vec![4, 2],
    )?;
    let t = Tensor::from_f64(vec![1.0, 2.0, 3.0, 0.0], vec![4, 1])?;
    let mut net = Net::new("linear_regression");
    net.add_layer(NdarrayDataLayer::new("data", vec![x, t])?, BlobNames::none(), ["x", "t"])?;
    net.add_layer(constant_fc("fc", 1, 0.0)?, "x", "y")?;
    net.add_layer(
        SquaredLossLayer::new("loss", SquaredLossConfig::default())?,
        ["y", "t"],
        BlobNames::none(),
    )?;
    net.finish()?;
    Ok(net)
}
