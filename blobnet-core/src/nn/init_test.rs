use super::*;
use crate::types::DType;

#[test]
fn test_constant_fill() -> Result<(), BlobNetError> {
    let t = Tensor::zeros(&[2, 3], DType::F32);
    Filler::Constant { value: 1.5 }.fill(&t)?;
    assert_eq!(t.get_f32_data()?, vec![1.5; 6]);
    Ok(())
}

#[test]
fn test_uniform_fill_stays_in_range() -> Result<(), BlobNetError> {
    let t = Tensor::zeros(&[100], DType::F64);
    Filler::Uniform { low: -0.5, high: 0.25 }.fill(&t)?;
    for v in t.get_f64_data()? {
        assert!((-0.5..0.25).contains(&v), "value {} out of range", v);
    }
    Ok(())
}

#[test]
fn test_gaussian_zero_std_is_constant() -> Result<(), BlobNetError> {
    let t = Tensor::zeros(&[4], DType::F64);
    Filler::Gaussian { mean: 2.0, std: 0.0 }.fill(&t)?;
    for v in t.get_f64_data()? {
        approx::assert_abs_diff_eq!(v, 2.0, epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn test_xavier_bound_uses_fan_in() -> Result<(), BlobNetError> {
    let t = Tensor::zeros(&[12, 4], DType::F32);
    Filler::Xavier.fill(&t)?;
    let bound = (3.0f32 / 12.0).sqrt();
    for v in t.get_f32_data()? {
        assert!(v.abs() <= bound + 1e-6);
    }
    Ok(())
}

#[test]
fn test_random_fill_rejects_integers() {
    let t = Tensor::zeros(&[3], DType::I32);
    let err = Filler::Uniform { low: 0.0, high: 1.0 }.fill(&t).unwrap_err();
    assert!(matches!(err, BlobNetError::UnsupportedOperation(_)));
    assert!(Filler::Constant { value: 3.0 }.fill(&t).is_ok());
}

#[test]
fn test_validate() {
    assert!(Filler::Xavier.validate("fc").is_ok());
    let err = Filler::Uniform { low: 1.0, high: 1.0 }.validate("fc").unwrap_err();
    assert!(matches!(err, BlobNetError::InvalidLayerConfig { ref layer, .. } if layer == "fc"));
    assert!(Filler::Gaussian { mean: 0.0, std: -1.0 }.validate("fc").is_err());
    assert!(Filler::Gaussian { mean: f64::NAN, std: 1.0 }.validate("fc").is_err());
}

#[test]
fn test_unbounded_uniform_is_rejected_not_filled() -> Result<(), BlobNetError> {
    let t = Tensor::zeros(&[2, 2], DType::F64);
    for filler in [
        Filler::Uniform { low: f64::NEG_INFINITY, high: 0.0 },
        Filler::Uniform { low: 0.0, high: f64::INFINITY },
        Filler::Uniform { low: -f64::MAX, high: f64::MAX },
    ] {
        assert!(filler.validate("fc").is_err(), "{:?}", filler);
        assert!(matches!(filler.fill(&t), Err(BlobNetError::InvalidLayerConfig { .. })));
    }
    assert_eq!(t.to_f64_vec()?, vec![0.0; 4]);
    Ok(())
}

#[test]
fn test_serde_tagging() -> Result<(), BlobNetError> {
    let json = serde_json::to_string(&Filler::Gaussian { mean: 0.0, std: 0.01 })?;
    assert_eq!(json, r#"{"type":"gaussian","mean":0.0,"std":0.01}"#);
    let back: Filler = serde_json::from_str(r#"{"type":"zero"}"#)?;
    assert_eq!(back, Filler::Zero);
    Ok(())
}
