use super::*;

#[test]
fn test_sequential_sampler_len() {
    let sampler = SequentialSampler::new();
    assert_eq!(sampler.len(0), 0);
    assert_eq!(sampler.len(5), 5);
}

#[test]
fn test_sequential_sampler_iter() {
    let sampler = SequentialSampler::new();
    assert_eq!(sampler.iter(0).next(), None);
    assert_eq!(sampler.iter(5).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    // Every epoch is the same.
    assert_eq!(sampler.iter(3).collect::<Vec<_>>(), sampler.iter(3).collect::<Vec<_>>());
}
