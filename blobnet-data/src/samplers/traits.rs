use std::fmt::Debug;

/// Decides the order in which the records of a source are visited during
/// one epoch.
///
/// Data layers ask for a fresh epoch every time the previous one is used up,
/// so a sampler may return a different order on each call.
pub trait Sampler: Debug + Send + Sync {
    /// Record indices of one epoch over `num_records` records.
    fn iter(&self, num_records: usize) -> Box<dyn Iterator<Item = usize> + Send + Sync>;

    /// Number of indices one epoch yields.
    fn len(&self, num_records: usize) -> usize;
}
