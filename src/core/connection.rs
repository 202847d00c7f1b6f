//! Module implementing the connections between nodes of a network.
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::ops::Range;

use crate::error::SNNError;

/// A connection between two nodes.
#[derive(Debug, PartialEq, Clone)]
pub struct Connection {
    /// The index of the node producing spikes.
    pub source_id: usize,
    /// The index of the neuron receiving spikes.
    pub target_id: usize,
    /// The amplitude (in pA) of the postsynaptic current.
    pub weight: f64,
    /// The transmission delay (in ms).
    pub delay: f64,
}

impl Connection {
    /// Create a new connection with the specified parameters.
    /// Returns an error if the delay is negative.
    pub fn build(
        source_id: usize,
        target_id: usize,
        weight: f64,
        delay: f64,
    ) -> Result<Self, SNNError> {
        if delay < 0.0 {
            return Err(SNNError::InvalidParameters(
                "Connection delay must be non-negative".to_string(),
            ));
        }

        Ok(Connection {
            source_id,
            target_id,
            weight,
            delay,
        })
    }

    /// The delay in simulation steps; at least one step.
    pub fn delay_steps(&self, resolution: f64) -> usize {
        ((self.delay / resolution).round() as usize).max(1)
    }
}

/// A normal distribution whose samples are clipped to the `[min, max]` range.
#[derive(Debug, Clone, Copy)]
pub struct ClippedNormal {
    normal: Normal<f64>,
    min: f64,
    max: f64,
}

impl ClippedNormal {
    pub fn new(mean: f64, std: f64, min: f64, max: f64) -> Result<Self, SNNError> {
        let normal = Normal::new(mean, std).map_err(|e| {
            SNNError::InvalidParameters(format!("Invalid normal distribution: {}", e))
        })?;
        if min > max {
            return Err(SNNError::InvalidParameters(format!(
                "Invalid clipping range: [{}, {}]",
                min, max
            )));
        }
        Ok(ClippedNormal { normal, min, max })
    }
}

impl Distribution<f64> for ClippedNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.normal.sample(rng).clamp(self.min, self.max)
    }
}

/// Sample a fixed total number of connections between a range of sources and a range of targets.
/// Sources and targets are drawn uniformly; autapses and multapses are allowed.
pub fn rand_fixed_total_number<R: Rng>(
    num_connections: usize,
    sources: Range<usize>,
    targets: Range<usize>,
    weight_dist: &ClippedNormal,
    delay_dist: &ClippedNormal,
    rng: &mut R,
) -> Result<Vec<Connection>, SNNError> {
    if num_connections == 0 {
        return Ok(vec![]);
    }
    if sources.is_empty() || targets.is_empty() {
        return Err(SNNError::InvalidParameters(
            "Cannot connect empty populations".to_string(),
        ));
    }

    let source_dist = Uniform::new(sources.start, sources.end);
    let target_dist = Uniform::new(targets.start, targets.end);

    (0..num_connections)
        .map(|_| {
            let source_id = source_dist.sample(rng);
            let target_id = target_dist.sample(rng);
            let weight = weight_dist.sample(rng);
            let delay = delay_dist.sample(rng);
            Connection::build(source_id, target_id, weight, delay)
        })
        .collect()
}
