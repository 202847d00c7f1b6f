//! Core module defining the building blocks of the simulator.
//!
//! - [`neuron`]: leaky integrate-and-fire neurons with exponential currents and their inputs
//! - [`connection`]: connections between nodes and their random generation
//! - [`spikes`]: spikes and simple spike statistics
//! - [`utils`]: time intervals and sample statistics
pub mod connection;
pub mod neuron;
pub mod spikes;
pub mod utils;

/// Minimum number of neurons to consider parallel processing.
pub const MIN_PARALLEL_NEURONS: usize = 100;
