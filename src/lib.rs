//! This crate simulates the cortical microcircuit model of Potjans & Diesmann (2014) in Rust.
//!
//! The network represents the cell-type specific connectivity of the neurons under 1 mm² of
//! early sensory cortex, organized in eight populations of excitatory and inhibitory leaky
//! integrate-and-fire neurons spread over four layers.
//!
//! # Running the Model
//!
//! A run goes through the lifecycle of the [`driver::Lifecycle`] trait: the nodes are created,
//! connected, simulated, and the recorded activity is evaluated.
//!
//! ```no_run
//! use rusty_microcircuit::driver;
//! use rusty_microcircuit::microcircuit::Microcircuit;
//! use rusty_microcircuit::params::Params;
//!
//! let report = driver::run(|| Ok(Params::default()), Microcircuit::new).unwrap();
//! println!("{}", report);
//! ```
//!
//! # Downscaling
//!
//! The number of neurons and the number of connections can be downscaled with the `n_scaling`
//! and `k_scaling` network parameters. Downscaling the number of connections is compensated by
//! stronger weights and a DC input to preserve the mean and variance of the input currents.
//!
//! ```rust
//! use rusty_microcircuit::microcircuit::helpers::ModelQuantities;
//! use rusty_microcircuit::params::{NetParams, StimParams};
//!
//! let quantities = ModelQuantities::derive(&NetParams::default(), &StimParams::default()).unwrap();
//! assert_eq!(quantities.total_num_neurons(), 7717);
//! ```
pub mod core;
pub mod driver;
pub mod error;
pub mod microcircuit;
pub mod params;
pub mod recording;
