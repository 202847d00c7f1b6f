//! The cortical microcircuit model of Potjans & Diesmann (2014).
//!
//! - [`helpers`]: derivation of the scaled network quantities from the parameters
//! - [`network`]: construction and simulation of the network
//! - [`evaluation`]: spike raster and firing rate statistics
pub mod evaluation;
pub mod helpers;
pub mod network;

pub use network::Microcircuit;
