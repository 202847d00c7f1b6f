//! Driver sequencing the lifecycle of a network simulation and measuring its phases.
//!
//! A run loads the parameters, builds the network, calls `create`, `connect`, `simulate` and
//! `evaluate` (in that order, each exactly once) and reports the wall-clock time spent in
//! every phase. Any error aborts the run at the phase where it occurs.
use std::fmt;
use std::time::Instant;

use crate::error::SNNError;
use crate::params::{Params, SimParams, StimParams};

/// Half-width of the raster window around the thalamic stimulus onset.
pub const RASTER_HALF_WIDTH: f64 = 100.0;
/// Initial transient discarded from the firing rate computation.
pub const FIRING_RATES_START: f64 = 500.0;

/// The lifecycle every simulated network goes through.
pub trait Lifecycle {
    /// Create the nodes: neurons, input sources and recorders.
    fn create(&mut self) -> Result<(), SNNError>;

    /// Connect the nodes.
    fn connect(&mut self) -> Result<(), SNNError>;

    /// Simulate the network.
    fn simulate(&mut self) -> Result<(), SNNError>;

    /// Evaluate the recorded activity, with spikes shown in the raster window and firing rates
    /// computed over the rate window.
    fn evaluate(
        &mut self,
        raster_interval: [f64; 2],
        firing_rates_interval: [f64; 2],
    ) -> Result<(), SNNError>;

    /// The rank of the process running the network.
    fn rank(&self) -> usize;
}

/// The window of the spike raster, centered on the thalamic stimulus onset.
pub fn raster_plot_interval(stim: &StimParams) -> [f64; 2] {
    [
        stim.th_start - RASTER_HALF_WIDTH,
        stim.th_start + RASTER_HALF_WIDTH,
    ]
}

/// The window of the firing rates, from the end of the initial transient to the end of the
/// simulation.
pub fn firing_rates_interval(sim: &SimParams) -> [f64; 2] {
    [FIRING_RATES_START, sim.t_sim]
}

/// Wall-clock timestamps taken right after each phase of a run.
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    pub start: Instant,
    pub network: Instant,
    pub create: Instant,
    pub connect: Instant,
    pub simulate: Instant,
    pub evaluate: Instant,
}

impl Timestamps {
    /// Durations (in seconds) between consecutive timestamps.
    pub fn report(&self, rank: usize) -> TimingReport {
        let secs = |from: Instant, to: Instant| to.saturating_duration_since(from).as_secs_f64();
        TimingReport {
            rank,
            total: secs(self.start, self.evaluate),
            initialize: secs(self.start, self.network),
            create: secs(self.network, self.create),
            connect: secs(self.create, self.connect),
            simulate: secs(self.connect, self.simulate),
            evaluate: secs(self.simulate, self.evaluate),
        }
    }
}

/// Time spent (in seconds) in every phase of a run.
#[derive(Debug, PartialEq, Clone)]
pub struct TimingReport {
    pub rank: usize,
    pub total: f64,
    pub initialize: f64,
    pub create: f64,
    pub connect: f64,
    pub simulate: f64,
    pub evaluate: f64,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Times of Rank {}:", self.rank)?;
        writeln!(f, "  Total time:         {:.3} s", self.total)?;
        writeln!(f, "  Time to initialize: {:.3} s", self.initialize)?;
        writeln!(f, "  Time to create:     {:.3} s", self.create)?;
        writeln!(f, "  Time to connect:    {:.3} s", self.connect)?;
        writeln!(f, "  Time to simulate:   {:.3} s", self.simulate)?;
        write!(f, "  Time to evaluate:   {:.3} s", self.evaluate)
    }
}

/// Run a network through its whole lifecycle.
///
/// `load` provides the parameters and `build` constructs the network from them; both count
/// towards the initialization time. The report is only produced if every phase succeeds.
pub fn run<N, L, B>(load: L, build: B) -> Result<TimingReport, SNNError>
where
    N: Lifecycle,
    L: FnOnce() -> Result<Params, SNNError>,
    B: FnOnce(&Params) -> Result<N, SNNError>,
{
    let start = Instant::now();

    let params = load()?;
    let mut network = build(&params)?;
    let time_network = Instant::now();
    log::info!("Network initialized");

    network.create()?;
    let time_create = Instant::now();
    log::info!("Nodes created");

    network.connect()?;
    let time_connect = Instant::now();
    log::info!("Nodes connected");

    network.simulate()?;
    let time_simulate = Instant::now();
    log::info!("Simulation done");

    let raster_interval = raster_plot_interval(&params.stim);
    let rates_interval = firing_rates_interval(&params.sim);
    network.evaluate(raster_interval, rates_interval)?;
    let time_evaluate = Instant::now();
    log::info!("Evaluation done");

    let timestamps = Timestamps {
        start,
        network: time_network,
        create: time_create,
        connect: time_connect,
        simulate: time_simulate,
        evaluate: time_evaluate,
    };
    Ok(timestamps.report(network.rank()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_raster_plot_interval() {
        let mut stim = StimParams::default();
        stim.th_start = 700.0;
        assert_eq!(raster_plot_interval(&stim), [600.0, 800.0]);
        stim.th_start = 42.5;
        assert_eq!(raster_plot_interval(&stim), [-57.5, 142.5]);
    }

    #[test]
    fn test_firing_rates_interval() {
        let mut sim = SimParams::default();
        sim.t_sim = 10000.0;
        assert_eq!(firing_rates_interval(&sim), [500.0, 10000.0]);
    }

    #[test]
    fn test_report_format() {
        let report = TimingReport {
            rank: 0,
            total: 12.3456,
            initialize: 0.0,
            create: 1.0,
            connect: 2.0004,
            simulate: 9.0,
            evaluate: 0.3451,
        };
        assert_eq!(
            report.to_string(),
            "Times of Rank 0:\n\
             \x20 Total time:         12.346 s\n\
             \x20 Time to initialize: 0.000 s\n\
             \x20 Time to create:     1.000 s\n\
             \x20 Time to connect:    2.000 s\n\
             \x20 Time to simulate:   9.000 s\n\
             \x20 Time to evaluate:   0.345 s"
        );
    }

    #[test]
    fn test_timestamps_report() {
        let start = Instant::now();
        let at = |ms: u64| start + Duration::from_millis(ms);
        let timestamps = Timestamps {
            start,
            network: at(250),
            create: at(500),
            connect: at(1500),
            simulate: at(4000),
            evaluate: at(4125),
        };
        let report = timestamps.report(3);
        assert_eq!(report.rank, 3);
        assert!((report.total - 4.125).abs() < 1e-9);
        assert!((report.initialize - 0.25).abs() < 1e-9);
        assert!((report.create - 0.25).abs() < 1e-9);
        assert!((report.connect - 1.0).abs() < 1e-9);
        assert!((report.simulate - 2.5).abs() < 1e-9);
        assert!((report.evaluate - 0.125).abs() < 1e-9);
    }
}
