//! Simulation, network and stimulus parameters of the microcircuit model.
//!
//! The defaults reproduce the model of Potjans & Diesmann (2014), downscaled to 10% of the
//! neurons and in-degrees. All times are in ms, rates in Hz, potentials in mV, currents in pA
//! and capacitances in pF.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SNNError;

/// Number of populations of the microcircuit.
pub const NUM_POPULATIONS: usize = 8;

/// Load any parameter set from a JSON file.
fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, SNNError> {
    let file = File::open(path.as_ref()).map_err(|e| {
        SNNError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| SNNError::ConfigError(format!("{}: {}", path.as_ref().display(), e)))
}

/// Save any parameter set to a (pretty) JSON file.
fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<(), SNNError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| SNNError::ConfigError(e.to_string()))?;
    writer.flush().map_err(SNNError::from)
}

fn check_len(name: &str, len: usize, expected: usize) -> Result<(), SNNError> {
    if len != expected {
        return Err(SNNError::InvalidParameters(format!(
            "{} must have {} entries, got {}",
            name, expected, len
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), SNNError> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(SNNError::InvalidParameters(format!(
            "{} must be positive and finite, got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_probability(name: &str, p: f64) -> Result<(), SNNError> {
    if !(0.0..1.0).contains(&p) {
        return Err(SNNError::InvalidParameters(format!(
            "{} must be in [0, 1), got {}",
            name, p
        )));
    }
    Ok(())
}

/// The recording devices attached to every population.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingDevice {
    /// Records the spikes of the neurons.
    SpikeRecorder,
    /// Samples the membrane potentials of the neurons every `rec_v_dt`.
    Voltmeter,
}

impl RecordingDevice {
    /// The device model name, used as label of its recording files.
    pub fn name(&self) -> &'static str {
        match self {
            RecordingDevice::SpikeRecorder => "spike_recorder",
            RecordingDevice::Voltmeter => "voltmeter",
        }
    }
}

/// Parameters of the ASCII recording backend.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingParams {
    /// Prefix prepended to the label of every recording file.
    pub data_prefix: String,
    /// Number of decimals of the recorded times and values.
    pub precision: usize,
    /// Extension of the recording files.
    pub file_extension: String,
    /// Record spike times as (step, offset) pairs instead of ms.
    pub time_in_steps: bool,
}

impl Default for RecordingParams {
    fn default() -> Self {
        RecordingParams {
            data_prefix: String::new(),
            precision: 3,
            file_extension: "dat".to_string(),
            time_in_steps: false,
        }
    }
}

/// Simulation parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Simulated time (in ms).
    pub t_sim: f64,
    /// Resolution of the simulation (in ms).
    pub sim_resolution: f64,
    /// Directory of the recorded data and evaluation outputs.
    pub data_path: PathBuf,
    /// Master seed of all random number generators.
    pub master_seed: u64,
    /// Number of threads, i.e., of virtual processes.
    pub local_num_threads: usize,
    /// Allow overwriting existing recording files.
    pub overwrite_files: bool,
    /// Log the simulation progress.
    pub print_time: bool,
    /// Recording devices of every population.
    pub rec_dev: Vec<RecordingDevice>,
    /// Sampling interval (in ms) of the voltmeters.
    pub rec_v_dt: f64,
    /// Recording backend.
    pub recording: RecordingParams,
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            t_sim: 1000.0,
            sim_resolution: 0.1,
            data_path: PathBuf::from("data"),
            master_seed: 55,
            local_num_threads: 1,
            overwrite_files: true,
            print_time: false,
            rec_dev: vec![RecordingDevice::SpikeRecorder],
            rec_v_dt: 1.0,
            recording: RecordingParams::default(),
        }
    }
}

impl SimParams {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        load_json(path)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        save_json(self, path)
    }

    /// Check the consistency of the simulation parameters.
    pub fn validate(&self) -> Result<(), SNNError> {
        check_positive("t_sim", self.t_sim)?;
        check_positive("sim_resolution", self.sim_resolution)?;
        if self.local_num_threads == 0 {
            return Err(SNNError::InvalidParameters(
                "local_num_threads must be at least 1".to_string(),
            ));
        }
        for (i, device) in self.rec_dev.iter().enumerate() {
            if self.rec_dev[..i].contains(device) {
                return Err(SNNError::InvalidParameters(format!(
                    "Recording device {} listed twice",
                    device.name()
                )));
            }
        }
        if self.records_with(RecordingDevice::Voltmeter) && self.rec_v_dt < self.sim_resolution {
            return Err(SNNError::InvalidParameters(format!(
                "rec_v_dt must be at least the resolution {}, got {}",
                self.sim_resolution, self.rec_v_dt
            )));
        }
        Ok(())
    }

    /// Check whether the populations are recorded with the given device.
    pub fn records_with(&self, device: RecordingDevice) -> bool {
        self.rec_dev.contains(&device)
    }

    /// The number of steps between two voltmeter samples.
    pub fn rec_v_steps(&self) -> usize {
        ((self.rec_v_dt / self.sim_resolution).round() as usize).max(1)
    }

    /// The number of simulation steps.
    pub fn num_steps(&self) -> usize {
        (self.t_sim / self.sim_resolution).round() as usize
    }
}

/// Parameters of the leaky integrate-and-fire neurons with exponential currents.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuronParams {
    /// Resting membrane potential.
    pub e_l: f64,
    /// Firing threshold.
    pub v_th: f64,
    /// Reset potential after a spike.
    pub v_reset: f64,
    /// Membrane capacitance.
    pub c_m: f64,
    /// Membrane time constant.
    pub tau_m: f64,
    /// Time constant of the (excitatory and inhibitory) postsynaptic currents.
    pub tau_syn: f64,
    /// Absolute refractory period.
    pub t_ref: f64,
}

impl Default for NeuronParams {
    fn default() -> Self {
        NeuronParams {
            e_l: -65.0,
            v_th: -50.0,
            v_reset: -65.0,
            c_m: 250.0,
            tau_m: 10.0,
            tau_syn: 0.5,
            t_ref: 2.0,
        }
    }
}

impl NeuronParams {
    pub fn validate(&self) -> Result<(), SNNError> {
        check_positive("c_m", self.c_m)?;
        check_positive("tau_m", self.tau_m)?;
        check_positive("tau_syn", self.tau_syn)?;
        if self.t_ref < 0.0 {
            return Err(SNNError::InvalidParameters(
                "t_ref must be non-negative".to_string(),
            ));
        }
        if self.tau_m == self.tau_syn {
            return Err(SNNError::InvalidParameters(
                "tau_m and tau_syn must differ".to_string(),
            ));
        }
        if self.v_reset >= self.v_th {
            return Err(SNNError::InvalidParameters(
                "v_reset must be below v_th".to_string(),
            ));
        }
        Ok(())
    }
}

/// Network parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetParams {
    /// Names of the populations; a trailing 'E' marks an excitatory population.
    pub populations: Vec<String>,
    /// Number of neurons of each population in the full-scale model.
    pub full_num_neurons: Vec<usize>,
    /// Connection probabilities, rows are targets and columns are sources.
    pub conn_probs: Vec<Vec<f64>>,
    /// Mean firing rates of the full-scale model, used to compensate the downscaling.
    pub full_mean_rates: Vec<f64>,
    /// Scaling factor of the number of neurons.
    pub n_scaling: f64,
    /// Scaling factor of the in-degrees.
    pub k_scaling: f64,
    /// Mean amplitude of the excitatory postsynaptic potentials.
    pub psp_exc_mean: f64,
    /// Multiplier of the excitatory weights from L4E to L23E.
    pub psp_exc_l23e_from_l4e: f64,
    /// Relative standard deviation of the weights.
    pub weight_rel_std: f64,
    /// Relative inhibitory synaptic strength.
    pub g: f64,
    /// Rate of each external (background) source.
    pub bg_rate: f64,
    /// Number of external inputs per neuron, for each population.
    pub k_ext: Vec<f64>,
    /// Background input as Poisson spikes (otherwise, as equivalent constant current).
    pub poisson_input: bool,
    /// Mean delay of the excitatory connections.
    pub delay_exc_mean: f64,
    /// Mean delay of the inhibitory connections.
    pub delay_inh_mean: f64,
    /// Relative standard deviation of the delays.
    pub delay_rel_std: f64,
    /// Delay of the background input.
    pub poisson_delay: f64,
    /// Mean of the initial membrane potentials.
    pub v0_mean: f64,
    /// Standard deviation of the initial membrane potentials.
    pub v0_std: f64,
    pub neuron_params: NeuronParams,
}

impl Default for NetParams {
    fn default() -> Self {
        NetParams {
            populations: ["L23E", "L23I", "L4E", "L4I", "L5E", "L5I", "L6E", "L6I"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            full_num_neurons: vec![20683, 5834, 21915, 5479, 4850, 1065, 14395, 2948],
            conn_probs: vec![
                vec![0.1009, 0.1689, 0.0437, 0.0818, 0.0323, 0.0, 0.0076, 0.0],
                vec![0.1346, 0.1371, 0.0316, 0.0515, 0.0755, 0.0, 0.0042, 0.0],
                vec![0.0077, 0.0059, 0.0497, 0.135, 0.0067, 0.0003, 0.0453, 0.0],
                vec![0.0691, 0.0029, 0.0794, 0.1597, 0.0033, 0.0, 0.1057, 0.0],
                vec![0.1004, 0.0622, 0.0505, 0.0057, 0.0831, 0.3726, 0.0204, 0.0],
                vec![0.0548, 0.0269, 0.0257, 0.0022, 0.06, 0.3158, 0.0086, 0.0],
                vec![0.0156, 0.0066, 0.0211, 0.0166, 0.0572, 0.0197, 0.0396, 0.2252],
                vec![0.0364, 0.001, 0.0034, 0.0005, 0.0277, 0.008, 0.0658, 0.1443],
            ],
            full_mean_rates: vec![0.971, 2.868, 4.746, 5.396, 8.142, 9.078, 0.991, 7.523],
            n_scaling: 0.1,
            k_scaling: 0.1,
            psp_exc_mean: 0.15,
            psp_exc_l23e_from_l4e: 2.0,
            weight_rel_std: 0.1,
            g: -4.0,
            bg_rate: 8.0,
            k_ext: vec![1600.0, 1500.0, 2100.0, 1900.0, 2000.0, 1900.0, 2900.0, 2100.0],
            poisson_input: true,
            delay_exc_mean: 1.5,
            delay_inh_mean: 0.75,
            delay_rel_std: 0.5,
            poisson_delay: 1.5,
            v0_mean: -58.0,
            v0_std: 10.0,
            neuron_params: NeuronParams::default(),
        }
    }
}

impl NetParams {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        load_json(path)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        save_json(self, path)
    }

    /// The number of populations.
    pub fn num_populations(&self) -> usize {
        self.populations.len()
    }

    /// Returns true if the population with the given index is excitatory.
    pub fn is_excitatory(&self, population: usize) -> bool {
        self.populations
            .get(population)
            .map_or(false, |name| name.ends_with('E'))
    }

    /// Check the consistency of the network parameters.
    pub fn validate(&self) -> Result<(), SNNError> {
        let n = self.num_populations();
        if n == 0 {
            return Err(SNNError::InvalidParameters(
                "At least one population is required".to_string(),
            ));
        }
        check_len("full_num_neurons", self.full_num_neurons.len(), n)?;
        check_len("full_mean_rates", self.full_mean_rates.len(), n)?;
        check_len("k_ext", self.k_ext.len(), n)?;
        check_len("conn_probs", self.conn_probs.len(), n)?;
        for row in self.conn_probs.iter() {
            check_len("conn_probs row", row.len(), n)?;
            for &p in row.iter() {
                check_probability("conn_probs entry", p)?;
            }
        }
        if self.full_num_neurons.iter().any(|&num| num == 0) {
            return Err(SNNError::InvalidParameters(
                "Every population must contain neurons".to_string(),
            ));
        }
        if !(self.n_scaling > 0.0 && self.n_scaling <= 1.0) {
            return Err(SNNError::InvalidParameters(
                "n_scaling must be in (0, 1]".to_string(),
            ));
        }
        if !(self.k_scaling > 0.0 && self.k_scaling <= 1.0) {
            return Err(SNNError::InvalidParameters(
                "k_scaling must be in (0, 1]".to_string(),
            ));
        }
        check_positive("delay_exc_mean", self.delay_exc_mean)?;
        check_positive("delay_inh_mean", self.delay_inh_mean)?;
        check_positive("poisson_delay", self.poisson_delay)?;
        if self.delay_rel_std < 0.0 || self.weight_rel_std < 0.0 || self.v0_std < 0.0 {
            return Err(SNNError::InvalidParameters(
                "Standard deviations must be non-negative".to_string(),
            ));
        }
        if self.bg_rate < 0.0 || self.k_ext.iter().any(|&k| k < 0.0) {
            return Err(SNNError::InvalidParameters(
                "Background rate and external in-degrees must be non-negative".to_string(),
            ));
        }
        self.neuron_params.validate()
    }
}

/// Stimulus parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StimParams {
    /// Turn the thalamic input on or off.
    pub thalamic_input: bool,
    /// Start of the thalamic input.
    pub th_start: f64,
    /// Duration of the thalamic input.
    pub th_duration: f64,
    /// Rate of the thalamic neurons.
    pub th_rate: f64,
    /// Number of thalamic neurons in the full-scale model.
    pub num_th_neurons: usize,
    /// Connection probabilities of the thalamus to the populations.
    pub conn_probs_th: Vec<f64>,
    /// Mean amplitude of the thalamic postsynaptic potentials.
    pub psp_th: f64,
    /// Relative standard deviation of the thalamic weights.
    pub psp_th_rel_std: f64,
    /// Mean delay of the thalamic connections.
    pub delay_th_mean: f64,
    /// Relative standard deviation of the thalamic delays.
    pub delay_th_rel_std: f64,
    /// Turn the DC input on or off.
    pub dc_input: bool,
    /// Start of the DC input.
    pub dc_start: f64,
    /// Duration of the DC input.
    pub dc_dur: f64,
    /// DC amplitude per external input, for each population.
    pub dc_amp: Vec<f64>,
}

impl Default for StimParams {
    fn default() -> Self {
        StimParams {
            thalamic_input: false,
            th_start: 700.0,
            th_duration: 10.0,
            th_rate: 120.0,
            num_th_neurons: 902,
            conn_probs_th: vec![0.0, 0.0, 0.0983, 0.0619, 0.0, 0.0, 0.0512, 0.0196],
            psp_th: 0.15,
            psp_th_rel_std: 0.1,
            delay_th_mean: 1.5,
            delay_th_rel_std: 0.5,
            dc_input: false,
            dc_start: 650.0,
            dc_dur: 100.0,
            dc_amp: vec![0.3; NUM_POPULATIONS],
        }
    }
}

impl StimParams {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        load_json(path)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        save_json(self, path)
    }

    /// Check the consistency of the stimulus parameters against the network populations.
    pub fn validate(&self, num_populations: usize) -> Result<(), SNNError> {
        if self.thalamic_input {
            check_len("conn_probs_th", self.conn_probs_th.len(), num_populations)?;
            for &p in self.conn_probs_th.iter() {
                check_probability("conn_probs_th entry", p)?;
            }
            check_positive("delay_th_mean", self.delay_th_mean)?;
            if self.th_duration < 0.0 || self.th_rate < 0.0 {
                return Err(SNNError::InvalidParameters(
                    "Thalamic duration and rate must be non-negative".to_string(),
                ));
            }
        }
        if self.dc_input {
            check_len("dc_amp", self.dc_amp.len(), num_populations)?;
            if self.dc_dur < 0.0 {
                return Err(SNNError::InvalidParameters(
                    "DC duration must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// The three parameter sets of a run.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Params {
    pub sim: SimParams,
    pub net: NetParams,
    pub stim: StimParams,
}

impl Params {
    /// Load the parameter sets from the provided JSON files, falling back to the defaults
    /// for the missing ones.
    pub fn load(
        sim_path: Option<&Path>,
        net_path: Option<&Path>,
        stim_path: Option<&Path>,
    ) -> Result<Self, SNNError> {
        let sim = match sim_path {
            Some(path) => SimParams::load_from(path)?,
            None => SimParams::default(),
        };
        let net = match net_path {
            Some(path) => NetParams::load_from(path)?,
            None => NetParams::default(),
        };
        let stim = match stim_path {
            Some(path) => StimParams::load_from(path)?,
            None => StimParams::default(),
        };
        Ok(Params { sim, net, stim })
    }

    /// Check the three parameter sets.
    pub fn validate(&self) -> Result<(), SNNError> {
        self.sim.validate()?;
        self.net.validate()?;
        self.stim.validate(self.net.num_populations())
    }
}
