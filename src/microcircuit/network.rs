//! The cortical microcircuit network: eight populations of leaky integrate-and-fire neurons
//! with background and (optional) thalamic and DC inputs, simulated on a fixed time grid.
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;
use std::ops::Range;

use crate::core::connection::{rand_fixed_total_number, ClippedNormal};
use crate::core::neuron::{IafPscExp, PoissonInput, Propagators};
use crate::core::utils::TimeInterval;
use crate::core::MIN_PARALLEL_NEURONS;
use crate::driver::Lifecycle;
use crate::error::SNNError;
use crate::microcircuit::evaluation::{
    population_rates, write_raster, write_rates, PopulationRates, PopulationSpikes,
    RASTER_FILENAME, RATES_FILENAME,
};
use crate::microcircuit::helpers::ModelQuantities;
use crate::params::{NetParams, Params, RecordingDevice, SimParams, StimParams};
use crate::recording::{AsciiBackend, Device, Record};

/// The lifecycle stage reached by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Initialized,
    Created,
    Connected,
    Simulated,
}

/// A population of neurons with contiguous IDs, recorded by its own devices.
#[derive(Debug, Clone, PartialEq)]
pub struct Population {
    pub name: String,
    pub excitatory: bool,
    /// Index of the first neuron of the population.
    pub first_id: usize,
    pub size: usize,
    /// Global ID of the spike recorder of the population.
    pub spike_recorder_gid: Option<usize>,
    /// Global ID of the voltmeter of the population.
    pub voltmeter_gid: Option<usize>,
}

impl Population {
    /// The indices of the neurons of the population.
    pub fn ids(&self) -> Range<usize> {
        self.first_id..self.first_id + self.size
    }

    /// The global ID of the first neuron of the population.
    pub fn first_gid(&self) -> usize {
        self.first_id + 1
    }

    /// The recording devices of the population.
    fn devices(&self) -> Vec<Device> {
        let spike_recorder = self
            .spike_recorder_gid
            .map(|gid| Device::new(gid, RecordingDevice::SpikeRecorder.name()));
        let voltmeter = self.voltmeter_gid.map(|gid| {
            Device::new(gid, RecordingDevice::Voltmeter.name())
                .with_double_values(&["V_m"])
        });
        spike_recorder.into_iter().chain(voltmeter).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Synapse {
    target: usize,
    weight: f64,
    delay_steps: usize,
}

/// Thalamic neurons relaying independent Poisson spike trains during the stimulus window.
#[derive(Debug)]
struct Thalamus {
    /// Index of the first thalamic neuron among the spike sources.
    first_source: usize,
    size: usize,
    events: Option<Poisson<f64>>,
    window: TimeInterval,
    rng: ChaCha8Rng,
}

impl Thalamus {
    /// The (source, multiplicity) pairs of the thalamic spikes of one step.
    fn sample_spikes(&mut self, time: f64) -> Vec<(usize, f64)> {
        let events = match (&self.events, self.window.contains(time)) {
            (Some(events), true) => events,
            _ => return vec![],
        };
        let mut spikes = vec![];
        for k in 0..self.size {
            let count: f64 = events.sample(&mut self.rng);
            if count > 0.0 {
                spikes.push((self.first_source + k, count));
            }
        }
        spikes
    }
}

/// Deliver the spikes of a source to its targets.
fn deliver(synapses: &[Synapse], neurons: &mut [IafPscExp], step: usize, multiplicity: f64) {
    for synapse in synapses.iter() {
        neurons[synapse.target].receive(step + synapse.delay_steps, synapse.weight * multiplicity);
    }
}

/// The microcircuit model of Potjans & Diesmann (2014).
///
/// Global IDs are assigned as in a NEST kernel: neurons first (starting at 1), then one device
/// per population for each recording device kind (in the order of `rec_dev`), then the thalamic
/// neurons.
pub struct Microcircuit {
    sim: SimParams,
    net: NetParams,
    stim: StimParams,
    quantities: ModelQuantities,
    propagators: Propagators,
    stage: Stage,
    populations: Vec<Population>,
    neurons: Vec<IafPscExp>,
    /// Population index of every neuron.
    neuron_population: Vec<usize>,
    thalamus: Option<Thalamus>,
    /// Outgoing synapses of every spike source: the neurons, then the thalamic neurons.
    outgoing: Vec<Vec<Synapse>>,
    recorder: AsciiBackend,
    pool: rayon::ThreadPool,
    rng: ChaCha8Rng,
    num_spikes: usize,
    rates: Vec<PopulationRates>,
}

impl Microcircuit {
    /// Build the network from the simulation, network and stimulus parameters.
    /// The parameters are validated and the data directory is created if necessary.
    pub fn new(params: &Params) -> Result<Self, SNNError> {
        params.validate()?;
        let Params { sim, net, stim } = params.clone();

        let quantities = ModelQuantities::derive(&net, &stim)?;
        let propagators = Propagators::new(&net.neuron_params, sim.sim_resolution);

        if sim.data_path.is_dir() {
            log::info!("Data directory {} already exists", sim.data_path.display());
        } else {
            std::fs::create_dir_all(&sim.data_path)?;
            log::info!("Data directory {} created", sim.data_path.display());
        }

        let num_nodes = quantities.total_num_neurons()
            + sim.rec_dev.len() * net.num_populations()
            + quantities.num_th_neurons;
        let recorder = AsciiBackend::new(
            sim.recording.clone(),
            &sim.data_path,
            sim.overwrite_files,
            sim.sim_resolution,
            num_nodes,
            sim.local_num_threads,
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(sim.local_num_threads)
            .build()
            .map_err(|e| SNNError::InvalidParameters(format!("Invalid thread pool: {}", e)))?;

        log::info!(
            "Microcircuit with {} neurons in {} populations (N_scaling = {}, K_scaling = {})",
            quantities.total_num_neurons(),
            net.num_populations(),
            net.n_scaling,
            net.k_scaling
        );

        Ok(Microcircuit {
            rng: ChaCha8Rng::seed_from_u64(sim.master_seed),
            sim,
            net,
            stim,
            quantities,
            propagators,
            stage: Stage::Initialized,
            populations: vec![],
            neurons: vec![],
            neuron_population: vec![],
            thalamus: None,
            outgoing: vec![],
            recorder,
            pool,
            num_spikes: 0,
            rates: vec![],
        })
    }

    fn require_stage(&self, stage: Stage, operation: &str) -> Result<(), SNNError> {
        if self.stage != stage {
            return Err(SNNError::InvalidOperation(format!(
                "{} requires a network in stage {:?}, found {:?}",
                operation, stage, self.stage
            )));
        }
        Ok(())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    pub fn quantities(&self) -> &ModelQuantities {
        &self.quantities
    }

    /// The number of neurons of the network (thalamic neurons excluded).
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    /// The number of thalamic neurons.
    pub fn num_th_neurons(&self) -> usize {
        self.thalamus.as_ref().map_or(0, |thalamus| thalamus.size)
    }

    /// The number of connections, thalamic ones included.
    pub fn num_connections(&self) -> usize {
        self.outgoing.iter().map(|synapses| synapses.len()).sum()
    }

    /// The number of spikes emitted by the neurons during the simulation.
    pub fn num_spikes(&self) -> usize {
        self.num_spikes
    }

    /// The firing rate statistics computed by the last evaluation.
    pub fn rates(&self) -> &[PopulationRates] {
        &self.rates
    }

    /// The recording files of every population.
    pub fn recording_files(&self) -> Vec<std::path::PathBuf> {
        self.populations
            .iter()
            .flat_map(|population| population.devices())
            .flat_map(|device| self.recorder.filenames(device.gid))
            .collect()
    }

    /// The recorded spikes of every population.
    pub fn population_spikes(&self) -> Result<Vec<PopulationSpikes>, SNNError> {
        self.populations
            .iter()
            .map(|population| {
                let gid = population.spike_recorder_gid.ok_or_else(|| {
                    SNNError::InvalidOperation("The spikes are not recorded".to_string())
                })?;
                Ok(PopulationSpikes {
                    name: population.name.clone(),
                    first_gid: population.first_gid(),
                    num_neurons: population.size,
                    spikes: self.recorder.read_device_spikes(gid)?,
                })
            })
            .collect()
    }

    /// The membrane potentials (in mV) sampled by the voltmeter of a population.
    pub fn recorded_voltages(&self, population: usize) -> Result<Vec<Record>, SNNError> {
        let gid = self
            .populations
            .get(population)
            .ok_or_else(|| SNNError::OutOfBounds(format!("Population {}", population)))?
            .voltmeter_gid
            .ok_or_else(|| {
                SNNError::InvalidOperation("The membrane potentials are not recorded".to_string())
            })?;
        self.recorder.read_device(gid)
    }

    fn connect_populations<R: Rng>(
        outgoing: &mut [Vec<Synapse>],
        num_connections: usize,
        sources: Range<usize>,
        targets: Range<usize>,
        weights: &ClippedNormal,
        delays: &ClippedNormal,
        resolution: f64,
        rng: &mut R,
    ) -> Result<(), SNNError> {
        let connections =
            rand_fixed_total_number(num_connections, sources, targets, weights, delays, rng)?;
        for connection in connections {
            outgoing[connection.source_id].push(Synapse {
                target: connection.target_id,
                weight: connection.weight,
                delay_steps: connection.delay_steps(resolution),
            });
        }
        Ok(())
    }
}

impl Lifecycle for Microcircuit {
    /// Create the neurons with random initial membrane potentials, their inputs, the thalamic
    /// neurons and the recording devices.
    fn create(&mut self) -> Result<(), SNNError> {
        self.require_stage(Stage::Initialized, "create")?;

        let resolution = self.sim.sim_resolution;
        let v0 = Normal::new(self.net.v0_mean, self.net.v0_std).map_err(|e| {
            SNNError::InvalidParameters(format!("Invalid initial potentials: {}", e))
        })?;
        let total = self.quantities.total_num_neurons();
        let num_pops = self.net.num_populations();
        let rec_dev = self.sim.rec_dev.clone();
        let device_gid = |device: RecordingDevice, p: usize| {
            rec_dev
                .iter()
                .position(|&d| d == device)
                .map(|d| total + d * num_pops + p + 1)
        };

        self.neurons = Vec::with_capacity(total);
        self.neuron_population = Vec::with_capacity(total);
        for (p, &size) in self.quantities.num_neurons.iter().enumerate() {
            let population = Population {
                name: self.net.populations[p].clone(),
                excitatory: self.net.is_excitatory(p),
                first_id: self.neurons.len(),
                size,
                spike_recorder_gid: device_gid(RecordingDevice::SpikeRecorder, p),
                voltmeter_gid: device_gid(RecordingDevice::Voltmeter, p),
            };

            for id in population.ids() {
                let gid = id + 1;
                let v_init = v0.sample(&mut self.rng);
                let mut neuron = IafPscExp::new(
                    id,
                    &self.net.neuron_params,
                    v_init,
                    resolution,
                    self.sim.master_seed.wrapping_add(gid as u64),
                );
                neuron.set_i_e(self.quantities.dc_amp[p]);
                neuron.set_i_dc(self.quantities.dc_stim_amp[p]);
                neuron.set_background(PoissonInput::build(
                    self.quantities.ext_rates[p],
                    self.quantities.psc_ext,
                    resolution,
                )?);
                self.neurons.push(neuron);
                self.neuron_population.push(p);
            }

            log::debug!(
                "Population {} created with {} neurons (IDs {} to {})",
                population.name,
                population.size,
                population.first_gid(),
                population.first_gid() + population.size - 1
            );
            self.populations.push(population);
        }

        let num_th = self.quantities.num_th_neurons;
        if self.stim.thalamic_input && num_th > 0 {
            let lambda = self.stim.th_rate * resolution * 1e-3;
            let events = if lambda > 0.0 {
                Some(Poisson::new(lambda).map_err(|e| {
                    SNNError::InvalidParameters(format!("Invalid thalamic rate: {}", e))
                })?)
            } else {
                None
            };
            self.thalamus = Some(Thalamus {
                first_source: total,
                size: num_th,
                events,
                window: TimeInterval::new(
                    self.stim.th_start,
                    self.stim.th_start + self.stim.th_duration,
                ),
                rng: ChaCha8Rng::seed_from_u64(
                    self.sim
                        .master_seed
                        .wrapping_add((total + rec_dev.len() * num_pops + 1) as u64),
                ),
            });
            log::info!("Thalamic input created with {} neurons", num_th);
        }

        self.outgoing = vec![vec![]; total + self.num_th_neurons()];
        self.stage = Stage::Created;
        log::info!(
            "{} neurons and {} recording devices created",
            total,
            rec_dev.len() * num_pops
        );
        Ok(())
    }

    /// Connect the populations (and the thalamus) with a fixed total number of synapses per pair.
    fn connect(&mut self) -> Result<(), SNNError> {
        self.require_stage(Stage::Created, "connect")?;

        let resolution = self.sim.sim_resolution;
        for (i, target) in self.populations.iter().enumerate() {
            for (j, source) in self.populations.iter().enumerate() {
                let num_synapses = self.quantities.num_synapses[(i, j)];
                if num_synapses == 0 {
                    continue;
                }

                let mean_weight = self.quantities.psc_matrix[(i, j)];
                let (min_weight, max_weight) = if mean_weight.is_sign_positive() {
                    (0.0, f64::INFINITY)
                } else {
                    (f64::NEG_INFINITY, 0.0)
                };
                let weights = ClippedNormal::new(
                    mean_weight,
                    mean_weight.abs() * self.net.weight_rel_std,
                    min_weight,
                    max_weight,
                )?;

                let mean_delay = if source.excitatory {
                    self.net.delay_exc_mean
                } else {
                    self.net.delay_inh_mean
                };
                let delays = ClippedNormal::new(
                    mean_delay,
                    mean_delay * self.net.delay_rel_std,
                    resolution,
                    f64::INFINITY,
                )?;

                Self::connect_populations(
                    &mut self.outgoing,
                    num_synapses,
                    source.ids(),
                    target.ids(),
                    &weights,
                    &delays,
                    resolution,
                    &mut self.rng,
                )?;
                log::debug!(
                    "Connected {} -> {} with {} synapses",
                    source.name,
                    target.name,
                    num_synapses
                );
            }
        }

        if let Some(thalamus) = &self.thalamus {
            let sources = thalamus.first_source..thalamus.first_source + thalamus.size;
            let weights = ClippedNormal::new(
                self.quantities.psc_th,
                self.quantities.psc_th * self.stim.psp_th_rel_std,
                0.0,
                f64::INFINITY,
            )?;
            let delays = ClippedNormal::new(
                self.stim.delay_th_mean,
                self.stim.delay_th_mean * self.stim.delay_th_rel_std,
                resolution,
                f64::INFINITY,
            )?;
            for (i, target) in self.populations.iter().enumerate() {
                Self::connect_populations(
                    &mut self.outgoing,
                    self.quantities.num_th_synapses[i],
                    sources.clone(),
                    target.ids(),
                    &weights,
                    &delays,
                    resolution,
                    &mut self.rng,
                )?;
            }
            log::info!("Thalamic input connected");
        }

        let max_delay_steps = self
            .outgoing
            .iter()
            .flatten()
            .map(|synapse| synapse.delay_steps)
            .max()
            .unwrap_or(1);
        self.neurons
            .iter_mut()
            .for_each(|neuron| neuron.init_ring_buffer(max_delay_steps));

        self.stage = Stage::Connected;
        log::info!(
            "{} connections created (maximum delay: {} steps)",
            self.num_connections(),
            max_delay_steps
        );
        Ok(())
    }

    /// Simulate the network for `t_sim` and record the spikes of every population.
    fn simulate(&mut self) -> Result<(), SNNError> {
        self.require_stage(Stage::Connected, "simulate")?;

        let num_vps = self.recorder.num_vps();
        for device in self.populations.iter().flat_map(|population| population.devices()) {
            for vp in 0..num_vps {
                self.recorder.enroll(&device, vp)?;
            }
        }
        let rec_v_steps = self.sim.rec_v_steps();
        let e_l = self.net.neuron_params.e_l;

        let resolution = self.sim.sim_resolution;
        let num_steps = self.sim.num_steps();
        let propagators = self.propagators;
        let dc_window =
            TimeInterval::new(self.stim.dc_start, self.stim.dc_start + self.stim.dc_dur);
        let log_every = (num_steps / 10).max(1);

        log::info!("Simulating {} ms ({} steps)", self.sim.t_sim, num_steps);
        for step in 0..num_steps {
            let time = step as f64 * resolution;
            let dc_on = self.stim.dc_input && dc_window.contains(time);

            let neurons = &mut self.neurons;
            let spikes: Vec<usize> = if neurons.len() >= MIN_PARALLEL_NEURONS {
                self.pool.install(|| {
                    neurons
                        .par_iter_mut()
                        .filter_map(|neuron| {
                            neuron.update(step, dc_on, &propagators).then(|| neuron.id())
                        })
                        .collect()
                })
            } else {
                neurons
                    .iter_mut()
                    .filter_map(|neuron| {
                        neuron.update(step, dc_on, &propagators).then(|| neuron.id())
                    })
                    .collect()
            };

            for &id in spikes.iter() {
                let gid = id + 1;
                let population = &self.populations[self.neuron_population[id]];
                if let Some(recorder_gid) = population.spike_recorder_gid {
                    self.recorder
                        .write(recorder_gid, gid % num_vps, gid, step, &[], &[])?;
                }
                deliver(&self.outgoing[id], &mut self.neurons, step, 1.0);
            }
            self.num_spikes += spikes.len();

            if (step + 1) % rec_v_steps == 0 {
                for population in self.populations.iter() {
                    let Some(voltmeter_gid) = population.voltmeter_gid else {
                        continue;
                    };
                    for neuron in self.neurons[population.ids()].iter() {
                        let gid = neuron.id() + 1;
                        let v_m = neuron.v_m() + e_l;
                        self.recorder
                            .write(voltmeter_gid, gid % num_vps, gid, step, &[v_m], &[])?;
                    }
                }
            }

            if let Some(thalamus) = self.thalamus.as_mut() {
                for (source, multiplicity) in thalamus.sample_spikes(time) {
                    deliver(&self.outgoing[source], &mut self.neurons, step, multiplicity);
                }
            }

            if self.sim.print_time && (step + 1) % log_every == 0 {
                log::info!(
                    "Simulation progress: {:.0}% (Time: {:.1}/{:.1} ms)",
                    100.0 * (step + 1) as f64 / num_steps as f64,
                    (step + 1) as f64 * resolution,
                    self.sim.t_sim
                );
            }
        }

        self.recorder.post_run()?;
        self.stage = Stage::Simulated;
        log::info!(
            "Simulation done: {} spikes, i.e., {:.3} spikes/s per neuron",
            self.num_spikes,
            self.num_spikes as f64 / (self.neurons.len().max(1) as f64 * self.sim.t_sim * 1e-3)
        );
        Ok(())
    }

    /// Write the spike raster and compute the firing rates of every population.
    /// Only rank 0 evaluates.
    fn evaluate(
        &mut self,
        raster_interval: [f64; 2],
        firing_rates_interval: [f64; 2],
    ) -> Result<(), SNNError> {
        self.require_stage(Stage::Simulated, "evaluate")?;
        if self.rank() != 0 {
            return Ok(());
        }

        if !self.sim.records_with(RecordingDevice::SpikeRecorder) {
            log::info!("No spike recorders: nothing to evaluate");
            return Ok(());
        }
        let populations = self.population_spikes()?;

        let raster_path = self.sim.data_path.join(RASTER_FILENAME);
        let num_spikes = write_raster(
            &raster_path,
            &populations,
            &TimeInterval::from_bounds(raster_interval),
        )?;
        log::info!(
            "Spike raster with {} spikes in [{}, {}] ms saved to {}",
            num_spikes,
            raster_interval[0],
            raster_interval[1],
            raster_path.display()
        );

        let rates_interval = TimeInterval::from_bounds(firing_rates_interval);
        if rates_interval.is_empty() {
            log::warn!(
                "Empty firing rate interval [{}, {}] ms: no firing rates computed",
                firing_rates_interval[0],
                firing_rates_interval[1]
            );
            return Ok(());
        }

        self.rates = populations
            .iter()
            .map(|population| population_rates(population, &rates_interval))
            .collect::<Result<Vec<_>, _>>()?;
        for rates in self.rates.iter() {
            log::info!(
                "Mean rate of population {} is {:.3} spikes/s",
                rates.population,
                rates.mean
            );
            log::info!(
                "Standard deviation of the rates of population {} is {:.3} spikes/s",
                rates.population,
                rates.std
            );
        }

        let rates_path = self.sim.data_path.join(RATES_FILENAME);
        write_rates(&rates_path, &self.rates)?;
        log::info!("Firing rates saved to {}", rates_path.display());
        Ok(())
    }

    /// The network runs in a single process.
    fn rank(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn small_params(data_path: &Path) -> Params {
        let mut params = Params::default();
        params.sim.t_sim = 100.0;
        params.sim.local_num_threads = 2;
        params.sim.data_path = data_path.to_path_buf();
        params.net.n_scaling = 0.01;
        params.net.k_scaling = 0.01;
        params
    }

    #[test]
    fn test_out_of_order_operations() {
        let dir = tempdir().unwrap();
        let mut network = Microcircuit::new(&small_params(dir.path())).unwrap();
        assert_eq!(network.stage(), Stage::Initialized);
        assert!(matches!(network.connect(), Err(SNNError::InvalidOperation(_))));
        assert!(matches!(network.simulate(), Err(SNNError::InvalidOperation(_))));
        assert!(matches!(
            network.evaluate([0.0, 100.0], [0.0, 100.0]),
            Err(SNNError::InvalidOperation(_))
        ));

        network.create().unwrap();
        assert!(matches!(network.create(), Err(SNNError::InvalidOperation(_))));
        assert!(matches!(network.simulate(), Err(SNNError::InvalidOperation(_))));
        assert_eq!(network.stage(), Stage::Created);
    }

    #[test]
    fn test_invalid_params() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        params.net.k_scaling = 0.0;
        assert!(matches!(
            Microcircuit::new(&params),
            Err(SNNError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_create() {
        let dir = tempdir().unwrap();
        let mut network = Microcircuit::new(&small_params(dir.path())).unwrap();
        network.create().unwrap();

        let total = network.quantities().total_num_neurons();
        assert_eq!(network.num_neurons(), total);
        assert_eq!(network.num_th_neurons(), 0);
        assert_eq!(network.populations().len(), 8);

        let mut next_id = 0;
        for (p, population) in network.populations().iter().enumerate() {
            assert_eq!(population.first_id, next_id);
            assert_eq!(population.size, network.quantities().num_neurons[p]);
            assert_eq!(population.spike_recorder_gid, Some(total + p + 1));
            assert_eq!(population.voltmeter_gid, None);
            assert_eq!(population.excitatory, p % 2 == 0);
            next_id += population.size;
        }
    }

    #[test]
    fn test_connect() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        params.stim.thalamic_input = true;
        let mut network = Microcircuit::new(&params).unwrap();
        network.create().unwrap();
        network.connect().unwrap();
        assert_eq!(network.stage(), Stage::Connected);

        let quantities = network.quantities();
        assert_eq!(network.num_th_neurons(), quantities.num_th_neurons);
        let expected = quantities.num_synapses.iter().sum::<usize>()
            + quantities.num_th_synapses.iter().sum::<usize>();
        assert_eq!(network.num_connections(), expected);

        for population in network.populations().iter() {
            for id in population.ids() {
                for synapse in network.outgoing[id].iter() {
                    assert!(synapse.delay_steps >= 1);
                    let target = network.neuron_population[synapse.target];
                    let source = network.neuron_population[id];
                    let mean_weight = quantities.psc_matrix[(target, source)];
                    assert!(synapse.weight * mean_weight >= 0.0);
                    if population.excitatory {
                        assert!(synapse.weight >= 0.0);
                    } else {
                        assert!(synapse.weight <= 0.0);
                    }
                }
            }
        }
        assert!(network.outgoing[network.num_neurons()..]
            .iter()
            .flatten()
            .all(|synapse| synapse.weight >= 0.0 && synapse.target < network.num_neurons()));
    }

    #[test]
    fn test_connect_with_positive_relative_inhibition() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        // inhibitory synapses become excitatory
        params.net.g = 4.0;
        let mut network = Microcircuit::new(&params).unwrap();
        network.create().unwrap();
        network.connect().unwrap();

        let inhibitory_weights: Vec<f64> = network
            .populations()
            .iter()
            .filter(|population| !population.excitatory)
            .flat_map(|population| population.ids())
            .flat_map(|id| network.outgoing[id].iter().map(|synapse| synapse.weight))
            .collect();
        assert!(!inhibitory_weights.is_empty());
        assert!(inhibitory_weights.iter().all(|&weight| weight >= 0.0));
        assert!(inhibitory_weights.iter().any(|&weight| weight > 0.0));
    }

    #[test]
    fn test_simulate_and_evaluate() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        params.sim.t_sim = 200.0;
        let mut network = Microcircuit::new(&params).unwrap();
        network.create().unwrap();
        network.connect().unwrap();
        network.simulate().unwrap();
        assert_eq!(network.stage(), Stage::Simulated);

        let files = network.recording_files();
        assert_eq!(files.len(), 8 * 2);
        assert!(files.iter().all(|path| path.exists()));

        let populations = network.population_spikes().unwrap();
        let num_recorded: usize = populations.iter().map(|p| p.spikes.len()).sum();
        assert_eq!(num_recorded, network.num_spikes());
        for population in populations.iter() {
            assert!(population.spikes.iter().all(|spike| {
                spike.sender >= population.first_gid
                    && spike.sender < population.first_gid + population.num_neurons
                    && spike.time > 0.0
                    && spike.time <= 200.0 + 1e-9
            }));
        }

        network.evaluate([50.0, 150.0], [100.0, 200.0]).unwrap();
        assert!(dir.path().join(RASTER_FILENAME).exists());
        assert!(dir.path().join(RATES_FILENAME).exists());
        assert_eq!(network.rates().len(), 8);
        assert!(network.rates().iter().all(|rates| rates.mean >= 0.0));
    }

    #[test]
    fn test_voltmeter() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        params.sim.rec_dev = vec![RecordingDevice::SpikeRecorder, RecordingDevice::Voltmeter];
        params.sim.rec_v_dt = 1.0;
        let v_th = params.net.neuron_params.v_th;
        let mut network = Microcircuit::new(&params).unwrap();
        network.create().unwrap();

        let total = network.num_neurons();
        for (p, population) in network.populations().iter().enumerate() {
            assert_eq!(population.spike_recorder_gid, Some(total + p + 1));
            assert_eq!(population.voltmeter_gid, Some(total + 8 + p + 1));
        }

        network.connect().unwrap();
        network.simulate().unwrap();

        let files = network.recording_files();
        assert_eq!(files.len(), 8 * 2 * 2);
        let voltmeter_files: Vec<_> = files
            .iter()
            .filter(|path| path.to_string_lossy().contains("voltmeter"))
            .collect();
        assert_eq!(voltmeter_files.len(), 8 * 2);

        for (p, population) in network.populations().iter().enumerate() {
            let records = network.recorded_voltages(p).unwrap();
            // one sample per neuron and per ms
            assert_eq!(records.len(), population.size * 100);
            assert!(records.iter().all(|record| {
                record.values.len() == 1
                    && record.values[0] <= v_th
                    && record.sender >= population.first_gid()
                    && record.sender < population.first_gid() + population.size
            }));
        }
        assert!(matches!(network.recorded_voltages(8), Err(SNNError::OutOfBounds(_))));

        network.evaluate([0.0, 100.0], [50.0, 100.0]).unwrap();
        assert_eq!(network.rates().len(), 8);
    }

    #[test]
    fn test_voltmeter_only() {
        let dir = tempdir().unwrap();
        let mut params = small_params(dir.path());
        params.sim.rec_dev = vec![RecordingDevice::Voltmeter];
        let mut network = Microcircuit::new(&params).unwrap();
        network.create().unwrap();
        network.connect().unwrap();
        network.simulate().unwrap();

        assert!(matches!(
            network.population_spikes(),
            Err(SNNError::InvalidOperation(_))
        ));
        network.evaluate([0.0, 100.0], [50.0, 100.0]).unwrap();
        assert!(!dir.path().join(RASTER_FILENAME).exists());
        assert!(network.rates().is_empty());
    }

    #[test]
    fn test_empty_rates_interval() {
        let dir = tempdir().unwrap();
        let mut network = Microcircuit::new(&small_params(dir.path())).unwrap();
        network.create().unwrap();
        network.connect().unwrap();
        network.simulate().unwrap();
        // the default rate interval starts after the end of the simulation
        network.evaluate([0.0, 100.0], [500.0, 100.0]).unwrap();
        assert!(dir.path().join(RASTER_FILENAME).exists());
        assert!(!dir.path().join(RATES_FILENAME).exists());
        assert!(network.rates().is_empty());
    }

    #[test]
    fn test_reproducible_runs() {
        let num_spikes: Vec<usize> = (0..2)
            .map(|_| {
                let dir = tempdir().unwrap();
                let mut network = Microcircuit::new(&small_params(dir.path())).unwrap();
                network.create().unwrap();
                network.connect().unwrap();
                network.simulate().unwrap();
                network.num_spikes()
            })
            .collect();
        assert_eq!(num_spikes[0], num_spikes[1]);
    }
}
