//! Leaky integrate-and-fire neurons with exponentially decaying postsynaptic currents.
//!
//! The subthreshold dynamics
//!
//! ```text
//! dV/dt = -V / tau_m + (I_syn + I_e + I_dc) / C_m
//! dI_syn/dt = -I_syn / tau_syn
//! ```
//!
//! are integrated exactly on a fixed time grid. The membrane potential is stored relative to
//! the resting potential.
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rand_distr::{Distribution, Poisson};

use crate::error::SNNError;
use crate::params::NeuronParams;

/// Exact integration propagators for one simulation step.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Propagators {
    /// Decay of the synaptic current.
    pub p11: f64,
    /// Decay of the membrane potential.
    pub p22: f64,
    /// Contribution of the synaptic current to the membrane potential.
    pub p21: f64,
    /// Contribution of a constant current to the membrane potential.
    pub p20: f64,
}

impl Propagators {
    pub fn new(params: &NeuronParams, resolution: f64) -> Self {
        let NeuronParams {
            c_m, tau_m, tau_syn, ..
        } = *params;
        let p11 = (-resolution / tau_syn).exp();
        let p22 = (-resolution / tau_m).exp();
        let p21 = tau_m * tau_syn / (c_m * (tau_m - tau_syn)) * (p22 - p11);
        let p20 = tau_m / c_m * (1.0 - p22);
        Propagators { p11, p22, p21, p20 }
    }
}

/// Background input made of independent Poisson spike sources.
#[derive(Debug, Clone)]
pub struct PoissonInput {
    events: Poisson<f64>,
    weight: f64,
}

impl PoissonInput {
    /// Poisson input with the given total rate (in Hz) and weight (in pA), sampled every step.
    /// Returns `None` if the input is silent.
    pub fn build(rate: f64, weight: f64, resolution: f64) -> Result<Option<Self>, SNNError> {
        let lambda = rate * resolution * 1e-3;
        if lambda == 0.0 || weight == 0.0 {
            return Ok(None);
        }
        let events = Poisson::new(lambda).map_err(|e| {
            SNNError::InvalidParameters(format!("Invalid Poisson rate {}: {}", rate, e))
        })?;
        Ok(Some(PoissonInput { events, weight }))
    }

    /// The input current arriving during one step.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        self.events.sample(rng) * self.weight
    }
}

/// A leaky integrate-and-fire neuron with exponential postsynaptic currents.
#[derive(Debug, Clone)]
pub struct IafPscExp {
    id: usize,
    /// Membrane potential relative to the resting potential.
    v_m: f64,
    i_syn: f64,
    /// Constant external current.
    i_e: f64,
    /// Additional current while the DC stimulus is on.
    i_dc: f64,
    theta: f64,
    v_reset: f64,
    refractory_steps: usize,
    refractory_left: usize,
    /// Incoming currents indexed by (arrival step modulo length).
    ring_buffer: Vec<f64>,
    background: Option<PoissonInput>,
    rng: ChaCha8Rng,
}

impl IafPscExp {
    /// Create a new neuron with the given initial membrane potential (in absolute mV).
    pub fn new(id: usize, params: &NeuronParams, v_init: f64, resolution: f64, seed: u64) -> Self {
        IafPscExp {
            id,
            v_m: v_init - params.e_l,
            i_syn: 0.0,
            i_e: 0.0,
            i_dc: 0.0,
            theta: params.v_th - params.e_l,
            v_reset: params.v_reset - params.e_l,
            refractory_steps: (params.t_ref / resolution).round() as usize,
            refractory_left: 0,
            ring_buffer: vec![0.0],
            background: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the neuron ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the membrane potential relative to the resting potential.
    pub fn v_m(&self) -> f64 {
        self.v_m
    }

    /// Returns the synaptic current.
    pub fn i_syn(&self) -> f64 {
        self.i_syn
    }

    pub fn set_i_e(&mut self, i_e: f64) {
        self.i_e = i_e;
    }

    pub fn set_i_dc(&mut self, i_dc: f64) {
        self.i_dc = i_dc;
    }

    pub fn set_background(&mut self, background: Option<PoissonInput>) {
        self.background = background;
    }

    /// Resize the ring buffer to hold inputs up to `max_delay_steps` ahead.
    pub fn init_ring_buffer(&mut self, max_delay_steps: usize) {
        self.ring_buffer = vec![0.0; max_delay_steps + 1];
    }

    /// Register an input current arriving at the given step.
    /// The arrival must lie within the ring buffer horizon.
    pub fn receive(&mut self, arrival_step: usize, weight: f64) {
        let len = self.ring_buffer.len();
        self.ring_buffer[arrival_step % len] += weight;
    }

    /// Advance the neuron by one step and return true if it fires.
    pub fn update(&mut self, step: usize, dc_on: bool, propagators: &Propagators) -> bool {
        let i_ext = if dc_on { self.i_e + self.i_dc } else { self.i_e };

        if self.refractory_left == 0 {
            self.v_m = self.v_m * propagators.p22
                + self.i_syn * propagators.p21
                + i_ext * propagators.p20;
        } else {
            self.refractory_left -= 1;
        }

        let len = self.ring_buffer.len();
        let slot = &mut self.ring_buffer[step % len];
        let mut input = *slot;
        *slot = 0.0;
        if let Some(background) = &self.background {
            input += background.sample(&mut self.rng);
        }
        self.i_syn = self.i_syn * propagators.p11 + input;

        if self.v_m >= self.theta {
            self.refractory_left = self.refractory_steps;
            self.v_m = self.v_reset;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLUTION: f64 = 0.1;

    fn neuron(v_init: f64) -> IafPscExp {
        IafPscExp::new(0, &NeuronParams::default(), v_init, RESOLUTION, 0)
    }

    #[test]
    fn test_propagators() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        assert!((props.p22 - (-0.01_f64).exp()).abs() < 1e-12);
        assert!((props.p11 - (-0.2_f64).exp()).abs() < 1e-12);
        assert!(props.p21 > 0.0);
        assert!((props.p20 - 10.0 / 250.0 * (1.0 - (-0.01_f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_rest_is_stable() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        let mut neuron = neuron(-65.0);
        for step in 0..1000 {
            assert!(!neuron.update(step, false, &props));
        }
        assert_eq!(neuron.v_m(), 0.0);
    }

    #[test]
    fn test_suprathreshold_current_fires_periodically() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        let mut neuron = neuron(-65.0);
        // the asymptotic potential is 10 ms * 500 pA / 250 pF = 20 mV above rest
        neuron.set_i_e(500.0);
        let spikes: Vec<usize> = (0..2000)
            .filter(|&step| neuron.update(step, false, &props))
            .collect();
        assert!(spikes.len() > 5);
        // the refractory period separates consecutive spikes
        assert!(spikes.windows(2).all(|w| w[1] - w[0] > 20));
        // the first spike happens when 20 * (1 - exp(-t / 10)) reaches 15, i.e., at t = 13.86 ms
        assert!((spikes[0] as f64 * RESOLUTION - 13.86).abs() < 0.2);
    }

    #[test]
    fn test_dc_only_when_on() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        let mut neuron = neuron(-65.0);
        neuron.set_i_dc(500.0);
        for step in 0..500 {
            assert!(!neuron.update(step, false, &props));
        }
        assert!((0..500).any(|step| neuron.update(step, true, &props)));
    }

    #[test]
    fn test_delayed_input() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        let mut neuron = neuron(-65.0);
        neuron.init_ring_buffer(20);
        neuron.receive(15, 100.0);

        for step in 0..15 {
            neuron.update(step, false, &props);
            assert_eq!(neuron.i_syn(), 0.0);
        }
        neuron.update(15, false, &props);
        assert_eq!(neuron.i_syn(), 100.0);
        neuron.update(16, false, &props);
        assert!(neuron.v_m() > 0.0);
        assert!((neuron.i_syn() - 100.0 * props.p11).abs() < 1e-12);
    }

    #[test]
    fn test_reset_after_spike() {
        let props = Propagators::new(&NeuronParams::default(), RESOLUTION);
        let mut neuron = neuron(-49.0);
        assert!(neuron.update(0, false, &props));
        assert_eq!(neuron.v_m(), 0.0);
        // clamped during the refractory period despite a strong input
        neuron.init_ring_buffer(1);
        neuron.receive(1, 1e5);
        for step in 1..20 {
            assert!(!neuron.update(step, false, &props));
            assert_eq!(neuron.v_m(), 0.0);
        }
    }

    #[test]
    fn test_poisson_input() {
        assert!(PoissonInput::build(0.0, 87.8, RESOLUTION).unwrap().is_none());
        let input = PoissonInput::build(8.0 * 1600.0, 87.8, RESOLUTION)
            .unwrap()
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mean = (0..10000).map(|_| input.sample(&mut rng)).sum::<f64>() / 10000.0;
        // 1.28 events per step on average
        assert!((mean / 87.8 - 1.28).abs() < 0.05);
    }
}
