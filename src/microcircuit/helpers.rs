//! Model arithmetic of the microcircuit: synapse numbers, synaptic weights and the
//! compensation of the in-degree downscaling.
use nalgebra::{DMatrix, DVector};

use crate::error::SNNError;
use crate::params::{NetParams, StimParams};

/// Amplitude of the postsynaptic current (in pA) that produces a postsynaptic potential with
/// a peak of 1 mV, for exponentially decaying currents.
pub fn psp_to_psc(c_m: f64, tau_m: f64, tau_syn: f64) -> f64 {
    let sub = 1.0 / (tau_syn - tau_m);
    let pre = tau_m * tau_syn / c_m * sub;
    let frac = (tau_m / tau_syn).powf(sub);
    1.0 / (pre * (frac.powf(tau_m) - frac.powf(tau_syn)))
}

/// Total number of synapses between populations such that every pair of neurons is connected
/// with the given probability, when connections are drawn with replacement.
///
/// Rows of `conn_probs` are target populations and columns are source populations.
pub fn num_synapses_from_conn_probs(
    conn_probs: &DMatrix<f64>,
    num_targets: &DVector<f64>,
    num_sources: &DVector<f64>,
) -> DMatrix<f64> {
    DMatrix::from_fn(conn_probs.nrows(), conn_probs.ncols(), |i, j| {
        let p = conn_probs[(i, j)];
        let prod = num_targets[i] * num_sources[j];
        if p <= 0.0 || prod <= 1.0 {
            return 0.0;
        }
        (1.0 - p).ln() / ((prod - 1.0) / prod).ln()
    })
}

/// Mean postsynaptic current amplitudes (in pA) of the full-scale model.
/// Inhibitory sources are scaled by `g`; the projection from L4E to L23E has its own multiplier.
pub fn mean_psc_matrix(net: &NetParams, psc_exc: f64) -> DMatrix<f64> {
    let n = net.num_populations();
    let l23e = net.populations.iter().position(|name| name == "L23E");
    let l4e = net.populations.iter().position(|name| name == "L4E");
    DMatrix::from_fn(n, n, |i, j| {
        let mut psc = if net.is_excitatory(j) {
            psc_exc
        } else {
            net.g * psc_exc
        };
        if Some(i) == l23e && Some(j) == l4e {
            psc *= net.psp_exc_l23e_from_l4e;
        }
        psc
    })
}

/// Weights and constant currents after compensating the downscaling of the in-degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledInput {
    /// Mean recurrent postsynaptic currents.
    pub psc_matrix: DMatrix<f64>,
    /// Postsynaptic current of the background input.
    pub psc_ext: f64,
    /// Constant input current of each population.
    pub dc_amp: DVector<f64>,
}

/// Scale the weights by `1/sqrt(K_scaling)` and add the constant current that restores the mean
/// input of the full-scale model, given its mean firing rates.
#[allow(clippy::too_many_arguments)]
pub fn adjust_weights_and_input_to_synapse_scaling(
    full_num_neurons: &DVector<f64>,
    full_num_synapses: &DMatrix<f64>,
    k_scaling: f64,
    mean_psc_matrix: &DMatrix<f64>,
    psc_ext: f64,
    tau_syn: f64,
    full_mean_rates: &DVector<f64>,
    dc_amp: &DVector<f64>,
    poisson_input: bool,
    bg_rate: f64,
    k_ext: &DVector<f64>,
) -> ScaledInput {
    let sqrt_k = k_scaling.sqrt();
    let psc_matrix = mean_psc_matrix / sqrt_k;
    let psc_ext_new = psc_ext / sqrt_k;

    let n = full_num_neurons.len();
    let input_rec = DVector::from_fn(n, |i, _| {
        (0..n)
            .map(|j| {
                let indegree = full_num_synapses[(i, j)] / full_num_neurons[i];
                mean_psc_matrix[(i, j)] * indegree * full_mean_rates[j]
            })
            .sum::<f64>()
    });

    let mut dc_amp_new = dc_amp + input_rec * (0.001 * tau_syn * (1.0 - sqrt_k));
    if poisson_input {
        let input_ext = k_ext * (psc_ext * bg_rate);
        dc_amp_new += input_ext * (0.001 * tau_syn * (1.0 - sqrt_k));
    }

    ScaledInput {
        psc_matrix,
        psc_ext: psc_ext_new,
        dc_amp: dc_amp_new,
    }
}

/// All derived quantities the network needs to create and connect its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelQuantities {
    /// Number of neurons of each (scaled) population.
    pub num_neurons: Vec<usize>,
    /// Number of synapses between (scaled) populations; rows are targets.
    pub num_synapses: DMatrix<usize>,
    /// Mean recurrent postsynaptic currents (in pA), compensated for the downscaling.
    pub psc_matrix: DMatrix<f64>,
    /// Postsynaptic current of the background input.
    pub psc_ext: f64,
    /// Rate (in Hz) of the background input of each population, if Poisson.
    pub ext_rates: Vec<f64>,
    /// Constant input current (in pA) of each population.
    pub dc_amp: Vec<f64>,
    /// Number of thalamic neurons.
    pub num_th_neurons: usize,
    /// Number of synapses from the thalamus to each population.
    pub num_th_synapses: Vec<usize>,
    /// Mean postsynaptic current of the thalamic input.
    pub psc_th: f64,
    /// DC stimulus amplitude (in pA) of each population.
    pub dc_stim_amp: Vec<f64>,
}

/// Round to the nearest count, ties to even.
fn round_count(x: f64) -> usize {
    x.round_ties_even().max(0.0) as usize
}

impl ModelQuantities {
    /// Derive the model quantities from validated network and stimulus parameters.
    pub fn derive(net: &NetParams, stim: &StimParams) -> Result<Self, SNNError> {
        let n = net.num_populations();
        let neuron = &net.neuron_params;

        let full_num_neurons =
            DVector::from_iterator(n, net.full_num_neurons.iter().map(|&num| num as f64));
        let conn_probs = DMatrix::from_fn(n, n, |i, j| net.conn_probs[i][j]);
        let full_num_synapses =
            num_synapses_from_conn_probs(&conn_probs, &full_num_neurons, &full_num_neurons);

        let num_neurons: Vec<usize> = full_num_neurons
            .iter()
            .map(|&num| round_count(num * net.n_scaling))
            .collect();
        if num_neurons.iter().any(|&num| num == 0) {
            return Err(SNNError::InvalidParameters(
                "n_scaling leaves a population without neurons".to_string(),
            ));
        }
        let num_synapses =
            full_num_synapses.map(|k| round_count(k * net.n_scaling * net.k_scaling));

        let psc_over_psp = psp_to_psc(neuron.c_m, neuron.tau_m, neuron.tau_syn);
        let psc_exc = net.psp_exc_mean * psc_over_psp;
        let full_psc_matrix = mean_psc_matrix(net, psc_exc);

        let k_ext = DVector::from_column_slice(&net.k_ext);
        let ext_indegrees: Vec<f64> = net
            .k_ext
            .iter()
            .map(|&k| (k * net.k_scaling).round_ties_even())
            .collect();

        let mut dc_amp = DVector::zeros(n);
        if !net.poisson_input {
            dc_amp = &k_ext * (net.bg_rate * psc_exc * neuron.tau_syn * 0.001);
        }

        let (psc_matrix, psc_ext, dc_amp) = if net.k_scaling < 1.0 {
            let scaled = adjust_weights_and_input_to_synapse_scaling(
                &full_num_neurons,
                &full_num_synapses,
                net.k_scaling,
                &full_psc_matrix,
                psc_exc,
                neuron.tau_syn,
                &DVector::from_column_slice(&net.full_mean_rates),
                &dc_amp,
                net.poisson_input,
                net.bg_rate,
                &k_ext,
            );
            (scaled.psc_matrix, scaled.psc_ext, scaled.dc_amp)
        } else {
            (full_psc_matrix, psc_exc, dc_amp)
        };

        let ext_rates = if net.poisson_input {
            ext_indegrees.iter().map(|&k| k * net.bg_rate).collect()
        } else {
            vec![0.0; n]
        };

        let (num_th_neurons, num_th_synapses) = if stim.thalamic_input {
            let full_num_th = DVector::from_element(1, stim.num_th_neurons as f64);
            let conn_probs_th = DMatrix::from_column_slice(n, 1, &stim.conn_probs_th);
            let full_th_synapses =
                num_synapses_from_conn_probs(&conn_probs_th, &full_num_neurons, &full_num_th);
            (
                round_count(stim.num_th_neurons as f64 * net.n_scaling),
                full_th_synapses
                    .iter()
                    .map(|&k| round_count(k * net.n_scaling * net.k_scaling))
                    .collect(),
            )
        } else {
            (0, vec![0; n])
        };

        let dc_stim_amp = if stim.dc_input {
            stim.dc_amp
                .iter()
                .zip(net.k_ext.iter())
                .map(|(amp, k)| amp * k)
                .collect()
        } else {
            vec![0.0; n]
        };

        Ok(ModelQuantities {
            num_neurons,
            num_synapses,
            psc_matrix,
            psc_ext,
            ext_rates,
            dc_amp: dc_amp.iter().copied().collect(),
            num_th_neurons,
            num_th_synapses,
            psc_th: stim.psp_th * psc_over_psp,
            dc_stim_amp,
        })
    }

    /// Total number of neurons.
    pub fn total_num_neurons(&self) -> usize {
        self.num_neurons.iter().sum()
    }
}
