//! Evaluation of the recorded activity: spike raster and firing rate statistics per population.
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::spikes::{spike_counts, spikes_within, Spike};
use crate::core::utils::{mean_std, quantile, TimeInterval};
use crate::error::SNNError;

/// File name of the spike raster data.
pub const RASTER_FILENAME: &str = "raster_plot.dat";
/// File name of the firing rate statistics.
pub const RATES_FILENAME: &str = "firing_rates.json";

/// The recorded spikes of a population, whose neurons have contiguous global IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSpikes {
    pub name: String,
    pub first_gid: usize,
    pub num_neurons: usize,
    pub spikes: Vec<Spike>,
}

/// Summary of a sample as drawn by a box plot.
/// The whiskers extend to the most extreme values within 1.5 interquartile ranges of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
}

impl BoxStats {
    /// Returns `None` for an empty sample.
    pub fn from_sample(values: &[f64]) -> Option<Self> {
        let sorted: Vec<f64> = values.iter().copied().sorted_by(|a, b| a.total_cmp(b)).collect();
        let q1 = quantile(&sorted, 0.25)?;
        let median = quantile(&sorted, 0.5)?;
        let q3 = quantile(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let lower_whisker = sorted
            .iter()
            .copied()
            .find(|&v| v >= q1 - 1.5 * iqr)
            .unwrap_or(q1);
        let upper_whisker = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= q3 + 1.5 * iqr)
            .unwrap_or(q3);
        Some(BoxStats {
            lower_whisker,
            q1,
            median,
            q3,
            upper_whisker,
        })
    }
}

/// Firing rate statistics (in spikes/s) of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRates {
    pub population: String,
    pub num_neurons: usize,
    pub mean: f64,
    pub std: f64,
    pub box_stats: BoxStats,
}

/// Per-neuron firing rates over the interval, silent neurons included.
pub fn neuron_rates(
    population: &PopulationSpikes,
    interval: &TimeInterval,
) -> Result<Vec<f64>, SNNError> {
    if interval.is_empty() {
        return Err(SNNError::InvalidParameters(
            "The firing rate interval must not be empty".to_string(),
        ));
    }
    let duration_s = interval.length() * 1e-3;
    Ok(spike_counts(
        &population.spikes,
        population.first_gid,
        population.num_neurons,
        interval,
    )
    .into_iter()
    .map(|count| count as f64 / duration_s)
    .collect())
}

/// Firing rate statistics of a population over the interval.
pub fn population_rates(
    population: &PopulationSpikes,
    interval: &TimeInterval,
) -> Result<PopulationRates, SNNError> {
    let rates = neuron_rates(population, interval)?;
    let ((mean, std), box_stats) = mean_std(&rates)
        .zip(BoxStats::from_sample(&rates))
        .ok_or_else(|| {
            SNNError::InvalidParameters(format!("Population {} has no neurons", population.name))
        })?;
    Ok(PopulationRates {
        population: population.name.clone(),
        num_neurons: population.num_neurons,
        mean,
        std,
        box_stats,
    })
}

/// Write the spikes inside the interval as `population\tsender\ttime(ms)` lines.
/// Returns the number of spikes written.
pub fn write_raster(
    path: &Path,
    populations: &[PopulationSpikes],
    interval: &TimeInterval,
) -> Result<usize, SNNError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "# population\tsender\ttime(ms)")?;
    let mut num_spikes = 0;
    for population in populations.iter() {
        for spike in spikes_within(&population.spikes, interval) {
            writeln!(writer, "{}\t{}\t{:.3}", population.name, spike.sender, spike.time)?;
            num_spikes += 1;
        }
    }
    writer.flush()?;
    Ok(num_spikes)
}

/// Save the firing rate statistics to a (pretty) JSON file.
pub fn write_rates(path: &Path, rates: &[PopulationRates]) -> Result<(), SNNError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, rates)
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    writer.flush().map_err(SNNError::from)
}

/// Load firing rate statistics saved with [`write_rates`].
pub fn read_rates(path: &Path) -> Result<Vec<PopulationRates>, SNNError> {
    let file = File::open(path)?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| SNNError::IOError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn population() -> PopulationSpikes {
        PopulationSpikes {
            name: "L23E".to_string(),
            first_gid: 1,
            num_neurons: 4,
            spikes: vec![
                Spike::new(1, 600.0),
                Spike::new(1, 700.0),
                Spike::new(2, 750.0),
                Spike::new(2, 400.0),
                Spike::new(3, 1500.0),
            ],
        }
    }

    #[test]
    fn test_neuron_rates() {
        let rates = neuron_rates(&population(), &TimeInterval::new(500.0, 1500.0)).unwrap();
        assert_eq!(rates, vec![2.0, 1.0, 0.0, 0.0]);
        assert!(neuron_rates(&population(), &TimeInterval::new(500.0, 500.0)).is_err());
    }

    #[test]
    fn test_neuron_rates_closed_window() {
        // the spike stamped at the end of the window is counted
        let interval = TimeInterval::from_bounds([500.0, 1500.0]);
        let rates = neuron_rates(&population(), &interval).unwrap();
        assert_eq!(rates, vec![2.0, 1.0, 1.0, 0.0]);
        assert!(neuron_rates(&population(), &TimeInterval::from_bounds([500.0, 500.0])).is_err());
    }

    #[test]
    fn test_population_rates() {
        let rates = population_rates(&population(), &TimeInterval::new(500.0, 1500.0)).unwrap();
        assert_eq!(rates.population, "L23E");
        assert_eq!(rates.mean, 0.75);
        assert!((rates.std - 0.82915619758885).abs() < 1e-12);
        assert_eq!(rates.box_stats.median, 0.5);
        assert_eq!(rates.box_stats.lower_whisker, 0.0);
        assert_eq!(rates.box_stats.upper_whisker, 2.0);
    }

    #[test]
    fn test_empty_population() {
        let mut population = population();
        population.num_neurons = 0;
        assert!(population_rates(&population, &TimeInterval::new(500.0, 1500.0)).is_err());
    }

    #[test]
    fn test_box_stats_whiskers() {
        let stats = BoxStats::from_sample(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.lower_whisker, 1.0);
        // the outlier is left out of the whiskers
        assert_eq!(stats.upper_whisker, 4.0);
        assert_eq!(BoxStats::from_sample(&[]), None);
    }

    #[test]
    fn test_write_raster() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RASTER_FILENAME);
        let num_spikes =
            write_raster(&path, &[population()], &TimeInterval::new(600.0, 800.0)).unwrap();
        assert_eq!(num_spikes, 3);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# population\tsender\ttime(ms)\nL23E\t1\t600.000\nL23E\t1\t700.000\nL23E\t2\t750.000\n"
        );

        // closed windows keep the spikes at both bounds
        let interval = TimeInterval::from_bounds([400.0, 600.0]);
        let num_spikes = write_raster(&path, &[population()], &interval).unwrap();
        assert_eq!(num_spikes, 2);
    }

    #[test]
    fn test_write_and_read_rates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(RATES_FILENAME);
        let rates =
            vec![population_rates(&population(), &TimeInterval::new(500.0, 1500.0)).unwrap()];
        write_rates(&path, &rates).unwrap();
        let loaded = read_rates(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].population, "L23E");
        assert_eq!(loaded[0].num_neurons, 4);
        assert_eq!(loaded[0].mean, 0.75);
        assert_eq!(loaded[0].box_stats.upper_whisker, 2.0);
    }
}
