//! Spike related structures.
use crate::core::utils::TimeInterval;

/// A spike emitted by a node.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Spike {
    /// The global ID of the node producing the spike.
    pub sender: usize,
    /// The time (in ms) at which the spike is produced.
    pub time: f64,
}

impl Spike {
    pub fn new(sender: usize, time: f64) -> Self {
        Spike { sender, time }
    }
}

/// Keep the spikes inside the interval, sorted by time.
pub fn spikes_within(spikes: &[Spike], interval: &TimeInterval) -> Vec<Spike> {
    let mut selected: Vec<Spike> = spikes
        .iter()
        .filter(|spike| interval.contains(spike.time))
        .copied()
        .collect();
    selected.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.sender.cmp(&b.sender)));
    selected
}

/// Count the spikes of each sender in `[first_gid, first_gid + num_senders)` inside the interval.
pub fn spike_counts(
    spikes: &[Spike],
    first_gid: usize,
    num_senders: usize,
    interval: &TimeInterval,
) -> Vec<usize> {
    let mut counts = vec![0; num_senders];
    spikes
        .iter()
        .filter(|spike| interval.contains(spike.time))
        .filter_map(|spike| spike.sender.checked_sub(first_gid))
        .filter(|&offset| offset < num_senders)
        .for_each(|offset| counts[offset] += 1);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spikes_within() {
        let spikes = vec![
            Spike::new(3, 650.0),
            Spike::new(1, 599.9),
            Spike::new(2, 600.0),
            Spike::new(1, 800.0),
            Spike::new(1, 600.0),
        ];
        let selected = spikes_within(&spikes, &TimeInterval::new(600.0, 800.0));
        assert_eq!(
            selected,
            vec![Spike::new(1, 600.0), Spike::new(2, 600.0), Spike::new(3, 650.0)]
        );
    }

    #[test]
    fn test_spike_counts() {
        let spikes = vec![
            Spike::new(11, 501.0),
            Spike::new(11, 502.0),
            Spike::new(12, 499.0),
            Spike::new(14, 700.0),
            Spike::new(9, 700.0),
            Spike::new(15, 700.0),
        ];
        let counts = spike_counts(&spikes, 10, 5, &TimeInterval::new(500.0, 1000.0));
        assert_eq!(counts, vec![0, 2, 0, 0, 1]);
    }
}
