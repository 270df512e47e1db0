//! Grouping of single-station measurements into multi-station samples.

use crate::{Measurement, MatchedSample, Real};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum time from the first measurement of a sample, seconds.
    ///
    /// Just under one rotation period of the emitters, so each station is
    /// seen at most once per window.
    pub max_time_gap: Real,
    /// Samples with fewer distinct stations are discarded.
    pub min_stations: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 0.018,
            min_stations: 0,
        }
    }
}

/// Incremental matcher; feed measurements in time order with [`SampleMatcher::push`].
#[derive(Debug, Clone, Default)]
pub struct SampleMatcher {
    config: MatcherConfig,
    current: Option<MatchedSample>,
}

impl SampleMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    /// Add one measurement. Returns the previous sample when this measurement closes it.
    pub fn push(&mut self, measurement: &Measurement) -> Option<MatchedSample> {
        let closes = self.current.as_ref().is_some_and(|s| {
            measurement.timestamp > s.timestamp + self.config.max_time_gap
                || measurement.timestamp < s.timestamp
        });
        let closed = if closes { self.flush() } else { None };

        self.current
            .get_or_insert_with(|| MatchedSample::new(measurement.timestamp))
            .insert(measurement.bs_id, measurement.angles);
        closed
    }

    /// Close the open sample, if any.
    pub fn flush(&mut self) -> Option<MatchedSample> {
        let sample = self.current.take()?;
        if sample.bs_count() >= self.config.min_stations {
            Some(sample)
        } else {
            log::trace!(
                "dropping sample at {:.3}s with {} station(s)",
                sample.timestamp,
                sample.bs_count()
            );
            None
        }
    }
}

/// Group a time-ordered measurement stream into samples.
pub fn match_measurements(measurements: &[Measurement], config: &MatcherConfig) -> Vec<MatchedSample> {
    let mut matcher = SampleMatcher::new(*config);
    let mut out: Vec<MatchedSample> = measurements
        .iter()
        .filter_map(|m| matcher.push(m))
        .collect();
    out.extend(matcher.flush());
    out
}

/// Merge every measurement into one sample regardless of timing.
///
/// Used for recordings taken with the platform held still. Returns `None`
/// for an empty input.
pub fn merge_stationary(measurements: &[Measurement]) -> Option<MatchedSample> {
    let first = measurements.first()?;
    let mut sample = MatchedSample::new(first.timestamp);
    for m in measurements {
        sample.insert(m.bs_id, m.angles);
    }
    Some(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AngleVector, AngleVectorSet};

    fn angles(tag: Real) -> AngleVectorSet {
        AngleVectorSet::new([AngleVector::new(tag, 0.0); 4])
    }

    fn stream() -> Vec<Measurement> {
        vec![
            Measurement::new(1.000, 0, angles(1.000)),
            Measurement::new(1.015, 1, angles(1.015)),
            Measurement::new(1.020, 0, angles(1.020)),
            Measurement::new(1.035, 1, angles(1.035)),
        ]
    }

    fn config(min_stations: usize) -> MatcherConfig {
        MatcherConfig {
            max_time_gap: 0.010,
            min_stations,
        }
    }

    #[test]
    fn empty_input() {
        assert!(match_measurements(&[], &MatcherConfig::default()).is_empty());
    }

    #[test]
    fn windows_close_and_repeats_overwrite() {
        let samples = match_measurements(&stream(), &config(0));
        assert_eq!(samples.len(), 3);

        assert_eq!(samples[0].timestamp, 1.000);
        assert_eq!(samples[0].bs_count(), 1);
        assert_eq!(samples[0].angles[&0], angles(1.000));

        assert_eq!(samples[1].timestamp, 1.015);
        assert_eq!(samples[1].bs_count(), 2);
        assert_eq!(samples[1].angles[&1], angles(1.015));
        assert_eq!(samples[1].angles[&0], angles(1.020));

        assert_eq!(samples[2].timestamp, 1.035);
        assert_eq!(samples[2].angles[&1], angles(1.035));
    }

    #[test]
    fn min_stations_filters() {
        let samples = match_measurements(&stream(), &config(2));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, 1.015);
    }

    #[test]
    fn same_station_within_window_is_last_writer() {
        let input = vec![
            Measurement::new(2.0, 3, angles(0.1)),
            Measurement::new(2.005, 3, angles(0.2)),
        ];
        let samples = match_measurements(&input, &config(0));
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].angles[&3], angles(0.2));
    }

    #[test]
    fn out_of_order_timestamp_starts_new_sample() {
        let input = vec![
            Measurement::new(5.0, 0, angles(0.0)),
            Measurement::new(4.999, 1, angles(0.0)),
        ];
        let samples = match_measurements(&input, &config(0));
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, 4.999);
    }

    #[test]
    fn incremental_push_returns_on_close() {
        let mut m = SampleMatcher::new(config(0));
        let s = stream();
        assert!(m.push(&s[0]).is_none());
        let closed = m.push(&s[1]).expect("first window closes");
        assert_eq!(closed.timestamp, 1.000);
        assert!(m.push(&s[2]).is_none());
        assert!(m.flush().is_some());
        assert!(m.flush().is_none());
    }

    #[test]
    fn stationary_merge() {
        let merged = merge_stationary(&stream()).unwrap();
        assert_eq!(merged.timestamp, 1.000);
        assert_eq!(merged.bs_count(), 2);
        assert_eq!(merged.angles[&0], angles(1.020));
        assert!(merge_stationary(&[]).is_none());
    }
}
