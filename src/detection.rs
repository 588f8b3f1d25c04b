//! Noise-floor threshold estimation and peak/trough spike detection.
//!
//! The pipeline for one channel is: calibrate, subtract the mean
//! ([`mean_centered`]), estimate a threshold ([`ThresholdEstimator`]) and run
//! the [`SpikeDetector`] over the centered signal.

use ndarray::{s, Array1, ArrayView, ArrayView1, Axis, Dimension, Ix1, Ix2};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::config::DetectionConfig;
use crate::error::{MeaError, Result};
use crate::reader::AnalogStream;
use crate::types::ChannelKey;

/// Extra samples searched for the closing lobe when it falls just past the
/// peak-duration window.
pub const OVERLAP: usize = 5;

/// Reduces `samples` to a one-dimensional view.
///
/// One-dimensional input passes through. Two-dimensional input is accepted
/// only when exactly one of its dimensions is longer than one, and is read
/// along that dimension. Anything else is a `ShapeError`.
pub fn as_one_dimensional<'a, D: Dimension>(
    samples: ArrayView<'a, f64, D>,
) -> Result<ArrayView1<'a, f64>> {
    let shape = samples.shape().to_vec();
    let samples = samples.into_dyn();
    let to_shape_error = |e: ndarray::ShapeError| MeaError::ShapeError(e.to_string());

    match shape.len() {
        1 => samples.into_dimensionality::<Ix1>().map_err(to_shape_error),
        2 => {
            let long: Vec<usize> = (0..2).filter(|&axis| shape[axis] != 1).collect();
            if long.len() != 1 {
                return Err(MeaError::ShapeError(format!(
                    "expected one non-unit dimension, got shape {:?}",
                    shape
                )));
            }
            let unit_axis = 1 - long[0];
            let matrix = samples.into_dimensionality::<Ix2>().map_err(to_shape_error)?;
            Ok(matrix.index_axis_move(Axis(unit_axis), 0))
        }
        n => Err(MeaError::ShapeError(format!(
            "expected a one-dimensional signal, got {} dimensions",
            n
        ))),
    }
}

/// Returns `signal` minus its mean.
pub fn mean_centered(signal: ArrayView1<f64>) -> Array1<f64> {
    let mean = signal.mean().unwrap_or(0.0);
    signal.mapv(|x| x - mean)
}

fn to_samples(ms: f64, sampling_frequency: f64) -> usize {
    (ms * sampling_frequency / 1000.0).round() as usize
}

fn check_sampling_frequency(sampling_frequency: f64) -> Result<()> {
    if sampling_frequency > 0.0 && sampling_frequency.is_finite() {
        Ok(())
    } else {
        Err(MeaError::InvalidParameter(format!(
            "sampling frequency must be positive, got {}",
            sampling_frequency
        )))
    }
}

/// Estimates a detection threshold from the quietest part of a signal.
///
/// The signal is split into `windows` evenly spaced windows. Only the first
/// `window_ms` of each window is sampled, and the smallest standard deviation
/// found is taken as the noise floor. The threshold is
/// `std_multiplier * noise_floor`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEstimator {
    pub std_multiplier: f64,
    pub windows: usize,
    pub window_ms: f64,
}

impl Default for ThresholdEstimator {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

impl ThresholdEstimator {
    pub fn new(std_multiplier: f64) -> Self {
        ThresholdEstimator {
            std_multiplier,
            ..Default::default()
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        ThresholdEstimator {
            std_multiplier: config.std_multiplier,
            windows: config.windows,
            window_ms: config.window_ms,
        }
    }

    /// Smallest per-window standard deviation of `signal`.
    pub fn noise_floor(&self, signal: ArrayView1<f64>, sampling_frequency: f64) -> Result<f64> {
        check_sampling_frequency(sampling_frequency)?;
        if self.windows == 0 {
            return Err(MeaError::InvalidParameter(
                "threshold estimation needs at least one window".to_string(),
            ));
        }
        let len = signal.len();
        if len == 0 {
            return Err(MeaError::InvalidParameter(
                "cannot estimate a threshold on an empty signal".to_string(),
            ));
        }

        let window_len = to_samples(self.window_ms, sampling_frequency).max(1);
        let step = len as f64 / self.windows as f64;

        // Windows overlap when the signal is shorter than windows * window_ms;
        // starts are still spread evenly and ends are clamped.
        let floor = (0..self.windows)
            .map(|w| {
                let start = ((w as f64 * step).round() as usize).min(len - 1);
                let end = (start + window_len).min(len);
                signal.slice(s![start..end]).std(0.0)
            })
            .fold(f64::INFINITY, f64::min);
        Ok(floor)
    }

    /// Threshold for `samples`, which must reduce to one dimension.
    pub fn estimate<D: Dimension>(
        &self,
        samples: ArrayView<f64, D>,
        sampling_frequency: f64,
    ) -> Result<f64> {
        let signal = as_one_dimensional(samples)?;
        Ok(self.std_multiplier * self.noise_floor(signal, sampling_frequency)?)
    }
}

/// A detected spike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spike {
    /// Peak-to-peak amplitude between the two lobes
    pub amplitude: f64,
    /// Sample index of the larger lobe
    pub index: usize,
}

impl Spike {
    /// Spike time in seconds.
    pub fn time(&self, sampling_frequency: f64) -> f64 {
        self.index as f64 / sampling_frequency
    }
}

/// Peak/trough pairing spike detector for one mean-centered channel.
///
/// A candidate is a local maximum of `|x|` (strictly above its left
/// neighbour, at least its right neighbour). The opposite lobe is the most
/// extreme opposite-direction sample within `peak_duration_ms`, extended by
/// [`OVERLAP`] samples when it sits on the window edge. The pair is a spike
/// when the lobes differ by at least the threshold; the spike is reported at
/// whichever lobe is larger in magnitude (the first lobe on ties).
///
/// After a spike at index `t`, candidates at indices up to and including
/// `t + refractory` samples are ignored, as is everything up to the closing
/// lobe of the spike.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeDetector {
    pub peak_duration_ms: f64,
    pub refractory_ms: f64,
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

fn extremum(x: &ArrayView1<f64>, range: Range<usize>, maximum: bool) -> usize {
    let mut best = range.start;
    for k in range {
        if (maximum && x[k] > x[best]) || (!maximum && x[k] < x[best]) {
            best = k;
        }
    }
    best
}

impl SpikeDetector {
    pub fn new(peak_duration_ms: f64, refractory_ms: f64) -> Self {
        SpikeDetector {
            peak_duration_ms,
            refractory_ms,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.peak_duration_ms, config.refractory_ms)
    }

    /// Detects spikes in a mean-centered signal, in order of occurrence.
    pub fn detect(
        &self,
        signal: ArrayView1<f64>,
        threshold: f64,
        sampling_frequency: f64,
    ) -> Result<Vec<Spike>> {
        check_sampling_frequency(sampling_frequency)?;
        let x = signal;
        let n = x.len();
        let peak = to_samples(self.peak_duration_ms, sampling_frequency).max(1);
        let refractory = to_samples(self.refractory_ms, sampling_frequency);

        let mut spikes = Vec::new();
        if n < 3 {
            return Ok(spikes);
        }

        let mut i = 1;
        while i < n - 1 {
            let magnitude = x[i].abs();
            if !(magnitude > x[i - 1].abs() && magnitude >= x[i + 1].abs()) {
                i += 1;
                continue;
            }

            let positive = x[i] > 0.0;
            let window_end = (i + peak).min(n - 1);
            let mut end = extremum(&x, i + 1..window_end + 1, !positive);
            let start = extremum(&x, i..end, positive);

            if end == i + peak && end + OVERLAP < n {
                let extra = extremum(&x, end + 1..end + OVERLAP + 1, !positive);
                let further = if positive { x[extra] < x[end] } else { x[extra] > x[end] };
                if further {
                    end = extra;
                }
            }

            let amplitude = (x[start] - x[end]).abs();
            if amplitude >= threshold {
                let index = if x[start].abs() >= x[end].abs() { start } else { end };
                spikes.push(Spike { amplitude, index });
                i = (index + refractory).max(end) + 1;
            } else {
                i = end + 1;
            }
        }

        Ok(spikes)
    }

    /// Legacy result layout: amplitude and index arrays as long as the
    /// signal, zero after the last spike.
    pub fn detect_padded(
        &self,
        signal: ArrayView1<f64>,
        threshold: f64,
        sampling_frequency: f64,
    ) -> Result<(Array1<f64>, Array1<i64>)> {
        let spikes = self.detect(signal, threshold, sampling_frequency)?;
        let mut amplitudes = Array1::zeros(signal.len());
        let mut indices = Array1::zeros(signal.len());
        for (slot, spike) in spikes.iter().enumerate() {
            amplitudes[slot] = spike.amplitude;
            indices[slot] = spike.index as i64;
        }
        Ok((amplitudes, indices))
    }
}

/// Detection result for one electrode.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDetection {
    pub label: u8,
    pub threshold: f64,
    pub sampling_frequency: f64,
    pub spikes: Vec<Spike>,
}

impl ChannelDetection {
    /// Spike times in seconds.
    pub fn times(&self) -> Array1<f64> {
        self.spikes
            .iter()
            .map(|s| s.time(self.sampling_frequency))
            .collect()
    }
}

/// Runs threshold estimation and detection on each electrode in parallel.
///
/// Channels are independent, so they are spread over the rayon pool. The
/// first channel error aborts the whole run.
pub fn detect_channels(
    stream: &AnalogStream,
    labels: &[u8],
    config: &DetectionConfig,
) -> Result<BTreeMap<u8, ChannelDetection>> {
    config.validate()?;
    let estimator = ThresholdEstimator::from_config(config);
    let detector = SpikeDetector::from_config(config);

    labels
        .par_iter()
        .map(|&label| {
            let signal = stream.voltage(ChannelKey::electrode(label), config.unit_scale)?;
            let centered = mean_centered(signal.data.view());
            let threshold = estimator.estimate(centered.view(), signal.sampling_frequency)?;
            let spikes = detector.detect(centered.view(), threshold, signal.sampling_frequency)?;
            log::debug!(
                "Electrode {}: threshold {:.4}, {} spikes",
                label,
                threshold,
                spikes.len()
            );
            Ok((
                label,
                ChannelDetection {
                    label,
                    threshold,
                    sampling_frequency: signal.sampling_frequency,
                    spikes,
                },
            ))
        })
        .collect::<Result<Vec<_>>>()
        .map(|detections| detections.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::electrode_info;
    use crate::source::InMemoryChannelData;
    use ndarray::{array, Array2, Array3};

    const FS: f64 = 10_000.0;

    fn with_pulses(len: usize, pulses: &[(usize, f64, f64)]) -> Array1<f64> {
        let mut x = Array1::zeros(len);
        for &(at, first, second) in pulses {
            x[at] = first;
            x[at + 1] = second;
        }
        x
    }

    fn noise(len: usize) -> Array1<f64> {
        // Deterministic broadband-ish noise; the amplitude grows along the
        // signal so the quietest window is the first one.
        Array1::from_iter((0..len).map(|k| {
            let t = k as f64;
            (1.0 + t / len as f64) * ((t * 0.37).sin() + 0.5 * (t * 1.71).cos())
        }))
    }

    #[test]
    fn single_bipolar_pulse() {
        let x = with_pulses(1000, &[(500, 1.0, -0.8)]);
        let spikes = SpikeDetector::default().detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].index, 500);
        assert!((spikes[0].amplitude - 1.8).abs() < 1e-12);
        assert!((spikes[0].time(FS) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn negative_first_pulse() {
        let x = with_pulses(1000, &[(300, -1.0, 0.7)]);
        let spikes = SpikeDetector::default().detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].index, 300);
        assert!((spikes[0].amplitude - 1.7).abs() < 1e-12);
    }

    #[test]
    fn time_is_reported_at_the_larger_lobe() {
        let mut x = Array1::zeros(1000);
        x[200] = 0.6;
        x[201] = 0.5;
        x[202] = 0.9;
        x[203] = -0.8;
        let spikes = SpikeDetector::default().detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].index, 202);
        assert!((spikes[0].amplitude - 1.7).abs() < 1e-12);
    }

    #[test]
    fn sub_threshold_pulse_is_ignored() {
        let x = with_pulses(1000, &[(500, 1.0, -0.8)]);
        let spikes = SpikeDetector::default().detect(x.view(), 2.0, FS).unwrap();
        assert!(spikes.is_empty());
    }

    #[test]
    fn refractory_collapses_close_pulses() {
        // 1 ms refractory at 10 kHz is 10 samples.
        let x = with_pulses(1000, &[(500, 1.0, -0.8), (506, 1.0, -0.8)]);
        let spikes = SpikeDetector::default().detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].index, 500);

        let x = with_pulses(1000, &[(500, 1.0, -0.8), (800, 1.0, -0.8)]);
        let spikes = SpikeDetector::default().detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.iter().map(|s| s.index).collect::<Vec<_>>(), vec![500, 800]);
    }

    #[test]
    fn refractory_boundary_is_inclusive() {
        let detector = SpikeDetector::new(0.5, 1.0);

        let x = with_pulses(1000, &[(500, 1.0, -0.8), (510, 1.0, -0.8)]);
        let spikes = detector.detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.len(), 1);

        let x = with_pulses(1000, &[(500, 1.0, -0.8), (511, 1.0, -0.8)]);
        let spikes = detector.detect(x.view(), 1.0, FS).unwrap();
        assert_eq!(spikes.iter().map(|s| s.index).collect::<Vec<_>>(), vec![500, 511]);
    }

    #[test]
    fn candidate_may_tie_its_right_neighbour() {
        let mut x = Array1::zeros(200);
        x[50] = 1.0;
        x[51] = 1.0;
        x[52] = -1.0;
        let spikes = SpikeDetector::default().detect(x.view(), 1.5, FS).unwrap();
        assert_eq!(spikes, vec![Spike { amplitude: 2.0, index: 50 }]);
    }

    #[test]
    fn candidate_may_not_tie_its_left_neighbour() {
        // Sample 0 is never a candidate and sample 1 only ties it.
        let mut x = Array1::zeros(200);
        x[0] = 1.0;
        x[1] = 1.0;
        x[2] = -1.0;
        let spikes = SpikeDetector::default().detect(x.view(), 1.5, FS).unwrap();
        assert!(spikes.is_empty());
    }

    #[test]
    fn closing_lobe_sets_time_and_refractory() {
        // 0.5 ms window and 1 ms refractory at 10 kHz: 5 and 10 samples.
        let detector = SpikeDetector::new(0.5, 1.0);
        let mut x = Array1::zeros(1000);
        x[100] = 0.5;
        x[101] = 0.2;
        x[102] = -1.5;
        // Inside the refractory period counted from 102, not from 100.
        x[112] = 1.0;
        x[113] = -1.0;
        x[115] = 1.0;
        x[116] = -1.0;
        let spikes = detector.detect(x.view(), 1.5, FS).unwrap();
        assert_eq!(spikes.iter().map(|s| s.index).collect::<Vec<_>>(), vec![102, 115]);
        assert!((spikes[0].amplitude - 2.0).abs() < 1e-12);
    }

    #[test]
    fn overlap_extends_past_the_window() {
        // 2 ms at 10 kHz is a 20 sample window: the edge is at 120.
        let mut x = Array1::zeros(1000);
        x[100] = 1.0;
        x[120] = -0.5;
        x[123] = -0.9;
        let spikes = SpikeDetector::default().detect(x.view(), 1.7, FS).unwrap();
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].index, 100);
        assert!((spikes[0].amplitude - 1.9).abs() < 1e-12);
    }

    #[test]
    fn overlap_needs_room_before_the_end() {
        let mut x = Array1::zeros(123);
        x[100] = 1.0;
        x[120] = -0.5;
        x[121] = -0.9;
        let spikes = SpikeDetector::default().detect(x.view(), 1.7, FS).unwrap();
        assert!(spikes.is_empty());
    }

    #[test]
    fn padded_layout_keeps_zero_tail() {
        let x = with_pulses(50, &[(10, 1.0, -1.0), (30, -1.0, 1.0)]);
        let (amplitudes, indices) = SpikeDetector::new(0.5, 0.5)
            .detect_padded(x.view(), 1.5, FS)
            .unwrap();
        assert_eq!(amplitudes.len(), 50);
        assert_eq!(indices.slice(s![..3]), array![10i64, 30, 0]);
        assert_eq!(amplitudes[0], 2.0);
        assert!(amplitudes.iter().skip(2).all(|&a| a == 0.0));
    }

    #[test]
    fn short_signals_have_no_spikes() {
        let spikes = SpikeDetector::default().detect(array![1.0, -1.0].view(), 0.1, FS).unwrap();
        assert!(spikes.is_empty());
        assert!(SpikeDetector::default().detect(array![1.0].view(), 0.1, 0.0).is_err());
    }

    #[test]
    fn threshold_is_linear_in_multiplier() {
        let x = noise(200_000);
        let single = ThresholdEstimator::new(8.0).estimate(x.view(), FS).unwrap();
        let double = ThresholdEstimator::new(16.0).estimate(x.view(), FS).unwrap();
        assert!(single > 0.0);
        assert_eq!(double, 2.0 * single);
    }

    #[test]
    fn threshold_uses_the_quietest_window() {
        let mut x = Array1::from_iter((0..60_000).map(|k| if k % 2 == 0 { 1.0 } else { -1.0 }));
        // Quieter stretch at the start of window 10 (2000 samples per window).
        for k in 20_000..22_000 {
            x[k] *= 0.25;
        }
        let estimator = ThresholdEstimator::new(1.0);
        let threshold = estimator.estimate(x.view(), FS).unwrap();
        assert!((threshold - 0.25).abs() < 1e-12);
    }

    #[test]
    fn short_signal_windows_are_clamped() {
        // 100 samples is far less than 30 x 200 ms; windows overlap and end
        // at the signal end.
        // On a ramp the last (shortest) window, 97..100, is the quietest.
        let x = Array1::from_iter((0..100).map(|k| k as f64));
        let floor = ThresholdEstimator::default().noise_floor(x.view(), FS).unwrap();
        assert!((floor - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn shapes_reducible_to_one_dimension() {
        let column = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let row = Array2::from_shape_vec((1, 4), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(as_one_dimensional(column.view()).unwrap(), array![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(as_one_dimensional(row.view()).unwrap(), array![1.0, 2.0, 3.0, 4.0]);

        let matrix = Array2::<f64>::zeros((2, 3));
        assert!(matches!(as_one_dimensional(matrix.view()), Err(MeaError::ShapeError(_))));
        let cube = Array3::<f64>::zeros((1, 1, 4));
        assert!(matches!(as_one_dimensional(cube.view()), Err(MeaError::ShapeError(_))));
        assert!(ThresholdEstimator::default().estimate(matrix.view(), FS).is_err());
    }

    #[test]
    fn channels_are_detected_independently() {
        let mut raw = Array2::from_shape_fn((2, 20_000), |(_, k)| if k % 2 == 0 { 10 } else { -10 });
        raw[[1, 5000]] = 2000;
        raw[[1, 5001]] = -2000;
        let stream = AnalogStream::new(
            "Stream_0",
            vec![electrode_info(0, "12"), electrode_info(1, "47")],
            Box::new(InMemoryChannelData::new(raw)),
        )
        .unwrap();

        let results = detect_channels(&stream, &[12, 47], &DetectionConfig::default()).unwrap();
        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![12, 47]);
        assert!(results[&12].spikes.is_empty());
        assert_eq!(results[&47].spikes.len(), 1);
        assert_eq!(results[&47].spikes[0].index, 5000);
        assert!((results[&47].times()[0] - 0.5).abs() < 1e-12);
        assert!(results[&47].threshold > 0.0);

        assert!(matches!(
            detect_channels(&stream, &[48], &DetectionConfig::default()),
            Err(MeaError::ChannelNotFound(_))
        ));
    }

    #[test]
    fn mean_centering() {
        let centered = mean_centered(array![1.0, 2.0, 3.0].view());
        assert_eq!(centered, array![-1.0, 0.0, 1.0]);
    }
}
