//! Recording phases, experiments and the statistics computed on them.
//!
//! A [`Phase`] holds spike times (seconds) per electrode label. Filtering
//! operations never modify a phase in place; they return a new one, which is
//! what [`Experiment::apply_operation`] expects.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::DetectionConfig;
use crate::detection::detect_channels;
use crate::electrode::mea_electrode_list;
use crate::error::{MeaError, Result};
use crate::reader::RecordingContainer;
use crate::types::{ChannelKey, PhaseInfo, Signal};

/// Spike times in seconds, keyed by electrode label.
pub type Peaks = BTreeMap<u8, Array1<f64>>;

/// Where the spike times of a phase come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PeakSource {
    /// Vendor-computed events stored in time-stamp stream `stream`
    TimeStamps { stream: usize },
    /// Threshold estimation and detection on the primary analog stream
    Detection(DetectionConfig),
}

impl PeakSource {
    /// The time-stamp stream the acquisition software fills: stream 1 when
    /// a stimulus stream shifts the recorded signals, stream 0 otherwise.
    pub fn vendor_default(info: &PhaseInfo) -> Self {
        PeakSource::TimeStamps {
            stream: if info.digital { 1 } else { 0 },
        }
    }
}

/// (start, end) times in seconds of every run where `digital` is positive.
///
/// `end` is the first sample after the run, so a run reaching the end of the
/// trace ends at the trace duration.
pub fn stimulus_intervals(digital: &Signal) -> Vec<(f64, f64)> {
    let fs = digital.sampling_frequency;
    let mut intervals = Vec::new();
    let mut run_start = None;
    for (k, &value) in digital.data.iter().enumerate() {
        match (value > 0.0, run_start) {
            (true, None) => run_start = Some(k),
            (false, Some(start)) => {
                intervals.push((start as f64 / fs, k as f64 / fs));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        intervals.push((start as f64 / fs, digital.data.len() as f64 / fs));
    }
    intervals
}

fn in_interval(t: f64, interval: (f64, f64)) -> bool {
    t >= interval.0 && t <= interval.1
}

/// One recording epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    /// Spike times (s); only electrodes with at least one spike have an entry
    pub peaks: Peaks,
    /// Stimulus indicator trace, offset so that the inactive level is 0
    pub digital: Option<Signal>,
    pub sampling_frequency: f64,
    /// Duration in seconds
    pub duration: f64,
    pub div: Option<u32>,
    pub phase_type: Option<String>,
    pub order: Option<u32>,
    pub notes: String,
}

impl Phase {
    pub fn new(
        name: impl Into<String>,
        peaks: Peaks,
        digital: Option<Signal>,
        sampling_frequency: f64,
        duration: f64,
    ) -> Self {
        Phase {
            name: name.into(),
            peaks: peaks.into_iter().filter(|(_, p)| !p.is_empty()).collect(),
            digital,
            sampling_frequency,
            duration,
            div: None,
            phase_type: None,
            order: None,
            notes: String::new(),
        }
    }

    /// Builds a phase from the content of a recording container.
    ///
    /// When `info.digital` is set, analog stream 0 must be a stimulus stream
    /// distinct from the recorded one; its first channel becomes the digital
    /// trace. Spike times come from `source` and are always in seconds.
    pub fn from_container(
        container: &RecordingContainer,
        info: &PhaseInfo,
        source: &PeakSource,
    ) -> Result<Self> {
        let analogs = container.analogs();
        let digital = if info.digital {
            if analogs.len() < 2 {
                return Err(MeaError::InconsistentDigitalFlag(format!(
                    "{} is a stimulation phase but {} has {} analog stream{}",
                    info.name,
                    container.name(),
                    analogs.len(),
                    if analogs.len() != 1 { "s" } else { "" }
                )));
            }
            Some(load_digital(container, &info.notes)?)
        } else {
            None
        };

        let primary_index = analogs.len().saturating_sub(1);
        let primary = container.primary_analog()?;
        let electrodes = primary.electrode_labels();
        let skipped = primary.num_channels() - electrodes.len();
        if skipped > 0 {
            log::warn!(
                "{}: skipping {} channel{} without an MEA60 label",
                primary.name(),
                skipped,
                if skipped != 1 { "s" } else { "" }
            );
        }

        let peaks = match source {
            PeakSource::TimeStamps { stream } => {
                if container.time_stamp(*stream).is_none() {
                    return Err(MeaError::corrupt(
                        format!("{}/TimeStampStream/Stream_{}", container.name(), stream),
                        "stream not present",
                    ));
                }
                let mut peaks = Peaks::new();
                for label in &electrodes {
                    if let Some(times) =
                        container.event_times(primary_index, *stream, &label.to_string())?
                    {
                        peaks.insert(*label, times);
                    }
                }
                peaks
            }
            PeakSource::Detection(config) => detect_channels(primary, &electrodes, config)?
                .into_iter()
                .map(|(label, detection)| (label, detection.times()))
                .collect(),
        };

        let sampling_frequency = primary
            .channel_infos()
            .first()
            .map(|c| c.sampling_frequency())
            .unwrap_or(info.sampling_frequency);
        let duration = info
            .duration
            .unwrap_or(primary.num_samples() as f64 / sampling_frequency);

        let mut phase = Phase::new(
            info.name.clone(),
            peaks,
            digital,
            sampling_frequency,
            duration,
        );
        phase.div = info.div;
        phase.phase_type = info.phase_type.clone();
        phase.order = info.order;
        phase.notes = info.notes.clone();

        log::info!(
            "Phase {}: {} active electrode{}, {}",
            phase.name,
            phase.peaks.len(),
            if phase.peaks.len() != 1 { "s" } else { "" },
            phase.info()
        );
        Ok(phase)
    }

    /// Metadata of this phase in the form accepted by
    /// [`Phase::from_container`].
    pub fn phase_info(&self) -> PhaseInfo {
        PhaseInfo {
            name: self.name.clone(),
            div: self.div,
            phase_type: self.phase_type.clone(),
            order: self.order,
            digital: self.digital.is_some(),
            sampling_frequency: self.sampling_frequency,
            duration: Some(self.duration),
            notes: self.notes.clone(),
            other: None,
        }
    }

    /// One-line summary of the phase metadata.
    pub fn info(&self) -> String {
        fn or_unknown<T: ToString>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "Unknown".to_string())
        }
        format!(
            "type: {}, div: {}, order: {}, duration: {} seconds, sampling frequency: {} Hz",
            or_unknown(&self.phase_type),
            or_unknown(&self.div),
            or_unknown(&self.order),
            self.duration,
            self.sampling_frequency
        )
    }

    /// Stimulus intervals of the digital trace, see [`stimulus_intervals`].
    pub fn stimulus_intervals(&self) -> Result<Vec<(f64, f64)>> {
        self.digital
            .as_ref()
            .map(stimulus_intervals)
            .ok_or_else(|| {
                MeaError::InconsistentDigitalFlag(format!("{} has no digital trace", self.name))
            })
    }

    /// Returns a copy without the spikes inside any of the closed
    /// `intervals` (seconds). Electrodes left without spikes lose their
    /// entry.
    pub fn clear_intervals(&self, intervals: &[(f64, f64)]) -> Phase {
        let peaks = self
            .peaks
            .iter()
            .map(|(&label, times)| {
                let kept: Array1<f64> = times
                    .iter()
                    .copied()
                    .filter(|&t| !intervals.iter().any(|&i| in_interval(t, i)))
                    .collect();
                (label, kept)
            })
            .filter(|(_, times)| !times.is_empty())
            .collect();
        Phase {
            peaks,
            ..self.clone()
        }
    }

    /// Clears `guard` seconds after the start and after the end of every
    /// stimulus interval.
    pub fn clear_around_stimulation_boundaries(&self, guard: f64) -> Result<Phase> {
        if !(guard >= 0.0) {
            return Err(MeaError::InvalidParameter(format!(
                "guard must not be negative, got {}",
                guard
            )));
        }
        let intervals: Vec<(f64, f64)> = self
            .stimulus_intervals()?
            .into_iter()
            .flat_map(|(on, off)| [(on, on + guard), (off, off + guard)])
            .collect();
        Ok(self.clear_intervals(&intervals))
    }

    /// Spike count per electrode, optionally restricted to a closed interval.
    pub fn spikes_count(&self, interval: Option<(f64, f64)>) -> BTreeMap<u8, usize> {
        self.peaks
            .iter()
            .map(|(&label, times)| {
                let count = match interval {
                    Some(i) => times.iter().filter(|&&t| in_interval(t, i)).count(),
                    None => times.len(),
                };
                (label, count)
            })
            .collect()
    }
}

fn load_digital(container: &RecordingContainer, notes: &str) -> Result<Signal> {
    let stream = container.analog(0).ok_or_else(|| {
        MeaError::corrupt(
            format!("{}/AnalogStream/Stream_0", container.name()),
            "stream not present",
        )
    })?;
    let first = stream.channel_infos().first().ok_or_else(|| {
        MeaError::corrupt(
            format!("{}/AnalogStream/{}/InfoChannel", container.name(), stream.name()),
            "stimulus stream has no channels",
        )
    })?;
    let raw = stream.raw(ChannelKey::Index(first.channel_id as usize))?;
    let min = raw.iter().copied().min().unwrap_or(0) as f64;
    let mut signal = Signal::new(raw.mapv(|v| v as f64 - min), first.sampling_frequency());
    if !notes.is_empty() {
        signal.notes = Some(notes.to_string());
    }
    Ok(signal)
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// All phases recorded on one culture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Culture id
    pub name: String,
    pub path: String,
    pub date: String,
    pub phases: Vec<Phase>,
    /// Electrodes grounded during the recordings
    pub grounded_el: Vec<u8>,
    applied_operations: Vec<(String, Vec<String>)>,
}

impl Experiment {
    /// Fails with `InvalidElectrode` if `grounded_el` is not a set of
    /// distinct MEA60 labels.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        date: impl Into<String>,
        phases: Vec<Phase>,
        grounded_el: Vec<u8>,
    ) -> Result<Self> {
        mea_electrode_list(&grounded_el)?;
        Ok(Experiment {
            name: name.into(),
            path: path.into(),
            date: date.into(),
            phases,
            grounded_el,
            applied_operations: Vec::new(),
        })
    }

    /// Operations applied through [`Experiment::apply_operation`], in order.
    pub fn applied_operations(&self) -> &[(String, Vec<String>)] {
        &self.applied_operations
    }

    /// MEA60 labels that were not grounded.
    pub fn active_electrodes(&self) -> Result<Vec<u8>> {
        mea_electrode_list(&self.grounded_el)
    }

    /// Replaces every phase with `op(phase)` and records `(name, args)`.
    ///
    /// Phases are only replaced once `op` succeeded on all of them.
    pub fn apply_operation<F>(&mut self, name: &str, args: Vec<String>, op: F) -> Result<()>
    where
        F: Fn(&Phase) -> Result<Phase>,
    {
        let phases = self.phases.iter().map(&op).collect::<Result<Vec<_>>>()?;
        self.phases = phases;
        log::info!("{}: applied {}({})", self.name, name, args.join(", "));
        self.applied_operations.push((name.to_string(), args));
        Ok(())
    }

    /// Mean firing rate (spikes/s) of each electrode that fired.
    pub fn mean_firing_rate(
        &self,
        phase: &Phase,
        interval: Option<(f64, f64)>,
    ) -> Result<BTreeMap<u8, f64>> {
        let duration = window_duration(phase, interval)?;
        Ok(phase
            .spikes_count(interval)
            .into_iter()
            .map(|(label, count)| (label, count as f64 / duration))
            .collect())
    }

    /// Firing rate of the whole array: spikes of all active electrodes over
    /// the duration.
    pub fn net_mean_firing_rate(&self, phase: &Phase, interval: Option<(f64, f64)>) -> Result<f64> {
        let duration = window_duration(phase, interval)?;
        let counts = phase.spikes_count(interval);
        let total: usize = self
            .active_electrodes()?
            .iter()
            .filter_map(|label| counts.get(label))
            .sum();
        Ok(total as f64 / duration)
    }

    /// Inter-spike intervals (s) of each active electrode; electrodes that
    /// did not fire get an empty array.
    pub fn instantaneous_firing_rate(
        &self,
        phase: &Phase,
        interval: Option<(f64, f64)>,
    ) -> Result<BTreeMap<u8, Array1<f64>>> {
        Ok(self
            .active_electrodes()?
            .into_iter()
            .map(|label| {
                let times: Vec<f64> = phase
                    .peaks
                    .get(&label)
                    .map(|p| {
                        p.iter()
                            .copied()
                            .filter(|&t| interval.map_or(true, |i| in_interval(t, i)))
                            .collect()
                    })
                    .unwrap_or_default();
                let diffs: Array1<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
                (label, diffs)
            })
            .collect())
    }

    /// Post-stimulus time histogram of each active electrode.
    ///
    /// Bin `b` counts, over all `starts`, the spikes in
    /// `[start + b * bin_size, start + (b + 1) * bin_size)`.
    pub fn psth(
        &self,
        phase: &Phase,
        starts: &[f64],
        bin_size: f64,
        bin_num: usize,
    ) -> Result<BTreeMap<u8, Vec<usize>>> {
        if !(bin_size > 0.0 && bin_size.is_finite()) {
            return Err(MeaError::InvalidParameter(format!(
                "bin size must be positive, got {}",
                bin_size
            )));
        }
        let mut histograms = BTreeMap::new();
        for label in self.active_electrodes()? {
            let mut bins = vec![0usize; bin_num];
            if let Some(times) = phase.peaks.get(&label) {
                for &start in starts {
                    for &t in times.iter() {
                        let offset = t - start;
                        if offset < 0.0 {
                            continue;
                        }
                        let bin = (offset / bin_size).floor() as usize;
                        if bin < bin_num {
                            bins[bin] += 1;
                        }
                    }
                }
            }
            histograms.insert(label, bins);
        }
        Ok(histograms)
    }

    /// [`Experiment::psth`] summed over the active electrodes.
    pub fn net_psth(
        &self,
        phase: &Phase,
        starts: &[f64],
        bin_size: f64,
        bin_num: usize,
    ) -> Result<Vec<usize>> {
        let mut net = vec![0usize; bin_num];
        for bins in self.psth(phase, starts, bin_size, bin_num)?.values() {
            for (total, count) in net.iter_mut().zip(bins) {
                *total += count;
            }
        }
        Ok(net)
    }
}

fn window_duration(phase: &Phase, interval: Option<(f64, f64)>) -> Result<f64> {
    let duration = match interval {
        Some((start, end)) => end - start,
        None => phase.duration,
    };
    if duration > 0.0 && duration.is_finite() {
        Ok(duration)
    } else {
        Err(MeaError::InvalidParameter(format!(
            "firing rate needs a positive duration, got {}",
            duration
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{electrode_info, timestamp_info};
    use crate::reader::{AnalogStream, TimeStampStream};
    use crate::source::{InMemoryChannelData, InMemoryEventData};
    use ndarray::{array, Array2};

    fn phase() -> Phase {
        let mut peaks = Peaks::new();
        peaks.insert(12, array![0.5, 1.0, 2.5, 4.0]);
        peaks.insert(47, array![1.2, 3.0]);
        peaks.insert(15, Array1::zeros(0));
        let digital = Signal::new(
            Array1::from_iter((0..50).map(|k| if (10..20).contains(&k) { 1.0 } else { 0.0 })),
            10.0,
        );
        Phase::new("stim", peaks, Some(digital), 10_000.0, 5.0)
    }

    fn experiment(grounded: Vec<u8>) -> Experiment {
        Experiment::new("C1", "/data/C1", "2024-03-01", vec![phase()], grounded).unwrap()
    }

    #[test]
    fn empty_peak_arrays_are_dropped() {
        let phase = phase();
        assert_eq!(phase.peaks.keys().copied().collect::<Vec<_>>(), vec![12, 47]);
    }

    #[test]
    fn intervals_of_digital_trace() {
        let digital = Signal::new(array![0.0, 1.0, 1.0, 0.0, 0.0, 2.0], 2.0);
        assert_eq!(stimulus_intervals(&digital), vec![(0.5, 1.5), (2.5, 3.0)]);
        assert_eq!(phase().stimulus_intervals().unwrap(), vec![(1.0, 2.0)]);
    }

    #[test]
    fn clearing_is_idempotent_and_copies() {
        let original = phase();
        let intervals = [(0.9, 1.3), (3.0, 3.0)];

        let once = original.clear_intervals(&intervals);
        let twice = once.clear_intervals(&intervals);
        assert_eq!(once, twice);
        assert_eq!(once.peaks[&12], array![0.5, 2.5, 4.0]);
        assert!(!once.peaks.contains_key(&47));
        assert_eq!(original, phase());
    }

    #[test]
    fn clearing_around_stimulation() {
        let cleared = phase().clear_around_stimulation_boundaries(0.6).unwrap();
        // Stimulus runs from 1.0 to 2.0 s: guards are [1.0, 1.6] and [2.0, 2.6].
        assert_eq!(cleared.peaks[&12], array![0.5, 4.0]);
        assert_eq!(cleared.peaks[&47], array![3.0]);

        let mut basal = phase();
        basal.digital = None;
        assert!(matches!(
            basal.clear_around_stimulation_boundaries(0.6),
            Err(MeaError::InconsistentDigitalFlag(_))
        ));
    }

    #[test]
    fn counts_and_rates() {
        let phase = phase();
        let counts = phase.spikes_count(None);
        assert_eq!(counts[&12], 4);
        assert_eq!(phase.spikes_count(Some((1.0, 3.0)))[&12], 2);

        let experiment = experiment(vec![47]);
        let rates = experiment.mean_firing_rate(&phase, None).unwrap();
        assert_eq!(rates[&12], 0.8);
        assert_eq!(rates[&47], 0.4);
        // 47 is grounded and excluded from the net rate.
        assert_eq!(experiment.net_mean_firing_rate(&phase, None).unwrap(), 0.8);
        assert_eq!(
            experiment.net_mean_firing_rate(&phase, Some((0.0, 2.0))).unwrap(),
            1.0
        );
        assert!(experiment.mean_firing_rate(&phase, Some((2.0, 2.0))).is_err());
    }

    #[test]
    fn inter_spike_intervals() {
        let isi = experiment(vec![]).instantaneous_firing_rate(&phase(), None).unwrap();
        assert_eq!(isi.len(), 60);
        assert_eq!(isi[&12], array![0.5, 1.5, 1.5]);
        assert_eq!(isi[&47].len(), 1);
        assert!(isi[&13].is_empty());

        let isi = experiment(vec![])
            .instantaneous_firing_rate(&phase(), Some((0.0, 2.0)))
            .unwrap();
        assert_eq!(isi[&12], array![0.5]);
    }

    #[test]
    fn post_stimulus_histogram() {
        let experiment = experiment(vec![]);
        let phase = phase();
        let psth = experiment.psth(&phase, &[0.0, 2.0], 1.0, 3).unwrap();
        // Electrode 12: from 0.0 -> 0.5, 1.0, 2.5; from 2.0 -> 2.5, 4.0
        assert_eq!(psth[&12], vec![2, 1, 2]);
        assert_eq!(psth[&47], vec![0, 2, 0]);
        assert_eq!(psth[&13], vec![0, 0, 0]);
        assert_eq!(experiment.net_psth(&phase, &[0.0, 2.0], 1.0, 3).unwrap(), vec![2, 3, 2]);
        assert!(experiment.psth(&phase, &[0.0], 0.0, 3).is_err());
    }

    #[test]
    fn operations_are_logged() {
        let mut experiment = experiment(vec![]);
        experiment
            .apply_operation("clear_intervals", vec!["(0.9, 1.3)".to_string()], |p| {
                Ok(p.clear_intervals(&[(0.9, 1.3)]))
            })
            .unwrap();
        assert_eq!(experiment.applied_operations().len(), 1);
        assert_eq!(experiment.applied_operations()[0].0, "clear_intervals");
        assert_eq!(experiment.phases[0].spikes_count(None)[&12], 3);

        let failed = experiment.apply_operation("fail", vec![], |_| {
            Err(MeaError::InvalidParameter("nope".to_string()))
        });
        assert!(failed.is_err());
        assert_eq!(experiment.applied_operations().len(), 1);
    }

    #[test]
    fn grounded_electrodes_are_validated() {
        assert!(Experiment::new("C1", "", "", vec![], vec![18]).is_err());
        assert!(Experiment::new("C1", "", "", vec![], vec![47, 47]).is_err());
        assert_eq!(experiment(vec![47]).active_electrodes().unwrap().len(), 59);
    }

    #[test]
    fn info_line() {
        let mut phase = phase();
        phase.div = Some(21);
        assert_eq!(
            phase.info(),
            "type: Unknown, div: 21, order: Unknown, duration: 5 seconds, sampling frequency: 10000 Hz"
        );
    }

    fn container(with_stimulus: bool) -> RecordingContainer {
        let mut analogs = Vec::new();
        if with_stimulus {
            analogs.push(
                AnalogStream::new(
                    "Stream_0",
                    vec![electrode_info(0, "D1")],
                    Box::new(InMemoryChannelData::new(array![[-5, -5, 3, 3, -5, -5, -5, -5]])),
                )
                .unwrap(),
            );
        }
        analogs.push(
            AnalogStream::new(
                "Stream_1",
                vec![electrode_info(0, "12"), electrode_info(1, "47"), electrode_info(2, "Ref")],
                Box::new(InMemoryChannelData::new(Array2::zeros((3, 8)))),
            )
            .unwrap(),
        );
        let events = InMemoryEventData::new()
            .with_entity(0, array![100, 500])
            .with_entity(1, Array1::zeros(0));
        let ts = TimeStampStream::new(
            "Stream_0",
            vec![timestamp_info(0, "12"), timestamp_info(1, "47")],
            Box::new(events),
        )
        .unwrap();
        let mut time_stamps = vec![ts];
        if with_stimulus {
            let events = InMemoryEventData::new().with_entity(1, array![300]);
            time_stamps.push(
                TimeStampStream::new("Stream_1", vec![timestamp_info(1, "47")], Box::new(events))
                    .unwrap(),
            );
        }
        RecordingContainer::new("rec", analogs, time_stamps)
    }

    #[test]
    fn phase_from_time_stamps() {
        let info = PhaseInfo::new("basal");
        let source = PeakSource::vendor_default(&info);
        assert_eq!(source, PeakSource::TimeStamps { stream: 0 });

        let phase = Phase::from_container(&container(false), &info, &source).unwrap();
        assert!(phase.digital.is_none());
        assert_eq!(phase.peaks.keys().copied().collect::<Vec<_>>(), vec![12]);
        assert_eq!(phase.peaks[&12], array![0.0001, 0.0005]);
        assert_eq!(phase.sampling_frequency, 10_000.0);
        assert!((phase.duration - 0.0008).abs() < 1e-15);
    }

    #[test]
    fn stimulation_phase_loads_digital_trace() {
        let info = PhaseInfo::new("stim").with_digital(true);
        let source = PeakSource::vendor_default(&info);
        let phase = Phase::from_container(&container(true), &info, &source).unwrap();

        let digital = phase.digital.as_ref().unwrap();
        assert_eq!(digital.data, array![0.0, 0.0, 8.0, 8.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(phase.stimulus_intervals().unwrap(), vec![(0.0002, 0.0004)]);
        assert_eq!(phase.peaks.keys().copied().collect::<Vec<_>>(), vec![47]);
        assert_eq!(phase.peaks[&47], array![0.0003]);
    }

    #[test]
    fn digital_flag_needs_two_streams() {
        let info = PhaseInfo::new("stim").with_digital(true);
        let source = PeakSource::Detection(DetectionConfig::default());
        let result = Phase::from_container(&container(false), &info, &source);
        assert!(matches!(result, Err(MeaError::InconsistentDigitalFlag(_))));

        let result = Phase::from_container(
            &container(false),
            &PhaseInfo::new("basal"),
            &PeakSource::TimeStamps { stream: 4 },
        );
        assert!(matches!(result, Err(MeaError::ContainerCorrupt { .. })));
    }

    #[test]
    fn phase_serializes_to_json() {
        let json = serde_json::to_string(&phase()).unwrap();
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(back.peaks[&12], array![0.5, 1.0, 2.5, 4.0]);
        assert_eq!(back.name, "stim");
    }
}
