use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::electrode;

/// Exponent offset for calibrated output in volts.
pub const UNIT_SCALE_VOLT: i32 = 0;
/// Exponent offset used by the legacy raw-signal loader (`exponent + 6`).
pub const UNIT_SCALE_LEGACY: i32 = 6;

/// Calibration record for one channel of an analog stream.
///
/// One row of the `InfoChannel` table. Read once when the stream is opened
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// First column of the table, carried through but not interpreted
    pub id: i32,
    /// Storage index: the row of this channel in `ChannelData`
    pub channel_id: i32,
    /// Row index reported by the vendor software
    pub row_index: i32,
    /// Channel group
    pub group_id: i32,
    /// Acquisition label (e.g. "47" for electrode 47)
    pub label: String,
    /// Raw data type as declared by the vendor (e.g. "Int")
    pub raw_data_type: String,
    /// Physical unit of the calibrated value (e.g. "V")
    pub unit: String,
    /// Power-of-ten scale of the calibrated value
    pub exponent: i32,
    /// ADC zero offset, subtracted from every raw sample
    pub adc_offset: i32,
    /// Sampling interval in microseconds
    pub tick: i64,
    /// Multiplier from ADC steps to physical units
    pub conversion_factor: i64,
    /// ADC resolution in bits
    pub adc_bits: i32,
    /// High-pass filter type
    pub highpass_type: String,
    /// High-pass filter cutoff, as stored
    pub highpass_cutoff: String,
    /// High-pass filter order
    pub highpass_order: i32,
    /// Low-pass filter type
    pub lowpass_type: String,
    /// Low-pass filter cutoff, as stored
    pub lowpass_cutoff: String,
    /// Low-pass filter order
    pub lowpass_order: i32,
}

impl ChannelInfo {
    /// Sampling frequency in Hz derived from the tick.
    pub fn sampling_frequency(&self) -> f64 {
        1e6 / self.tick as f64
    }

    /// The MEA60 electrode label of this channel, if it is one.
    pub fn electrode_label(&self) -> Option<u8> {
        self.label
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|&l| electrode::is_valid_label(l))
    }

    /// Converts raw ADC samples into calibrated values.
    ///
    /// `value = (raw - adc_offset) * conversion_factor * 10^(exponent + unit_scale)`
    ///
    /// `unit_scale` shifts the output unit: [`UNIT_SCALE_VOLT`] keeps the
    /// stored exponent, [`UNIT_SCALE_LEGACY`] reproduces the legacy loader.
    pub fn calibrate(&self, raw: &Array1<i32>, unit_scale: i32) -> Array1<f64> {
        let offset = self.adc_offset as f64;
        let scale = self.conversion_factor as f64 * 10f64.powi(self.exponent + unit_scale);
        raw.mapv(|x| (x as f64 - offset) * scale)
    }
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} (label {}): {} 10^{} {}, offset {}, tick {} us, factor {}",
            self.channel_id,
            self.label,
            self.raw_data_type,
            self.exponent,
            self.unit,
            self.adc_offset,
            self.tick,
            self.conversion_factor
        )
    }
}

/// Description of one event channel of a time-stamp stream.
///
/// One row of the `InfoTimeStamp` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStampInfo {
    /// Selects the `TimeStampEntity_{channel_id}` table
    pub channel_id: i32,
    /// Channel group
    pub group: i32,
    /// Label of the event channel itself
    pub label: String,
    /// Physical unit of the event times (e.g. "s")
    pub unit: String,
    /// Power-of-ten scale of the event times
    pub exponent: i32,
    /// Channel the events were computed from
    pub source_id: i32,
    /// Label of the analog channel the events were computed from
    pub source_label: String,
}

/// Addresses a channel inside a stream, either by label or by storage index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Label(String),
    Index(usize),
}

impl ChannelKey {
    /// Key for a MEA60 electrode label.
    pub fn electrode(label: u8) -> Self {
        ChannelKey::Label(label.to_string())
    }
}

impl From<&str> for ChannelKey {
    fn from(label: &str) -> Self {
        ChannelKey::Label(label.to_string())
    }
}

impl From<String> for ChannelKey {
    fn from(label: String) -> Self {
        ChannelKey::Label(label)
    }
}

impl From<usize> for ChannelKey {
    fn from(index: usize) -> Self {
        ChannelKey::Index(index)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Label(label) => write!(f, "label {}", label),
            ChannelKey::Index(index) => write!(f, "index {}", index),
        }
    }
}

/// A named numeric vector with its sampling frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Samples
    pub data: Array1<f64>,
    /// Sampling frequency (Hz)
    pub sampling_frequency: f64,
    /// Free-text notes
    pub notes: Option<String>,
}

impl Signal {
    pub fn new(data: Array1<f64>, sampling_frequency: f64) -> Self {
        Signal {
            data,
            sampling_frequency,
            notes: None,
        }
    }

    /// Duration of the signal in seconds.
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.sampling_frequency
    }
}

fn default_sampling_frequency() -> f64 {
    10_000.0
}

/// Metadata of a recording phase, parsed from the file name by the caller.
///
/// The usual convention is `COLTURE-ID_DIV{n}_{PHASE-TYPE}_{ORDER}[_OTHER].h5`;
/// this crate never parses names itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    /// Phase name (usually the recording's file name)
    pub name: String,
    /// Day in vitro
    pub div: Option<u32>,
    /// Phase type (e.g. "Basal", "Stim")
    pub phase_type: Option<String>,
    /// Position of the phase in the experiment
    pub order: Option<u32>,
    /// Whether the container carries a stimulus indicator stream
    #[serde(default)]
    pub digital: bool,
    /// Sampling frequency used when the container does not declare one (Hz)
    #[serde(default = "default_sampling_frequency")]
    pub sampling_frequency: f64,
    /// Duration override in seconds
    pub duration: Option<f64>,
    /// Free-text notes
    #[serde(default)]
    pub notes: String,
    /// Trailing field of the file name
    pub other: Option<String>,
}

impl PhaseInfo {
    pub fn new(name: impl Into<String>) -> Self {
        PhaseInfo {
            name: name.into(),
            div: None,
            phase_type: None,
            order: None,
            digital: false,
            sampling_frequency: default_sampling_frequency(),
            duration: None,
            notes: String::new(),
            other: None,
        }
    }

    /// Marks the phase as a stimulation phase with a digital stream.
    pub fn with_digital(mut self, digital: bool) -> Self {
        self.digital = digital;
        self
    }
}
