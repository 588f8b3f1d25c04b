//! Reader and spike detector for 60-electrode MEA recordings.
//!
//! Recordings are read into a [`RecordingContainer`] of analog and
//! time-stamp streams. Channels are calibrated on demand, spikes are either
//! taken from the vendor time stamps or detected with
//! [`ThresholdEstimator`] and [`SpikeDetector`], and the result is gathered
//! in a [`Phase`].
//!
//! # Examples
//!
//! ```
//! use mea_importer::{AnalogStream, ChannelInfo, InMemoryChannelData, Phase, PhaseInfo,
//!                    PeakSource, RecordingContainer, DetectionConfig};
//! use ndarray::Array2;
//!
//! let info = ChannelInfo {
//!     id: 0, channel_id: 0, row_index: 0, group_id: 0,
//!     label: "47".to_string(), raw_data_type: "Int".to_string(), unit: "V".to_string(),
//!     exponent: -12, adc_offset: 0, tick: 100, conversion_factor: 59605, adc_bits: 24,
//!     highpass_type: String::new(), highpass_cutoff: String::new(), highpass_order: 0,
//!     lowpass_type: String::new(), lowpass_cutoff: String::new(), lowpass_order: 0,
//! };
//! let data = Array2::from_shape_fn((1, 10_000), |(_, k)| if k % 2 == 0 { 10 } else { -10 });
//! let stream = AnalogStream::new("Stream_0", vec![info], Box::new(InMemoryChannelData::new(data)))?;
//! let container = RecordingContainer::new("rec", vec![stream], vec![]);
//!
//! let source = PeakSource::Detection(DetectionConfig::default());
//! let phase = Phase::from_container(&container, &PhaseInfo::new("basal"), &source)?;
//! assert!(phase.peaks.is_empty());
//! # Ok::<(), mea_importer::MeaError>(())
//! ```

pub mod config;
pub mod detection;
pub mod electrode;
pub mod error;
pub mod experiment;
#[cfg(feature = "hdf5")]
pub mod h5;
pub mod reader;
pub mod source;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use config::DetectionConfig;
pub use detection::{
    as_one_dimensional, detect_channels, mean_centered, ChannelDetection, Spike, SpikeDetector,
    ThresholdEstimator,
};
pub use error::{MeaError, Result};
pub use experiment::{stimulus_intervals, Experiment, PeakSource, Peaks, Phase};
pub use reader::{AnalogStream, RecordingContainer, TimeStampStream};
pub use source::{
    ChannelDataSource, EventDataSource, InMemoryChannelData, InMemoryEventData, MappedChannelData,
};
pub use types::*;

#[cfg(feature = "hdf5")]
pub use h5::open;

/// Opens an MCS HDF5 recording and builds one phase from it.
///
/// # Examples
///
/// ```no_run
/// use mea_importer::{load, PeakSource, PhaseInfo};
///
/// let info = PhaseInfo::new("C1").with_digital(true);
/// let phase = load("C1_DIV21_Stim_2.h5", &info, &PeakSource::vendor_default(&info));
/// match phase {
///     Ok(phase) => println!("{}", phase.info()),
///     Err(e) => println!("Error loading file: {}", e),
/// }
/// ```
#[cfg(feature = "hdf5")]
pub fn load<P: AsRef<std::path::Path>>(
    file_path: P,
    info: &PhaseInfo,
    source: &PeakSource,
) -> Result<Phase> {
    let container = h5::open(file_path)?;
    Phase::from_container(&container, info, source)
}
