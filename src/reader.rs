use ndarray::Array1;
use std::collections::HashMap;
use std::fmt;

use crate::error::{MeaError, Result};
use crate::source::{ChannelDataSource, EventDataSource};
use crate::types::*;

/// One analog stream of a recording: calibration table plus raw samples.
///
/// Samples stay in the backing [`ChannelDataSource`] until a channel is
/// asked for, and are calibrated on every request.
pub struct AnalogStream {
    name: String,
    infos: Vec<ChannelInfo>,
    labels: HashMap<String, usize>,
    storage: HashMap<usize, usize>,
    data: Box<dyn ChannelDataSource>,
}

impl AnalogStream {
    /// Builds a stream from its `InfoChannel` rows and its sample table.
    ///
    /// Fails with `ContainerCorrupt` when two rows share a label or a data
    /// row, or when a row points outside the sample table.
    pub fn new(
        name: impl Into<String>,
        infos: Vec<ChannelInfo>,
        data: Box<dyn ChannelDataSource>,
    ) -> Result<Self> {
        let name = name.into();
        let mut labels = HashMap::with_capacity(infos.len());
        let mut storage = HashMap::with_capacity(infos.len());

        for (row, info) in infos.iter().enumerate() {
            let data_row = usize::try_from(info.channel_id)
                .ok()
                .filter(|&s| s < data.num_channels())
                .ok_or_else(|| {
                    MeaError::corrupt(
                        format!("{}/InfoChannel", name),
                        format!(
                            "row {} points at data row {} but ChannelData has {} rows",
                            row,
                            info.channel_id,
                            data.num_channels()
                        ),
                    )
                })?;
            if labels.insert(info.label.trim().to_string(), row).is_some() {
                return Err(MeaError::corrupt(
                    format!("{}/InfoChannel", name),
                    format!("duplicate channel label {}", info.label),
                ));
            }
            if storage.insert(data_row, row).is_some() {
                return Err(MeaError::corrupt(
                    format!("{}/InfoChannel", name),
                    format!("data row {} claimed twice", data_row),
                ));
            }
        }

        let stream = AnalogStream {
            name,
            infos,
            labels,
            storage,
            data,
        };
        log::info!("{}", stream);
        Ok(stream)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All `InfoChannel` rows, in table order.
    pub fn channel_infos(&self) -> &[ChannelInfo] {
        &self.infos
    }

    pub fn num_channels(&self) -> usize {
        self.infos.len()
    }

    pub fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    /// Channel labels in table order.
    pub fn labels(&self) -> Vec<&str> {
        self.infos.iter().map(|i| i.label.as_str()).collect()
    }

    /// MEA60 electrode labels present in the stream, in table order.
    pub fn electrode_labels(&self) -> Vec<u8> {
        self.infos
            .iter()
            .filter_map(ChannelInfo::electrode_label)
            .collect()
    }

    /// Duration in seconds, taken from the first channel's tick.
    pub fn duration(&self) -> Option<f64> {
        self.infos
            .first()
            .map(|info| self.num_samples() as f64 / info.sampling_frequency())
    }

    fn row_of(&self, key: &ChannelKey) -> Result<usize> {
        match key {
            ChannelKey::Label(label) => self.labels.get(label.trim()).copied(),
            ChannelKey::Index(index) => self.storage.get(index).copied(),
        }
        .ok_or_else(|| MeaError::ChannelNotFound(format!("{} in {}", key, self.name)))
    }

    /// Calibration record of a channel.
    pub fn channel_info(&self, key: impl Into<ChannelKey>) -> Result<&ChannelInfo> {
        let row = self.row_of(&key.into())?;
        Ok(&self.infos[row])
    }

    /// Raw ADC samples of a channel.
    pub fn raw(&self, key: impl Into<ChannelKey>) -> Result<Array1<i32>> {
        let info = self.channel_info(key)?;
        self.data.read_channel(info.channel_id as usize)
    }

    /// Calibrated samples of a channel.
    ///
    /// `unit_scale` is added to the stored exponent, see
    /// [`ChannelInfo::calibrate`].
    pub fn voltage(&self, key: impl Into<ChannelKey>, unit_scale: i32) -> Result<Signal> {
        let info = self.channel_info(key)?;
        let raw = self.data.read_channel(info.channel_id as usize)?;
        Ok(Signal::new(
            info.calibrate(&raw, unit_scale),
            info.sampling_frequency(),
        ))
    }
}

impl fmt::Display for AnalogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Analog stream {}: {} channel{}, {} samples",
            self.name,
            self.infos.len(),
            if self.infos.len() != 1 { "s" } else { "" },
            self.num_samples()
        )
    }
}

/// Vendor-computed event channels, keyed by the label of their source channel.
pub struct TimeStampStream {
    name: String,
    infos: Vec<TimeStampInfo>,
    labels: HashMap<String, i32>,
    entities: Box<dyn EventDataSource>,
}

impl TimeStampStream {
    /// Builds a stream from its `InfoTimeStamp` rows and its entity tables.
    pub fn new(
        name: impl Into<String>,
        infos: Vec<TimeStampInfo>,
        entities: Box<dyn EventDataSource>,
    ) -> Result<Self> {
        let name = name.into();
        let mut labels = HashMap::with_capacity(infos.len());
        for info in &infos {
            if labels
                .insert(info.source_label.trim().to_string(), info.channel_id)
                .is_some()
            {
                return Err(MeaError::corrupt(
                    format!("{}/InfoTimeStamp", name),
                    format!("duplicate source label {}", info.source_label),
                ));
            }
        }

        let stream = TimeStampStream {
            name,
            infos,
            labels,
            entities,
        };
        log::info!("{}", stream);
        Ok(stream)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn infos(&self) -> &[TimeStampInfo] {
        &self.infos
    }

    /// Event times recorded for the channel with source label `label`, as
    /// stored by the vendor (integer ticks, not seconds). Use
    /// [`RecordingContainer::event_times`] for seconds.
    ///
    /// Returns `None` for unknown labels. A label that is declared but has no
    /// entity table is `ContainerCorrupt`.
    pub fn raw_events(&self, label: &str) -> Result<Option<Array1<i64>>> {
        let Some(&channel_id) = self.labels.get(label.trim()) else {
            return Ok(None);
        };
        match self.entities.read_entity(channel_id)? {
            Some(events) => Ok(Some(events)),
            None => Err(MeaError::corrupt(
                format!("{}/TimeStampEntity_{}", self.name, channel_id),
                "declared in InfoTimeStamp but missing",
            )),
        }
    }
}

impl fmt::Display for TimeStampStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time stamp stream {}: {} channel{}",
            self.name,
            self.infos.len(),
            if self.infos.len() != 1 { "s" } else { "" }
        )
    }
}

/// Content of a recording container.
///
/// Stream indices start at 0. When a stimulus indicator stream is present it
/// is analog stream 0; the recorded signals are always the last analog
/// stream.
pub struct RecordingContainer {
    name: String,
    analogs: Vec<AnalogStream>,
    time_stamps: Vec<TimeStampStream>,
}

impl RecordingContainer {
    pub fn new(
        name: impl Into<String>,
        analogs: Vec<AnalogStream>,
        time_stamps: Vec<TimeStampStream>,
    ) -> Self {
        let container = RecordingContainer {
            name: name.into(),
            analogs,
            time_stamps,
        };
        log::info!("{}", container);
        container
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn analogs(&self) -> &[AnalogStream] {
        &self.analogs
    }

    pub fn time_stamps(&self) -> &[TimeStampStream] {
        &self.time_stamps
    }

    /// Analog stream by index; `None` for streams the container lacks.
    pub fn analog(&self, index: usize) -> Option<&AnalogStream> {
        self.analogs.get(index)
    }

    /// Time-stamp stream by index; `None` for streams the container lacks.
    pub fn time_stamp(&self, index: usize) -> Option<&TimeStampStream> {
        self.time_stamps.get(index)
    }

    /// The stream carrying the recorded signals (the highest-indexed one).
    pub fn primary_analog(&self) -> Result<&AnalogStream> {
        self.analogs.last().ok_or_else(|| {
            MeaError::corrupt(format!("{}/AnalogStream", self.name), "no analog streams")
        })
    }

    fn analog_or_err(&self, index: usize) -> Result<&AnalogStream> {
        self.analog(index).ok_or_else(|| {
            MeaError::corrupt(
                format!("{}/AnalogStream/Stream_{}", self.name, index),
                "stream not present",
            )
        })
    }

    /// Event positions of `label` in samples of analog stream `analog`.
    ///
    /// The raw times of time-stamp stream `time_stamp` are divided by the
    /// tick of the matching analog channel. `None` when either stream lacks
    /// the label.
    pub fn events(
        &self,
        analog: usize,
        time_stamp: usize,
        label: &str,
    ) -> Result<Option<Array1<f64>>> {
        let stream = self.analog_or_err(analog)?;
        let Some(events_stream) = self.time_stamp(time_stamp) else {
            return Ok(None);
        };
        let tick = match stream.channel_info(label) {
            Ok(info) => info.tick as f64,
            Err(MeaError::ChannelNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(events_stream
            .raw_events(label)?
            .map(|raw| raw.mapv(|t| t as f64 / tick)))
    }

    /// Event times of `label` in seconds, see [`RecordingContainer::events`].
    pub fn event_times(
        &self,
        analog: usize,
        time_stamp: usize,
        label: &str,
    ) -> Result<Option<Array1<f64>>> {
        let Some(positions) = self.events(analog, time_stamp, label)? else {
            return Ok(None);
        };
        let sampling_frequency = self.analog_or_err(analog)?.channel_info(label)?.sampling_frequency();
        Ok(Some(positions / sampling_frequency))
    }
}

impl fmt::Display for RecordingContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recording {}: {} analog stream{}, {} time stamp stream{}",
            self.name,
            self.analogs.len(),
            if self.analogs.len() != 1 { "s" } else { "" },
            self.time_stamps.len(),
            if self.time_stamps.len() != 1 { "s" } else { "" }
        )
    }
}
