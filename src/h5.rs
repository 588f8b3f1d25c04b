//! Reader for Multi Channel Systems HDF5 recordings.
//!
//! The layout is fixed by the acquisition software:
//!
//! ```text
//! /Data/Recording_0/AnalogStream/Stream_{k}/InfoChannel      (compound, 18 fields)
//! /Data/Recording_0/AnalogStream/Stream_{k}/ChannelData      (i32, channel x sample)
//! /Data/Recording_0/TimeStampStream/Stream_{k}/InfoTimeStamp (compound, 7 fields)
//! /Data/Recording_0/TimeStampStream/Stream_{k}/TimeStampEntity_{id} (i64, 1 x N)
//! ```
//!
//! String columns of `InfoChannel` and `InfoTimeStamp` are read as
//! variable-length ASCII, which is what the acquisition software writes.
//! Other string encodings (fixed-length, UTF-8) are not supported: when the
//! HDF5 library cannot convert a table to these row types, `open` fails with
//! [`MeaError::ContainerCorrupt`] naming the table.

use hdf5::types::VarLenAscii;
use hdf5::{Dataset, File as H5File, Group, H5Type};
use ndarray::Array1;
use parking_lot::Mutex;
use std::path::Path;

use crate::error::{MeaError, Result};
use crate::reader::{AnalogStream, RecordingContainer, TimeStampStream};
use crate::source::{ChannelDataSource, EventDataSource};
use crate::types::{ChannelInfo, TimeStampInfo};

const RECORDING: &str = "Data/Recording_0";
const ANALOG_STREAMS: &str = "AnalogStream";
const TIME_STAMP_STREAMS: &str = "TimeStampStream";

#[derive(H5Type, Clone, Debug)]
#[repr(C)]
struct InfoChannelRow {
    #[hdf5(rename = "ChannelID")]
    id: i32,
    #[hdf5(rename = "RowIndex")]
    channel_id: i32,
    #[hdf5(rename = "GroupID")]
    row_index: i32,
    #[hdf5(rename = "ElectrodeGroup")]
    group_id: i32,
    #[hdf5(rename = "Label")]
    label: VarLenAscii,
    #[hdf5(rename = "RawDataType")]
    raw_data_type: VarLenAscii,
    #[hdf5(rename = "Unit")]
    unit: VarLenAscii,
    #[hdf5(rename = "Exponent")]
    exponent: i32,
    #[hdf5(rename = "ADZero")]
    adc_offset: i32,
    #[hdf5(rename = "Tick")]
    tick: i64,
    #[hdf5(rename = "ConversionFactor")]
    conversion_factor: i64,
    #[hdf5(rename = "ADCBits")]
    adc_bits: i32,
    #[hdf5(rename = "HighPassFilterType")]
    highpass_type: VarLenAscii,
    #[hdf5(rename = "HighPassFilterCutOffFrequency")]
    highpass_cutoff: VarLenAscii,
    #[hdf5(rename = "HighPassFilterOrder")]
    highpass_order: i32,
    #[hdf5(rename = "LowPassFilterType")]
    lowpass_type: VarLenAscii,
    #[hdf5(rename = "LowPassFilterCutOffFrequency")]
    lowpass_cutoff: VarLenAscii,
    #[hdf5(rename = "LowPassFilterOrder")]
    lowpass_order: i32,
}

impl From<&InfoChannelRow> for ChannelInfo {
    fn from(row: &InfoChannelRow) -> Self {
        ChannelInfo {
            id: row.id,
            channel_id: row.channel_id,
            row_index: row.row_index,
            group_id: row.group_id,
            label: row.label.as_str().trim().to_string(),
            raw_data_type: row.raw_data_type.as_str().to_string(),
            unit: row.unit.as_str().to_string(),
            exponent: row.exponent,
            adc_offset: row.adc_offset,
            tick: row.tick,
            conversion_factor: row.conversion_factor,
            adc_bits: row.adc_bits,
            highpass_type: row.highpass_type.as_str().to_string(),
            highpass_cutoff: row.highpass_cutoff.as_str().to_string(),
            highpass_order: row.highpass_order,
            lowpass_type: row.lowpass_type.as_str().to_string(),
            lowpass_cutoff: row.lowpass_cutoff.as_str().to_string(),
            lowpass_order: row.lowpass_order,
        }
    }
}

#[derive(H5Type, Clone, Debug)]
#[repr(C)]
struct InfoTimeStampRow {
    #[hdf5(rename = "TimeStampEntityID")]
    channel_id: i32,
    #[hdf5(rename = "GroupID")]
    group: i32,
    #[hdf5(rename = "Label")]
    label: VarLenAscii,
    #[hdf5(rename = "Unit")]
    unit: VarLenAscii,
    #[hdf5(rename = "Exponent")]
    exponent: i32,
    #[hdf5(rename = "SourceChannelIDs")]
    source_id: VarLenAscii,
    #[hdf5(rename = "SourceChannelLabels")]
    source_label: VarLenAscii,
}

impl InfoTimeStampRow {
    // Source ids are stored as text; entities here always have one source.
    fn to_info(&self, at: &str) -> Result<TimeStampInfo> {
        let source = self.source_id.as_str().split(',').next().unwrap_or("").trim();
        let source_id = source.parse::<i32>().map_err(|_| {
            MeaError::corrupt(at, format!("source channel id {:?} is not a number", source))
        })?;
        Ok(TimeStampInfo {
            channel_id: self.channel_id,
            group: self.group,
            label: self.label.as_str().to_string(),
            unit: self.unit.as_str().to_string(),
            exponent: self.exponent,
            source_id,
            source_label: self.source_label.as_str().trim().to_string(),
        })
    }
}

/// A `ChannelData` dataset read one row at a time.
pub struct H5ChannelData {
    path: String,
    dataset: Mutex<Dataset>,
    num_channels: usize,
    num_samples: usize,
}

impl H5ChannelData {
    pub fn new(path: impl Into<String>, dataset: Dataset) -> Result<Self> {
        let path = path.into();
        let shape = dataset.shape();
        if shape.len() != 2 {
            return Err(MeaError::corrupt(
                path,
                format!("expected a 2-D table, got shape {:?}", shape),
            ));
        }
        Ok(H5ChannelData {
            path,
            dataset: Mutex::new(dataset),
            num_channels: shape[0],
            num_samples: shape[1],
        })
    }
}

impl ChannelDataSource for H5ChannelData {
    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn num_samples(&self) -> usize {
        self.num_samples
    }

    fn read_channel(&self, index: usize) -> Result<Array1<i32>> {
        if index >= self.num_channels {
            return Err(MeaError::ChannelNotFound(format!("row {}", index)));
        }
        let dataset = self.dataset.lock();
        dataset
            .read_slice_1d::<i32, _>((index, ..))
            .map_err(|e| MeaError::corrupt(&self.path, e.to_string()))
    }
}

/// The `TimeStampEntity_{id}` tables of one time-stamp stream.
pub struct H5EventData {
    path: String,
    group: Mutex<Group>,
}

impl H5EventData {
    pub fn new(path: impl Into<String>, group: Group) -> Self {
        H5EventData {
            path: path.into(),
            group: Mutex::new(group),
        }
    }
}

impl EventDataSource for H5EventData {
    fn read_entity(&self, channel_id: i32) -> Result<Option<Array1<i64>>> {
        let name = format!("TimeStampEntity_{}", channel_id);
        let at = format!("{}/{}", self.path, name);
        let group = self.group.lock();
        if !group.link_exists(&name) {
            return Ok(None);
        }
        let dataset = group
            .dataset(&name)
            .map_err(|e| MeaError::corrupt(&at, e.to_string()))?;
        let events = match dataset.ndim() {
            1 => dataset.read_1d::<i64>(),
            2 => dataset.read_slice_1d::<i64, _>((0, ..)),
            n => {
                return Err(MeaError::corrupt(
                    at,
                    format!("expected a 1 x N table, got {} dimensions", n),
                ))
            }
        };
        events
            .map(Some)
            .map_err(|e| MeaError::corrupt(&at, e.to_string()))
    }
}

/// `Stream_0`, `Stream_1`, ... of a stream collection, in index order.
///
/// A missing collection has no streams; a gap in the numbering is corrupt.
fn stream_groups(recording: &Group, at: &str, collection: &str) -> Result<Vec<(String, Group)>> {
    if !recording.link_exists(collection) {
        return Ok(Vec::new());
    }
    let collection_at = format!("{}/{}", at, collection);
    let group = recording
        .group(collection)
        .map_err(|e| MeaError::corrupt(&collection_at, e.to_string()))?;
    let count = group
        .member_names()
        .map_err(|e| MeaError::corrupt(&collection_at, e.to_string()))?
        .iter()
        .filter(|name| name.starts_with("Stream_"))
        .count();

    (0..count)
        .map(|k| {
            let key = format!("Stream_{}", k);
            group
                .group(&key)
                .map(|g| (format!("{}/{}", collection_at, key), g))
                .map_err(|e| MeaError::corrupt(format!("{}/{}", collection_at, key), e.to_string()))
        })
        .collect()
}

fn unreadable_table(e: hdf5::Error) -> String {
    format!("{} (expected the MCS compound layout with variable-length ASCII strings)", e)
}

fn open_analog(at: String, group: &Group) -> Result<AnalogStream> {
    let info_at = format!("{}/InfoChannel", at);
    let rows = group
        .dataset("InfoChannel")
        .and_then(|ds| ds.read_raw::<InfoChannelRow>())
        .map_err(|e| MeaError::corrupt(&info_at, unreadable_table(e)))?;
    let infos = rows.iter().map(ChannelInfo::from).collect();

    let data_at = format!("{}/ChannelData", at);
    let dataset = group
        .dataset("ChannelData")
        .map_err(|e| MeaError::corrupt(&data_at, e.to_string()))?;
    let data = H5ChannelData::new(data_at, dataset)?;

    AnalogStream::new(at, infos, Box::new(data))
}

fn open_time_stamp(at: String, group: Group) -> Result<TimeStampStream> {
    let info_at = format!("{}/InfoTimeStamp", at);
    let rows = group
        .dataset("InfoTimeStamp")
        .and_then(|ds| ds.read_raw::<InfoTimeStampRow>())
        .map_err(|e| MeaError::corrupt(&info_at, unreadable_table(e)))?;
    let infos = rows
        .iter()
        .map(|row| row.to_info(&info_at))
        .collect::<Result<Vec<_>>>()?;

    let entities = H5EventData::new(at.clone(), group);
    TimeStampStream::new(at, infos, Box::new(entities))
}

/// Opens an MCS HDF5 recording.
///
/// Channel samples and event tables stay on disk until requested.
pub fn open<P: AsRef<Path>>(path: P) -> Result<RecordingContainer> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let file = H5File::open(path).map_err(|e| MeaError::corrupt(&path_str, e.to_string()))?;

    let at = format!("{}:/{}", path_str, RECORDING);
    let recording = file
        .group(RECORDING)
        .map_err(|e| MeaError::corrupt(&at, e.to_string()))?;

    let analogs = stream_groups(&recording, &at, ANALOG_STREAMS)?
        .into_iter()
        .map(|(stream_at, group)| open_analog(stream_at, &group))
        .collect::<Result<Vec<_>>>()?;
    let time_stamps = stream_groups(&recording, &at, TIME_STAMP_STREAMS)?
        .into_iter()
        .map(|(stream_at, group)| open_time_stamp(stream_at, group))
        .collect::<Result<Vec<_>>>()?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(path_str);
    Ok(RecordingContainer::new(name, analogs, time_stamps))
}
