//! Random access to raw sample tables.
//!
//! Recordings can hold tens of millions of samples per channel, so streams
//! never materialise the whole `ChannelData` table: they ask a
//! [`ChannelDataSource`] for one channel row at a time.

use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::error::{MeaError, Result};

/// Row-addressable raw sample table (channel x sample).
pub trait ChannelDataSource: Send + Sync {
    /// Number of rows in the table
    fn num_channels(&self) -> usize;

    /// Number of samples per row
    fn num_samples(&self) -> usize;

    /// Reads one row of raw ADC values.
    fn read_channel(&self, index: usize) -> Result<Array1<i32>>;
}

/// Per-channel event tables of a time-stamp stream.
pub trait EventDataSource: Send + Sync {
    /// Reads the first row of `TimeStampEntity_{channel_id}`, or `None` when
    /// the stream has no such entity.
    fn read_entity(&self, channel_id: i32) -> Result<Option<Array1<i64>>>;
}

/// A sample table held in memory, used for fixtures and small recordings.
#[derive(Debug, Clone)]
pub struct InMemoryChannelData {
    data: Array2<i32>,
}

impl InMemoryChannelData {
    pub fn new(data: Array2<i32>) -> Self {
        InMemoryChannelData { data }
    }
}

impl ChannelDataSource for InMemoryChannelData {
    fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    fn read_channel(&self, index: usize) -> Result<Array1<i32>> {
        if index >= self.data.nrows() {
            return Err(MeaError::ChannelNotFound(format!("row {}", index)));
        }
        Ok(self.data.row(index).to_owned())
    }
}

/// Event tables held in memory, keyed by channel id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventData {
    entities: HashMap<i32, Array1<i64>>,
}

impl InMemoryEventData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, channel_id: i32, events: Array1<i64>) -> Self {
        self.entities.insert(channel_id, events);
        self
    }
}

impl EventDataSource for InMemoryEventData {
    fn read_entity(&self, channel_id: i32) -> Result<Option<Array1<i64>>> {
        Ok(self.entities.get(&channel_id).cloned())
    }
}

const SAMPLE_BYTES: usize = 4;

/// A memory-mapped sample table stored channel-major as little-endian `i32`.
///
/// Only the requested row is decoded; the operating system pages the rest of
/// the file in on demand.
#[derive(Debug)]
pub struct MappedChannelData {
    path: String,
    mmap: Mmap,
    num_channels: usize,
    num_samples: usize,
}

impl MappedChannelData {
    /// Maps `path` as a table with `num_channels` rows.
    pub fn open<P: AsRef<Path>>(path: P, num_channels: usize) -> Result<Self> {
        let path_str = path.as_ref().display().to_string();
        if num_channels == 0 {
            return Err(MeaError::InvalidParameter(
                "a mapped table needs at least one channel".to_string(),
            ));
        }

        let file = File::open(path.as_ref())?;
        // The mapping is read-only and the table is never written while mapped.
        let mmap = unsafe { Mmap::map(&file)? };

        let row_bytes = num_channels * SAMPLE_BYTES;
        if mmap.len() % row_bytes != 0 {
            return Err(MeaError::corrupt(
                path_str,
                format!(
                    "{} bytes is not a whole number of {}-channel i32 frames",
                    mmap.len(),
                    num_channels
                ),
            ));
        }
        let num_samples = mmap.len() / row_bytes;
        log::debug!(
            "Mapped {}: {} channels x {} samples",
            path_str,
            num_channels,
            num_samples
        );

        Ok(MappedChannelData {
            path: path_str,
            mmap,
            num_channels,
            num_samples,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ChannelDataSource for MappedChannelData {
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
        let row_bytes = self.num_samples * SAMPLE_BYTES;
        let bytes = &self.mmap[index * row_bytes..(index + 1) * row_bytes];
        let mut row = vec![0i32; self.num_samples];
        LittleEndian::read_i32_into(bytes, &mut row);
        Ok(Array1::from(row))
    }
}
