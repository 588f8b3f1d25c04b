//! Calibration rows shared by the unit tests.

use crate::types::{ChannelInfo, TimeStampInfo};

/// A typical MEA2100 electrode row: 24-bit ADC, 59605 pV per step, 10 kHz.
pub(crate) fn electrode_info(channel_id: i32, label: &str) -> ChannelInfo {
    ChannelInfo {
        id: channel_id + 100,
        channel_id,
        row_index: channel_id,
        group_id: 0,
        label: label.to_string(),
        raw_data_type: "Int".to_string(),
        unit: "V".to_string(),
        exponent: -12,
        adc_offset: 0,
        tick: 100,
        conversion_factor: 59605,
        adc_bits: 24,
        highpass_type: "Butterworth".to_string(),
        highpass_cutoff: "1 Hz".to_string(),
        highpass_order: 1,
        lowpass_type: String::new(),
        lowpass_cutoff: String::new(),
        lowpass_order: 0,
    }
}

pub(crate) fn timestamp_info(channel_id: i32, source_label: &str) -> TimeStampInfo {
    TimeStampInfo {
        channel_id,
        group: 0,
        label: format!("Spike {}", source_label),
        unit: "s".to_string(),
        exponent: -6,
        source_id: channel_id,
        source_label: source_label.to_string(),
    }
}
