//! MEA60 electrode topology.
//!
//! The 60-electrode array is addressed three ways:
//!
//! * **label**: the vendor's two-digit grid coordinate (column then row),
//! * **sequential index** in `1..=60`, counting the grid row by row,
//! * **circular index** in `0..60`, the amplifier's hardware channel order.
//!
//! ```text
//!        12 13 14 15 16 17                 1  2  3  4  5  6
//!     21 22 23 24 25 26 27 28           7  8  9 10 11 12 13 14
//!     31 32 33 34 35 36 37 38          15 16 17 18 19 20 21 22
//!     41 42 43 44 45 46 47 48  <---->  23 24 25 26 27 28 29 30
//!     51 52 53 54 55 56 57 58          31 32 33 34 35 36 37 38
//!     61 62 63 64 65 66 67 68          39 40 41 42 43 44 45 46
//!     71 72 73 74 75 76 77 78          47 48 49 50 51 52 53 54
//!        82 83 84 85 86 87                55 56 57 58 59 60
//! ```
//!
//! The label space has gaps (18-20, 29-30, ...), so every conversion checks
//! membership against the enumerated tables rather than a numeric range.

use crate::error::{MeaError, Result};

/// Number of electrodes on the array
pub const MEA60_SIZE: usize = 60;

/// Valid labels in sequential (row-major) order.
pub const MEA60_LABELS: [u8; MEA60_SIZE] = [
    12, 13, 14, 15, 16, 17, //
    21, 22, 23, 24, 25, 26, 27, 28, //
    31, 32, 33, 34, 35, 36, 37, 38, //
    41, 42, 43, 44, 45, 46, 47, 48, //
    51, 52, 53, 54, 55, 56, 57, 58, //
    61, 62, 63, 64, 65, 66, 67, 68, //
    71, 72, 73, 74, 75, 76, 77, 78, //
    82, 83, 84, 85, 86, 87,
];

/// Label at each circular (hardware channel) index, in the channel order of
/// the MEA2100 60-channel headstage.
pub const CIRCULAR_LABELS: [u8; MEA60_SIZE] = [
    47, 48, 46, 45, 38, 37, 28, 36, 27, 17, //
    26, 16, 35, 25, 15, 14, 24, 34, 13, 23, //
    12, 22, 33, 21, 32, 31, 44, 43, 41, 42, //
    52, 51, 53, 54, 61, 62, 71, 63, 72, 82, //
    73, 83, 64, 74, 84, 85, 75, 65, 86, 76, //
    87, 77, 66, 78, 67, 68, 55, 56, 58, 57,
];

// One slot per possible two-digit label; `UNMAPPED` marks the gaps.
const LABEL_SLOTS: usize = 89;
const UNMAPPED: u8 = u8::MAX;

const fn invert(table: &[u8; MEA60_SIZE], base: u8) -> [u8; LABEL_SLOTS] {
    let mut inverse = [UNMAPPED; LABEL_SLOTS];
    let mut i = 0;
    while i < MEA60_SIZE {
        inverse[table[i] as usize] = i as u8 + base;
        i += 1;
    }
    inverse
}

const LABEL_TO_SEQUENTIAL: [u8; LABEL_SLOTS] = invert(&MEA60_LABELS, 1);
const LABEL_TO_CIRCULAR: [u8; LABEL_SLOTS] = invert(&CIRCULAR_LABELS, 0);

fn lookup(table: &[u8; LABEL_SLOTS], label: u8) -> Option<u8> {
    table
        .get(label as usize)
        .copied()
        .filter(|&v| v != UNMAPPED)
}

/// Returns true when `label` is one of the 60 MEA60 labels.
pub fn is_valid_label(label: u8) -> bool {
    lookup(&LABEL_TO_SEQUENTIAL, label).is_some()
}

/// Converts a label into its sequential index in `1..=60`.
pub fn label_to_index(label: u8) -> Result<u8> {
    lookup(&LABEL_TO_SEQUENTIAL, label).ok_or(MeaError::InvalidElectrode {
        kind: "label",
        value: label as i64,
    })
}

/// Converts a sequential index in `1..=60` back into its label.
pub fn index_to_label(index: u8) -> Result<u8> {
    match index {
        1..=60 => Ok(MEA60_LABELS[index as usize - 1]),
        _ => Err(MeaError::InvalidElectrode {
            kind: "sequential index",
            value: index as i64,
        }),
    }
}

/// Converts a label into its circular (hardware) index in `0..60`.
pub fn label_to_circular(label: u8) -> Result<usize> {
    lookup(&LABEL_TO_CIRCULAR, label)
        .map(usize::from)
        .ok_or(MeaError::InvalidElectrode {
            kind: "label",
            value: label as i64,
        })
}

/// Converts a circular (hardware) index in `0..60` into its label.
pub fn circular_to_label(index: usize) -> Result<u8> {
    CIRCULAR_LABELS
        .get(index)
        .copied()
        .ok_or(MeaError::InvalidElectrode {
            kind: "circular index",
            value: index as i64,
        })
}

/// Full MEA60 label list without the grounded electrodes.
///
/// Removing a label that is not in the list (an invalid label, or one given
/// twice in `grounded`) is an error.
pub fn mea_electrode_list(grounded: &[u8]) -> Result<Vec<u8>> {
    let mut labels = MEA60_LABELS.to_vec();
    for &g in grounded {
        let pos = labels
            .iter()
            .position(|&l| l == g)
            .ok_or(MeaError::InvalidElectrode {
                kind: "grounded label",
                value: g as i64,
            })?;
        labels.remove(pos);
    }
    Ok(labels)
}
