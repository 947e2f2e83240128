//! Radiotap header synthesis and parsing.
//!
//! Two concerns live here: building the minimal header we prepend to injected
//! frames, and picking apart the headers the driver prepends to captures.
//! The parsing side has to reproduce the variable-length present-bitmap walk
//! exactly: drivers disagree about which fields they emit, and the offset of
//! the Flags field (which tells us whether an FCS trailer is attached) moves
//! around accordingly.

use crate::error::{AttackError, Result};

// Present-bitmap bits we care about.
pub const RT_TSFT: u32 = 1 << 0;
pub const RT_FLAGS: u32 = 1 << 1;
pub const RT_RATE: u32 = 1 << 2;
pub const RT_CHANNEL: u32 = 1 << 3;
pub const RT_ANTENNA: u32 = 1 << 11;
pub const RT_RX_FLAGS: u32 = 1 << 14;

/// Bit within the Flags *field value* signalling that the frame ends with an
/// FCS trailer.
pub const FLAG_FCS_AT_END: u8 = 0x10;

/// 2.4 GHz centre frequencies for channels 1–11. Channels 12/13 are not in
/// this table, so metadata-attached injection on them is unsupported.
const CHANNEL_FREQ_MHZ: [u16; 11] = [
    2412, 2417, 2422, 2427, 2432, 2437, 2442, 2447, 2452, 2457, 2462,
];

/// Channel flags for the synthesized header: 2.4 GHz spectrum + CCK.
const CHANNEL_FLAGS_2GHZ_CCK: u16 = 0x00a0;

/// Parsed fixed part of a radiotap header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    /// Total header length (offset where the 802.11 frame begins).
    pub len: usize,
    /// First present word (continuation words are only consulted for the
    /// Flags-field offset walk).
    pub present: u32,
}

impl Header {
    pub fn has(&self, bit: u32) -> bool {
        self.present & bit != 0
    }
}

/// Parse the fixed radiotap preamble. `None` for anything that is not a
/// version-0 radiotap capture.
pub fn parse(data: &[u8]) -> Option<Header> {
    if data.len() < 8 || data[0] != 0 {
        return None;
    }
    let len = u16::from_le_bytes([data[2], data[3]]) as usize;
    if len < 8 || data.len() < len {
        return None;
    }
    let present = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    Some(Header { len, present })
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Byte offset of the Flags field value within a raw radiotap capture.
///
/// The field data starts after the present-bitmap chain: each 32-bit present
/// word whose top bit is set is followed by another word. When TSFT is
/// present it precedes Flags, is 8-byte aligned, and occupies 8 bytes.
/// Returns `None` when the Flags field is absent or the header is truncated.
pub fn flags_field_offset(data: &[u8]) -> Option<usize> {
    let hdr = parse(data)?;
    if !hdr.has(RT_FLAGS) {
        return None;
    }
    let mut pos = 8;
    while data.get(pos - 1)? & 0x80 != 0 {
        pos += 4;
    }
    if hdr.has(RT_TSFT) {
        pos = align_up(pos, 8) + 8;
    }
    if pos >= hdr.len {
        return None;
    }
    Some(pos)
}

/// Value of the Flags field, if present.
pub fn flags(data: &[u8]) -> Option<u8> {
    let pos = flags_field_offset(data)?;
    data.get(pos).copied()
}

pub fn channel_frequency(channel: u8) -> Option<u16> {
    if (1..=11).contains(&channel) {
        Some(CHANNEL_FREQ_MHZ[channel as usize - 1])
    } else {
        None
    }
}

/// Build the minimal injection header: Flags + Channel + Antenna + RX flags,
/// 18 bytes total. Channels outside the frequency table are rejected.
pub fn injection_header(channel: u8) -> Result<Vec<u8>> {
    let freq = channel_frequency(channel).ok_or_else(|| {
        AttackError::Channel(format!(
            "channel {channel} has no entry in the injection frequency table"
        ))
    })?;

    let present = RT_FLAGS | RT_CHANNEL | RT_ANTENNA | RT_RX_FLAGS;
    let mut hdr = Vec::with_capacity(18);
    hdr.push(0x00); // version
    hdr.push(0x00); // pad
    hdr.extend_from_slice(&18u16.to_le_bytes());
    hdr.extend_from_slice(&present.to_le_bytes());
    hdr.push(0x00); // flags
    hdr.push(0x00); // pad to 2-byte alignment for the channel field
    hdr.extend_from_slice(&freq.to_le_bytes());
    hdr.extend_from_slice(&CHANNEL_FLAGS_2GHZ_CCK.to_le_bytes());
    hdr.push(0x00); // antenna
    hdr.push(0x00); // pad to 2-byte alignment for rx flags
    hdr.extend_from_slice(&0u16.to_le_bytes());
    debug_assert_eq!(hdr.len(), 18);
    Ok(hdr)
}
