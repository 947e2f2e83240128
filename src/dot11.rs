//! 802.11 frame codec: frame-control accessors, tagged-element scanning, and
//! channel-switch element construction.
//!
//! Frames are plain byte slices (radiotap already stripped). The tag chain of
//! a management frame is an ordered sequence of (type, length, value) records
//! starting after the subtype-specific fixed fields.

pub const TYPE_MGMT: u8 = 0;
pub const TYPE_CTRL: u8 = 1;
pub const TYPE_DATA: u8 = 2;

pub const SUBTYPE_BEACON: u8 = 8;

/// Tagged-element type codes.
pub const ELEM_SSID: u8 = 0;
pub const ELEM_DS_CHANNEL: u8 = 3;
pub const ELEM_CSA: u8 = 37;

/// Minimum management frame header size (FC + Dur + Addr1 + Addr2 + Addr3 + SeqCtl).
const MGMT_HEADER_LEN: usize = 24;

/// Retry flag in the frame-control flags byte. Set on frames the kernel
/// echoes back after we inject them.
pub const FC_RETRY: u8 = 0x08;
/// Power-management flag (used only for diagnostics).
const FC_PWR_MGT: u8 = 0x10;
/// Protected-frame flag.
const FC_PROTECTED: u8 = 0x40;

pub fn frame_type(frame: &[u8]) -> u8 {
    (frame[0] >> 2) & 0x03
}

pub fn frame_subtype(frame: &[u8]) -> u8 {
    frame[0] >> 4
}

/// Frame-control flags byte (second byte of the frame).
pub fn fc_flags(frame: &[u8]) -> u8 {
    frame[1]
}

pub fn is_beacon(frame: &[u8]) -> bool {
    frame.len() >= 2 && frame_type(frame) == TYPE_MGMT && frame_subtype(frame) == SUBTYPE_BEACON
}

/// Sequence number from the sequence-control field.
pub fn sequence_number(frame: &[u8]) -> Option<u16> {
    if frame.len() < MGMT_HEADER_LEN {
        return None;
    }
    Some(u16::from_le_bytes([frame[22], frame[23]]) >> 4)
}

/// Transmitter address (addr2).
pub fn source_address(frame: &[u8]) -> Option<[u8; 6]> {
    if frame.len() < 16 {
        return None;
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&frame[10..16]);
    Some(mac)
}

/// Format a MAC address as a colon-separated hex string.
pub fn format_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Offset of the tagged-parameter chain, or `None` when the subtype carries
/// no chain. Beacons and probe responses have 12 bytes of fixed fields
/// (timestamp + interval + capabilities) before the first tag.
fn tagged_params_offset(frame: &[u8]) -> Option<usize> {
    if frame.len() < MGMT_HEADER_LEN || frame_type(frame) != TYPE_MGMT {
        return None;
    }
    match frame_subtype(frame) {
        8 | 5 => Some(MGMT_HEADER_LEN + 12), // beacon, probe response
        4 => Some(MGMT_HEADER_LEN),          // probe request
        _ => None,
    }
}

/// Value of the first tag-chain element matching `id`, or `None` when the
/// chain is absent, truncated, or has no match.
pub fn element_value(frame: &[u8], id: u8) -> Option<&[u8]> {
    let start = tagged_params_offset(frame)?;
    let body = frame.get(start..)?;
    let mut offset = 0;
    while offset + 2 <= body.len() {
        let tag = body[offset];
        let len = body[offset + 1] as usize;
        offset += 2;
        if offset + len > body.len() {
            break;
        }
        if tag == id {
            return Some(&body[offset..offset + len]);
        }
        offset += len;
    }
    None
}

/// Build a channel-switch announcement element: mode 1 (stations must hold
/// transmission until the switch completes), target channel, countdown.
pub fn build_csa(new_channel: u8, switch_count: u8) -> [u8; 5] {
    [ELEM_CSA, 3, 1, new_channel, switch_count]
}

/// Return a copy of `frame` with a CSA element appended as the new terminal
/// entry of its tag chain. The input is never mutated.
pub fn append_csa(frame: &[u8], new_channel: u8, switch_count: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() + 5);
    out.extend_from_slice(frame);
    out.extend_from_slice(&build_csa(new_channel, switch_count));
    out
}

fn deauth_reason(code: u16) -> String {
    match code {
        1 => "Unspecified".into(),
        2 => "Prev_Auth_No_Longer_Valid/Timeout".into(),
        3 => "STA_is_leaving".into(),
        4 => "Inactivity".into(),
        6 => "Unexp_Class2_Frame".into(),
        7 => "Unexp_Class3_Frame".into(),
        8 => "Leaving".into(),
        15 => "4-way_HS_timeout".into(),
        other => other.to_string(),
    }
}

/// True when a data frame carries an EAPOL payload (LLC/SNAP 88-8e).
fn is_eapol(frame: &[u8]) -> bool {
    // QoS data subtypes carry a 2-byte QoS control field after the header.
    let llc = if frame_subtype(frame) & 0x08 != 0 {
        MGMT_HEADER_LEN + 2
    } else {
        MGMT_HEADER_LEN
    };
    frame
        .get(llc..llc + 8)
        .map(|b| b == [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8e])
        .unwrap_or(false)
}

/// Diagnostic label for a frame. Never fails; anything unrecognized gets a
/// generic fallback.
pub fn classify(frame: &[u8]) -> String {
    if frame.len() < 2 {
        return format!("Frame(len={})", frame.len());
    }
    let seq = sequence_number(frame).unwrap_or(0);
    match (frame_type(frame), frame_subtype(frame)) {
        (TYPE_MGMT, 8) => format!("Beacon(seq={seq})"),
        (TYPE_MGMT, 4) => format!("ProbeReq(seq={seq})"),
        (TYPE_MGMT, 5) => format!("ProbeResp(seq={seq})"),
        (TYPE_MGMT, 11) => format!("Auth(seq={seq})"),
        (TYPE_MGMT, 12) => {
            let reason = frame
                .get(24..26)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .unwrap_or(0);
            format!("Deauth(seq={seq}, reason={})", deauth_reason(reason))
        }
        (TYPE_MGMT, 0) => format!("AssoReq(seq={seq})"),
        (TYPE_MGMT, 1) => format!("AssoResp(seq={seq})"),
        (TYPE_MGMT, 2) => format!("ReassoReq(seq={seq})"),
        (TYPE_MGMT, 3) => format!("ReassoResp(seq={seq})"),
        (TYPE_MGMT, 10) => format!("Disas(seq={seq})"),
        (TYPE_MGMT, 13) => format!("Action(seq={seq})"),
        (TYPE_CTRL, 9) => "BlockAck".into(),
        (TYPE_CTRL, 11) => "RTS".into(),
        (TYPE_CTRL, 13) => "Ack".into(),
        (TYPE_DATA, st) => {
            if fc_flags(frame) & FC_PROTECTED != 0 {
                format!("EncryptedData(seq={seq})")
            } else if is_eapol(frame) {
                format!("EAPOL(seq={seq})")
            } else if st == 4 {
                format!("Null(seq={seq}, sleep={})", fc_flags(frame) & FC_PWR_MGT != 0)
            } else if st == 12 {
                format!("QoS-Null(seq={seq}, sleep={})", fc_flags(frame) & FC_PWR_MGT != 0)
            } else {
                format!("Data(seq={seq}, subtype={st})")
            }
        }
        (ty, st) => format!("Frame(type={ty}, subtype={st}, len={})", frame.len()),
    }
}

/// Minimal beacon for tests: mgmt header + fixed fields + tagged elements.
#[cfg(test)]
pub(crate) fn test_beacon(elements: &[(u8, &[u8])]) -> Vec<u8> {
    let mut frame = vec![0x80, 0x00]; // frame control: beacon
    frame.extend_from_slice(&[0x00, 0x00]); // duration
    frame.extend_from_slice(&[0xff; 6]); // addr1: broadcast
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x11, 0x22, 0x33]); // addr2
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x11, 0x22, 0x33]); // addr3
    frame.extend_from_slice(&[0x10, 0x00]); // seq ctl (seq = 1)
    frame.extend_from_slice(&[0x00; 8]); // timestamp
    frame.extend_from_slice(&[0x64, 0x00]); // beacon interval
    frame.extend_from_slice(&[0x11, 0x04]); // capabilities
    for (id, value) in elements {
        frame.push(*id);
        frame.push(value.len() as u8);
        frame.extend_from_slice(value);
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_lookup_finds_first_match() {
        let frame = test_beacon(&[
            (ELEM_SSID, b"Target"),
            (ELEM_DS_CHANNEL, &[9]),
            (ELEM_DS_CHANNEL, &[4]),
        ]);
        assert_eq!(element_value(&frame, ELEM_SSID), Some(&b"Target"[..]));
        assert_eq!(element_value(&frame, ELEM_DS_CHANNEL), Some(&[9u8][..]));
    }

    #[test]
    fn element_lookup_none_without_chain() {
        // An ack control frame has no tag chain at all.
        let ack = [0xd4, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(element_value(&ack, ELEM_SSID), None);
        // A beacon whose chain lacks the element.
        let frame = test_beacon(&[(ELEM_SSID, b"x")]);
        assert_eq!(element_value(&frame, ELEM_CSA), None);
    }

    #[test]
    fn element_lookup_stops_at_truncated_chain() {
        let mut frame = test_beacon(&[(ELEM_SSID, b"Target")]);
        frame.push(ELEM_DS_CHANNEL);
        frame.push(200); // claims 200 bytes that are not there
        assert_eq!(element_value(&frame, ELEM_DS_CHANNEL), None);
    }

    #[test]
    fn append_csa_leaves_input_untouched() {
        let frame = test_beacon(&[(ELEM_SSID, b"Target"), (ELEM_DS_CHANNEL, &[9])]);
        let before = frame.clone();
        let forged = append_csa(&frame, 11, 1);
        assert_eq!(frame, before);
        assert_eq!(forged.len(), frame.len() + 5);
        assert_eq!(&forged[..frame.len()], &frame[..]);
        assert_eq!(element_value(&forged, ELEM_CSA), Some(&[1u8, 11, 1][..]));
    }

    #[test]
    fn csa_element_payload() {
        assert_eq!(build_csa(11, 2), [ELEM_CSA, 3, 1, 11, 2]);
    }

    #[test]
    fn classify_labels() {
        let beacon = test_beacon(&[(ELEM_SSID, b"Target")]);
        assert_eq!(classify(&beacon), "Beacon(seq=1)");
        let ack = [0xd4, 0x00];
        assert_eq!(classify(&ack), "Ack");
        assert_eq!(classify(&[]), "Frame(len=0)");
    }

    #[test]
    fn source_address_is_addr2() {
        let frame = test_beacon(&[]);
        let mac = source_address(&frame).unwrap();
        assert_eq!(format_mac(&mac), "02:00:00:11:22:33");
    }
}
