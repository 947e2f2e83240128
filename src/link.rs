//! One monitor-mode radio: pcap capture + raw injection.
//!
//! `recv` lowers every capture through the same funnel: radiotap parse,
//! control-frame drop, self-echo drop, FCS strip. The funnel itself is a pure
//! function over the raw bytes so it can be exercised without a radio.
//!
//! Echo detection is heuristic. The kernel's tx radiotap header carries
//! rate/tx-flags but no channel field, while genuine rx headers carry the
//! channel, so "channel absent, rate present" marks a frame we injected and
//! re-observed ourselves. Frames we injected but that the *other* radio
//! captured over the air are not caught.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use pcap::{Active, Capture, Linktype, Packet, PacketHeader, Savefile};

use crate::dot11;
use crate::error::{AttackError, Result};
use crate::radiotap;

const DLT_IEEE802_11_RADIO: i32 = 127;

/// Capture-metadata summary attached to every received frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureMeta {
    /// First radiotap present word.
    pub present: u32,
    /// Radiotap Flags field value, when the field exists.
    pub flags: Option<u8>,
    pub channel_present: bool,
    pub rate_present: bool,
    /// Whether a 4-byte FCS trailer was removed from `dot11`.
    pub fcs_stripped: bool,
}

/// A frame delivered by `recv`: the lowered 802.11 bytes plus the raw
/// capture including its radiotap header.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub dot11: Vec<u8>,
    pub raw: Vec<u8>,
    pub meta: CaptureMeta,
}

/// Outcome of lowering one raw capture.
#[derive(Debug)]
enum Lowered {
    /// Not a radiotap-wrapped 802.11 frame.
    NotWireless,
    /// Control-type frame; uninteresting.
    Control,
    /// A frame this process injected, re-observed by its own radio.
    Echo,
    Frame(CapturedFrame),
}

/// Lower a raw radiotap capture into an 802.11 frame.
fn lower(raw: &[u8], strict_echo: bool) -> Lowered {
    let hdr = match radiotap::parse(raw) {
        Some(hdr) => hdr,
        None => return Lowered::NotWireless,
    };
    let frame = &raw[hdr.len..];
    if frame.len() < 2 {
        return Lowered::NotWireless;
    }
    if dot11::frame_type(frame) == dot11::TYPE_CTRL {
        return Lowered::Control;
    }

    let channel_present = hdr.has(radiotap::RT_CHANNEL);
    let rate_present = hdr.has(radiotap::RT_RATE);
    let possible_injection = !channel_present && rate_present;
    if dot11::fc_flags(frame) & dot11::FC_RETRY != 0 && (!strict_echo || possible_injection) {
        return Lowered::Echo;
    }

    let flags = radiotap::flags(raw);
    let mut lowered = frame.to_vec();
    let mut fcs_stripped = false;
    if let Some(f) = flags {
        if f & radiotap::FLAG_FCS_AT_END != 0 && lowered.len() > 4 {
            lowered.truncate(lowered.len() - 4);
            fcs_stripped = true;
        }
    }

    Lowered::Frame(CapturedFrame {
        dot11: lowered,
        raw: raw.to_vec(),
        meta: CaptureMeta {
            present: hdr.present,
            flags,
            channel_present,
            rate_present,
            fcs_stripped,
        },
    })
}

pub struct MonitorLink {
    iface: String,
    cap: Option<Capture<Active>>,
    mirror: Option<Savefile>,
    strict_echo: bool,
}

impl MonitorLink {
    /// Bind to a monitor-mode radio. A radio whose datalink cannot be set to
    /// radiotap is not in monitor mode and is rejected.
    pub fn open(iface: &str, mirror_prefix: Option<&Path>, strict_echo: bool) -> Result<Self> {
        let interface_err = |reason: String| AttackError::Interface {
            iface: iface.to_string(),
            reason,
        };

        let mut cap = Capture::from_device(iface)
            .and_then(|c| {
                c.promisc(true)
                    .snaplen(65535)
                    .timeout(1000)
                    .immediate_mode(true)
                    .open()
            })
            .map_err(|e| interface_err(e.to_string()))?;

        if let Err(e) = cap.set_datalink(Linktype(DLT_IEEE802_11_RADIO)) {
            log::debug!("{iface}: could not set radiotap datalink: {e}");
        }
        let dlt = cap.get_datalink();
        if dlt.0 != DLT_IEEE802_11_RADIO {
            return Err(interface_err(format!(
                "datalink is {} ({}), not radiotap — interface is not in monitor mode",
                dlt.0,
                dlt.get_name().unwrap_or_default(),
            )));
        }

        let mirror = match mirror_prefix {
            Some(prefix) => {
                let path = format!("{}.{}.pcap", prefix.display(), iface);
                log::info!("{iface}: mirroring traffic to {path}");
                Some(cap.savefile(&path)?)
            }
            None => None,
        };

        Ok(Self {
            iface: iface.to_string(),
            cap: Some(cap),
            mirror,
            strict_echo,
        })
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// Synchronous channel set; rejects channels outside 1..=13.
    pub fn set_channel(&self, channel: u8) -> Result<()> {
        if !(1..=13).contains(&channel) {
            return Err(AttackError::Channel(format!(
                "channel {channel} outside 1..=13"
            )));
        }
        crate::platform::set_channel(&self.iface, channel)
            .map_err(|e| AttackError::Channel(e.to_string()))
    }

    /// Inject a frame. With `attach_radiotap` a minimal metadata header for
    /// `channel` is prepended; otherwise the bytes go out unmodified.
    pub fn send(&mut self, frame: &[u8], attach_radiotap: bool, channel: u8) -> Result<()> {
        let buf = if attach_radiotap {
            let mut buf = radiotap::injection_header(channel)?;
            buf.extend_from_slice(frame);
            buf
        } else {
            frame.to_vec()
        };

        let cap = self.cap.as_mut().ok_or_else(|| AttackError::Interface {
            iface: self.iface.clone(),
            reason: "link is closed".into(),
        })?;
        cap.sendpacket(buf.as_slice())?;

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.write(&Packet::new(&now_header(buf.len()), &buf));
        }
        log::debug!("{}: injected frame {}", self.iface, dot11::classify(frame));
        Ok(())
    }

    /// Blocking receive with a 1 s timeout. `Ok(None)` when nothing usable
    /// arrived: timeout, non-wireless capture, control frame, or self-echo.
    pub fn recv(&mut self) -> Result<Option<CapturedFrame>> {
        let cap = self.cap.as_mut().ok_or_else(|| AttackError::Interface {
            iface: self.iface.clone(),
            reason: "link is closed".into(),
        })?;

        let (raw, header) = match cap.next_packet() {
            Ok(packet) => (packet.data.to_vec(), *packet.header),
            Err(pcap::Error::TimeoutExpired) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.write(&Packet::new(&header, &raw));
        }

        match lower(&raw, self.strict_echo) {
            Lowered::NotWireless => {
                log::trace!("{}: ignoring non-wireless capture", self.iface);
                Ok(None)
            }
            Lowered::Control => {
                log::trace!("{}: ignoring control frame", self.iface);
                Ok(None)
            }
            Lowered::Echo => {
                log::debug!("{}: ignoring echoed frame", self.iface);
                Ok(None)
            }
            Lowered::Frame(frame) => {
                log::trace!(
                    "{}: received frame {}",
                    self.iface,
                    dot11::classify(&frame.dot11)
                );
                Ok(Some(frame))
            }
        }
    }

    /// Idempotent: flushes the mirror file and releases the radio handle.
    pub fn close(&mut self) {
        if let Some(mut mirror) = self.mirror.take() {
            if let Err(e) = mirror.flush() {
                log::warn!("{}: mirror flush failed: {e}", self.iface);
            }
        }
        self.cap = None;
    }
}

/// Pcap record header stamped with the current wall-clock time, for mirrored
/// injected frames (received frames reuse the driver's header).
fn now_header(len: usize) -> PacketHeader {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    PacketHeader {
        ts: libc::timeval {
            tv_sec: now.as_secs() as libc::time_t,
            tv_usec: now.subsec_micros() as libc::suseconds_t,
        },
        caplen: len as u32,
        len: len as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot11::test_beacon;
    use crate::radiotap::{RT_CHANNEL, RT_FLAGS, RT_RATE};

    /// Raw capture: radiotap header with the given present word and field
    /// bytes, followed by the 802.11 frame.
    fn raw_capture(present: u32, fields: &[u8], frame: &[u8]) -> Vec<u8> {
        let len = 8 + fields.len();
        let mut data = vec![0x00, 0x00];
        data.extend_from_slice(&(len as u16).to_le_bytes());
        data.extend_from_slice(&present.to_le_bytes());
        data.extend_from_slice(fields);
        data.extend_from_slice(frame);
        data
    }

    fn rx_fields() -> Vec<u8> {
        // Flags (no FCS) + pad + channel freq/flags.
        vec![0x00, 0x00, 0x6c, 0x09, 0xa0, 0x00]
    }

    #[test]
    fn control_frames_are_dropped() {
        let ack = [0xd4, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let raw = raw_capture(RT_FLAGS | RT_CHANNEL, &rx_fields(), &ack);
        assert!(matches!(lower(&raw, false), Lowered::Control));
    }

    #[test]
    fn non_radiotap_is_not_wireless() {
        let mut raw = raw_capture(RT_FLAGS | RT_CHANNEL, &rx_fields(), &test_beacon(&[]));
        raw[0] = 1; // bad version
        assert!(matches!(lower(&raw, false), Lowered::NotWireless));
    }

    #[test]
    fn retry_frames_are_echoes_by_default() {
        let mut beacon = test_beacon(&[]);
        beacon[1] |= dot11::FC_RETRY;
        let raw = raw_capture(RT_FLAGS | RT_CHANNEL, &rx_fields(), &beacon);
        assert!(matches!(lower(&raw, false), Lowered::Echo));
    }

    #[test]
    fn strict_echo_needs_injection_signature() {
        let mut beacon = test_beacon(&[]);
        beacon[1] |= dot11::FC_RETRY;

        // Channel present: a genuine rx header, kept in strict mode.
        let raw = raw_capture(RT_FLAGS | RT_CHANNEL, &rx_fields(), &beacon);
        assert!(matches!(lower(&raw, true), Lowered::Frame(_)));

        // Channel absent + rate present: the tx-header signature, dropped.
        let raw = raw_capture(RT_RATE, &[0x02], &beacon);
        assert!(matches!(lower(&raw, true), Lowered::Echo));
    }

    #[test]
    fn fcs_trailer_is_stripped() {
        let beacon = test_beacon(&[(dot11::ELEM_SSID, b"Target")]);
        let mut with_fcs = beacon.clone();
        with_fcs.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        // Flags field value 0x10: FCS at end.
        let raw = raw_capture(RT_FLAGS | RT_CHANNEL, &[0x10, 0x00, 0x6c, 0x09, 0xa0, 0x00], &with_fcs);
        match lower(&raw, false) {
            Lowered::Frame(f) => {
                assert_eq!(f.dot11, beacon);
                assert!(f.meta.fcs_stripped);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn no_trailer_without_fcs_flag() {
        let beacon = test_beacon(&[(dot11::ELEM_SSID, b"Target")]);
        let raw = raw_capture(RT_FLAGS | RT_CHANNEL, &rx_fields(), &beacon);
        match lower(&raw, false) {
            Lowered::Frame(f) => {
                assert_eq!(f.dot11, beacon);
                assert!(!f.meta.fcs_stripped);
                assert!(f.meta.channel_present);
                assert!(!f.meta.rate_present);
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }
}
