//! Error taxonomy for the attack.
//!
//! Configuration-phase errors are fatal; cleanup-phase errors are logged and
//! swallowed by the caller. "No frame available" is never an error; the
//! capture path models it as `Ok(None)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttackError {
    /// Radio could not be opened or is not in monitor mode.
    #[error("interface error on {iface}: {reason}")]
    Interface { iface: String, reason: String },

    /// Channel outside 1..=13, or the channel-set command failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Full channel sweep completed without seeing the target's beacon.
    #[error("no beacon received of network {0:?} — is monitor mode working? is the SSID correct?")]
    Discovery(String),

    /// Captured beacon lacks an element we need (unsupported target).
    #[error("beacon is missing the {0} element")]
    Profile(&'static str),

    /// The rogue hostapd could not be launched.
    #[error("failed to launch {command}: {source}")]
    ChildProcess {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("capture error: {0}")]
    Capture(#[from] pcap::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AttackError>;
