//! Wrappers for the OS commands that configure the radios.
//!
//! Everything here shells out synchronously: `ifconfig` for link state,
//! `iwconfig`/`iw` for monitor mode and channels, `macchanger` for hardware
//! address spoofing. Failures are fatal while configuring and merely logged
//! while cleaning up; that policy lives in the callers.

use std::io;
use std::process::Command;

/// Run a command, returning an `io::Error` carrying stderr on non-zero exit.
pub fn run(cmd: &str, args: &[&str]) -> io::Result<String> {
    let output = Command::new(cmd).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("`{cmd} {}` failed: {stderr}", args.join(" ")),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn interface_down(iface: &str) -> io::Result<()> {
    run("ifconfig", &[iface, "down"]).map(|_| ())
}

pub fn interface_up(iface: &str) -> io::Result<()> {
    run("ifconfig", &[iface, "up"]).map(|_| ())
}

pub fn set_monitor_mode(iface: &str) -> io::Result<()> {
    run("iwconfig", &[iface, "mode", "monitor"]).map(|_| ())
}

pub fn set_channel(iface: &str, channel: u8) -> io::Result<()> {
    let ch = channel.to_string();
    run("iw", &[iface, "set", "channel", &ch]).map(|_| ())
}

/// Spoof the interface hardware address. macchanger refuses with "It's the
/// same MAC!!" when the address is already set; that is not a failure.
pub fn set_mac_address(iface: &str, mac: &str) -> io::Result<()> {
    interface_down(iface)?;
    match run("macchanger", &["-m", mac, iface]) {
        Ok(_) => {}
        Err(e) if e.to_string().contains("It's the same MAC") => {
            log::debug!("{iface}: hardware address already {mac}");
        }
        Err(e) => return Err(e),
    }
    interface_up(iface)
}

/// Restore the interface's permanent hardware address.
pub fn restore_mac_address(iface: &str) -> io::Result<()> {
    run("macchanger", &["-p", iface]).map(|_| ())
}
