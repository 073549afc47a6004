use crate::topic::{full_path, TopicId};

/// Static IPv4 settings, DHCP is used when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIp {
    pub address: [u8; 4],
    pub netmask: [u8; 4],
    pub gateway: [u8; 4],
    pub dns: [u8; 4],
}

/// Receiver of the UDP log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpLog {
    pub ip: [u8; 4],
    pub port: u16,
}

/// Firmware update server, updates are disabled when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaServer {
    pub hostname: &'static str,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'static str,

    // Wi-Fi pre-shared key (password)
    pub wifi_psk: &'static str,

    // DHCP hostname
    pub hostname: &'static str,

    // Static address (optional, DHCP otherwise)
    pub static_ip: Option<StaticIp>,

    // UDP log receiver (optional)
    pub udp_log: Option<UdpLog>,

    // Firmware update server (optional)
    pub ota: Option<OtaServer>,

    // MQTT broker hostname or IP address
    pub mqtt_hostname: &'static str,

    // MQTT port (usually 1883)
    pub mqtt_port: u16,

    // MQTT username for authentication (optional)
    pub mqtt_username: Option<&'static str>,

    // MQTT password for authentication (optional)
    pub mqtt_password: Option<&'static str>,

    // MQTT client ID, must be unique on the broker
    pub mqtt_client_id: &'static str,

    // Size of the MQTT client buffers
    pub mqtt_max_packet_size: u16,

    // Prefix shared by all subscribed topics, without trailing slash
    pub mqtt_topic_prefix: &'static str,

    // Topic published on every sample tick (optional)
    pub mqtt_keepalive_topic: Option<&'static str>,

    // Sampling and keepalive interval in milliseconds
    pub sample_interval_ms: u32,

    // SNTP server hostname
    pub ntp_server: &'static str,

    // Local time offset from UTC
    pub utc_offset_minutes: i16,

    // Hour at which the panels switch off
    pub hour_sleep: u8,

    // Hour at which the panels switch back on
    pub hour_awake: u8,

    // Power in watts drawn at full graph height
    pub graph_power_full_scale_w: f32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    EmptyField(&'static str),
    InvalidHour(u8),
    InvalidUtcOffset,
    EmptyNightWindow,
    InvalidTopicPrefix,
    TopicPathTooLong,
    InvalidKeepaliveTopic,
    InvalidInterval,
    PacketSizeTooSmall,
    InvalidFullScale,
    Netmask,
}

fn has_wildcard(topic: &str) -> bool {
    topic.contains(|c: char| c == '+' || c == '#')
}

/// Smallest packet size still holding a subscribe for one full topic path
pub const MIN_PACKET_SIZE: u16 = 128;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("wifi_ssid", self.wifi_ssid),
            ("hostname", self.hostname),
            ("mqtt_hostname", self.mqtt_hostname),
            ("mqtt_client_id", self.mqtt_client_id),
            ("ntp_server", self.ntp_server),
        ] {
            if value.is_empty() {
                return Err(ConfigError::EmptyField(name));
            }
        }

        for hour in [self.hour_sleep, self.hour_awake] {
            if hour > 23 {
                return Err(ConfigError::InvalidHour(hour));
            }
        }
        if self.hour_sleep == self.hour_awake {
            return Err(ConfigError::EmptyNightWindow);
        }
        // chrono rejects offsets of a whole day
        if self.utc_offset_minutes.unsigned_abs() >= 24 * 60 {
            return Err(ConfigError::InvalidUtcOffset);
        }

        let prefix = self.mqtt_topic_prefix;
        if prefix.is_empty() || prefix.ends_with('/') || has_wildcard(prefix) {
            return Err(ConfigError::InvalidTopicPrefix);
        }
        for id in TopicId::ALL {
            full_path(prefix, id).map_err(|_| ConfigError::TopicPathTooLong)?;
        }

        if let Some(topic) = self.mqtt_keepalive_topic {
            if topic.is_empty() || has_wildcard(topic) {
                return Err(ConfigError::InvalidKeepaliveTopic);
            }
        }

        if self.sample_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.mqtt_max_packet_size < MIN_PACKET_SIZE {
            return Err(ConfigError::PacketSizeTooSmall);
        }
        let scale = self.graph_power_full_scale_w;
        if scale.is_nan() || scale <= 0.0 {
            return Err(ConfigError::InvalidFullScale);
        }

        if let Some(ip) = self.static_ip {
            netmask_prefix_len(ip.netmask)?;
        }
        if let Some(ota) = self.ota {
            if ota.hostname.is_empty() {
                return Err(ConfigError::EmptyField("ota.hostname"));
            }
        }

        Ok(())
    }
}

/// Converts a dotted netmask into a CIDR prefix length.
/// The set bits must be contiguous from the top.
pub fn netmask_prefix_len(netmask: [u8; 4]) -> Result<u8, ConfigError> {
    let mask = u32::from_be_bytes(netmask);
    let len = mask.leading_ones();
    if mask.checked_shl(len).unwrap_or(0) != 0 {
        return Err(ConfigError::Netmask);
    }
    Ok(len as u8)
}

// config values are generated at compile time
include!(concat!(env!("OUT_DIR"), "/config.rs"));

#[cfg(test)]
mod test {
    use super::*;

    const VALID: Config = Config {
        wifi_ssid: "ssid",
        wifi_psk: "psk",
        hostname: "MQTT_OLED_MON",
        static_ip: Some(StaticIp {
            address: [192, 168, 178, 155],
            netmask: [255, 255, 255, 0],
            gateway: [192, 168, 178, 1],
            dns: [8, 8, 8, 8],
        }),
        udp_log: None,
        ota: Some(OtaServer {
            hostname: "ota.local",
            port: 8080,
        }),
        mqtt_hostname: "192.168.178.222",
        mqtt_port: 1883,
        mqtt_username: None,
        mqtt_password: None,
        mqtt_client_id: "mqtt_oled_mon_1",
        mqtt_max_packet_size: 1024,
        mqtt_topic_prefix: "myhouse/victron_cerbo_N/ed3a43se2345",
        mqtt_keepalive_topic: None,
        sample_interval_ms: 10_000,
        ntp_server: "pool.ntp.org",
        utc_offset_minutes: 60,
        hour_sleep: 22,
        hour_awake: 6,
        graph_power_full_scale_w: 10_000.0,
    };

    #[test]
    fn valid_config() {
        assert_eq!(VALID.validate(), Ok(()));
    }

    #[test]
    fn generated_config_is_valid() {
        assert_eq!(CONFIG.validate(), Ok(()));
    }

    #[test]
    fn empty_ssid() {
        let config = Config {
            wifi_ssid: "",
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyField("wifi_ssid")));
    }

    #[test]
    fn hours() {
        let config = Config {
            hour_sleep: 24,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidHour(24)));

        let config = Config {
            hour_sleep: 6,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyNightWindow));

        let config = Config {
            utc_offset_minutes: -1440,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidUtcOffset));
    }

    #[test]
    fn topic_prefix() {
        for prefix in ["", "myhouse/", "myhouse/+/x", "myhouse/#"] {
            let config = Config {
                mqtt_topic_prefix: prefix,
                ..VALID
            };
            assert_eq!(config.validate(), Err(ConfigError::InvalidTopicPrefix));
        }
    }

    #[test]
    fn prefix_too_long_for_topic_paths() {
        let long: &'static str = "x".repeat(100).leak();
        let config = Config {
            mqtt_topic_prefix: long,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::TopicPathTooLong));
    }

    #[test]
    fn keepalive_topic() {
        let config = Config {
            mqtt_keepalive_topic: Some("R/ed3a43se2345/keepalive"),
            ..VALID
        };
        assert_eq!(config.validate(), Ok(()));

        for topic in ["", "R/+/keepalive"] {
            let config = Config {
                mqtt_keepalive_topic: Some(topic),
                ..VALID
            };
            assert_eq!(config.validate(), Err(ConfigError::InvalidKeepaliveTopic));
        }
    }

    #[test]
    fn empty_ota_hostname() {
        let config = Config {
            ota: Some(OtaServer {
                hostname: "",
                port: 80,
            }),
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyField("ota.hostname")));
    }

    #[test]
    fn numeric_limits() {
        let config = Config {
            sample_interval_ms: 0,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidInterval));

        let config = Config {
            mqtt_max_packet_size: 64,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::PacketSizeTooSmall));

        let config = Config {
            graph_power_full_scale_w: f32::NAN,
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidFullScale));
    }

    #[test]
    fn bad_static_netmask() {
        let config = Config {
            static_ip: Some(StaticIp {
                netmask: [255, 0, 255, 0],
                ..VALID.static_ip.unwrap()
            }),
            ..VALID
        };
        assert_eq!(config.validate(), Err(ConfigError::Netmask));
    }

    #[test]
    fn prefix_len() {
        assert_eq!(netmask_prefix_len([255, 255, 255, 0]), Ok(24));
        assert_eq!(netmask_prefix_len([255, 255, 240, 0]), Ok(20));
        assert_eq!(netmask_prefix_len([255, 255, 255, 255]), Ok(32));
        assert_eq!(netmask_prefix_len([0, 0, 0, 0]), Ok(0));
        assert_eq!(netmask_prefix_len([255, 255, 0, 255]), Err(ConfigError::Netmask));
    }
}
