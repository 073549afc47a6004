use std::{env, error::Error, fs, net::Ipv4Addr, path::Path};

use serde::Deserialize;

#[derive(Deserialize)]
struct RawStaticIp {
    address: Ipv4Addr,
    netmask: Ipv4Addr,
    gateway: Ipv4Addr,
    dns: Ipv4Addr,
}

#[derive(Deserialize)]
struct RawUdpLog {
    ip: Ipv4Addr,
    port: u16,
}

#[derive(Deserialize)]
struct RawOta {
    hostname: String,
    port: u16,
}

#[derive(Deserialize)]
struct RawConfig {
    wifi_ssid: String,
    wifi_psk: String,
    hostname: String,
    static_ip: Option<RawStaticIp>,
    udp_log: Option<RawUdpLog>,
    ota: Option<RawOta>,
    mqtt_hostname: String,
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    mqtt_client_id: String,
    mqtt_max_packet_size: u16,
    mqtt_topic_prefix: String,
    mqtt_keepalive_topic: Option<String>,
    sample_interval_ms: u32,
    ntp_server: String,
    utc_offset_minutes: i16,
    hour_sleep: u8,
    hour_awake: u8,
    graph_power_full_scale_w: f32,
}

fn octets(addr: Ipv4Addr) -> String {
    let [a, b, c, d] = addr.octets();
    format!("[{a}, {b}, {c}, {d}]")
}

fn main() -> Result<(), Box<dyn Error>> {
    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed=cfg.toml");
    println!("cargo:rerun-if-changed=cfg.toml.example");

    // A missing cfg.toml falls back to the example so host tests still build
    let path = if Path::new("cfg.toml").exists() {
        "cfg.toml"
    } else {
        println!("cargo:warning=cfg.toml not found, using cfg.toml.example");
        "cfg.toml.example"
    };

    // Read and parse
    let toml_str = fs::read_to_string(path)?;
    let raw: RawConfig = toml::from_str(&toml_str)?;

    let static_ip = match raw.static_ip {
        Some(ip) => format!(
            "Some(StaticIp {{ address: {}, netmask: {}, gateway: {}, dns: {} }})",
            octets(ip.address),
            octets(ip.netmask),
            octets(ip.gateway),
            octets(ip.dns)
        ),
        None => "None".into(),
    };

    let udp_log = match raw.udp_log {
        Some(log) => format!(
            "Some(UdpLog {{ ip: {}, port: {} }})",
            octets(log.ip),
            log.port
        ),
        None => "None".into(),
    };

    let ota = match raw.ota {
        Some(ota) => format!(
            "Some(OtaServer {{ hostname: {:?}, port: {} }})",
            ota.hostname, ota.port
        ),
        None => "None".into(),
    };

    // Generate Rust code
    let code = format!(
        r#"
        pub const CONFIG: Config = Config {{
            wifi_ssid: {ssid:?},
            wifi_psk: {psk:?},
            hostname: {host:?},
            static_ip: {static_ip},
            udp_log: {udp_log},
            ota: {ota},
            mqtt_hostname: {mh:?},
            mqtt_port: {mp},
            mqtt_username: {mu:?},
            mqtt_password: {mpw:?},
            mqtt_client_id: {mc:?},
            mqtt_max_packet_size: {mps},
            mqtt_topic_prefix: {prefix:?},
            mqtt_keepalive_topic: {keepalive:?},
            sample_interval_ms: {intv},
            ntp_server: {ntp:?},
            utc_offset_minutes: {utc},
            hour_sleep: {sleep},
            hour_awake: {awake},
            graph_power_full_scale_w: {scale:?},
        }};
    "#,
        ssid = raw.wifi_ssid,
        psk = raw.wifi_psk,
        host = raw.hostname,
        mh = raw.mqtt_hostname,
        mp = raw.mqtt_port,
        mu = raw.mqtt_username,
        mpw = raw.mqtt_password,
        mc = raw.mqtt_client_id,
        mps = raw.mqtt_max_packet_size,
        prefix = raw.mqtt_topic_prefix,
        keepalive = raw.mqtt_keepalive_topic,
        intv = raw.sample_interval_ms,
        ntp = raw.ntp_server,
        utc = raw.utc_offset_minutes,
        sleep = raw.hour_sleep,
        awake = raw.hour_awake,
        scale = raw.graph_power_full_scale_w,
    );

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    fs::write(dest_path, code)?;
    Ok(())
}
