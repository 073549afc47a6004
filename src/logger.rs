use embassy_net::{
    udp::{PacketMetadata, UdpSocket},
    IpAddress, IpEndpoint, Ipv4Address, Stack,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{LevelFilter, Log, Metadata, Record};

use mqtt_oled_mon::config::UdpLog;
use mqtt_oled_mon::constants::LOG_QUEUE_DEPTH;
use mqtt_oled_mon::log_line::{format_line, Forwarder};

static LOGGER: Logger = Logger;

/// Lines waiting for the UDP sender, only filled while UDP logging is enabled
static FORWARDER: Forwarder<CriticalSectionRawMutex, LOG_QUEUE_DEPTH> = Forwarder::new();

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record.level(), record.target(), *record.args());
        esp_println::println!("{}", line);
        FORWARDER.offer(line);
    }

    fn flush(&self) {}
}

/// Installs the console logger, lines are forwarded over UDP when `udp` is set
pub fn init(level: LevelFilter, udp: bool) {
    FORWARDER.enable(udp);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[embassy_executor::task]
pub async fn udp_log_task(stack: Stack<'static>, target: UdpLog) {
    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0; 16];
    let mut tx_meta = [PacketMetadata::EMPTY; LOG_QUEUE_DEPTH];
    let mut tx_buffer = [0; 1024];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    if socket.bind(target.port).is_err() {
        esp_println::println!("UDP log: bind to port {} failed", target.port);
        return;
    }

    let [a, b, c, d] = target.ip;
    let endpoint = IpEndpoint::new(IpAddress::Ipv4(Ipv4Address::new(a, b, c, d)), target.port);

    loop {
        let line = FORWARDER.next().await;
        // logging here would feed the queue it drains
        if socket.send_to(line.as_bytes(), endpoint).await.is_err() {
            esp_println::println!("UDP log: send failed");
        }

        let dropped = FORWARDER.take_dropped();
        if dropped > 0 {
            esp_println::println!("UDP log: {} lines dropped", dropped);
        }
    }
}
