use core::cell::Cell;
use core::net::{IpAddr, SocketAddr};

use embassy_net::{
    udp::{PacketMetadata, UdpSocket},
    IpAddress, IpEndpoint, Stack,
};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::{Duration, Instant, Timer};
use log::{error, info};
use sntpc::{NtpContext, NtpTimestampGenerator, NtpUdpSocket};

use mqtt_oled_mon::clock::WallClock;
use mqtt_oled_mon::config::CONFIG;
use mqtt_oled_mon::constants::{NTP_PORT, NTP_SYNC_INTERVAL_SECS, WIFI_RECONNECT_DELAY_MS};

use crate::wifi::resolve;

/// Shared with the session, which derives the local hour from it
pub static CLOCK: Mutex<CriticalSectionRawMutex, Cell<WallClock>> =
    Mutex::new(Cell::new(WallClock::new()));

#[derive(Debug)]
pub enum Error {
    DnsLookupFailed,
    Bind,
    #[allow(dead_code)]
    Sntp(sntpc::Error),
}

struct Socket<'a>(UdpSocket<'a>);

impl NtpUdpSocket for Socket<'_> {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> sntpc::Result<usize> {
        let SocketAddr::V4(addr) = addr else {
            return Err(sntpc::Error::Network);
        };
        let endpoint = IpEndpoint::new(IpAddress::Ipv4(*addr.ip()), addr.port());
        self.0
            .send_to(buf, endpoint)
            .await
            .map_err(|_| sntpc::Error::Network)?;
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> sntpc::Result<(usize, SocketAddr)> {
        let (len, meta) = self
            .0
            .recv_from(buf)
            .await
            .map_err(|_| sntpc::Error::Network)?;
        let IpAddress::Ipv4(ip) = meta.endpoint.addr;
        Ok((len, SocketAddr::new(IpAddr::V4(ip), meta.endpoint.port)))
    }
}

#[derive(Copy, Clone, Default)]
struct TimestampGen;

impl NtpTimestampGenerator for TimestampGen {
    fn init(&mut self) {}

    fn timestamp_sec(&self) -> u64 {
        0
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        0
    }
}

/// Queries the configured server once and returns the unix time in seconds
pub async fn query(stack: Stack<'_>) -> Result<u64, Error> {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0; 256];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0; 256];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(NTP_PORT).map_err(|_| Error::Bind)?;
    let socket = Socket(socket);

    let addr = resolve(stack, CONFIG.ntp_server)
        .await
        .ok_or(Error::DnsLookupFailed)?;
    let IpAddress::Ipv4(ip) = addr;

    let context = NtpContext::new(TimestampGen);
    let time = sntpc::get_time(SocketAddr::new(IpAddr::V4(ip), NTP_PORT), &socket, context)
        .await
        .map_err(Error::Sntp)?;

    Ok(u64::from(time.seconds))
}

#[embassy_executor::task]
pub async fn ntp_task(stack: Stack<'static>) {
    loop {
        match query(stack).await {
            Ok(unix_secs) => {
                let uptime_ms = Instant::now().as_millis();
                CLOCK.lock(|clock| {
                    let mut synced = clock.get();
                    synced.set(unix_secs, uptime_ms);
                    clock.set(synced);
                });
                info!("Clock synced, unix time {}", unix_secs);
                Timer::after(Duration::from_secs(NTP_SYNC_INTERVAL_SECS)).await;
            }
            Err(e) => {
                error!("SNTP sync failed: {:?}", e);
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
            }
        }
    }
}
