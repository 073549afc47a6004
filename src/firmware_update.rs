use embassy_net::{tcp::TcpSocket, Stack};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use esp_hal_ota::Ota;
use esp_storage::FlashStorage;

use mqtt_oled_mon::config::{OtaServer, CONFIG};
use mqtt_oled_mon::constants::*;
use mqtt_oled_mon::update::{self, check_status, header_end, parse_release, Release, Version};

use crate::wifi::resolve;

#[derive(Debug)]
pub enum Error {
    DnsLookupFailed,
    #[allow(dead_code)]
    SocketConnectionError(embassy_net::tcp::ConnectError),
    Io,
    HeaderTooLarge,
    #[allow(dead_code)]
    Response(update::Error),
    Ota,
    #[allow(dead_code)]
    Incomplete { written: usize, expected: usize },
    CrcMismatch,
}

pub struct FirmwareUpdate {
    stack: Stack<'static>,
    server: OtaServer,
    current: Version,
}

impl FirmwareUpdate {
    pub fn new(stack: Stack<'static>, server: OtaServer) -> Result<Self, Error> {
        // Reaching this point means the image boots, keep it
        let _ = Ota::new(FlashStorage::new())
            .map_err(|_| Error::Ota)?
            .ota_mark_app_valid();

        let current = Version::parse(VERSION).ok_or(Error::Response(update::Error::Version))?;

        Ok(Self {
            stack,
            server,
            current,
        })
    }

    async fn connect<'b>(
        &self,
        rx_buffer: &'b mut [u8],
        tx_buffer: &'b mut [u8],
    ) -> Result<TcpSocket<'b>, Error> {
        let addr = resolve(self.stack, self.server.hostname)
            .await
            .ok_or(Error::DnsLookupFailed)?;

        let mut socket = TcpSocket::new(self.stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(30)));
        socket
            .connect((addr, self.server.port))
            .await
            .map_err(Error::SocketConnectionError)?;
        Ok(socket)
    }

    async fn request(&self, socket: &mut TcpSocket<'_>, path: &str) -> Result<(), Error> {
        for part in [
            "GET ",
            path,
            "?device=",
            CONFIG.hostname,
            " HTTP/1.1\r\nHost: ",
            self.server.hostname,
            "\r\nConnection: close\r\n\r\n",
        ] {
            socket
                .write_all(part.as_bytes())
                .await
                .map_err(|_| Error::Io)?;
        }
        socket.flush().await.map_err(|_| Error::Io)
    }

    async fn fetch_release(&self) -> Result<Release, Error> {
        let mut rx_buffer = [0; RX_BUFFER_SIZE];
        let mut tx_buffer = [0; TX_BUFFER_SIZE];
        let mut socket = self.connect(&mut rx_buffer, &mut tx_buffer).await?;
        self.request(&mut socket, "/version").await?;

        let mut buf = [0u8; OTA_CHUNK_BUFFER_SIZE];
        let (mut len, body_start) = read_head(&mut socket, &mut buf).await?;
        // Connection: close, the body ends with the stream
        while len < buf.len() {
            match socket.read(&mut buf[len..]).await.map_err(|_| Error::Io)? {
                0 => break,
                n => len += n,
            }
        }
        socket.close();

        parse_release(&buf[body_start..len]).map_err(Error::Response)
    }

    /// Asks the server for its version and installs it when it is newer.
    /// Reboots on success, so `Ok` means nothing was installed.
    pub async fn check(&mut self) -> Result<(), Error> {
        let release = self.fetch_release().await?;
        if !release.version.is_newer_than(&self.current) {
            log::info!("Firmware {} is up to date ({:?} offered)", VERSION, release.version);
            return Ok(());
        }

        log::info!(
            "Updating to {:?}, crc32={:#010x}, size={}",
            release.version,
            release.crc32,
            release.size
        );
        self.install(&release).await
    }

    async fn install(&self, release: &Release) -> Result<(), Error> {
        let mut rx_buffer = [0; RX_BUFFER_SIZE];
        let mut tx_buffer = [0; TX_BUFFER_SIZE];
        let mut socket = self.connect(&mut rx_buffer, &mut tx_buffer).await?;
        self.request(&mut socket, "/firmware").await?;

        let mut buf = [0u8; OTA_CHUNK_BUFFER_SIZE];
        let (len, body_start) = read_head(&mut socket, &mut buf).await?;

        let mut ota = Ota::new(FlashStorage::new()).map_err(|_| Error::Ota)?;
        ota.ota_begin(release.size as u32, release.crc32)
            .map_err(|_| Error::Ota)?;

        let leftover = &buf[body_start..len.min(body_start + release.size)];
        if !leftover.is_empty() {
            ota.ota_write_chunk(leftover).map_err(|_| Error::Ota)?;
        }
        let mut written = leftover.len();

        let mut reported = 0;
        while written < release.size {
            let want = (release.size - written).min(buf.len());
            let n = socket
                .read(&mut buf[..want])
                .await
                .map_err(|_| Error::Io)?;
            if n == 0 {
                break;
            }
            ota.ota_write_chunk(&buf[..n]).map_err(|_| Error::Ota)?;
            written += n;

            let tenths = written * 10 / release.size;
            if tenths > reported {
                reported = tenths;
                log::info!("Progress: {}%", tenths * 10);
            }
        }
        socket.close();

        if written != release.size {
            return Err(Error::Incomplete {
                written,
                expected: release.size,
            });
        }
        if !ota.ota_verify().map_err(|_| Error::Ota)? {
            log::error!("CRC mismatch after flash!");
            return Err(Error::CrcMismatch);
        }
        ota.ota_flush(false, true).map_err(|_| Error::Ota)?;

        log::info!("OTA complete. Rebooting...");
        Timer::after_millis(1_000).await;
        esp_hal::system::software_reset()
    }
}

/// Reads until the end of the response header and checks the status.
/// Returns the bytes read so far and the offset of the body.
async fn read_head(socket: &mut TcpSocket<'_>, buf: &mut [u8]) -> Result<(usize, usize), Error> {
    let mut len = 0;
    loop {
        if let Some(end) = header_end(&buf[..len]) {
            check_status(&buf[..end]).map_err(Error::Response)?;
            return Ok((len, end));
        }
        if len == buf.len() {
            return Err(Error::HeaderTooLarge);
        }
        match socket.read(&mut buf[len..]).await.map_err(|_| Error::Io)? {
            0 => return Err(Error::Response(update::Error::Header)),
            n => len += n,
        }
    }
}

#[embassy_executor::task]
pub async fn ota_task(mut firmware_update: FirmwareUpdate) {
    loop {
        if let Err(e) = firmware_update.check().await {
            log::error!("Firmware update error: {:?}", e);
        }
        Timer::after(Duration::from_secs(FIRMWARE_CHECK_INTERVAL_SECS)).await;
    }
}
