use embassy_futures::select::{select, Either};
use embassy_net::{tcp::TcpSocket, IpAddress, Stack};
use embassy_time::{Duration, Instant, Ticker, Timer};
use embedded_hal_async::i2c::I2c;
use embedded_io_async::{Read, ReadReady, Write};
use heapless::Vec;

use mqtt_oled_mon::config::CONFIG;
use mqtt_oled_mon::constants::*;
use mqtt_oled_mon::history::Lane;
use mqtt_oled_mon::monitor::{Monitor, Tick};
use mqtt_oled_mon::mqtt::{self, Incoming, Mqtt};
use mqtt_oled_mon::night::Transition;
use mqtt_oled_mon::topic::{self, TopicId, TopicPath, TOPIC_COUNT};

use crate::ntp::CLOCK;
use crate::oled::Oleds;
use crate::wifi::resolve;

#[derive(Debug)]
pub enum Error {
    TopicPath,
    DnsLookupFailed,
    #[allow(dead_code)]
    SocketConnectionError(embassy_net::tcp::ConnectError),
    Mqtt(mqtt::Error),
}

/// Long-lived state across broker connections
pub struct Session<I2C> {
    stack: Stack<'static>,
    oleds: Oleds<I2C>,
    monitor: Monitor,
    paths: Vec<TopicPath, TOPIC_COUNT>,
}

impl<I2C> Session<I2C>
where
    I2C: I2c,
{
    pub fn new(stack: Stack<'static>, oleds: Oleds<I2C>) -> Result<Self, Error> {
        let mut paths = Vec::new();
        for id in TopicId::ALL {
            let path =
                topic::full_path(CONFIG.mqtt_topic_prefix, id).map_err(|_| Error::TopicPath)?;
            paths.push(path).map_err(|_| Error::TopicPath)?;
        }

        Ok(Self {
            stack,
            oleds,
            monitor: Monitor::new(&CONFIG),
            paths,
        })
    }

    async fn broker_address(&self) -> Result<IpAddress, Error> {
        resolve(self.stack, CONFIG.mqtt_hostname)
            .await
            .ok_or(Error::DnsLookupFailed)
    }

    /// Connects, subscribes and processes messages until the connection fails
    pub async fn run(&mut self) -> Result<(), Error> {
        let addr = self.broker_address().await?;

        let mut rx_buffer = [0; RX_BUFFER_SIZE];
        let mut tx_buffer = [0; TX_BUFFER_SIZE];
        let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(u64::from(MQTT_KEEP_ALIVE_SECS) * 2)));

        log::info!("Connecting TCP socket to {}:{}", CONFIG.mqtt_hostname, CONFIG.mqtt_port);
        socket
            .connect((addr, CONFIG.mqtt_port))
            .await
            .map_err(Error::SocketConnectionError)?;
        log::info!("TCP connected");

        let mut mqtt_tx_buffer = [0; MQTT_TX_BUFFER_SIZE];
        let mut mqtt_rx_buffer = [0; MQTT_RX_BUFFER_SIZE];
        let mut mqtt = Mqtt::connect(socket, &mut mqtt_tx_buffer, &mut mqtt_rx_buffer, &CONFIG)
            .await
            .map_err(Error::Mqtt)?;

        let result = self.serve(&mut mqtt).await;

        mqtt.disconnect().await;
        self.monitor.on_disconnect();
        result
    }

    /// Runs ticks from a [`Ticker`] and reads packets in between. A read only
    /// starts once bytes are buffered, so a tick never interrupts one.
    async fn serve<T>(&mut self, mqtt: &mut Mqtt<'_, T>) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        mqtt.subscribe(&self.paths).await.map_err(Error::Mqtt)?;

        let mut ticker = Ticker::every(Duration::from_millis(u64::from(CONFIG.sample_interval_ms)));
        loop {
            match select(ticker.next(), Timer::after_millis(MQTT_POLL_INTERVAL_MS)).await {
                Either::First(()) => {
                    let tick = self.tick().await;
                    log::debug!("Sample: {:?}", tick.sample);
                    keepalive(mqtt).await.map_err(Error::Mqtt)?;
                }
                Either::Second(()) => self.drain(mqtt).await?,
            }
        }
    }

    async fn drain<T>(&mut self, mqtt: &mut Mqtt<'_, T>) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        for _ in 0..MQTT_DRAIN_MAX {
            match mqtt.poll_if_ready().await.map_err(Error::Mqtt)? {
                Some(Incoming::Message { topic, payload }) => {
                    match self.monitor.on_message(topic, payload) {
                        Ok(id) => log::debug!("{} updated", id.name()),
                        Err(e) => log::warn!("Ignoring message on {}: {:?}", topic, e),
                    }
                }
                Some(Incoming::Subscribed) => log::info!("Subscription acknowledged"),
                Some(Incoming::Pong) => log::debug!("PINGRESP"),
                Some(Incoming::Other) => {}
                None => break,
            }
        }
        Ok(())
    }

    async fn tick(&mut self) -> Tick {
        let now_ms = Instant::now().as_millis();
        let hour = CLOCK.lock(|clock| clock.get().hour_at(now_ms, CONFIG.utc_offset_minutes));

        let tick = self.monitor.on_tick(hour);

        if let Some(column) = tick.column {
            log::info!(
                "Graph column {}: net {:?} W, load {:?} W, pv {:?} W, soc {:?} %",
                column.x,
                column.means[Lane::Net as usize],
                column.means[Lane::Load as usize],
                column.means[Lane::Pv as usize],
                column.means[Lane::Soc as usize],
            );
        }

        match tick.transition {
            Some(Transition::Dusk) => {
                log::info!("Night, switching panels off");
                self.oleds.set_backlight(false).await;
            }
            Some(Transition::Dawn) => {
                log::info!("Morning, switching panels on");
                self.oleds.set_backlight(true).await;
            }
            None => {}
        }

        tick
    }
}

/// Publishes to the keepalive topic if one is set, pings otherwise
async fn keepalive<T>(mqtt: &mut Mqtt<'_, T>) -> Result<(), mqtt::Error>
where
    T: Read + Write,
{
    match CONFIG.mqtt_keepalive_topic {
        Some(topic) => mqtt.publish(topic, b"").await,
        None => mqtt.ping().await,
    }
}

#[embassy_executor::task]
pub async fn session_task(mut session: Session<esp_hal::i2c::master::I2c<'static, esp_hal::Async>>) {
    loop {
        if let Err(e) = session.run().await {
            log::error!("MQTT session error: {:?}", e);
        }
        Timer::after(Duration::from_millis(MQTT_RECONNECT_DELAY_MS)).await;
    }
}
