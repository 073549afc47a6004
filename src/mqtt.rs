//! MQTT v5 client for the telemetry subscription.
//!
//! Every inbound packet goes through [`Mqtt::poll`], so a PINGRESP or SUBACK
//! may arrive between retained or streaming PUBLISH packets without the
//! client losing either.

use embedded_io_async::{Read, ReadReady, Write};
use heapless::Vec;
use rust_mqtt::{
    client::{
        client_config::{ClientConfig, MqttVersion},
        raw_client::{Event, RawMqttClient},
    },
    packet::v5::{publish_packet::QualityOfService, reason_codes::ReasonCode},
    utils::rng_generator::CountingRng,
};

use crate::config::Config;
use crate::constants::{MQTT_KEEP_ALIVE_SECS, MQTT_MAX_PINGS_IN_FLIGHT, MQTT_MAX_PROPERTIES};
use crate::topic::{TopicPath, TOPIC_COUNT};

#[derive(Debug, PartialEq)]
pub enum Error {
    ConnectionFailed(ReasonCode),
    UnexpectedPacket,
    TooManyTopics,
    SubscribeFailed(ReasonCode),
    ReceiveFailed(ReasonCode),
    Disconnected(ReasonCode),
    PublishFailed(ReasonCode),
    PingFailed(ReasonCode),
    PingTimeout,
}

/// One packet read from the broker
#[derive(Debug, PartialEq)]
pub enum Incoming<'a> {
    Message { topic: &'a str, payload: &'a [u8] },
    Subscribed,
    Pong,
    Other,
}

pub struct Mqtt<'a, T>
where
    T: Read + Write,
{
    client: RawMqttClient<'a, T, MQTT_MAX_PROPERTIES, CountingRng>,
    pings_in_flight: u8,
}

fn incoming<'e>(event: Event<'e>, pings_in_flight: &mut u8) -> Result<Incoming<'e>, Error> {
    match event {
        Event::Message(topic, payload) => Ok(Incoming::Message { topic, payload }),
        Event::Suback(_) => Ok(Incoming::Subscribed),
        Event::Pingresp => {
            *pings_in_flight = 0;
            Ok(Incoming::Pong)
        }
        Event::Disconnect(reason) => Err(Error::Disconnected(reason)),
        _ => Ok(Incoming::Other),
    }
}

impl<'a, T> Mqtt<'a, T>
where
    T: Read + Write,
{
    /// Sends CONNECT and waits for the CONNACK
    pub async fn connect(
        transport: T,
        tx_buffer: &'a mut [u8],
        rx_buffer: &'a mut [u8],
        config: &Config,
    ) -> Result<Self, Error> {
        let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        client_config.add_max_subscribe_qos(QualityOfService::QoS0);
        client_config.add_client_id(config.mqtt_client_id);
        if let Some(username) = config.mqtt_username {
            client_config.add_username(username);
        }
        if let Some(password) = config.mqtt_password {
            client_config.add_password(password);
        }
        client_config.keep_alive = MQTT_KEEP_ALIVE_SECS;
        client_config.max_packet_size =
            usize::from(config.mqtt_max_packet_size).min(rx_buffer.len()) as u32;

        let tx_len = tx_buffer.len();
        let rx_len = rx_buffer.len();
        let mut client =
            RawMqttClient::new(transport, tx_buffer, tx_len, rx_buffer, rx_len, client_config);

        client
            .connect_to_broker()
            .await
            .map_err(Error::ConnectionFailed)?;
        match client.poll::<0>().await {
            Ok(Event::Connack) => log::info!("MQTT connected to broker successfully"),
            Ok(_) => return Err(Error::UnexpectedPacket),
            Err(e) => {
                log::error!("MQTT connect_to_broker failed: {:?}", e);
                return Err(Error::ConnectionFailed(e));
            }
        }

        Ok(Self {
            client,
            pings_in_flight: 0,
        })
    }

    /// Subscribes to every path in a single SUBSCRIBE. The SUBACK is
    /// reported by [`Mqtt::poll`] like any other packet.
    pub async fn subscribe(&mut self, paths: &[TopicPath]) -> Result<(), Error> {
        let mut topics: Vec<&str, TOPIC_COUNT> = Vec::new();
        for path in paths {
            topics
                .push(path.as_str())
                .map_err(|_| Error::TooManyTopics)?;
        }

        self.client
            .subscribe_to_topics(&topics)
            .await
            .map_err(Error::SubscribeFailed)?;
        log::info!("Subscribing to {} topics", topics.len());
        Ok(())
    }

    /// Waits for the next packet
    pub async fn poll(&mut self) -> Result<Incoming<'_>, Error> {
        let event = self
            .client
            .poll::<TOPIC_COUNT>()
            .await
            .map_err(Error::ReceiveFailed)?;
        incoming(event, &mut self.pings_in_flight)
    }

    /// QoS 0 publish, nothing comes back for it
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        self.client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
            .map_err(Error::PublishFailed)?;
        log::debug!("Message published to {}", topic);
        Ok(())
    }

    /// Sends a PINGREQ without waiting for the answer. Fails once
    /// [`MQTT_MAX_PINGS_IN_FLIGHT`] pings went unanswered.
    pub async fn ping(&mut self) -> Result<(), Error> {
        if self.pings_in_flight >= MQTT_MAX_PINGS_IN_FLIGHT {
            return Err(Error::PingTimeout);
        }
        self.client.send_ping().await.map_err(Error::PingFailed)?;
        self.pings_in_flight += 1;
        Ok(())
    }

    pub fn pings_in_flight(&self) -> u8 {
        self.pings_in_flight
    }

    pub async fn disconnect(mut self) {
        let _ = self.client.disconnect().await;
    }
}

impl<'a, T> Mqtt<'a, T>
where
    T: Read + Write + ReadReady,
{
    /// Reads one whole packet if data is already buffered. Never waits for
    /// the first byte, so dropping the caller between packets is safe.
    pub async fn poll_if_ready(&mut self) -> Result<Option<Incoming<'_>>, Error> {
        match self
            .client
            .poll_if_ready::<TOPIC_COUNT>()
            .await
            .map_err(Error::ReceiveFailed)?
        {
            Some(event) => incoming(event, &mut self.pings_in_flight).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CONFIG;
    use crate::topic::{full_path, TopicId};
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorType;

    const CONNACK: &[u8] = &[0x20, 0x03, 0x00, 0x00, 0x00];
    const PINGREQ: &[u8] = &[0xC0, 0x00];
    const PINGRESP: &[u8] = &[0xD0, 0x00];
    const SUBACK: &[u8] = &[0x90, 0x04, 0x12, 0x34, 0x00, 0x00];

    /// PUBLISH at QoS 0 with topic "t" and payload `{"value":1}`
    const PUBLISH: &[u8] = &[
        0x30, 0x0f, 0x00, 0x01, b't', 0x00, b'{', b'"', b'v', b'a', b'l', b'u', b'e', b'"', b':',
        b'1', b'}',
    ];

    /// Broker stand-in replaying canned bytes and recording what the client sends
    struct Script {
        rx: std::vec::Vec<u8>,
        pos: usize,
        tx: std::vec::Vec<u8>,
    }

    impl Script {
        fn new(packets: &[&[u8]]) -> Self {
            Self {
                rx: packets.concat(),
                pos: 0,
                tx: std::vec::Vec::new(),
            }
        }
    }

    impl ErrorType for Script {
        type Error = Infallible;
    }

    impl Read for Script {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
            let n = buf.len().min(self.rx.len() - self.pos);
            buf[..n].copy_from_slice(&self.rx[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for Script {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    impl ReadReady for Script {
        fn read_ready(&mut self) -> Result<bool, Infallible> {
            Ok(self.pos < self.rx.len())
        }
    }

    const MESSAGE: Incoming<'static> = Incoming::Message {
        topic: "t",
        payload: br#"{"value":1}"#,
    };

    #[test]
    fn pong_after_message_keeps_both() {
        let mut script = Script::new(&[CONNACK, PUBLISH, PINGRESP]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        block_on(async {
            let mut mqtt = Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG)
                .await
                .unwrap();
            mqtt.ping().await.unwrap();
            assert_eq!(mqtt.pings_in_flight(), 1);

            assert_eq!(mqtt.poll().await, Ok(MESSAGE));
            assert_eq!(mqtt.poll().await, Ok(Incoming::Pong));
            assert_eq!(mqtt.pings_in_flight(), 0);
        });
        assert!(script.tx.ends_with(PINGREQ));
    }

    #[test]
    fn unanswered_pings_time_out() {
        let mut script = Script::new(&[CONNACK]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        block_on(async {
            let mut mqtt = Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG)
                .await
                .unwrap();
            for _ in 0..MQTT_MAX_PINGS_IN_FLIGHT {
                mqtt.ping().await.unwrap();
            }
            assert_eq!(mqtt.ping().await, Err(Error::PingTimeout));
        });
    }

    #[test]
    fn poll_if_ready_waits_for_data() {
        let mut script = Script::new(&[CONNACK, PUBLISH]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        block_on(async {
            let mut mqtt = Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG)
                .await
                .unwrap();
            assert_eq!(mqtt.poll_if_ready().await, Ok(Some(MESSAGE)));
            assert_eq!(mqtt.poll_if_ready().await, Ok(None));
        });
    }

    #[test]
    fn suback_reported_in_order() {
        let mut script = Script::new(&[CONNACK, SUBACK, PUBLISH]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        let paths = [full_path("victron", TopicId::BatSoc).unwrap()];
        block_on(async {
            let mut mqtt = Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG)
                .await
                .unwrap();
            mqtt.subscribe(&paths).await.unwrap();
            assert_eq!(mqtt.poll().await, Ok(Incoming::Subscribed));
            assert_eq!(mqtt.poll().await, Ok(MESSAGE));
        });
        let sent = std::string::String::from_utf8_lossy(&script.tx).into_owned();
        assert!(sent.contains("victron/system/0/Dc/Battery/Soc"));
    }

    #[test]
    fn refused_connack() {
        let mut script = Script::new(&[&[0x20, 0x03, 0x00, 0x87, 0x00]]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        let result = block_on(Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG));
        assert!(matches!(result, Err(Error::ConnectionFailed(_))));
    }

    #[test]
    fn too_many_topics() {
        let mut script = Script::new(&[CONNACK]);
        let mut tx = [0; 512];
        let mut rx = [0; 512];
        let path = full_path("victron", TopicId::BatSoc).unwrap();
        let paths: std::vec::Vec<TopicPath> = (0..=TOPIC_COUNT).map(|_| path.clone()).collect();
        block_on(async {
            let mut mqtt = Mqtt::connect(&mut script, &mut tx, &mut rx, &CONFIG)
                .await
                .unwrap();
            assert_eq!(mqtt.subscribe(&paths).await, Err(Error::TooManyTopics));
        });
    }
}
