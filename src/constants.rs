/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (internal memory)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 4096;

/// MQTT client transmit buffer, holds one SUBSCRIBE for every topic
pub const MQTT_TX_BUFFER_SIZE: usize = 4096;
/// MQTT client receive buffer, the configured packet size is clamped to it
pub const MQTT_RX_BUFFER_SIZE: usize = 2048;
/// Maximum number of MQTT v5 properties per packet
pub const MQTT_MAX_PROPERTIES: usize = 5;
/// MQTT keep alive sent in CONNECT, in seconds
pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;
/// Delay before reconnecting after a broker error
pub const MQTT_RECONNECT_DELAY_MS: u64 = 5000;
/// How often the socket is checked for whole packets between ticks
pub const MQTT_POLL_INTERVAL_MS: u64 = 50;
/// Packets handled per poll before the tick gets a chance to run
pub const MQTT_DRAIN_MAX: usize = 8;
/// Unanswered PINGREQs after which the broker is considered gone
pub const MQTT_MAX_PINGS_IN_FLIGHT: u8 = 2;

/// Longest full topic path (prefix plus suffix)
pub const TOPIC_PATH_MAX: usize = 128;

/// Number of samples averaged into one graph column
pub const SAMPLES_PER_COLUMN: u8 = 72;
/// Number of graph columns kept per series (one per display pixel column)
pub const GRAPH_COLUMNS: usize = 121;

/// Longest log line, longer lines are truncated
pub const LOG_LINE_MAX: usize = 192;
/// Queued log lines waiting for the UDP sender
pub const LOG_QUEUE_DEPTH: usize = 16;

/// Interval between SNTP resynchronisations
pub const NTP_SYNC_INTERVAL_SECS: u64 = 3600;
/// SNTP port
pub const NTP_PORT: u16 = 123;

/// Timeout for a single Wi-Fi connect attempt
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Delay between Wi-Fi reconnect attempts
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5000;

/// Interval between firmware update checks
pub const FIRMWARE_CHECK_INTERVAL_SECS: u64 = 3600;
/// Buffer for the `/version` response and the firmware download chunks
pub const OTA_CHUNK_BUFFER_SIZE: usize = 2048;

/// I2C bus frequency for the port expanders
pub const I2C_FREQUENCY_KHZ: u32 = 100;
