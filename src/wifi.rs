use embassy_executor::Spawner;
use embassy_net::{
    dns::DnsQueryType, IpAddress, Ipv4Address, Ipv4Cidr, Runner, Stack, StackResources,
    StaticConfigV4,
};
use embassy_time::{with_timeout, Duration, Timer};

use esp_hal::rng::Rng;
use esp_wifi::{
    wifi::{
        ClientConfiguration, Configuration, WifiController, WifiDevice, WifiEvent, WifiState,
    },
    EspWifiController,
};

use log::info;
use static_cell::StaticCell;

use mqtt_oled_mon::config::{netmask_prefix_len, StaticIp, CONFIG};
use mqtt_oled_mon::constants::{WIFI_CONNECT_TIMEOUT_SECS, WIFI_RECONNECT_DELAY_MS};

// DHCP, DNS, MQTT, UDP log, SNTP and firmware update sockets
static RESOURCES: StaticCell<StackResources<7>> = StaticCell::new();

pub struct Wifi {
    pub stack: Stack<'static>,
}

#[derive(Debug)]
pub enum Error {
    WifiInitFailed,
    HostnameTooLong,
    InvalidNetmask,
    TooManyDnsServers,
    SpawnFailed,
}

fn ipv4(octets: [u8; 4]) -> Ipv4Address {
    let [a, b, c, d] = octets;
    Ipv4Address::new(a, b, c, d)
}

fn static_config(ip: &StaticIp) -> Result<embassy_net::Config, Error> {
    let prefix_len = netmask_prefix_len(ip.netmask).map_err(|_| Error::InvalidNetmask)?;

    let mut config = StaticConfigV4 {
        address: Ipv4Cidr::new(ipv4(ip.address), prefix_len),
        gateway: Some(ipv4(ip.gateway)),
        dns_servers: Default::default(),
    };
    // The gateway answers DNS first, the configured server is the fallback
    for server in [ip.gateway, ip.dns] {
        config
            .dns_servers
            .push(ipv4(server))
            .map_err(|_| Error::TooManyDnsServers)?;
    }

    Ok(embassy_net::Config::ipv4_static(config))
}

/// Parses `host` as an IPv4 literal, or looks it up over DNS
pub async fn resolve(stack: Stack<'_>, host: &str) -> Option<IpAddress> {
    if let Ok(ip) = host.parse::<Ipv4Address>() {
        return Some(IpAddress::Ipv4(ip));
    }

    match stack.dns_query(host, DnsQueryType::A).await {
        Ok(addrs) => addrs.first().copied(),
        Err(e) => {
            log::warn!("DNS lookup of {} failed: {:?}", host, e);
            None
        }
    }
}

impl Wifi {
    pub async fn new(
        init: &'static EspWifiController<'static>,
        wifi: esp_hal::peripherals::WIFI<'static>,
        mut rng: Rng,
        spawner: Spawner,
    ) -> Result<Self, Error> {
        let (controller, interfaces) =
            esp_wifi::wifi::new(init, wifi).map_err(|_| Error::WifiInitFailed)?;

        let config = match &CONFIG.static_ip {
            Some(ip) => {
                info!("Using static address {:?}", ip.address);
                static_config(ip)?
            }
            None => {
                let mut dhcp_config = embassy_net::DhcpConfig::default();
                dhcp_config.hostname =
                    Some(CONFIG.hostname.try_into().map_err(|_| Error::HostnameTooLong)?);
                embassy_net::Config::dhcpv4(dhcp_config)
            }
        };

        let seed = (rng.random() as u64) << 32 | rng.random() as u64;

        let resources = RESOURCES.init(StackResources::new());
        let (stack, runner) = embassy_net::new(interfaces.sta, config, resources, seed);

        spawner
            .spawn(connection(controller))
            .map_err(|_| Error::SpawnFailed)?;
        spawner
            .spawn(net_task(runner))
            .map_err(|_| Error::SpawnFailed)?;

        Ok(Self { stack })
    }

    pub async fn connect(&self) -> Result<(), Error> {
        info!("Waiting for network stack to be ready...");
        loop {
            if self.stack.is_link_up() && self.stack.is_config_up() {
                break;
            }
            Timer::after(Duration::from_millis(500)).await;
        }

        info!("Waiting to get IP address...");
        loop {
            if let Some(config) = self.stack.config_v4() {
                info!("Got IP: {}", config.address);
                break;
            }
            Timer::after(Duration::from_millis(500)).await;
        }

        Ok(())
    }
}

#[embassy_executor::task]
async fn connection(mut controller: WifiController<'static>) {
    info!(
        "Start connection task, device capabilities: {:?}",
        controller.capabilities()
    );
    loop {
        if esp_wifi::wifi::wifi_state() == WifiState::StaConnected {
            // wait until we're no longer connected
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await
        }

        if !matches!(controller.is_started(), Ok(true)) {
            info!("Connecting to wifi with SSID: {:?}", CONFIG.wifi_ssid);
            let client_config = Configuration::Client(ClientConfiguration {
                ssid: CONFIG.wifi_ssid.into(),
                password: CONFIG.wifi_psk.into(),
                ..Default::default()
            });
            if let Err(e) = controller.set_configuration(&client_config) {
                log::error!("Failed to set WiFi config: {:?}. Retrying...", e);
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
                continue;
            }
            info!("Starting wifi");
            if let Err(e) = controller.start_async().await {
                log::error!("Failed to start WiFi: {:?}. Retrying...", e);
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await;
                continue;
            }
            info!("Wifi started!");
        }

        info!("About to connect to {:?}...", CONFIG.wifi_ssid);
        match with_timeout(
            Duration::from_secs(WIFI_CONNECT_TIMEOUT_SECS),
            controller.connect_async(),
        )
        .await
        {
            Ok(Ok(_)) => info!("Wifi connected!"),
            Ok(Err(e)) => {
                info!("Failed to connect to wifi: {e:?}");
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await
            }
            Err(_) => {
                info!("Wifi connection timed out");
                Timer::after(Duration::from_millis(WIFI_RECONNECT_DELAY_MS)).await
            }
        }
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
