#![cfg_attr(target_arch = "xtensa", no_std)]
#![cfg_attr(target_arch = "xtensa", no_main)]

#[cfg(target_arch = "xtensa")]
mod firmware_update;
#[cfg(target_arch = "xtensa")]
mod logger;
#[cfg(target_arch = "xtensa")]
mod ntp;
#[cfg(target_arch = "xtensa")]
mod oled;
#[cfg(target_arch = "xtensa")]
mod session;
#[cfg(target_arch = "xtensa")]
mod wifi;

#[cfg(target_arch = "xtensa")]
use {
    embassy_executor::Spawner,
    embassy_time::{Duration, Timer},
    esp_alloc as _,
    esp_backtrace as _,
    esp_hal::{i2c::master::I2c, rng::Rng, time::Rate, timer::timg::TimerGroup},
    esp_wifi::EspWifiController,
    firmware_update::{ota_task, FirmwareUpdate},
    mqtt_oled_mon::{config::CONFIG, constants::*},
    ntp::ntp_task,
    oled::Oleds,
    session::{session_task, Session},
    static_cell::StaticCell,
    wifi::Wifi,
};

#[cfg(target_arch = "xtensa")]
esp_bootloader_esp_idf::esp_app_desc!();

#[cfg(target_arch = "xtensa")]
static WIFI_INIT: StaticCell<EspWifiController<'static>> = StaticCell::new();

#[cfg(target_arch = "xtensa")]
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    logger::init(log::LevelFilter::Info, CONFIG.udp_log.is_some());
    log::info!("mqtt_oled_mon {}", VERSION);

    if let Err(e) = CONFIG.validate() {
        panic!("Invalid configuration: {:?}", e);
    }

    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let rng = Rng::new(peripherals.RNG);
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    // possibly high transient required at init
    // https://github.com/esp-rs/esp-hal/issues/1626
    Timer::after(Duration::from_millis(1000)).await;

    let i2c_config =
        esp_hal::i2c::master::Config::default().with_frequency(Rate::from_khz(I2C_FREQUENCY_KHZ));
    let i2c = I2c::new(peripherals.I2C0, i2c_config)
        .unwrap()
        .with_sda(peripherals.GPIO21)
        .with_scl(peripherals.GPIO22)
        .into_async();

    let mut oleds = Oleds::new(i2c).unwrap();
    let panels = oleds.init().await;
    log::info!("{} of {} panels answered", panels, mqtt_oled_mon::display::PANEL_COUNT);

    let wifi_init = WIFI_INIT.init(esp_wifi::init(timg1.timer0, rng).unwrap());
    let wifi = Wifi::new(wifi_init, peripherals.WIFI, rng, spawner)
        .await
        .unwrap();

    wifi.connect().await.unwrap();

    if let Some(target) = CONFIG.udp_log {
        spawner.spawn(logger::udp_log_task(wifi.stack, target)).ok();
    }
    spawner.spawn(ntp_task(wifi.stack)).ok();

    if let Some(server) = CONFIG.ota {
        let firmware_update = FirmwareUpdate::new(wifi.stack, server).unwrap();
        spawner.spawn(ota_task(firmware_update)).ok();
    }

    let session = Session::new(wifi.stack, oleds).unwrap();
    spawner.spawn(session_task(session)).ok();
}

#[cfg(not(target_arch = "xtensa"))]
fn main() {
    eprintln!(
        "mqtt_oled_mon is ESP32 firmware, build it with `cargo build --release --target xtensa-esp32-none-elf`"
    );
}
