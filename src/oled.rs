use embassy_time::Timer;
use embedded_hal_async::i2c::I2c;
use log::{info, warn};

use mqtt_oled_mon::display::{validate_panels, DisplayError, OledConfig, OLEDS, PANEL_COUNT};

/// Settle time between the reset writes
const RESET_STEP_MS: u64 = 5;

/// Control lines of all panels, driven through their port expanders
pub struct Oleds<I2C> {
    i2c: I2C,
    present: [bool; PANEL_COUNT],
}

impl<I2C> Oleds<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C) -> Result<Self, DisplayError> {
        validate_panels(&OLEDS)?;
        Ok(Self {
            i2c,
            present: [false; PANEL_COUNT],
        })
    }

    /// Resets every panel and switches its backlight on.
    /// Panels whose expander does not answer are skipped from then on.
    pub async fn init(&mut self) -> usize {
        for (i, panel) in OLEDS.iter().enumerate() {
            self.present[i] = self.reset(panel).await;
            if self.present[i] {
                info!("OLED {} at {:#04x} ready", i + 1, panel.address);
            } else {
                warn!("OLED {} at {:#04x} does not answer", i + 1, panel.address);
            }
        }
        self.present.iter().filter(|present| **present).count()
    }

    async fn reset(&mut self, panel: &OledConfig) -> bool {
        for byte in panel.reset_sequence() {
            if self.i2c.write(panel.address, &[byte]).await.is_err() {
                return false;
            }
            Timer::after_millis(RESET_STEP_MS).await;
        }
        true
    }

    pub async fn set_backlight(&mut self, on: bool) {
        for (panel, present) in OLEDS.iter().zip(self.present) {
            if !present {
                continue;
            }
            if let Err(e) = self.i2c.write(panel.address, &[panel.idle(on)]).await {
                warn!("OLED at {:#04x} backlight write failed: {:?}", panel.address, e);
            }
        }
    }
}
