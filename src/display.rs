//! SSD1322 panels behind 8-bit I2C port expanders.
//!
//! Each panel's control lines hang off a PCF8574 style expander. Writing a
//! byte to the expander sets all eight outputs at once, so every state
//! change is expressed as a full port byte.

/// Lowest and highest address of the expander family
pub const EXPANDER_ADDRESS_MIN: u8 = 0x20;
pub const EXPANDER_ADDRESS_MAX: u8 = 0x27;

/// Number of connected panels
pub const PANEL_COUNT: usize = 4;

#[derive(Debug, PartialEq, Eq)]
pub enum DisplayError {
    DuplicateAddress(u8),
    AddressOutOfRange(u8),
    PinOutOfRange(u8),
    PinConflict(u8),
}

/// Expander bit driving each control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPins {
    pub rst: u8,
    pub bl: u8,
    pub en: u8,
    pub rw: u8,
    pub di: u8,
}

impl ControlPins {
    fn all(&self) -> [u8; 5] {
        [self.rst, self.bl, self.en, self.rw, self.di]
    }
}

/// Logical state of the control lines
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlLines {
    /// Reset asserted, the RST pin is active low
    pub reset: bool,
    pub backlight: bool,
    pub enable: bool,
    /// Read cycle (RW high), write otherwise
    pub read: bool,
    /// Data (DI high), command otherwise
    pub data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OledConfig {
    pub pins: ControlPins,
    pub address: u8,
}

const PINS: ControlPins = ControlPins {
    rst: 7,
    bl: 6,
    en: 5,
    rw: 4,
    di: 3,
};

pub const OLEDS: [OledConfig; PANEL_COUNT] = [
    OledConfig { pins: PINS, address: 0x20 },
    OledConfig { pins: PINS, address: 0x21 },
    OledConfig { pins: PINS, address: 0x22 },
    OledConfig { pins: PINS, address: 0x23 },
];

impl OledConfig {
    pub fn port_byte(&self, lines: ControlLines) -> u8 {
        let bit = |pin: u8, high: bool| if high { 1u8 << pin } else { 0 };
        bit(self.pins.rst, !lines.reset)
            | bit(self.pins.bl, lines.backlight)
            | bit(self.pins.en, lines.enable)
            | bit(self.pins.rw, lines.read)
            | bit(self.pins.di, lines.data)
    }

    /// Idle state with the controller out of reset
    pub fn idle(&self, backlight: bool) -> u8 {
        self.port_byte(ControlLines {
            backlight,
            ..ControlLines::default()
        })
    }

    /// Port bytes for a hardware reset: assert, release, backlight on.
    /// The controller needs a few milliseconds between the writes.
    pub fn reset_sequence(&self) -> [u8; 3] {
        [
            self.port_byte(ControlLines {
                reset: true,
                ..ControlLines::default()
            }),
            self.idle(false),
            self.idle(true),
        ]
    }
}

pub fn validate_panels(panels: &[OledConfig]) -> Result<(), DisplayError> {
    for (i, panel) in panels.iter().enumerate() {
        if !(EXPANDER_ADDRESS_MIN..=EXPANDER_ADDRESS_MAX).contains(&panel.address) {
            return Err(DisplayError::AddressOutOfRange(panel.address));
        }
        if panels[..i].iter().any(|other| other.address == panel.address) {
            return Err(DisplayError::DuplicateAddress(panel.address));
        }

        let pins = panel.pins.all();
        for (j, &pin) in pins.iter().enumerate() {
            if pin >= 8 {
                return Err(DisplayError::PinOutOfRange(pin));
            }
            if pins[..j].contains(&pin) {
                return Err(DisplayError::PinConflict(pin));
            }
        }
    }
    Ok(())
}
