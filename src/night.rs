/// Hours during which the panels stay dark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightSchedule {
    pub sleep_hour: u8,
    pub awake_hour: u8,
}

impl NightSchedule {
    pub const fn new(sleep_hour: u8, awake_hour: u8) -> Self {
        Self {
            sleep_hour,
            awake_hour,
        }
    }

    /// `sleep_hour` is inclusive, `awake_hour` exclusive. The window may wrap midnight.
    pub fn is_night(&self, hour: u8) -> bool {
        if self.sleep_hour <= self.awake_hour {
            hour >= self.sleep_hour && hour < self.awake_hour
        } else {
            hour >= self.sleep_hour || hour < self.awake_hour
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Panels go dark
    Dusk,
    /// Panels come back on
    Dawn,
}

#[derive(Debug, Clone)]
pub struct NightMode {
    schedule: NightSchedule,
    night: bool,
}

impl NightMode {
    pub const fn new(schedule: NightSchedule) -> Self {
        Self {
            schedule,
            night: false,
        }
    }

    pub fn is_night(&self) -> bool {
        self.night
    }

    /// Feeds the current local hour, `None` while the clock is not set.
    /// Without a clock the panels stay on.
    pub fn update(&mut self, hour: Option<u8>) -> Option<Transition> {
        let night = hour.is_some_and(|hour| self.schedule.is_night(hour));
        if night == self.night {
            return None;
        }
        self.night = night;
        Some(if night {
            Transition::Dusk
        } else {
            Transition::Dawn
        })
    }
}
