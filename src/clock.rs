use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};

/// Wall clock derived from one SNTP answer and the uptime it was taken at
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    sync: Option<SyncPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncPoint {
    unix_secs: u64,
    uptime_ms: u64,
}

impl WallClock {
    pub const fn new() -> Self {
        Self { sync: None }
    }

    pub fn set(&mut self, unix_secs: u64, uptime_ms: u64) {
        self.sync = Some(SyncPoint {
            unix_secs,
            uptime_ms,
        });
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_some()
    }

    pub fn unix_secs_at(&self, uptime_ms: u64) -> Option<u64> {
        let sync = self.sync?;
        let elapsed = uptime_ms.saturating_sub(sync.uptime_ms) / 1000;
        Some(sync.unix_secs + elapsed)
    }

    pub fn time_at(&self, uptime_ms: u64) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.unix_secs_at(uptime_ms)?).ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }

    /// Local hour of day, 0..=23. `None` until synced or for an offset of a day or more.
    pub fn hour_at(&self, uptime_ms: u64, utc_offset_minutes: i16) -> Option<u8> {
        let offset = FixedOffset::east_opt(i32::from(utc_offset_minutes) * 60)?;
        let local = self.time_at(uptime_ms)?.with_timezone(&offset);
        Some(local.hour() as u8)
    }
}
