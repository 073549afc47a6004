//! Victron telemetry topics.
//!
//! Every value shown on the panels arrives on one MQTT topic. A topic is
//! identified by its index in [`TOPICS`], its full path is the configured
//! prefix followed by the entry's suffix.

use core::fmt::Write;
use heapless::String;

use crate::constants::TOPIC_PATH_MAX;

/// Number of subscribed topics
pub const TOPIC_COUNT: usize = 30;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    PathTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TopicId {
    BatSoc = 0,
    BatPower,
    BatVoltage,
    BatCurrent,
    PvPower,
    PvVoltage,
    PvCurrent,
    PvYield,
    LoadPowerL1,
    LoadPowerL2,
    LoadPowerL3,
    LoadVoltageL1,
    LoadVoltageL2,
    LoadVoltageL3,
    LoadCurrentL1,
    LoadCurrentL2,
    LoadCurrentL3,
    LoadFreqL1,
    NetPowerL1,
    NetPowerL2,
    NetPowerL3,
    NetVoltageL1,
    NetVoltageL2,
    NetVoltageL3,
    NetCurrentL1,
    NetCurrentL2,
    NetCurrentL3,
    DcPower,
    LedsInverter,
    BatState,
}

/// One row of the topic table
#[derive(Debug, Clone, Copy)]
pub struct TopicDef {
    pub id: TopicId,
    pub name: &'static str,
    /// Path below the configured prefix
    pub suffix: &'static str,
}

const fn def(id: TopicId, name: &'static str, suffix: &'static str) -> TopicDef {
    TopicDef { id, name, suffix }
}

#[rustfmt::skip]
const TABLE: [TopicDef; TOPIC_COUNT] = [
    def(TopicId::BatSoc, "Bat_Soc", "system/0/Dc/Battery/Soc"),
    def(TopicId::BatPower, "Bat_Power", "system/0/Dc/Battery/Power"),
    def(TopicId::BatVoltage, "Bat_Voltage", "system/0/Dc/Battery/Voltage"),
    def(TopicId::BatCurrent, "Bat_Current", "system/0/Dc/Battery/Current"),
    def(TopicId::PvPower, "PV_Power", "system/0/Dc/Pv/Power"),
    def(TopicId::PvVoltage, "PV_Voltage", "solarcharger/1/Pv/0/V"),
    def(TopicId::PvCurrent, "PV_Current", "system/0/Dc/Pv/Current"),
    def(TopicId::PvYield, "PV_Yield", "solarcharger/1/History/Daily/0/Yield"),
    def(TopicId::LoadPowerL1, "Load_Power_L1", "vebus/276/Ac/Out/L1/P"),
    def(TopicId::LoadPowerL2, "Load_Power_L2", "vebus/276/Ac/Out/L2/P"),
    def(TopicId::LoadPowerL3, "Load_Power_L3", "vebus/276/Ac/Out/L3/P"),
    def(TopicId::LoadVoltageL1, "Load_Voltage_L1", "vebus/276/Ac/Out/L1/V"),
    def(TopicId::LoadVoltageL2, "Load_Voltage_L2", "vebus/276/Ac/Out/L2/V"),
    def(TopicId::LoadVoltageL3, "Load_Voltage_L3", "vebus/276/Ac/Out/L3/V"),
    def(TopicId::LoadCurrentL1, "Load_Current_L1", "vebus/276/Ac/Out/L1/I"),
    def(TopicId::LoadCurrentL2, "Load_Current_L2", "vebus/276/Ac/Out/L2/I"),
    def(TopicId::LoadCurrentL3, "Load_Current_L3", "vebus/276/Ac/Out/L3/I"),
    def(TopicId::LoadFreqL1, "Load_Freq_L1", "vebus/276/Ac/Out/L1/F"),
    def(TopicId::NetPowerL1, "Net_Power_L1", "vebus/276/Ac/ActiveIn/L1/P"),
    def(TopicId::NetPowerL2, "Net_Power_L2", "vebus/276/Ac/ActiveIn/L2/P"),
    def(TopicId::NetPowerL3, "Net_Power_L3", "vebus/276/Ac/ActiveIn/L3/P"),
    def(TopicId::NetVoltageL1, "Net_Voltage_L1", "vebus/276/Ac/ActiveIn/L1/V"),
    def(TopicId::NetVoltageL2, "Net_Voltage_L2", "vebus/276/Ac/ActiveIn/L2/V"),
    def(TopicId::NetVoltageL3, "Net_Voltage_L3", "vebus/276/Ac/ActiveIn/L3/V"),
    def(TopicId::NetCurrentL1, "Net_Current_L1", "vebus/276/Ac/ActiveIn/L1/I"),
    def(TopicId::NetCurrentL2, "Net_Current_L2", "vebus/276/Ac/ActiveIn/L2/I"),
    def(TopicId::NetCurrentL3, "Net_Current_L3", "vebus/276/Ac/ActiveIn/L3/I"),
    def(TopicId::DcPower, "DC_Power", "system/0/Dc/System/Power"),
    def(TopicId::LedsInverter, "LEDs_Inverter", "vebus/276/Leds/Inverter"),
    def(TopicId::BatState, "Bat_State", "settings/0/Settings/CGwacs/BatteryLife/State"),
];

pub static TOPICS: [TopicDef; TOPIC_COUNT] = TABLE;

impl TopicId {
    pub const ALL: [TopicId; TOPIC_COUNT] = {
        let mut all = [TopicId::BatSoc; TOPIC_COUNT];
        let mut i = 0;
        while i < TOPIC_COUNT {
            all[i] = TABLE[i].id;
            i += 1;
        }
        all
    };

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn def(self) -> &'static TopicDef {
        &TOPICS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }

    pub fn suffix(self) -> &'static str {
        self.def().suffix
    }
}

pub type TopicPath = String<TOPIC_PATH_MAX>;

/// Builds `prefix/suffix` for a topic.
pub fn full_path(prefix: &str, id: TopicId) -> Result<TopicPath, Error> {
    let mut path = TopicPath::new();
    write!(path, "{}/{}", prefix, id.suffix()).map_err(|_| Error::PathTooLong)?;
    Ok(path)
}

/// Maps a received topic back to its id. Only exact matches count.
pub fn resolve(prefix: &str, path: &str) -> Option<TopicId> {
    let suffix = path.strip_prefix(prefix)?.strip_prefix('/')?;
    TOPICS
        .iter()
        .find(|topic| topic.suffix == suffix)
        .map(|topic| topic.id)
}

#[cfg(test)]
mod test {
    use super::*;

    const PREFIX: &str = "myhouse/victron_cerbo_N/ed3a43se2345";

    #[test]
    fn table_index_matches_position() {
        for (position, topic) in TOPICS.iter().enumerate() {
            assert_eq!(topic.id.index(), position, "{}", topic.name);
        }
    }

    #[test]
    fn suffixes_and_names_unique() {
        for (i, a) in TOPICS.iter().enumerate() {
            for b in &TOPICS[i + 1..] {
                assert_ne!(a.suffix, b.suffix);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_by_index() {
        assert_eq!(TopicId::from_index(0), Some(TopicId::BatSoc));
        assert_eq!(TopicId::from_index(29), Some(TopicId::BatState));
        assert_eq!(TopicId::from_index(30), None);
        assert_eq!(TopicId::PvYield.name(), "PV_Yield");
        assert_eq!(TopicId::PvVoltage.suffix(), "solarcharger/1/Pv/0/V");
    }

    #[test]
    fn builds_full_path() {
        let path = full_path(PREFIX, TopicId::BatSoc).unwrap();
        assert_eq!(
            path.as_str(),
            "myhouse/victron_cerbo_N/ed3a43se2345/system/0/Dc/Battery/Soc"
        );
    }

    #[test]
    fn path_too_long() {
        let prefix = "x".repeat(TOPIC_PATH_MAX);
        assert_eq!(full_path(&prefix, TopicId::BatSoc), Err(Error::PathTooLong));
    }

    #[test]
    fn every_topic_resolves_to_itself() {
        for id in TopicId::ALL {
            let path = full_path(PREFIX, id).unwrap();
            assert_eq!(resolve(PREFIX, &path), Some(id));
        }
    }

    #[test]
    fn resolve_rejects_foreign_paths() {
        assert_eq!(resolve(PREFIX, "other/system/0/Dc/Battery/Soc"), None);
        assert_eq!(resolve(PREFIX, PREFIX), None);
        assert_eq!(
            resolve(PREFIX, "myhouse/victron_cerbo_N/ed3a43se2345system/0/Dc/Battery/Soc"),
            None
        );
        assert_eq!(
            resolve(PREFIX, "myhouse/victron_cerbo_N/ed3a43se2345/system/0/Dc/Battery/Soc/x"),
            None
        );
    }
}
