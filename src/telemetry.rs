use crate::topic::{TopicId, TOPIC_COUNT};

const LOAD_PHASES: [TopicId; 3] = [
    TopicId::LoadPowerL1,
    TopicId::LoadPowerL2,
    TopicId::LoadPowerL3,
];
const NET_PHASES: [TopicId; 3] = [
    TopicId::NetPowerL1,
    TopicId::NetPowerL2,
    TopicId::NetPowerL3,
];

/// The four quantities that are averaged into the graphs
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Sample {
    pub net: Option<f32>,
    pub load: Option<f32>,
    pub pv: Option<f32>,
    pub soc: Option<f32>,
}

/// Latest value received for each topic
#[derive(Debug, Clone)]
pub struct Telemetry {
    values: [Option<f32>; TOPIC_COUNT],
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            values: [None; TOPIC_COUNT],
        }
    }

    pub fn update(&mut self, id: TopicId, value: Option<f32>) {
        self.values[id.index()] = value;
    }

    pub fn get(&self, id: TopicId) -> Option<f32> {
        self.values[id.index()]
    }

    /// Forgets all values, used after the broker connection is lost
    pub fn clear(&mut self) {
        self.values = [None; TOPIC_COUNT];
    }

    /// Number of topics with a value
    pub fn received(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    fn phase_sum(&self, phases: &[TopicId]) -> Option<f32> {
        phases
            .iter()
            .filter_map(|&id| self.get(id))
            .fold(None, |sum, v| Some(sum.unwrap_or(0.0) + v))
    }

    /// Grid power over all phases, negative while feeding in
    pub fn net_power(&self) -> Option<f32> {
        self.phase_sum(&NET_PHASES)
    }

    /// AC output power over all phases
    pub fn load_power(&self) -> Option<f32> {
        self.phase_sum(&LOAD_PHASES)
    }

    pub fn pv_power(&self) -> Option<f32> {
        self.get(TopicId::PvPower)
    }

    pub fn soc(&self) -> Option<f32> {
        self.get(TopicId::BatSoc)
    }

    pub fn snapshot(&self) -> Sample {
        Sample {
            net: self.net_power(),
            load: self.load_power(),
            pv: self.pv_power(),
            soc: self.soc(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty() {
        let telemetry = Telemetry::new();
        assert_eq!(telemetry.received(), 0);
        assert_eq!(telemetry.snapshot(), Sample::default());
    }

    #[test]
    fn update_and_get() {
        let mut telemetry = Telemetry::new();
        telemetry.update(TopicId::BatSoc, Some(81.0));
        telemetry.update(TopicId::PvPower, Some(2400.0));
        assert_eq!(telemetry.get(TopicId::BatSoc), Some(81.0));
        assert_eq!(telemetry.received(), 2);

        telemetry.update(TopicId::PvPower, None);
        assert_eq!(telemetry.pv_power(), None);
        assert_eq!(telemetry.received(), 1);
    }

    #[test]
    fn phase_sums() {
        let mut telemetry = Telemetry::new();
        telemetry.update(TopicId::NetPowerL1, Some(-300.0));
        telemetry.update(TopicId::NetPowerL3, Some(100.0));
        telemetry.update(TopicId::LoadPowerL2, Some(450.0));

        assert_eq!(telemetry.net_power(), Some(-200.0));
        assert_eq!(telemetry.load_power(), Some(450.0));
    }

    #[test]
    fn snapshot() {
        let mut telemetry = Telemetry::new();
        telemetry.update(TopicId::BatSoc, Some(55.0));
        telemetry.update(TopicId::PvPower, Some(1000.0));
        telemetry.update(TopicId::LoadPowerL1, Some(200.0));
        telemetry.update(TopicId::LoadPowerL2, Some(300.0));

        assert_eq!(
            telemetry.snapshot(),
            Sample {
                net: None,
                load: Some(500.0),
                pv: Some(1000.0),
                soc: Some(55.0),
            }
        );
    }

    #[test]
    fn clear() {
        let mut telemetry = Telemetry::new();
        telemetry.update(TopicId::BatState, Some(2.0));
        telemetry.clear();
        assert_eq!(telemetry.received(), 0);
    }
}
