//! Everything the firmware knows about the energy system, fed by MQTT
//! messages and a periodic sample tick.

use crate::config::Config;
use crate::constants::SAMPLES_PER_COLUMN;
use crate::history::{Column, Graphs};
use crate::night::{NightMode, NightSchedule, Transition};
use crate::payload;
use crate::telemetry::{Sample, Telemetry};
use crate::topic::{self, TopicId};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    UnknownTopic,
    Payload(payload::Error),
}

/// Outcome of one sample tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub sample: Sample,
    pub column: Option<Column>,
    pub transition: Option<Transition>,
}

pub struct Monitor {
    prefix: &'static str,
    telemetry: Telemetry,
    graphs: Graphs,
    night: NightMode,
}

impl Monitor {
    pub fn new(config: &Config) -> Self {
        Self {
            prefix: config.mqtt_topic_prefix,
            telemetry: Telemetry::new(),
            graphs: Graphs::new(config.graph_power_full_scale_w, SAMPLES_PER_COLUMN),
            night: NightMode::new(NightSchedule::new(config.hour_sleep, config.hour_awake)),
        }
    }

    /// Stores the value carried by a message on one of the subscribed topics
    pub fn on_message(&mut self, path: &str, payload: &[u8]) -> Result<TopicId, Error> {
        let id = topic::resolve(self.prefix, path).ok_or(Error::UnknownTopic)?;
        let value = payload::parse_value(payload).map_err(Error::Payload)?;
        self.telemetry.update(id, value);
        Ok(id)
    }

    /// Samples the current values into the graphs and re-evaluates night mode.
    /// `hour` is the local hour, `None` while the clock is unknown.
    pub fn on_tick(&mut self, hour: Option<u8>) -> Tick {
        let sample = self.telemetry.snapshot();
        Tick {
            sample,
            column: self.graphs.push(sample),
            transition: self.night.update(hour),
        }
    }

    /// Values are stale once the broker connection is gone
    pub fn on_disconnect(&mut self) {
        self.telemetry.clear();
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn graphs(&self) -> &Graphs {
        &self.graphs
    }

    pub fn is_night(&self) -> bool {
        self.night.is_night()
    }
}
