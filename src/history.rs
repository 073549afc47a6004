//! Rolling averages and graph history for the panels.
//!
//! Every sample tick feeds the current [`Sample`] into four lanes. After
//! `samples_per_column` ticks each lane closes its running mean into one
//! graph column, scaled to a byte. A lane keeps [`GRAPH_COLUMNS`] columns in
//! a ring, the write cursor doubles as the vertical marker on the panel.

use crate::constants::GRAPH_COLUMNS;
use crate::telemetry::Sample;

pub const LANES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Net = 0,
    Load,
    Pv,
    Soc,
}

impl Lane {
    pub const ALL: [Lane; LANES] = [Lane::Net, Lane::Load, Lane::Pv, Lane::Soc];

    fn pick(self, sample: &Sample) -> Option<f32> {
        match self {
            Lane::Net => sample.net,
            Lane::Load => sample.load,
            Lane::Pv => sample.pv,
            Lane::Soc => sample.soc,
        }
    }
}

/// Result of feeding one tick into a [`RollingMean`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    Open,
    /// Target reached, carries the mean of the valid samples if there were any
    Closed(Option<f32>),
}

/// Mean over a fixed number of ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingMean {
    sum: f64,
    valid: u16,
    ticks: u8,
    target: u8,
}

impl RollingMean {
    /// A target of zero behaves like one
    pub const fn new(target: u8) -> Self {
        Self {
            sum: 0.0,
            valid: 0,
            ticks: 0,
            target: if target == 0 { 1 } else { target },
        }
    }

    /// Counts one tick. Missing values are skipped and do not count towards
    /// the mean, but still count towards the target.
    pub fn push(&mut self, value: Option<f32>) -> Window {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.sum += f64::from(value);
            self.valid += 1;
        }
        self.ticks += 1;
        if self.ticks < self.target {
            return Window::Open;
        }

        let mean = self.mean();
        *self = Self::new(self.target);
        Window::Closed(mean)
    }

    pub fn mean(&self) -> Option<f32> {
        if self.valid == 0 {
            None
        } else {
            Some((self.sum / f64::from(self.valid)) as f32)
        }
    }

    /// Ticks counted in the current window
    pub fn ticks(&self) -> u8 {
        self.ticks
    }

    /// Valid samples in the current window
    pub fn valid(&self) -> u16 {
        self.valid
    }

    pub fn target(&self) -> u8 {
        self.target
    }
}

/// Linear mapping of a value range onto a byte, clamped at both ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub min: f32,
    pub max: f32,
}

impl Scale {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn to_column(&self, value: f32) -> u8 {
        let span = self.max - self.min;
        if span <= 0.0 || value.is_nan() {
            return 0;
        }
        let ratio = ((value - self.min) / span).clamp(0.0, 1.0);
        // no f32::round in core
        (ratio * f32::from(u8::MAX) + 0.5) as u8
    }

    /// Column used when a whole interval had no data, the level of a zero reading
    pub fn baseline(&self) -> u8 {
        self.to_column(0.0)
    }
}

/// Ring of graph columns
#[derive(Debug, Clone)]
pub struct Series {
    columns: [u8; GRAPH_COLUMNS],
    cursor: usize,
    filled: usize,
}

impl Default for Series {
    fn default() -> Self {
        Self::new()
    }
}

impl Series {
    pub const fn new() -> Self {
        Self {
            columns: [0; GRAPH_COLUMNS],
            cursor: 0,
            filled: 0,
        }
    }

    pub fn push(&mut self, column: u8) {
        self.columns[self.cursor] = column;
        self.cursor = (self.cursor + 1) % GRAPH_COLUMNS;
        self.filled = (self.filled + 1).min(GRAPH_COLUMNS);
    }

    /// Position the next column is written to
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of columns written so far, saturating at the capacity
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Raw columns in display order, the cursor marks the oldest entry once wrapped
    pub fn columns(&self) -> &[u8; GRAPH_COLUMNS] {
        &self.columns
    }

    /// Written columns, oldest first
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = u8> + '_ {
        let start = if self.filled < GRAPH_COLUMNS {
            0
        } else {
            self.cursor
        };
        self.columns[start..]
            .iter()
            .chain(self.columns[..start].iter())
            .take(self.filled)
            .copied()
    }
}

/// One closed graph column across all lanes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    /// Position the column was written to
    pub x: usize,
    pub means: [Option<f32>; LANES],
    pub values: [u8; LANES],
}

#[derive(Debug, Clone)]
struct LaneState {
    mean: RollingMean,
    series: Series,
    scale: Scale,
}

#[derive(Debug, Clone)]
pub struct Graphs {
    lanes: [LaneState; LANES],
    last_means: [Option<f32>; LANES],
}

impl Graphs {
    /// Power lanes span `power_full_scale_w`, grid power is centred on zero
    pub fn new(power_full_scale_w: f32, samples_per_column: u8) -> Self {
        let lane = |scale| LaneState {
            mean: RollingMean::new(samples_per_column),
            series: Series::new(),
            scale,
        };
        Self {
            lanes: [
                lane(Scale::new(-power_full_scale_w, power_full_scale_w)),
                lane(Scale::new(0.0, power_full_scale_w)),
                lane(Scale::new(0.0, power_full_scale_w)),
                lane(Scale::new(0.0, 100.0)),
            ],
            last_means: [None; LANES],
        }
    }

    /// Feeds one tick. Returns the closed column every `samples_per_column` ticks.
    pub fn push(&mut self, sample: Sample) -> Option<Column> {
        // all lanes share the target, so they close on the same tick
        let mut means = [None; LANES];
        let mut closed = false;
        for lane in Lane::ALL {
            let state = &mut self.lanes[lane as usize];
            if let Window::Closed(mean) = state.mean.push(lane.pick(&sample)) {
                means[lane as usize] = mean;
                closed = true;
            }
        }
        if !closed {
            return None;
        }

        let x = self.cursor();
        let mut values = [0; LANES];
        for (i, state) in self.lanes.iter_mut().enumerate() {
            values[i] = match means[i] {
                Some(mean) => state.scale.to_column(mean),
                None => state.scale.baseline(),
            };
            state.series.push(values[i]);
        }
        self.last_means = means;

        Some(Column { x, means, values })
    }

    pub fn series(&self, lane: Lane) -> &Series {
        &self.lanes[lane as usize].series
    }

    /// Mean of the last closed column
    pub fn last_mean(&self, lane: Lane) -> Option<f32> {
        self.last_means[lane as usize]
    }

    /// Mean of the column still being collected
    pub fn running_mean(&self, lane: Lane) -> Option<f32> {
        self.lanes[lane as usize].mean.mean()
    }

    /// Shared write position of all lanes
    pub fn cursor(&self) -> usize {
        self.lanes[0].series.cursor()
    }

    /// Ticks collected towards the next column
    pub fn counter(&self) -> u8 {
        self.lanes[0].mean.ticks()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample(net: f32, load: f32, pv: f32, soc: f32) -> Sample {
        Sample {
            net: Some(net),
            load: Some(load),
            pv: Some(pv),
            soc: Some(soc),
        }
    }

    #[test]
    fn rolling_mean_closes_at_target() {
        let mut mean = RollingMean::new(4);
        assert_eq!(mean.mean(), None);

        assert_eq!(mean.push(Some(10.0)), Window::Open);
        assert_eq!(mean.push(None), Window::Open);
        assert_eq!(mean.push(Some(20.0)), Window::Open);
        assert_eq!(mean.valid(), 2);
        assert_eq!(mean.ticks(), 3);
        assert_eq!(mean.mean(), Some(15.0));

        assert_eq!(mean.push(Some(f32::NAN)), Window::Closed(Some(15.0)));
        assert_eq!(mean.ticks(), 0);
        assert_eq!(mean.valid(), 0);
        assert_eq!(mean.target(), 4);
    }

    #[test]
    fn rolling_mean_without_data() {
        let mut mean = RollingMean::new(2);
        assert_eq!(mean.push(None), Window::Open);
        assert_eq!(mean.push(None), Window::Closed(None));

        let mut every_tick = RollingMean::new(0);
        assert_eq!(every_tick.target(), 1);
        assert_eq!(every_tick.push(Some(3.0)), Window::Closed(Some(3.0)));
    }

    #[test]
    fn scale() {
        let scale = Scale::new(0.0, 100.0);
        assert_eq!(scale.to_column(0.0), 0);
        assert_eq!(scale.to_column(100.0), 255);
        assert_eq!(scale.to_column(50.0), 128);
        assert_eq!(scale.to_column(-5.0), 0);
        assert_eq!(scale.to_column(250.0), 255);
        assert_eq!(scale.to_column(f32::NAN), 0);

        let centred = Scale::new(-1000.0, 1000.0);
        assert_eq!(centred.baseline(), 128);
        assert_eq!(centred.to_column(-1000.0), 0);

        assert_eq!(Scale::new(5.0, 5.0).to_column(5.0), 0);
    }

    #[test]
    fn series_wraps() {
        let mut series = Series::new();
        assert!(series.is_empty());
        for i in 0..GRAPH_COLUMNS + 2 {
            series.push(i as u8);
        }
        assert_eq!(series.len(), GRAPH_COLUMNS);
        assert_eq!(series.cursor(), 2);

        let oldest_first: Vec<u8> = series.iter_oldest_first().collect();
        assert_eq!(oldest_first.len(), GRAPH_COLUMNS);
        assert_eq!(oldest_first[0], 2);
        assert_eq!(oldest_first[GRAPH_COLUMNS - 1], GRAPH_COLUMNS as u8 + 1);
    }

    #[test]
    fn series_partial() {
        let mut series = Series::new();
        series.push(7);
        series.push(9);
        let columns: Vec<u8> = series.iter_oldest_first().collect();
        assert_eq!(columns, [7, 9]);
    }

    #[test]
    fn column_every_n_samples() {
        let mut graphs = Graphs::new(1000.0, 3);
        assert_eq!(graphs.push(sample(0.0, 100.0, 200.0, 10.0)), None);
        assert_eq!(graphs.push(sample(0.0, 200.0, 400.0, 20.0)), None);
        assert_eq!(graphs.counter(), 2);
        assert_eq!(graphs.running_mean(Lane::Load), Some(150.0));

        let column = graphs.push(sample(0.0, 300.0, 600.0, 30.0)).unwrap();
        assert_eq!(column.x, 0);
        assert_eq!(
            column.means,
            [Some(0.0), Some(200.0), Some(400.0), Some(20.0)]
        );
        assert_eq!(column.values, [128, 51, 102, 51]);
        assert_eq!(graphs.counter(), 0);
        assert_eq!(graphs.cursor(), 1);
        assert_eq!(graphs.last_mean(Lane::Pv), Some(400.0));
        assert_eq!(graphs.series(Lane::Soc).columns()[0], 51);
    }

    #[test]
    fn missing_lane_uses_baseline() {
        let mut graphs = Graphs::new(1000.0, 1);
        let column = graphs
            .push(Sample {
                soc: Some(100.0),
                ..Sample::default()
            })
            .unwrap();
        assert_eq!(column.means, [None, None, None, Some(100.0)]);
        assert_eq!(column.values, [128, 0, 0, 255]);
    }

    #[test]
    fn cursor_wraps_with_series() {
        let mut graphs = Graphs::new(1000.0, 1);
        for _ in 0..GRAPH_COLUMNS {
            assert!(graphs.push(Sample::default()).is_some());
        }
        assert_eq!(graphs.cursor(), 0);
        assert_eq!(graphs.series(Lane::Net).len(), GRAPH_COLUMNS);
    }

    #[test]
    fn zero_samples_per_column_acts_as_one() {
        let mut graphs = Graphs::new(1000.0, 0);
        assert!(graphs.push(Sample::default()).is_some());
    }
}
