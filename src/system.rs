//! In-memory data model: controllers, their fan channels and per-fan curves.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::fan_curve::{self, BezierCurve, CurveMode, PointCurve};

/// Fan channels on a Riing Quad hub.
pub const CHANNELS_PER_CONTROLLER: usize = 5;

/// Temperature source that drives a fan.
///
/// Persisted as `0` (CPU) or `1` (GPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MonitoringMode {
    #[default]
    Cpu,
    Gpu,
}

impl TryFrom<u8> for MonitoringMode {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Gpu),
            other => Err(anyhow!("Monitoring mode must be 0 (CPU) or 1 (GPU), got {other}")),
        }
    }
}

impl From<MonitoringMode> for u8 {
    fn from(mode: MonitoringMode) -> Self {
        match mode {
            MonitoringMode::Cpu => 0,
            MonitoringMode::Gpu => 1,
        }
    }
}

/// One fan channel. Both curves are always present.
#[derive(Debug, Clone, PartialEq)]
pub struct Fan {
    index: usize,
    pub monitoring: MonitoringMode,
    pub point_curve: PointCurve,
    pub bezier_curve: BezierCurve,
}

impl Fan {
    /// Creates a CPU-monitored fan with default curves.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            monitoring: MonitoringMode::default(),
            point_curve: PointCurve::default(),
            bezier_curve: BezierCurve::default(),
        }
    }

    pub fn with_curves(
        index: usize,
        monitoring: MonitoringMode,
        point_curve: PointCurve,
        bezier_curve: BezierCurve,
    ) -> Self {
        Self {
            index,
            monitoring,
            point_curve,
            bezier_curve,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn speed_for_temperature(&self, mode: CurveMode, temp: f32) -> f32 {
        fan_curve::speed_for_temperature(mode, &self.point_curve, &self.bezier_curve, temp)
    }
}

/// One physical hub and its fans, ordered by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    index: usize,
    fans: Vec<Fan>,
}

impl Controller {
    pub fn new(index: usize, fan_count: usize) -> Self {
        Self {
            index,
            fans: (0..fan_count).map(Fan::new).collect(),
        }
    }

    /// Wraps existing fans, re-numbering them by position.
    pub fn with_fans(index: usize, fans: Vec<Fan>) -> Self {
        Self {
            index,
            fans: fans
                .into_iter()
                .enumerate()
                .map(|(idx, fan)| Fan { index: idx, ..fan })
                .collect(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn fans(&self) -> &[Fan] {
        &self.fans
    }

    pub fn fan(&self, idx: usize) -> Option<&Fan> {
        self.fans.get(idx)
    }

    pub fn fan_mut(&mut self, idx: usize) -> Option<&mut Fan> {
        self.fans.get_mut(idx)
    }
}

/// All controllers in physical order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct System {
    controllers: Vec<Controller>,
}

impl System {
    pub fn new(controllers: Vec<Controller>) -> Self {
        Self {
            controllers: controllers
                .into_iter()
                .enumerate()
                .map(|(idx, ctrl)| Controller { index: idx, ..ctrl })
                .collect(),
        }
    }

    /// Default-valued system for `controllers` hubs with `fans` channels each.
    pub fn with_topology(controllers: usize, fans: usize) -> Self {
        Self {
            controllers: (0..controllers).map(|c| Controller::new(c, fans)).collect(),
        }
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn controller(&self, idx: usize) -> Option<&Controller> {
        self.controllers.get(idx)
    }

    pub fn fan(&self, controller: usize, fan: usize) -> Option<&Fan> {
        self.controllers.get(controller)?.fan(fan)
    }

    pub fn fan_mut(&mut self, controller: usize, fan: usize) -> Option<&mut Fan> {
        self.controllers.get_mut(controller)?.fan_mut(fan)
    }

    /// Iterates `(controller index, fan)` over every fan.
    pub fn fans(&self) -> impl Iterator<Item = (usize, &Fan)> {
        self.controllers
            .iter()
            .flat_map(|ctrl| ctrl.fans.iter().map(move |fan| (ctrl.index, fan)))
    }

    /// Grows or shrinks the model to match the discovered hardware.
    ///
    /// Existing fans keep their curves; new slots get defaults.
    pub fn fit_topology(&mut self, controllers: usize, fans: usize) {
        self.controllers.truncate(controllers);
        for ctrl in &mut self.controllers {
            ctrl.fans.truncate(fans);
            let have = ctrl.fans.len();
            ctrl.fans.extend((have..fans).map(Fan::new));
        }
        let have = self.controllers.len();
        self.controllers
            .extend((have..controllers).map(|c| Controller::new(c, fans)));
    }
}
