use std::time::Duration;

use log::{debug, info};

use crate::color::Color;

use super::command::{EffectCommand, EffectParams};

#[derive(Debug)]
struct ActiveEffect {
    index: usize,
    effect: EffectCommand,
}

/// Registry of effect prototypes plus at most one running instance.
///
/// Prototypes are never executed; activating one runs a deep copy.
#[derive(Debug, Default)]
pub struct EffectsEngine {
    prototypes: Vec<EffectCommand>,
    active: Option<ActiveEffect>,
}

impl EffectsEngine {
    pub fn new(prototypes: Vec<EffectCommand>) -> Self {
        Self {
            prototypes,
            active: None,
        }
    }

    pub fn effects(&self) -> &[EffectCommand] {
        &self.prototypes
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.index)
    }

    /// Starts a fresh copy of prototype `index`, clamped to the last one.
    ///
    /// Returns the index actually activated, or `None` with no prototypes.
    pub fn set_active_effect(&mut self, index: usize) -> Option<usize> {
        let Some(last) = self.prototypes.len().checked_sub(1) else {
            self.active = None;
            return None;
        };
        let index = index.min(last);
        info!("Activating {} effect #{index}", self.prototypes[index].kind());
        self.active = Some(ActiveEffect {
            index,
            effect: self.prototypes[index].clone(),
        });
        Some(index)
    }

    /// Rebuilds the active effect from `params`, replacing both its
    /// prototype and the running instance. Returns `false` when idle.
    pub fn update_active_effect(&mut self, params: EffectParams) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let rebuilt = active.effect.make_new(params);
        self.prototypes[active.index] = rebuilt.clone();
        active.effect = rebuilt;
        true
    }

    pub fn clear_active_effect(&mut self) {
        self.active = None;
    }

    /// Advances the running effect by `interval`.
    ///
    /// Returns its color, or `None` when nothing is running. A finished
    /// effect still yields its last color and then leaves the slot empty.
    pub fn update(&mut self, interval: Duration) -> Option<Color> {
        let active = self.active.as_mut()?;
        let color = active.effect.execute(interval);
        if active.effect.is_finished() {
            debug!("Effect #{} finished", active.index);
            self.active = None;
        }
        Some(color)
    }
}
