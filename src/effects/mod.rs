//! Time-driven LED effects.
//!
//! [`EffectCommand`] is a small state machine that yields one color per tick;
//! [`EffectsEngine`] keeps the configured prototypes and runs at most one copy.

pub mod command;
pub mod engine;

pub use command::{
    CompositeEffect, CyclicFadeEffect, EffectCommand, EffectParams, FadeEffect, StaticEffect,
};
pub use engine::EffectsEngine;
