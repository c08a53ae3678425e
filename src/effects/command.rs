use std::time::Duration;

use crate::color::Color;

/// Parameters used to rebuild an effect that is being edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectParams {
    pub color: Color,
    pub duration: Duration,
}

fn progress(elapsed: Duration, duration: Duration) -> f32 {
    elapsed.as_secs_f32() / duration.as_secs_f32()
}

/// Holds one color for `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEffect {
    color: Color,
    duration: Duration,
    elapsed: Duration,
}

impl StaticEffect {
    pub fn new(color: Color, duration: Duration) -> Self {
        Self {
            color,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    pub fn execute(&mut self, interval: Duration) -> Color {
        self.elapsed += interval;
        self.color
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Linear blend from `start` to `end` over `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeEffect {
    start: Color,
    end: Color,
    duration: Duration,
    elapsed: Duration,
    finished: bool,
}

impl FadeEffect {
    pub fn new(start: Color, end: Color, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
            elapsed: Duration::ZERO,
            finished: false,
        }
    }

    pub fn execute(&mut self, interval: Duration) -> Color {
        self.elapsed += interval;
        if self.elapsed >= self.duration {
            self.finished = true;
            return self.end;
        }
        self.start
            .lerp(self.end, progress(self.elapsed, self.duration))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Runs sub-effects one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEffect {
    steps: Vec<EffectCommand>,
    current: usize,
}

impl CompositeEffect {
    pub fn new(steps: Vec<EffectCommand>) -> Self {
        Self { steps, current: 0 }
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn execute(&mut self, interval: Duration) -> Color {
        let Some(step) = self.steps.get_mut(self.current) else {
            return Color::BLACK;
        };
        let color = step.execute(interval);
        if step.is_finished() {
            self.current += 1;
        }
        color
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.steps.len()
    }
}

/// Endless loop through `colors`, dipping to black between neighbours.
///
/// For each color and its successor (the last wraps to the first) the
/// sequence holds a fade-out to black followed by a fade-in to the successor.
/// A step that finishes is replaced by a fresh copy of its prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicFadeEffect {
    colors: Vec<Color>,
    segment: Duration,
    sequence: Vec<EffectCommand>,
    prototype: Vec<EffectCommand>,
    current: usize,
}

impl CyclicFadeEffect {
    pub fn new(colors: Vec<Color>, segment: Duration) -> Self {
        let prototype: Vec<EffectCommand> = colors
            .iter()
            .zip(colors.iter().cycle().skip(1))
            .flat_map(|(&from, &to)| {
                [
                    EffectCommand::Fade(FadeEffect::new(from, Color::BLACK, segment)),
                    EffectCommand::Fade(FadeEffect::new(Color::BLACK, to, segment)),
                ]
            })
            .collect();
        Self {
            colors,
            segment,
            sequence: prototype.clone(),
            prototype,
            current: 0,
        }
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn execute(&mut self, interval: Duration) -> Color {
        let Some(step) = self.sequence.get_mut(self.current) else {
            return Color::BLACK;
        };
        let color = step.execute(interval);
        if step.is_finished() {
            *step = self.prototype[self.current].clone();
            self.current = (self.current + 1) % self.sequence.len();
        }
        color
    }

    pub fn is_finished(&self) -> bool {
        false
    }
}

/// A time-varying LED color program.
///
/// `Clone` is a deep copy with independent timers.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectCommand {
    Static(StaticEffect),
    Fade(FadeEffect),
    Composite(CompositeEffect),
    CyclicFade(CyclicFadeEffect),
}

impl EffectCommand {
    /// Advances by `interval` and returns the color for this tick.
    pub fn execute(&mut self, interval: Duration) -> Color {
        match self {
            EffectCommand::Static(e) => e.execute(interval),
            EffectCommand::Fade(e) => e.execute(interval),
            EffectCommand::Composite(e) => e.execute(interval),
            EffectCommand::CyclicFade(e) => e.execute(interval),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            EffectCommand::Static(e) => e.is_finished(),
            EffectCommand::Fade(e) => e.is_finished(),
            EffectCommand::Composite(e) => e.is_finished(),
            EffectCommand::CyclicFade(e) => e.is_finished(),
        }
    }

    /// Builds a fresh effect of the same variant from `params`.
    ///
    /// * Static: `params.color` for `params.duration`.
    /// * Fade: keeps its start color, fades to `params.color`.
    /// * Composite: every step is rebuilt with `params`.
    /// * CyclicFade: `params.color` replaces the first color,
    ///   `params.duration` becomes the segment length.
    pub fn make_new(&self, params: EffectParams) -> EffectCommand {
        match self {
            EffectCommand::Static(_) => {
                EffectCommand::Static(StaticEffect::new(params.color, params.duration))
            }
            EffectCommand::Fade(e) => {
                EffectCommand::Fade(FadeEffect::new(e.start, params.color, params.duration))
            }
            EffectCommand::Composite(e) => EffectCommand::Composite(CompositeEffect::new(
                e.steps.iter().map(|step| step.make_new(params)).collect(),
            )),
            EffectCommand::CyclicFade(e) => {
                let mut colors = e.colors.clone();
                match colors.first_mut() {
                    Some(first) => *first = params.color,
                    None => colors.push(params.color),
                }
                EffectCommand::CyclicFade(CyclicFadeEffect::new(colors, params.duration))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EffectCommand::Static(_) => "static",
            EffectCommand::Fade(_) => "fade",
            EffectCommand::Composite(_) => "composite",
            EffectCommand::CyclicFade(_) => "cyclic-fade",
        }
    }
}
