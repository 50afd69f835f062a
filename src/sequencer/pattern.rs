// Pattern - The 16-step sequence and its thread-safe store
//
// The pattern is allocated once and steps are overwritten in place. Writers
// publish a complete new pattern through an atomic pointer swap, so the
// scheduler either sees a step before or after an update, never half of one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::synth::pitch::PITCH_COUNT;

/// Number of steps in a pattern
pub const STEP_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Step index {0} out of range (0..{STEP_COUNT})")]
    IndexOutOfRange(usize),

    #[error("Pitch index {0} out of range (0..{PITCH_COUNT})")]
    PitchOutOfRange(usize),
}

pub type PatternResult<T> = Result<T, PatternError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Step {
    pub active: bool,
    pub pitch_index: usize,
    pub accent: bool,
    pub slide: bool,
}

/// Partial update for a step; `None` fields are left unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepUpdate {
    pub active: Option<bool>,
    pub pitch_index: Option<usize>,
    pub accent: Option<bool>,
    pub slide: Option<bool>,
}

impl StepUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn pitch(mut self, pitch_index: usize) -> Self {
        self.pitch_index = Some(pitch_index);
        self
    }

    pub fn accent(mut self, accent: bool) -> Self {
        self.accent = Some(accent);
        self
    }

    pub fn slide(mut self, slide: bool) -> Self {
        self.slide = Some(slide);
        self
    }

    fn validate(&self) -> PatternResult<()> {
        match self.pitch_index {
            Some(pitch) if pitch >= PITCH_COUNT => Err(PatternError::PitchOutOfRange(pitch)),
            _ => Ok(()),
        }
    }

    fn apply_to(&self, step: &mut Step) {
        if let Some(active) = self.active {
            step.active = active;
        }
        if let Some(pitch_index) = self.pitch_index {
            step.pitch_index = pitch_index;
        }
        if let Some(accent) = self.accent {
            step.accent = accent;
        }
        if let Some(slide) = self.slide {
            step.slide = slide;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pattern {
    steps: [Step; STEP_COUNT],
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> PatternResult<Step> {
        self.steps
            .get(index)
            .copied()
            .ok_or(PatternError::IndexOutOfRange(index))
    }

    pub fn set(&mut self, index: usize, update: StepUpdate) -> PatternResult<()> {
        update.validate()?;
        let step = self
            .steps
            .get_mut(index)
            .ok_or(PatternError::IndexOutOfRange(index))?;
        update.apply_to(step);
        Ok(())
    }

    pub fn steps(&self) -> &[Step; STEP_COUNT] {
        &self.steps
    }

    /// Reset every step to its default (inactive, lowest pitch, no modifiers)
    pub fn clear(&mut self) {
        self.steps = [Step::default(); STEP_COUNT];
    }

    pub fn active_count(&self) -> usize {
        self.steps.iter().filter(|s| s.active).count()
    }
}

/// Shared, atomically updated pattern
#[derive(Clone, Default)]
pub struct PatternStore {
    inner: Arc<ArcSwap<Pattern>>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_step(&self, index: usize) -> PatternResult<Step> {
        self.inner.load().get(index)
    }

    /// Merge `update` into step `index`
    pub fn set_step(&self, index: usize, update: StepUpdate) -> PatternResult<()> {
        if index >= STEP_COUNT {
            return Err(PatternError::IndexOutOfRange(index));
        }
        update.validate()?;

        self.inner.rcu(|current| {
            let mut next = **current;
            update.apply_to(&mut next.steps[index]);
            next
        });
        Ok(())
    }

    /// Consistent copy of the whole pattern
    pub fn snapshot(&self) -> Pattern {
        **self.inner.load()
    }

    /// Swap in a whole pattern at once
    pub fn replace(&self, pattern: Pattern) -> PatternResult<()> {
        if let Some(step) = pattern.steps.iter().find(|s| s.pitch_index >= PITCH_COUNT) {
            return Err(PatternError::PitchOutOfRange(step.pitch_index));
        }
        self.inner.store(Arc::new(pattern));
        Ok(())
    }

    pub fn clear(&self) {
        self.inner.store(Arc::new(Pattern::default()));
    }
}
