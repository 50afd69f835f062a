// Automation - Timestamped parameter schedules
//
// Every continuously-variable parameter of the voice (frequency, cutoff, Q, gain)
// is an `AutomatedParam`: a queue of timestamped events that is evaluated once per
// sample at monotonically increasing audio time. The control side never renders
// audio; it only pushes events, which makes scheduling a note O(1) regardless of
// how loaded the audio thread is.
//
// Semantics:
// - SetValue:    jump to `value` at `time`
// - LinearRamp:  interpolate linearly from the end of the previous event to `value` at `time`
// - ExpRamp:     same, exponential (linear fallback if an endpoint is <= 0)
// - SetTarget:   from `time` on, approach `target` with time constant `tau`
// Events with equal timestamps keep their insertion order.

use std::collections::VecDeque;

use crate::audio::dsp_utils::flush_denormals_to_zero;

/// Pre-reserved event capacity (one note schedules at most a handful of events)
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
    SetTarget { time: f64, target: f32, time_constant: f64 },
}

impl ParamEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. }
            | ParamEvent::LinearRamp { time, .. }
            | ParamEvent::ExponentialRamp { time, .. }
            | ParamEvent::SetTarget { time, .. } => time,
        }
    }
}

/// Active exponential approach started by a SetTarget event
#[derive(Debug, Clone, Copy)]
struct Approach {
    start_time: f64,
    start_value: f32,
    target: f32,
    time_constant: f64,
}

/// Evaluation state carried between samples
#[derive(Debug, Clone, Copy)]
struct Cursor {
    value: f32,
    /// Time and value at which the last event completed (start point of ramps)
    segment_start: (f64, f32),
    approach: Option<Approach>,
}

impl Cursor {
    /// Apply `events` up to time `t`, returning how many of them completed
    fn advance<'a>(&mut self, events: impl Iterator<Item = &'a ParamEvent>, t: f64) -> usize {
        let mut completed = 0;
        for &event in events {
            let event_time = event.time();
            match event {
                ParamEvent::SetValue { value, .. }
                | ParamEvent::LinearRamp { value, .. }
                | ParamEvent::ExponentialRamp { value, .. }
                    if event_time <= t =>
                {
                    self.value = value;
                    self.approach = None;
                    self.segment_start = (event_time, value);
                }
                ParamEvent::SetTarget {
                    target,
                    time_constant,
                    ..
                } if event_time <= t => {
                    self.segment_start = (event_time, self.value);
                    self.approach = Some(Approach {
                        start_time: event_time,
                        start_value: self.value,
                        target,
                        time_constant,
                    });
                }
                ParamEvent::LinearRamp { value, .. } => {
                    self.approach = None;
                    self.value = self.interpolate_linear(value, event_time, t);
                    return completed;
                }
                ParamEvent::ExponentialRamp { value, .. } => {
                    self.approach = None;
                    self.value = self.interpolate_exponential(value, event_time, t);
                    return completed;
                }
                ParamEvent::SetValue { .. } | ParamEvent::SetTarget { .. } => break,
            }
            completed += 1;
        }

        if let Some(approach) = self.approach {
            let elapsed = (t - approach.start_time).max(0.0);
            let decay = (-elapsed / approach.time_constant).exp() as f32;
            let value = approach.target + (approach.start_value - approach.target) * decay;
            self.value = approach.target + flush_denormals_to_zero(value - approach.target);
        }
        completed
    }

    fn interpolate_linear(&self, end_value: f32, end_time: f64, t: f64) -> f32 {
        let (start_time, start_value) = self.segment_start;
        let span = end_time - start_time;
        if span <= 0.0 {
            return end_value;
        }
        let progress = ((t - start_time) / span).clamp(0.0, 1.0) as f32;
        start_value + (end_value - start_value) * progress
    }

    fn interpolate_exponential(&self, end_value: f32, end_time: f64, t: f64) -> f32 {
        let (start_time, start_value) = self.segment_start;
        if start_value <= 0.0 || end_value <= 0.0 {
            return self.interpolate_linear(end_value, end_time, t);
        }
        let span = end_time - start_time;
        if span <= 0.0 {
            return end_value;
        }
        let progress = ((t - start_time) / span).clamp(0.0, 1.0);
        let ratio = (end_value / start_value) as f64;
        (start_value as f64 * ratio.powf(progress)) as f32
    }
}

pub struct AutomatedParam {
    cursor: Cursor,
    events: VecDeque<ParamEvent>,
}

impl AutomatedParam {
    pub fn new(initial_value: f32) -> Self {
        Self {
            cursor: Cursor {
                value: initial_value,
                segment_start: (0.0, initial_value),
                approach: None,
            },
            events: VecDeque::with_capacity(EVENT_CAPACITY),
        }
    }

    /// Value computed by the last call to `value_at`
    pub fn current(&self) -> f32 {
        self.cursor.value
    }

    /// Number of events not yet consumed
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { time, value });
    }

    pub fn linear_ramp_to(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::LinearRamp { time, value });
    }

    pub fn exponential_ramp_to(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::ExponentialRamp { time, value });
    }

    pub fn set_target_at(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(ParamEvent::SetTarget {
            time,
            target,
            time_constant: time_constant.max(1e-6),
        });
    }

    /// Drop every event scheduled at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        let keep = self.events.partition_point(|e| e.time() < time);
        self.events.truncate(keep);
    }

    /// Like `cancel_scheduled_values`, but the curve in progress at `time` is
    /// cut there instead of dropped, so the value up to `time` is unchanged
    /// and the parameter holds it afterwards.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at_time(time);
        let keep = self.events.partition_point(|e| e.time() < time);
        let interrupted = self.events.get(keep).copied();
        self.events.truncate(keep);

        let cut = match interrupted {
            Some(ParamEvent::LinearRamp { .. }) => ParamEvent::LinearRamp { time, value: held },
            Some(ParamEvent::ExponentialRamp { .. }) => {
                ParamEvent::ExponentialRamp { time, value: held }
            }
            _ => ParamEvent::SetValue { time, value: held },
        };
        self.events.push_back(cut);
    }

    /// Value the schedule will have at `t`, without consuming any event
    ///
    /// `t` must not precede the last `value_at` call.
    pub fn value_at_time(&self, t: f64) -> f32 {
        let mut cursor = self.cursor;
        cursor.advance(self.events.iter(), t);
        cursor.value
    }

    fn insert(&mut self, event: ParamEvent) {
        // Insert after any event with the same timestamp
        let index = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(index, event);
    }

    /// Evaluate the parameter at audio time `t`
    ///
    /// Must be called with non-decreasing `t`; events whose time has passed are
    /// consumed.
    pub fn value_at(&mut self, t: f64) -> f32 {
        let completed = self.cursor.advance(self.events.iter(), t);
        self.events.drain(..completed);
        self.cursor.value
    }
}
