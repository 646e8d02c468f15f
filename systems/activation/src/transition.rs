//! Resumable, tick-driven transitions.

/// Outcome of advancing a transition by one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// More ticks are needed.
    InProgress,
    /// The transition reached its end state.
    Done,
}

impl Progress {
    /// Whether the transition finished.
    #[must_use]
    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

/// Normalized time over a fixed duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Tween {
    elapsed: f32,
    duration: f32,
}

impl Tween {
    pub(crate) fn new(duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            duration,
        }
    }

    /// Adds `dt` seconds and returns the progress fraction in `[0, 1]`.
    /// A zero-length tween completes on its first step.
    pub(crate) fn advance(&mut self, dt: f32) -> f32 {
        self.elapsed += dt.max(0.0);
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// Linear interpolation between two frame indices, rounded to the nearest frame.
pub(crate) fn frame_between(from: f32, to: f32, t: f32) -> i32 {
    (from + (to - from) * t).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tween_clamps_and_accumulates() {
        let mut tween = Tween::new(2.0);
        assert!((tween.advance(0.5) - 0.25).abs() < f32::EPSILON);
        assert!((tween.advance(0.5) - 0.5).abs() < f32::EPSILON);
        assert!((tween.advance(10.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_length_tween_finishes_immediately() {
        let mut tween = Tween::new(0.0);
        assert!((tween.advance(0.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn frames_round_to_nearest() {
        assert_eq!(frame_between(0.0, 4.0, 0.5), 2);
        assert_eq!(frame_between(5.0, 0.0, 0.35), 3);
        assert_eq!(frame_between(2.0, 2.0, 0.7), 2);
    }
}
