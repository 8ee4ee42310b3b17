use serde::{Deserialize, Serialize};

/// Recent-activity scalar of a channel, in [0, 1].
///
/// Set to 1 on every delivery and reduced by a fixed step on every tick,
/// used by renderers to shade the edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Usage(f64);

impl Usage {
    pub const FULL: Usage = Usage(1.0);

    pub fn value(self) -> f64 {
        self.0
    }

    /// Marks the channel as just used.
    pub fn touch(&mut self) {
        self.0 = 1.0;
    }

    /// Reduces usage by `step`, floored at 0.
    pub fn decay(&mut self, step: f64) {
        self.0 = (self.0 - step.max(0.0)).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_floors_at_zero() {
        let mut u = Usage::FULL;
        u.decay(0.4);
        assert!((u.value() - 0.6).abs() < 1e-9);
        u.decay(0.4);
        u.decay(0.4);
        assert_eq!(u.value(), 0.0);
    }

    #[test]
    fn touch_resets_to_full() {
        let mut u = Usage::default();
        assert_eq!(u.value(), 0.0);
        u.touch();
        assert_eq!(u, Usage::FULL);
    }

    #[test]
    fn negative_step_is_ignored() {
        let mut u = Usage::FULL;
        u.decay(-1.0);
        assert_eq!(u, Usage::FULL);
    }
}
