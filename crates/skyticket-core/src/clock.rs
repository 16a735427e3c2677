//! Source of "now" for date policy checks.

use chrono::{DateTime, Utc};

/// Wall clock used by the coordinators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// The system clock.
    #[default]
    System,
    /// A frozen instant, for deterministic tests.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// The current instant according to this clock.
    pub fn now(self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(instant) => instant,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn fixed_clock_does_not_move() {
        let instant = Utc::now() - Duration::days(3);
        let clock = Clock::Fixed(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn system_clock_tracks_utc() {
        let before = Utc::now();
        let now = Clock::System.now();
        assert!(now >= before);
    }
}
