use std::time::{Duration, SystemTime};

/// Time bound reported by a cloud request builder for one message.
///
/// Deadlines are immutable and compared by the absolute instant they resolve
/// to. The coordinator resolves every deadline exactly once per message,
/// against the wall-clock instant captured right before workers launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Bound relative to the start of message processing.
    Relative(Duration),
    /// Absolute wall-clock bound.
    Absolute(SystemTime),
}

impl Deadline {
    /// Deadline `after` the start of message processing.
    pub fn relative(after: Duration) -> Self {
        Deadline::Relative(after)
    }

    /// Deadline at a fixed wall-clock instant.
    pub fn absolute(at: SystemTime) -> Self {
        Deadline::Absolute(at)
    }

    /// Resolve to an absolute instant.
    ///
    /// The relative form resolves to `start + after`; the absolute form is
    /// returned unchanged, so resolving an already-resolved deadline is the
    /// identity for any `start`.
    pub fn to_absolute(self, start: SystemTime) -> SystemTime {
        match self {
            Deadline::Relative(after) => start + after,
            Deadline::Absolute(at) => at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_resolves_against_start() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let deadline = Deadline::relative(Duration::from_millis(500));
        assert_eq!(
            deadline.to_absolute(start),
            start + Duration::from_millis(500)
        );
    }

    #[test]
    fn absolute_ignores_start() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(2_000);
        let deadline = Deadline::absolute(at);
        assert_eq!(deadline.to_absolute(SystemTime::UNIX_EPOCH), at);
        assert_eq!(deadline.to_absolute(at + Duration::from_secs(60)), at);
    }

    #[test]
    fn resolving_twice_is_identity() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(3_000);
        let once = Deadline::relative(Duration::from_secs(2)).to_absolute(start);
        let twice = Deadline::absolute(once).to_absolute(start + Duration::from_secs(10));
        assert_eq!(once, twice);
    }
}
