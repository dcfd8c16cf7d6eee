use crate::error::ConfigError;

/// Loss-concealment strategy applied when the head slot is empty at consume time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcealmentPolicy {
    /// Repeat the most recent live block; silence if none has ever arrived.
    RepeatLastGood,
    /// Emit the current faded copy of the last live block, then refade from it.
    FadeLastGood,
    /// Always substitute 128 zeros.
    AllZero,
}

impl ConcealmentPolicy {
    /// Parses the exact (case-sensitive) strings named in the config descriptor.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "REPEAT_LAST_GOOD" => Ok(Self::RepeatLastGood),
            "FADE_LAST_GOOD" => Ok(Self::FadeLastGood),
            "ALL_ZERO" => Ok(Self::AllZero),
            other => Err(ConfigError::UnknownConcealmentPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_policies() {
        assert_eq!(
            ConcealmentPolicy::parse("REPEAT_LAST_GOOD").unwrap(),
            ConcealmentPolicy::RepeatLastGood
        );
        assert_eq!(
            ConcealmentPolicy::parse("FADE_LAST_GOOD").unwrap(),
            ConcealmentPolicy::FadeLastGood
        );
        assert_eq!(
            ConcealmentPolicy::parse("ALL_ZERO").unwrap(),
            ConcealmentPolicy::AllZero
        );
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(ConcealmentPolicy::parse("repeat_last_good").is_err());
        assert!(ConcealmentPolicy::parse("BOGUS").is_err());
    }
}
