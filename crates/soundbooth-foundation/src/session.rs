use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifies one continuous recording run. Derived from the wall clock at
/// construction time and stable for the owner's lifetime, so all chunks of
/// a run share the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn now() -> Self {
        SessionToken(unix_nanos())
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Nanoseconds since the UNIX epoch. Saturates to zero on a clock set
/// before 1970 rather than failing.
pub fn unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
