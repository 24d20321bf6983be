//! Clock abstraction.
//!
//! Freshness and age checks depend on "today"; going through [`Clock`] lets
//! tests pin the date (see `airdrop_nullables::NullClock`).

use chrono::{DateTime, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
