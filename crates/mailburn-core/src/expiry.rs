//! Expiration policy.
//!
//! Pure functions over epoch-millisecond timestamps. Nothing in here reads
//! the clock; callers pass `now` explicitly.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use crate::{Error, Result};

/// Milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// One hour in milliseconds.
pub const HOUR_MS: u64 = 3_600_000;
/// One day in milliseconds.
pub const DAY_MS: u64 = 86_400_000;
/// One week in milliseconds.
pub const WEEK_MS: u64 = 604_800_000;
/// One "month" in milliseconds: a fixed 30 days, not calendar-aware.
pub const MONTH_MS: u64 = 2_592_000_000;

/// Label shown for zero or absent remaining time.
pub const EXPIRED_LABEL: &str = "Expired";

/// Unit used when picking a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    /// 3,600,000 ms.
    Hours,
    /// 86,400,000 ms.
    Days,
    /// 604,800,000 ms.
    Weeks,
    /// 2,592,000,000 ms. Always 30 days regardless of the calendar.
    Months,
}

impl DurationUnit {
    /// Milliseconds in one unit.
    #[must_use]
    pub const fn millis(self) -> u64 {
        match self {
            Self::Hours => HOUR_MS,
            Self::Days => DAY_MS,
            Self::Weeks => WEEK_MS,
            Self::Months => MONTH_MS,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            "w" | "week" | "weeks" => Ok(Self::Weeks),
            "mo" | "month" | "months" => Ok(Self::Months),
            other => Err(Error::InvalidLifetime(format!("unknown unit {other:?}"))),
        }
    }
}

/// A positive validity window for a new address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Lifetime(NonZeroU64);

impl Lifetime {
    /// One hour.
    pub const ONE_HOUR: Self = Self::constant(HOUR_MS);
    /// One day.
    pub const ONE_DAY: Self = Self::constant(DAY_MS);
    /// One week.
    pub const ONE_WEEK: Self = Self::constant(WEEK_MS);
    /// Two weeks.
    pub const TWO_WEEKS: Self = Self::constant(2 * WEEK_MS);

    const fn constant(ms: u64) -> Self {
        match NonZeroU64::new(ms) {
            Some(ms) => Self(ms),
            None => panic!("preset lifetimes are non-zero"),
        }
    }

    /// Creates a lifetime from a raw millisecond count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLifetime`] if `ms` is zero.
    pub fn from_millis(ms: u64) -> Result<Self> {
        NonZeroU64::new(ms)
            .map(Self)
            .ok_or_else(|| Error::InvalidLifetime("lifetime must be positive".to_string()))
    }

    /// Creates a lifetime of `amount` units.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLifetime`] if the amount is zero or the
    /// product overflows.
    pub fn new(amount: u64, unit: DurationUnit) -> Result<Self> {
        let ms = amount
            .checked_mul(unit.millis())
            .ok_or_else(|| Error::InvalidLifetime(format!("{amount} {unit:?} overflows")))?;
        Self::from_millis(ms)
    }

    /// Looks up one of the quick-pick presets (`1h`, `24h`, `7d`, `2w`).
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "1h" => Some(Self::ONE_HOUR),
            "24h" => Some(Self::ONE_DAY),
            "7d" => Some(Self::ONE_WEEK),
            "2w" => Some(Self::TWO_WEEKS),
            _ => None,
        }
    }

    /// Length in milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_remaining(Some(self.as_millis())))
    }
}

/// Parses `<amount><unit>`, e.g. `3d`, `12h`, `2w`, `1mo`.
impl FromStr for Lifetime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(preset) = Self::preset(s) {
            return Ok(preset);
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| Error::InvalidLifetime(format!("missing unit in {s:?}")))?;
        let (amount, unit) = s.split_at(split);
        let amount: u64 = amount
            .parse()
            .map_err(|_| Error::InvalidLifetime(format!("missing amount in {s:?}")))?;
        Self::new(amount, unit.trim().parse()?)
    }
}

/// Absolute expiry for an address created at `now`.
#[must_use]
pub fn compute_expiry(now: EpochMillis, lifetime: Lifetime) -> EpochMillis {
    i64::try_from(lifetime.as_millis()).map_or(EpochMillis::MAX, |ms| now.saturating_add(ms))
}

/// Whether an address with this expiry is dead at `now`.
///
/// The boundary is strict: an address expiring exactly at `now` is still
/// valid for that instant.
#[must_use]
pub const fn is_expired(expiry: EpochMillis, now: EpochMillis) -> bool {
    now > expiry
}

/// Milliseconds left before `expiry`, or `None` once nothing is left.
#[must_use]
pub fn remaining_time(expiry: EpochMillis, now: EpochMillis) -> Option<u64> {
    expiry
        .checked_sub(now)
        .and_then(|left| u64::try_from(left).ok())
        .filter(|&left| left > 0)
}

/// Renders a remaining duration using its two coarsest units.
///
/// `None` and zero render as [`EXPIRED_LABEL`].
#[must_use]
pub fn format_remaining(ms: Option<u64>) -> String {
    let Some(ms) = ms.filter(|&ms| ms > 0) else {
        return EXPIRED_LABEL.to_string();
    };

    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h", hours % 24)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

/// How soon an address runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    /// An hour or less left, or already gone.
    Critical,
    /// A day or less left.
    Warning,
    /// More than a day left.
    Normal,
}

impl Urgency {
    /// Classifies a remaining duration as returned by [`remaining_time`].
    #[must_use]
    pub fn from_remaining(ms: Option<u64>) -> Self {
        match ms.unwrap_or(0) {
            ms if ms <= HOUR_MS => Self::Critical,
            ms if ms <= DAY_MS => Self::Warning,
            _ => Self::Normal,
        }
    }
}

/// Human-readable attachment size (`0 B`, `512 B`, `1.5 KB`, ... `GB`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.1}");
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{rendered} {}", UNITS[unit])
}
