//! Nanosecond time base shared by all crates.

/// Nanoseconds on either the device clock or the pipeline monotonic clock.
///
/// Signed so that offsets and differences can be expressed in the same type.
pub type Nanos = i64;

/// Nanoseconds per microsecond.
pub const NANOS_PER_MICRO: Nanos = 1_000;

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLI: Nanos = 1_000_000;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: Nanos = 1_000_000_000;

/// Convert whole milliseconds to [`Nanos`].
#[inline]
pub const fn millis(ms: i64) -> Nanos {
    ms * NANOS_PER_MILLI
}

/// Convert whole seconds to [`Nanos`].
#[inline]
pub const fn secs(s: i64) -> Nanos {
    s * NANOS_PER_SEC
}

/// Express [`Nanos`] as fractional milliseconds, for logs and metrics.
#[inline]
pub fn as_millis_f64(t: Nanos) -> f64 {
    t as f64 / NANOS_PER_MILLI as f64
}
