use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the current wall-clock time, in milliseconds since the UNIX
/// epoch.
///
/// `Write` substitutes this for any supplied timestamp that is negative.
/// Injecting a fake clock in tests avoids depending on real wall-clock
/// timing for anything but the rare scenario that deliberately measures
/// timeout latency.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

/// The default clock, backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX epoch");
        since_epoch.as_millis() as i64
    }
}
