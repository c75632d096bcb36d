//! Process-wide switches for texture replacement and dumping.
//!
//! The switches are read with relaxed ordering: flipping one while a frame is being rendered may
//! take effect in that frame or the next.

use core::sync::atomic::{AtomicBool, Ordering};

static REPLACE_ENABLED: AtomicBool = AtomicBool::new(false);
static DUMP_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn replace_enabled() -> bool {
    REPLACE_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn set_replace_enabled(value: bool) {
    REPLACE_ENABLED.store(value, Ordering::Relaxed);
}

#[inline]
pub fn dump_enabled() -> bool {
    DUMP_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn set_dump_enabled(value: bool) {
    DUMP_ENABLED.store(value, Ordering::Relaxed);
}

/// A snapshot of both switches, taken once per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Features {
    pub replace: bool,
    pub dump: bool,
}

impl Features {
    pub fn current() -> Self {
        Features {
            replace: replace_enabled(),
            dump: dump_enabled(),
        }
    }

    #[inline]
    pub fn any(self) -> bool {
        self.replace || self.dump
    }
}

/// Held by tests that flip the switches, since they are shared by the whole test binary.
#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
