//! In-memory `log` backend for the boot path. Records accumulate in a
//! fixed buffer so diagnostics survive phases where no console exists,
//! including the window after boot services are surrendered.

#![no_std]

use core::ops::Deref;
use core::sync::atomic::{AtomicBool, Ordering};

use arrayvec::ArrayString;
use spin::Mutex;

pub const BOOT_LOG_BUFFER_SIZE: usize = 16 * 1024;

static BUFFER: Mutex<ArrayString<BOOT_LOG_BUFFER_SIZE>> = Mutex::new(ArrayString::new_const());
static TRUNCATED: AtomicBool = AtomicBool::new(false);

struct BootLogger;

impl log::Log for BootLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        use core::fmt::Write;

        let mut guard = BUFFER.lock();
        let writer = &mut *guard;
        // a full buffer drops the rest of the record, nothing else we
        // can do here
        if write!(writer, "[{}] {}: {}\n", record.level(), record.target(), record.args()).is_err()
        {
            TRUNCATED.store(true, Ordering::Relaxed);
        }
    }

    fn flush(&self) {}
}

pub fn init() {
    let _ = log::set_logger(&BootLogger);
    log::set_max_level(log::LevelFilter::Trace);
}

/// Runs `f` over the accumulated log text while holding the lock. Do
/// not log from inside `f`.
pub fn with<F: FnOnce(&ArrayString<BOOT_LOG_BUFFER_SIZE>)>(f: F) {
    let guard = BUFFER.lock();
    f(guard.deref())
}

/// Whether any record has been dropped or cut short since boot.
pub fn truncated() -> bool {
    TRUNCATED.load(Ordering::Relaxed)
}

pub fn clear() {
    BUFFER.lock().clear();
    TRUNCATED.store(false, Ordering::Relaxed);
}
