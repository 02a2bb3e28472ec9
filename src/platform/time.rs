//! Wall-clock time
//!
//! Snapshot `createdAt` and export `exportedAt` use Unix milliseconds, like
//! `Date.now()` in the browser.

use std::cell::Cell;
use std::rc::Rc;

/// Source of Unix-epoch milliseconds
pub trait TimeSource {
    fn now_ms(&self) -> f64;
}

/// The real clock (`Date.now()` on web, `SystemTime` on native)
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl TimeSource for WallClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Stepping clock for tests. Each read advances by `step_ms` so
/// consecutive saves get distinct timestamps.
#[derive(Debug, Clone)]
pub struct ManualTime {
    now: Rc<Cell<f64>>,
    step_ms: f64,
}

impl ManualTime {
    pub fn new(start_ms: f64, step_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
            step_ms,
        }
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.step_ms);
        now
    }
}

/// Format Unix milliseconds as `YYYY-MM-DDTHH:MM:SS.sssZ` (UTC)
#[cfg(target_arch = "wasm32")]
pub fn iso8601(unix_ms: f64) -> String {
    let ms = if unix_ms.is_finite() { unix_ms.floor() } else { 0.0 };
    js_sys::Date::new(&ms.into()).to_iso_string().into()
}

/// Format Unix milliseconds as `YYYY-MM-DDTHH:MM:SS.sssZ` (UTC)
#[cfg(not(target_arch = "wasm32"))]
pub fn iso8601(unix_ms: f64) -> String {
    let total_ms = if unix_ms.is_finite() { unix_ms.floor() as i64 } else { 0 };
    let days = total_ms.div_euclid(86_400_000);
    let ms_of_day = total_ms.rem_euclid(86_400_000);

    // Civil date from days since 1970-01-01 (proleptic Gregorian)
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    let hours = ms_of_day / 3_600_000;
    let minutes = ms_of_day / 60_000 % 60;
    let seconds = ms_of_day / 1000 % 60;
    let millis = ms_of_day % 1000;

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z")
}
