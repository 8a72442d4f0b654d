//! Task watchdog for the control loop.
//!
//! A stalled loop leaves the pump relay wherever it was last driven; the
//! reset drops every relay output LOW.  The timeout is expressed in
//! control-loop periods so a faster loop also gets a tighter watchdog.
//!
//! `feed()` must be called once per tick.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Missed loop periods tolerated before the board resets.
pub const MISSED_TICKS: u32 = 50;

/// Lower bound so short loop periods don't trip on a slow NVS commit.
pub const MIN_TIMEOUT_MS: u32 = 3_000;

/// Timeout for a loop running every `loop_interval_ms`.
pub fn timeout_for(loop_interval_ms: u32) -> u32 {
    loop_interval_ms
        .saturating_mul(MISSED_TICKS)
        .max(MIN_TIMEOUT_MS)
}

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: core::cell::Cell<u64>,
}

impl Watchdog {
    /// Subscribe the calling task with a timeout sized for `loop_interval_ms`.
    pub fn for_loop(loop_interval_ms: u32) -> Self {
        let timeout_ms = timeout_for(loop_interval_ms);

        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: TWDT calls from the main task during start-up.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK as esp_err_t {
                log::warn!("WDT: reconfigure returned {} (already running?)", ret);
            }
            // SAFETY: a null handle subscribes the current task.
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            let subscribed = ret == ESP_OK as esp_err_t;
            if subscribed {
                log::info!("WDT: armed, {} ms ({} ms loop)", timeout_ms, loop_interval_ms);
            } else {
                log::warn!("WDT: subscribe failed ({}), loop unguarded", ret);
            }
            Self {
                timeout_ms,
                subscribed,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("WDT(sim): {} ms ({} ms loop)", timeout_ms, loop_interval_ms);
            Self {
                timeout_ms,
                feeds: core::cell::Cell::new(0),
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the TWDT for the subscribed current task.
            unsafe {
                esp_task_wdt_reset();
            }
        }

        #[cfg(not(target_os = "espidf"))]
        self.feeds.set(self.feeds.get() + 1);
    }

    /// Feeds seen so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn feeds(&self) -> u64 {
        self.feeds.get()
    }
}
