//! Clock adapter.
//!
//! Implements [`TimeAuthority`] and provides the monotonic uptime that
//! drives every tick.
//!
//! - **`target_os = "espidf"`**: SNTP through `esp_idf_svc::sntp`, the
//!   newlib wall clock, and `esp_timer_get_time()` for uptime.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for uptime and
//!   a settable wall clock for host-side simulation.

use log::info;

use crate::app::ports::TimeAuthority;

pub struct SystemClock {
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,

    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    epoch: i64,
    #[cfg(not(target_os = "espidf"))]
    offset: time::UtcOffset,
    #[cfg(not(target_os = "espidf"))]
    timezone: String,
    #[cfg(not(target_os = "espidf"))]
    sync_requests: u32,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            sntp: None,

            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            epoch: 0,
            #[cfg(not(target_os = "espidf"))]
            offset: time::UtcOffset::UTC,
            #[cfg(not(target_os = "espidf"))]
            timezone: String::new(),
            #[cfg(not(target_os = "espidf"))]
            sync_requests: 0,
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(target_os = "espidf")]
impl TimeAuthority for SystemClock {
    fn begin_sync(&mut self) {
        if self.sntp.is_some() {
            // Already running in the background; it keeps polling on its own.
            return;
        }
        match esp_idf_svc::sntp::EspSntp::new_default() {
            Ok(sntp) => {
                info!("NTP: SNTP client started");
                self.sntp = Some(sntp);
            }
            Err(e) => log::warn!("NTP: SNTP start failed: {}", e),
        }
    }

    fn current_epoch_time(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn apply_timezone(&mut self, tz: &str) {
        // SAFETY: single-threaded main loop; nothing else reads TZ concurrently.
        unsafe {
            std::env::set_var("TZ", tz);
            esp_idf_svc::sys::tzset();
        }
        info!("NTP: timezone set to {}", tz);
    }

    fn utc_offset(&self, epoch: i64) -> time::UtcOffset {
        let secs = epoch as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return time::UtcOffset::UTC;
        }
        local_minus_utc(&tm, epoch)
            .and_then(|diff| time::UtcOffset::from_whole_seconds(diff).ok())
            .unwrap_or(time::UtcOffset::UTC)
    }
}

/// Seconds by which the broken-down local time `tm` leads UTC.
#[cfg(target_os = "espidf")]
fn local_minus_utc(tm: &esp_idf_svc::sys::tm, epoch: i64) -> Option<i32> {
    let month = time::Month::try_from(u8::try_from(tm.tm_mon + 1).ok()?).ok()?;
    let date = time::Date::from_calendar_date(tm.tm_year + 1900, month, u8::try_from(tm.tm_mday).ok()?)
        .ok()?;
    let clock = time::Time::from_hms(
        u8::try_from(tm.tm_hour).ok()?,
        u8::try_from(tm.tm_min).ok()?,
        u8::try_from(tm.tm_sec).ok()?,
    )
    .ok()?;
    let as_utc = time::PrimitiveDateTime::new(date, clock).assume_utc().unix_timestamp();
    i32::try_from(as_utc - epoch).ok()
}

#[cfg(not(target_os = "espidf"))]
impl SystemClock {
    /// Set the simulated wall clock (seconds since the Unix epoch).
    pub fn set_epoch(&mut self, epoch: i64) {
        self.epoch = epoch;
    }

    /// Set the simulated local offset.
    pub fn set_utc_offset(&mut self, offset: time::UtcOffset) {
        self.offset = offset;
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn sync_requests(&self) -> u32 {
        self.sync_requests
    }
}

#[cfg(not(target_os = "espidf"))]
impl TimeAuthority for SystemClock {
    fn begin_sync(&mut self) {
        self.sync_requests += 1;
        info!("NTP: sync requested (simulation)");
    }

    fn current_epoch_time(&self) -> i64 {
        self.epoch
    }

    fn apply_timezone(&mut self, tz: &str) {
        self.timezone = tz.to_owned();
    }

    fn utc_offset(&self, _epoch: i64) -> time::UtcOffset {
        self.offset
    }
}
