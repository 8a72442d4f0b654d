//! Growbox Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by one cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter       LogEventSink   NvsAdapter   SystemClock │
//! │  (Moisture+Actuator)   (EventSink)    (Config+Jobs) (SNTP)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Job FSM · Pump · Valves · Triggers · Clock sync       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{error, info, warn};

use growbox::adapters::hardware::HardwareAdapter;
use growbox::adapters::log_sink::LogEventSink;
use growbox::adapters::nvs::NvsAdapter;
use growbox::adapters::time::SystemClock;
use growbox::app::ports::ConfigPort;
use growbox::app::service::AppService;
use growbox::config::Settings;
use growbox::drivers::{hw_init, pump::PumpRelay, valve::ValveRelays, watchdog::Watchdog};
use growbox::pins;
use growbox::sensors::MoistureBank;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Growbox v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load settings from NVS (or defaults) ───────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {e}"))?;
    let settings = match nvs.load() {
        Ok(s) => s,
        Err(e) => {
            warn!("Settings load failed ({}), using defaults", e);
            Settings::default()
        }
    };

    // ── 3. Peripherals ────────────────────────────────────────
    let valve_pins: Vec<i32> = settings.valve_pins().collect();
    if let Err(e) = hw_init::init_peripherals(&valve_pins) {
        // Relays are undefined without GPIO setup; let the watchdog reset us.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    let watchdog = Watchdog::for_loop(settings.timing.control_loop_interval_ms);

    // ── 4. Adapters ───────────────────────────────────────────
    let mut hw = HardwareAdapter::new(
        MoistureBank::new(settings.plant_count),
        PumpRelay::new(pins::PUMP_GPIO),
        ValveRelays::new(&valve_pins)?,
    );
    let mut clock = SystemClock::new();
    let mut log_sink = LogEventSink::new();

    // ── 5. App service ────────────────────────────────────────
    let loop_ms = u64::from(settings.timing.control_loop_interval_ms);
    let mut app = AppService::new(settings);
    if let Err(e) = app.load_jobs(&nvs) {
        warn!("Stored jobs unavailable ({}), starting with an empty list", e);
    }
    app.start(&mut hw, &mut log_sink)?;

    info!("System ready. Entering control loop ({} ms).", loop_ms);

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now_ms = clock.uptime_ms();
        app.tick(now_ms, &mut hw, &mut clock, &mut log_sink);
        watchdog.feed();

        let elapsed = clock.uptime_ms().saturating_sub(now_ms);
        let sleep_ms = loop_ms.saturating_sub(elapsed).max(1);
        FreeRtos::delay_ms(sleep_ms as u32);
    }
}
