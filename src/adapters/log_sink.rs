//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A WebSocket adapter pushing status to clients would implement the
//! same trait.

use core::fmt::Write;

use log::{info, warn};

use crate::app::events::{AppEvent, Status};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// Valve states as a compact `0/1` string, plant 0 first.
fn valve_mask(status: &Status) -> heapless::String<16> {
    let mut mask = heapless::String::new();
    for &open in &status.valves {
        let _ = mask.write_char(if open { '1' } else { '0' });
    }
    mask
}

fn log_status(tag: &str, s: &Status) {
    info!(
        "{} | pump={} valves={} auto={} runtime={}s | job={:?}/{:?} | clock={}",
        tag,
        s.pump.name(),
        valve_mask(s),
        if s.auto_enabled { "on" } else { "off" },
        s.pump_runtime_secs,
        s.job_state,
        s.running_job,
        if s.clock_synced { "synced" } else { "unset" },
    );
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(s) => log_status("START", s),
            AppEvent::StatusChanged(s) => log_status("STATUS", s),
            AppEvent::JobStarted { id, plant_index } => {
                info!("JOB | start id={} plant={}", id, plant_index);
            }
            AppEvent::JobFinished { id } => {
                info!("JOB | finished id={}", id);
            }
            AppEvent::JobAborted { id, reason } => {
                warn!("JOB | aborted id={} reason={}", id, reason);
            }
            AppEvent::TimeSynced { epoch } => {
                info!("NTP | synced epoch={}", epoch);
            }
            AppEvent::TimeSyncFailed { attempts } => {
                warn!("NTP | gave up after {} attempts", attempts);
            }
        }
    }
}
