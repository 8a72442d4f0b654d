//! Irrigation job: stored record and validated form.
//!
//! [`JobRecord`] is the loose shape clients send and the job file holds
//! (`id, active, name, type, moisture_min, moisture_max, plant, duration,
//! starttime, everyday`).  [`Job`] is what the scheduler works with; the
//! conversion rejects bad fields once, when the job is added.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::MAX_PLANTS;
use crate::error::JobError;
use crate::jobs::start_spec::StartSpec;

/// Job name capacity (bytes).
pub const NAME_CAP: usize = 32;

// ───────────────────────────────────────────────────────────────
// Trigger kind
// ───────────────────────────────────────────────────────────────

/// What starts a job.  Stored as `type`: 0 = time, 1 = moisture, 2 = both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    Time,
    Moisture,
    Both,
}

impl JobTrigger {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Time),
            1 => Some(Self::Moisture),
            2 => Some(Self::Both),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Time => 0,
            Self::Moisture => 1,
            Self::Both => 2,
        }
    }

    pub fn uses_time(self) -> bool {
        matches!(self, Self::Time | Self::Both)
    }

    pub fn uses_moisture(self) -> bool {
        matches!(self, Self::Moisture | Self::Both)
    }
}

// ───────────────────────────────────────────────────────────────
// Wire / storage record
// ───────────────────────────────────────────────────────────────

fn default_moisture_min() -> i32 {
    20
}

fn default_moisture_max() -> i32 {
    80
}

/// Job as stored and exchanged.  Missing fields take the device defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub trigger: u8,
    #[serde(default = "default_moisture_min")]
    pub moisture_min: i32,
    #[serde(default = "default_moisture_max")]
    pub moisture_max: i32,
    #[serde(default)]
    pub plant: i32,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub starttime: String,
    #[serde(default)]
    pub everyday: bool,
}

// ───────────────────────────────────────────────────────────────
// Validated job
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: u32,
    pub active: bool,
    pub name: heapless::String<NAME_CAP>,
    pub trigger: JobTrigger,
    pub plant_index: u8,
    pub duration_secs: u32,
    /// Required when the trigger uses time.
    pub start: Option<StartSpec>,
    pub recurs_daily: bool,
    pub moisture_min: u8,
    pub moisture_max: u8,
}

impl Job {
    /// Storage form of this job.
    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            id: i64::from(self.id),
            active: self.active,
            name: self.name.as_str().into(),
            trigger: self.trigger.code(),
            moisture_min: i32::from(self.moisture_min),
            moisture_max: i32::from(self.moisture_max),
            plant: i32::from(self.plant_index),
            duration: i64::from(self.duration_secs),
            starttime: self
                .start
                .map(|s| s.to_string())
                .unwrap_or_default(),
            everyday: self.recurs_daily,
        }
    }
}

impl TryFrom<&JobRecord> for Job {
    type Error = JobError;

    fn try_from(r: &JobRecord) -> Result<Self, JobError> {
        let id = u32::try_from(r.id).map_err(|_| JobError::InvalidField("id"))?;
        let trigger = JobTrigger::from_code(r.trigger).ok_or(JobError::InvalidField("type"))?;
        let plant_index = u8::try_from(r.plant)
            .ok()
            .filter(|p| *p < MAX_PLANTS)
            .ok_or(JobError::InvalidField("plant"))?;
        let duration_secs =
            u32::try_from(r.duration).map_err(|_| JobError::InvalidField("duration"))?;
        let moisture_min = percent(r.moisture_min).ok_or(JobError::InvalidField("moisture_min"))?;
        let moisture_max = percent(r.moisture_max).ok_or(JobError::InvalidField("moisture_max"))?;

        let start = if r.starttime.trim().is_empty() {
            None
        } else {
            Some(StartSpec::parse(&r.starttime).ok_or(JobError::InvalidField("starttime"))?)
        };
        if trigger.uses_time() && start.is_none() {
            return Err(JobError::InvalidField("starttime"));
        }

        Ok(Self {
            id,
            active: r.active,
            name: truncated_name(&r.name),
            trigger,
            plant_index,
            duration_secs,
            start,
            recurs_daily: r.everyday,
            moisture_min,
            moisture_max,
        })
    }
}

fn percent(v: i32) -> Option<u8> {
    u8::try_from(v).ok().filter(|p| *p <= 100)
}

fn truncated_name(name: &str) -> heapless::String<NAME_CAP> {
    let mut out = heapless::String::new();
    for c in name.chars() {
        if out.push(c).is_err() {
            warn!("JOB: name {:?} truncated to {} bytes", name, NAME_CAP);
            break;
        }
    }
    out
}
