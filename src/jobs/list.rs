//! Ordered job collection.  Order is evaluation priority; ids are unique.

use log::info;

use crate::error::JobError;
use crate::jobs::job::Job;

/// Maximum number of jobs kept.
pub const JOB_CAP: usize = 16;

#[derive(Debug, Default)]
pub struct JobList {
    jobs: heapless::Vec<Job, JOB_CAP>,
}

impl JobList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job.  Id 0 starts a bulk import: the list is cleared
    /// before the job is inserted.
    pub fn add(&mut self, job: Job) -> Result<(), JobError> {
        if job.id == 0 {
            info!("JOB: id 0, replacing job list");
            self.jobs.clear();
        }
        if self.jobs.iter().any(|j| j.id == job.id) {
            return Err(JobError::DuplicateId(job.id));
        }
        let id = job.id;
        self.jobs.push(job).map_err(|_| JobError::ListFull)?;
        info!("JOB: added job {} ({} total)", id, self.jobs.len());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn as_slice(&self) -> &[Job] {
        &self.jobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn get(&self, id: u32) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
