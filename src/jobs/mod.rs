//! Irrigation jobs: record format, start-time parsing, and the ordered
//! job list.

pub mod job;
pub mod list;
pub mod start_spec;

pub use job::{Job, JobRecord, JobTrigger};
pub use list::JobList;
pub use start_spec::StartSpec;
