pub mod batch;
pub mod export_snapshot;
pub mod job_file;
pub mod run;
pub mod validate;
