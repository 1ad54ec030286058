pub mod export_data;
pub mod job_queue;
