pub mod email;
pub mod jobs;
pub mod search;
pub mod storage;
