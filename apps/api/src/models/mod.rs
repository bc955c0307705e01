pub mod file;
pub mod job_ad;
pub mod profile;
pub mod resume;
