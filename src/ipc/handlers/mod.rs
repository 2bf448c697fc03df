pub mod attendance;
pub mod backup;
pub mod core;
pub mod data;
pub mod grading;
pub mod marks;
pub mod records;
pub mod reports;
pub mod requests;
pub mod setup;
