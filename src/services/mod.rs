pub mod executor;
pub mod jobs;
pub mod producer;
pub mod store;
