pub mod config;
pub mod logging;
pub mod model;

// Harvest pipeline, bottom-up
pub mod retry;
pub mod fetch;
pub mod aggregate;
pub mod scheduler;
pub mod checkpoint;
pub mod pipeline;

// Maintenance commands
pub mod discover;
pub mod refresh;
