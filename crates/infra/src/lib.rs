//! Infrastructure layer: unit queue, executor, configuration.

pub mod config;
pub mod jobs;
