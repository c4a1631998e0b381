//! Core types shared across the pipeline: configuration, errors, projects.

pub mod config;
pub mod error;
pub mod project;
