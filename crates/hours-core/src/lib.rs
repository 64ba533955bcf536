//! Core types for tweet-hours: the hour histogram model, the job
//! configuration layer and the shared error type.

pub mod error;
pub mod models;
pub mod settings;
