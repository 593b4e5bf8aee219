//! Request handlers

pub mod documents;
pub mod health;
pub mod jobs;
pub mod uploads;
