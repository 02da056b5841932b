//! Session aggregation for the Juju time tracker.
//! Loads logged work sessions from a data directory and answers the dashboard questions: where
//! did the hours of this week, month or year go, by project and by activity type.
//!

pub mod analysis;
pub mod cli;
pub mod error;
pub mod model;
pub mod storage;
pub mod utils;
