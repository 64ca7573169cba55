//! GameBus activity record schema
//!
//! This module defines the input shape shared by every data source: activity
//! records carrying key-tagged property values, plus batch decoding and cursor
//! helpers.

mod activity;

pub use activity::*;
