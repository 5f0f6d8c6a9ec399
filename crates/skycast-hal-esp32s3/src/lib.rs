#![no_std]

//! ESP32-S3 bindings for the skycast core: flash-backed persistent state,
//! battery measurement, the SNTP-latched wall clock, link-state sharing, and
//! the e-paper panel.

pub mod battery;
pub mod clock;
pub mod network;
pub mod panel;
pub mod storage;
