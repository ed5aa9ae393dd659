//! Hardware-independent core library for roommon
//!
//! This crate contains the platform-agnostic parts of the room monitor: the
//! persistent sensor history store (append-only log, hot cache, timestamp
//! index), the range query engine that turns a named time span into a small
//! ordered series for graphing, user settings persistence, and the time helpers
//! the wake/sleep episodes rely on.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod query;
pub mod sampling;
pub mod sensors;
pub mod settings;
pub mod storage;
pub mod time;

pub use config::StoreConfig;
pub use query::{Series, SeriesRequest, TimeWindow};
pub use sensors::SensorType;
pub use storage::{BlockStorage, RecordStore, SensorRecord, StorageManager, StoreError};
