//! notekeep library
//!
//! Reminder scheduling and attachment lifecycle for a local note and task
//! store. The binary wraps this library; tests use it directly.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
