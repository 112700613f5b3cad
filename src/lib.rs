//! Video Generation Job Service
//!
//! This library accepts asynchronous text-to-video generation requests, runs
//! each one on a background worker, and lets clients poll for completion and
//! download the resulting file.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
