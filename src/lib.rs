// src/lib.rs

//! Youth mobility project aggregator library

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
