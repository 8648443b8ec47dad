//! Core library functions for retweet-cascade block detection

pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod reduce;
pub mod storage;

pub use anyhow::{Result, anyhow};
