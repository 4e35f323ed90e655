//! Library crate for port-sweep exposing the scan engine and its helpers.
pub mod aggregator;
pub mod config;
pub mod connector;
pub mod output;
pub mod pool;
pub mod ports;
pub mod producer;
pub mod scanner;
pub mod targets;
pub mod types;
