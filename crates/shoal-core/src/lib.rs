pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod dispatch;
pub mod execution;
pub mod executors;
pub mod models;
pub mod registry;
pub mod reporting;
pub mod storage;
