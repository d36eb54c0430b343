pub mod batcher;
pub mod broker;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod locale;
pub mod mirror;
pub mod pipeline;
pub mod record;
pub mod storage;
