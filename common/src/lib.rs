pub mod config;
pub mod payload;
