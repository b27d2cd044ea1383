pub mod config;
pub mod error;
pub mod export;

pub mod models;
pub mod services;
