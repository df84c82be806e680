pub mod config;
pub mod detection;
pub mod models;
pub mod pipeline;
pub mod shared;
