pub mod config;
pub mod data_processing;
pub mod engines;
pub mod error;
pub mod model;
pub mod profile;
pub mod rules;
pub mod standings;

pub use error::ScoutError;
