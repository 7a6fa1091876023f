pub mod config;
pub mod constants;
pub mod coverage;
pub mod dataset;
pub mod dates;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod profile;
pub mod quality;
pub mod table;
pub mod types;
