pub mod config;
pub mod formats;
pub mod generate;
pub mod serve;
