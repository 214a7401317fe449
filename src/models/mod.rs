pub mod config;
pub mod competition;
