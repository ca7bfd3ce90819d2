pub mod aws;
pub mod config;
pub mod drain;
pub mod error;
pub mod identity;
pub mod state;
