pub mod access;
pub mod availability;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod remote;
pub mod store;
pub mod types;
