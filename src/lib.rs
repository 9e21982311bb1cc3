pub mod config;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod generator;
pub mod grid;
pub mod progress_store;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod session;
pub mod sync;
pub mod types;
pub mod validator;
