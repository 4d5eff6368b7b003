pub mod build_info;
pub mod cleanup;
pub mod config;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod schema;
pub mod verify;
