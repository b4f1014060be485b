pub mod config;
pub mod confirm;
pub mod error;
pub mod import_job;
pub mod queue;
pub mod routes;
pub mod state;
