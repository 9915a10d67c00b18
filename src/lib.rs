// Library exports for testing and modular access

pub mod app;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;

pub use error::{AppError, Result};
