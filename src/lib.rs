pub mod boundary;
pub mod cache;
pub mod cli;
pub mod cloudbuild;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod platform;
pub mod publish;
pub mod registry;
pub mod release;
pub mod ui;

pub use error::{PublishError, Result};
