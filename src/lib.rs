pub mod cli;
pub mod core;

pub use crate::core::config::PipelineConfig;
pub use crate::core::plan::LaunchPlan;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaduceusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CaduceusError>;
