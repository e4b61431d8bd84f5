pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod tables;

// Layered boundaries: ports in app, adapters in infra
pub mod app;
pub mod infra;

pub mod observability;

pub use config::Config;
pub use domain::{MovieRecord, RecordSet};
pub use error::{PipelineError, Result, SchemaError};
pub use pipeline::{Pipeline, PipelineOutput, PipelineSummary, SourceTables};
