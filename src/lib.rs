#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{AutoCapture, FieldConsole};
pub use domain::{AnalysisReport, DomainError};
