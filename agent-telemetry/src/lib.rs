//! Observability utilities for agent memory binaries.

#![warn(missing_docs, clippy::pedantic)]

mod tracing_support;

pub use tracing_support::{TracingOptions, init_tracing};
