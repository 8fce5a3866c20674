//! Test harness for scripted modelling sessions.
//!
//! Provides a fluent builder over [`feature_engine::Session`] so scenario
//! tests read like the modelling scripts they reproduce, plus assertion
//! helpers whose failures carry a summary of the feature tree.
//!
//! # Key Components
//!
//! - [`ModelBuilder`]: fluent API for building and checking models
//! - [`helpers`]: error type, tracing setup, selection and region constructors
//! - [`assertions`]: assertion helpers with diagnostics

pub mod assertions;
pub mod helpers;
pub mod workflow;

pub use helpers::{init_tracing, HarnessError};
pub use workflow::ModelBuilder;
