//! Gemini backend for the fusion engine
//!
//! `GeminiBackend` implements `fusion_engine::GenerationService` on top of
//! the Gemini REST API using `reqwest`. It owns the model-facing instruction
//! templates; the engine only hands it resolved arguments.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fusion_engine::FusionEngine;
//! use gemini_backend::GeminiBackend;
//!
//! let backend = GeminiBackend::from_env()?;
//! let mut engine = FusionEngine::new(Arc::new(backend));
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod prompts;
pub mod wire;

pub use client::GeminiBackend;
pub use config::GeminiConfig;
pub use error::{GeminiError, Result};
