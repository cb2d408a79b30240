//! Text-generation engine client.
//!
//! [`GenerationEngine`] is the seam the worker pool calls for each job;
//! [`HttpGenerationEngine`] implements it against an HTTP inference
//! server.

pub mod api;
pub mod engine;

pub use api::{GenerationApi, GenerationApiError};
pub use engine::{EngineError, GenerationEngine, GenerationParams, HttpGenerationEngine};
