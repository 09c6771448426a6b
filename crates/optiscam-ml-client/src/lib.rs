//! Client for the model sidecar service.
//!
//! The sidecar hosts the recognition models the pipeline treats as external
//! collaborators: a two-tier OCR stack, a speech recognizer and a
//! vision-language classifier. This crate exposes them through narrow traits
//! so the pipeline can be driven by in-process fakes in tests.

pub mod client;
pub mod error;
pub mod recognizer;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use recognizer::{SpeechRecognizer, TextRecognizer, VisionLanguageModel};
pub use types::{ClassifierOutput, RecognizedLine, TokenLogits};
