//! Watch undertaker listing endpoints for new obituary notices, read the
//! portrait image via OCR, and mail subscribers when the extracted text
//! matches a configured keyword. Designed for periodic batch invocation;
//! one process run executes exactly one polling cycle.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
