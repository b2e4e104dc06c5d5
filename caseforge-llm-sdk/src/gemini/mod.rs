//! Google Gemini API client and types
//!
//! Minimal generateContent support: text-only conversations with an
//! optional system instruction and JSON response mode.

pub mod client;
pub mod types;

pub use client::GeminiClient;
pub use types::*;
