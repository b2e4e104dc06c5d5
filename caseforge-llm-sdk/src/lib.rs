pub mod client;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use types::{CompletionRequest, CompletionResponse, Message, ResponseFormat, Role, Usage};
