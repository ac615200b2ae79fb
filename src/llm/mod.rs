//! Chat client abstraction for the parameter override phase
//!
//! A trait-based layer so the extractor can run against a real provider
//! (GenAI) or a scripted mock interchangeably.

mod client;
mod genai;
mod mock;
mod selector;
mod types;

pub use client::LLMClient;
pub use self::genai::GenAIClient;
pub use mock::{MockLLMClient, MockResponse};
pub use selector::{select_override_client, SelectedClient};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
