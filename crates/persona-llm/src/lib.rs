//! HTTP client for the OpenAI-compatible chat-completion endpoint shared by
//! OpenRouter and AgentRouter, with retry, prompt construction, and response
//! validation layered on top. `gateway::LlmGateway` is the one type the rest
//! of the workspace is expected to hold onto.

pub mod error;
pub mod gateway;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod sampling;
pub mod validator;

pub use error::LlmError;
pub use gateway::LlmGateway;
pub use provider::{HttpLlmProvider, LlmProvider, Provider};
pub use retry::RetryPolicy;
