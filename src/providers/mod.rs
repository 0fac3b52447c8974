//! Model provider backends and their selection.

pub mod factory;
pub mod gemini;
pub mod openai_compat;
pub mod provider;

pub use factory::{ProviderFactory, ProviderKind, ProviderSettings};
pub use gemini::GeminiAdapter;
pub use openai_compat::{OpenAiCompatAdapter, ResponseFormat};
pub use provider::{GenerationConfig, ProviderAdapter, ProviderCredentials};
