// LLM abstraction layer

pub mod provider;
pub mod sse;
pub mod openai;
pub mod anthropic;
pub mod google;

pub use provider::*;
