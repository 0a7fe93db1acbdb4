//! Generation gateway: prompt in, completion out.

mod chat;
mod echo;

pub use chat::OpenAiChatClient;
pub use echo::EchoGenerator;

use ragcrew_core::config::LlmConfig;
use ragcrew_core::error::{Error, Result};
use ragcrew_core::traits::Generator;
use tracing::info;

/// True when `APP_USE_FAKE_LLM` is `1` or `true`.
pub fn fake_llm_requested() -> bool {
    std::env::var("APP_USE_FAKE_LLM")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn get_default_generator(cfg: &LlmConfig) -> Result<Box<dyn Generator>> {
    if fake_llm_requested() {
        info!("using EchoGenerator");
        return Ok(Box::new(EchoGenerator::default()));
    }
    match cfg.api_type.to_ascii_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiChatClient::new(cfg)?)),
        other => Err(Error::Config(format!("unsupported llm api_type '{other}'"))),
    }
}
