//! Conversational inference for the voice session.
//!
//! This module provides:
//! * [`Conversant`] — async trait implemented by all chat backends.
//! * [`ApiConversant`] — OpenAI-compatible chat-completions backend.
//! * [`LlmError`] — error variants for conversational exchanges.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_chat::config::AppConfig;
//! use voice_chat::history::{DialogueHistory, Turn};
//! use voice_chat::llm::{ApiConversant, Conversant};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let conversant = ApiConversant::from_config(
//!         &config.api,
//!         config.session.conversant_model.clone(),
//!         config.conversation.temperature,
//!     );
//!
//!     let mut history = DialogueHistory::new();
//!     history.append(Turn::user("What's the capital of France?"));
//!     let answer = conversant.send(&history.snapshot()).await.unwrap();
//!     history.append(Turn::assistant(answer.clone()));
//!     println!("{answer}");
//! }
//! ```

pub mod conversant;

pub use conversant::{ApiConversant, Conversant, LlmError};
