//! Receipt recognition for Smart Ledger
//!
//! This crate wraps the external vision model behind the [`Recognizer`]
//! trait and provides an implementation for OpenAI-compatible
//! chat-completion endpoints, together with the prompt the model is sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledger_vision::{default_prompt, OpenAiRecognizer, Recognizer, VisionConfig};
//!
//! async fn run(image: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = VisionConfig::default().with_api_key("sk-...");
//!     let recognizer = OpenAiRecognizer::new(&config)?;
//!
//!     let result = recognizer
//!         .recognize(&image, "image/png", &default_prompt())
//!         .await?;
//!
//!     println!("{} paid to {}", result.amount, result.merchant);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod openai;
mod parse;
mod prompt;
mod recognizer;

pub use config::VisionConfig;
pub use error::VisionError;
pub use openai::OpenAiRecognizer;
pub use parse::parse_recognition;
pub use prompt::{build_prompt, default_prompt};
pub use recognizer::Recognizer;
