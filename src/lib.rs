//! chatrelay - Conversational proxy for LLM inference APIs
//!
//! This library provides the core functionality for the chatrelay server,
//! including configuration, conversation history, prompt building and
//! the HTTP front door.

pub mod config;
pub mod conversation;
pub mod error;
pub mod persona;
pub mod provider;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
