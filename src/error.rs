use std::io;

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError as UrlParseError;

use serde_json::Error as JsonError;

#[cfg(feature = "wasm")]
use serde_wasm_bindgen::Error as WasmError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum HelpError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Remote request failed: {0}")]
    Fetch(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Malformed server response: {0}")]
    Parse(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Server answered with status {0}")]
    Status(u16),
}

impl From<toml::de::Error> for HelpError {
    fn from(src: toml::de::Error) -> HelpError {
        HelpError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for HelpError {
    fn from(src: toml::ser::Error) -> HelpError {
        HelpError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for HelpError {
    fn from(src: JsonError) -> HelpError {
        HelpError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for HelpError {
    fn from(src: UrlParseError) -> HelpError {
        HelpError::Config(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for HelpError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => HelpError::NotFound(format!("{x}")),
            _ => HelpError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<RegexError> for HelpError {
    fn from(x: RegexError) -> Self {
        HelpError::Parse(format!("Regex parse failed: {x}"))
    }
}

impl From<roxmltree::Error> for HelpError {
    fn from(x: roxmltree::Error) -> Self {
        HelpError::Parse(format!("TOC fragment is not well-formed XML: {x}"))
    }
}

impl From<reqwest::Error> for HelpError {
    fn from(x: reqwest::Error) -> Self {
        match x.status() {
            Some(status) => HelpError::Status(status.as_u16()),
            None => HelpError::Fetch(format!("{x}")),
        }
    }
}

#[cfg(feature = "wasm")]
impl From<WasmError> for HelpError {
    fn from(wasm_error: WasmError) -> Self {
        HelpError::Serialization(format!("Serde-wasm-bindgen error: {wasm_error}"))
    }
}
