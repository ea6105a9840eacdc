//! Upstream source access
//!
//! A [`Source`] returns raw text on demand; a [`Decoder`] turns that text into
//! a flat key/value mapping. The poller only sees these two traits.

use async_trait::async_trait;

use crate::error::FetchError;

pub mod decoder;
pub mod http;

pub use decoder::{Decoder, JsonDecoder, KeyValueDecoder, SourceFormat};
pub use http::HttpSource;

/// Anything that can hand back the current raw text of the upstream source
#[async_trait]
pub trait Source: Send + Sync {
    /// Short description used in logs (usually the URL)
    fn describe(&self) -> String;

    /// Read the source once
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Build the decoder for a configured format
pub fn decoder_for(format: SourceFormat) -> Box<dyn Decoder> {
    match format {
        SourceFormat::Json => Box::new(JsonDecoder),
        SourceFormat::Kv => Box::new(KeyValueDecoder),
    }
}

