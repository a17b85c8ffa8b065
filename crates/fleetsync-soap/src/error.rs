use thiserror::Error;

/// Errors returned by the SOAP client.
#[derive(Debug, Error)]
pub enum SoapError {
    /// Network, TLS, timeout, or non-2xx status from the upstream service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured service URL could not be parsed.
    #[error("invalid SOAP endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The response arrived but could not be decoded into records.
    #[error("envelope decode error: {0}")]
    Envelope(#[from] EnvelopeError),
}

/// Reasons a response envelope yields no records.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML text: {0}")]
    Text(String),

    #[error("XML element <{0}> is never closed")]
    Unclosed(String),

    #[error("XML nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("no embedded JSON payload found in envelope")]
    MissingPayload,

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload JSON contains no array")]
    NoArray,
}
