//! SOAP transport and envelope decoding for the upstream transit data source.
//!
//! The upstream service answers every call with a SOAP envelope whose result
//! element carries a JSON document as text. [`SoapClient`] performs the call
//! and [`envelope`] turns the response into ordered [`RawRecord`]s.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{SoapClient, SoapEndpoint};
pub use envelope::{decode_records, try_decode_records, RawRecord, MAX_XML_DEPTH};
pub use error::{EnvelopeError, SoapError};
