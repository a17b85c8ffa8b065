//! HTTP client for the upstream SOAP service.
//!
//! Every dataset is exposed as a parameterless SOAP method. The client posts a
//! fixed request envelope for the method and returns the raw response XML, or
//! decodes it into [`RawRecord`]s via [`SoapClient::fetch_records`].

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::envelope::{try_decode_records, RawRecord};
use crate::error::SoapError;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// A service URL paired with the SOAP method that returns one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapEndpoint {
    pub url: String,
    pub method: String,
}

impl SoapEndpoint {
    #[must_use]
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
        }
    }
}

/// Client for the upstream SOAP service.
///
/// Holds one pooled `reqwest::Client` and the target namespace used for the
/// request element and the `SOAPAction` header.
#[derive(Debug, Clone)]
pub struct SoapClient {
    client: Client,
    namespace: String,
}

impl SoapClient {
    /// Creates a client with the given request timeout, user agent, and
    /// target namespace (a trailing `/` is ignored).
    ///
    /// # Errors
    ///
    /// Returns [`SoapError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str, namespace: &str) -> Result<Self, SoapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            namespace: namespace.trim_end_matches('/').to_owned(),
        })
    }

    /// Request body for a parameterless call to `method`.
    #[must_use]
    pub fn build_envelope(&self, method: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <soap:Envelope xmlns:soap=\"{SOAP_ENVELOPE_NS}\">\
             <soap:Body><{method} xmlns=\"{ns}/\" /></soap:Body>\
             </soap:Envelope>",
            ns = self.namespace,
        )
    }

    /// Quoted `SOAPAction` header value for `method`.
    #[must_use]
    pub fn soap_action(&self, method: &str) -> String {
        format!("\"{}/{method}\"", self.namespace)
    }

    /// Posts the request envelope for `endpoint.method` and returns the
    /// response body.
    ///
    /// # Errors
    ///
    /// - [`SoapError::InvalidEndpoint`] if `endpoint.url` is not a valid URL.
    /// - [`SoapError::Http`] on network failure, timeout, or non-2xx status.
    pub async fn call(&self, endpoint: &SoapEndpoint) -> Result<String, SoapError> {
        let url = Url::parse(&endpoint.url).map_err(|e| SoapError::InvalidEndpoint {
            url: endpoint.url.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(url = %url, method = %endpoint.method, "sending SOAP request");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header("SOAPAction", self.soap_action(&endpoint.method))
            .body(self.build_envelope(&endpoint.method))
            .send()
            .await?;
        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Calls `endpoint` and decodes the response into records.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`SoapClient::call`], plus
    /// [`SoapError::Envelope`] when the response cannot be decoded.
    pub async fn fetch_records(&self, endpoint: &SoapEndpoint) -> Result<Vec<RawRecord>, SoapError> {
        let xml = self.call(endpoint).await?;
        let records = try_decode_records(&xml, &endpoint.method)?;
        tracing::debug!(method = %endpoint.method, records = records.len(), "decoded SOAP response");
        Ok(records)
    }
}
