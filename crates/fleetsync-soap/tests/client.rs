//! Integration tests for `SoapClient` using wiremock HTTP mocks.

use fleetsync_soap::{SoapClient, SoapEndpoint, SoapError};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client() -> SoapClient {
    SoapClient::new(5, "fleetsync-test", "http://tempuri.org")
        .expect("client construction should not fail")
}

fn garage_response() -> String {
    "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
     <soap:Envelope xmlns:soap=\"http://schemas.xmlsoap.org/soap/envelope/\">\
     <soap:Body><GetGaraj_jsonResponse xmlns=\"http://tempuri.org/\">\
     <GetGaraj_jsonResult>[{&quot;ID&quot;:7,&quot;GARAJ_ADI&quot;:&quot;Ikitelli&quot;,\
     &quot;GARAJ_KODU&quot;:&quot;IKT&quot;,&quot;KOORDINAT&quot;:&quot;POINT (28.79 41.07)&quot;}]\
     </GetGaraj_jsonResult></GetGaraj_jsonResponse></soap:Body></soap:Envelope>"
        .to_string()
}

#[tokio::test]
async fn call_posts_soap_envelope_with_headers() {
    let server = MockServer::start().await;
    let client = test_client();

    Mock::given(method("POST"))
        .and(path("/garages.asmx"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(header("SOAPAction", "\"http://tempuri.org/GetGaraj_json\""))
        .and(body_string(client.build_envelope("GetGaraj_json")))
        .respond_with(ResponseTemplate::new(200).set_body_string(garage_response()))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = SoapEndpoint::new(format!("{}/garages.asmx", server.uri()), "GetGaraj_json");
    let xml = client.call(&endpoint).await.expect("call should succeed");

    assert!(xml.contains("GetGaraj_jsonResult"));
}

#[tokio::test]
async fn fetch_records_decodes_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/garages.asmx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(garage_response()))
        .mount(&server)
        .await;

    let endpoint = SoapEndpoint::new(format!("{}/garages.asmx", server.uri()), "GetGaraj_json");
    let records = test_client()
        .fetch_records(&endpoint)
        .await
        .expect("fetch should succeed");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("ID"), Some("7"));
    assert_eq!(records[0].get("KOORDINAT"), Some("POINT (28.79 41.07)"));
}

#[tokio::test]
async fn non_2xx_status_is_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("soap fault"))
        .mount(&server)
        .await;

    let endpoint = SoapEndpoint::new(server.uri(), "GetGaraj_json");
    let err = test_client().call(&endpoint).await.unwrap_err();

    assert!(matches!(err, SoapError::Http(_)), "got: {err:?}");
}

#[tokio::test]
async fn undecodable_body_is_envelope_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance"))
        .mount(&server)
        .await;

    let endpoint = SoapEndpoint::new(server.uri(), "GetGaraj_json");
    let err = test_client().fetch_records(&endpoint).await.unwrap_err();

    assert!(matches!(err, SoapError::Envelope(_)), "got: {err:?}");
}
