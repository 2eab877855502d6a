// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider API and outgoing address adapters against a mock HTTP server.

use proxy_runner::model::{ProviderFilter, ProviderIpType};
use proxy_runner::outgoing::{HttpOutgoingAddress, OutgoingAddress};
use proxy_runner::provider::{HttpProviderApi, ProviderApi, provider_id};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn proposals() -> serde_json::Value {
    json!([
        {
            "provider_id": "0xdef",
            "service_type": "wireguard",
            "location": {"country": "PL", "ip_type": "residential"},
            "quality": {"quality": 2.5, "bandwidth": 120.0, "latency": 35.0}
        },
        {
            "provider_id": "0x123",
            "service_type": "wireguard",
            "location": {"country": "DE", "ip_type": "hosting"}
        }
    ])
}

// ============================================================================
// Provider API
// ============================================================================

#[tokio::test]
async fn test_provider_list_and_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/proposals"))
        .and(query_param("service_type", "wireguard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(proposals()))
        .mount(&server)
        .await;

    let api = HttpProviderApi::new(&server.uri());
    let providers = api.list(&ProviderFilter::default()).await.unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].id, provider_id("0xdef"));
    assert_eq!(providers[0].ip_type, Some(ProviderIpType::Residential));
    assert_eq!(providers[0].quality, Some(2.5));
    assert!(providers[1].quality.is_none());

    let provider = api.get(&provider_id("0x123")).await.unwrap().unwrap();
    assert_eq!(provider.provider_identity, "0x123");
    assert_eq!(provider.country.as_deref(), Some("DE"));
    assert!(api.get("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn test_provider_country_filter_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/proposals"))
        .and(query_param("location_country", "PL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([proposals()[0].clone()])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = ProviderFilter {
        country: Some("PL".into()),
        ..ProviderFilter::default()
    };
    let providers = HttpProviderApi::new(&server.uri())
        .list(&filter)
        .await
        .unwrap();
    assert_eq!(providers.len(), 1);
}

#[tokio::test]
async fn test_provider_null_body_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/proposals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Null))
        .mount(&server)
        .await;

    let providers = HttpProviderApi::new(&server.uri())
        .list(&ProviderFilter::default())
        .await
        .unwrap();
    assert!(providers.is_empty());
}

#[tokio::test]
async fn test_provider_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = HttpProviderApi::new(&server.uri())
        .list(&ProviderFilter::default())
        .await;
    assert!(matches!(result, Err(proxy_runner::Error::Http(_))));
}

// ============================================================================
// Outgoing address
// ============================================================================

#[tokio::test]
async fn test_outgoing_first_success_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "203.0.113.10"})))
        .mount(&server)
        .await;

    let resolver = HttpOutgoingAddress::with_endpoints(vec![
        format!("{}/broken", server.uri()),
        format!("{}/ip", server.uri()),
    ]);
    assert_eq!(resolver.resolve().await.unwrap(), "203.0.113.10");
}

#[tokio::test]
async fn test_outgoing_all_endpoints_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let resolver = HttpOutgoingAddress::with_endpoints(vec![
        format!("{}/a", server.uri()),
        format!("{}/b", server.uri()),
    ]);
    assert!(resolver.resolve().await.is_err());
}

#[tokio::test]
async fn test_outgoing_without_endpoints() {
    let resolver = HttpOutgoingAddress::with_endpoints(Vec::new());
    assert!(matches!(
        resolver.resolve().await,
        Err(proxy_runner::Error::NotFound(_))
    ));
}
