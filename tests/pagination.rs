use cf_usage_exporter::cf::BearerToken;
use cf_usage_exporter::{CfClient, CfCredentials, CfError};
use httpmock::prelude::*;
use serde_json::json;

fn client_for(server: &MockServer) -> CfClient {
    CfClient::with_token(
        CfCredentials::new(server.base_url(), "admin", "secret"),
        BearerToken::new("token-abc", None),
    )
    .expect("client")
}

#[tokio::test]
async fn pages_are_concatenated_in_order() {
    let server = MockServer::start_async().await;

    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/v3/organizations")
            .query_param("per_page", "1000")
            .header("Authorization", "Bearer token-abc");
        then.status(200).json_body(json!({
            "resources": [{"name": "alpha", "guid": "1"}, {"name": "bravo", "guid": "2"}],
            "pagination": {"next": {"href": "/v3/organizations?page=2&per_page=2"}}
        }));
    });

    // absolute link on a different host: only path and query are kept
    let second = server.mock(|when, then| {
        when.method(GET)
            .path("/v3/organizations")
            .query_param("page", "2");
        then.status(200).json_body(json!({
            "resources": [{"name": "charlie", "guid": "3"}],
            "pagination": {"next": {"href": "https://api.elsewhere.example.com/v3/organizations?page=3&per_page=2"}}
        }));
    });

    let third = server.mock(|when, then| {
        when.method(GET)
            .path("/v3/organizations")
            .query_param("page", "3");
        then.status(200).json_body(json!({
            "resources": [{"name": "delta", "guid": "4"}],
            "pagination": {"next": {"href": ""}}
        }));
    });

    let orgs = client_for(&server).organizations().await.expect("orgs");
    let names: Vec<&str> = orgs.iter().map(|org| org.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie", "delta"]);

    first.assert_hits(1);
    second.assert_hits(1);
    third.assert_hits(1);
}

#[tokio::test]
async fn literal_null_href_ends_pagination() {
    let server = MockServer::start_async().await;

    let only = server.mock(|when, then| {
        when.method(GET).path("/v3/service_offerings");
        then.status(200).json_body(json!({
            "resources": [{"guid": "o1", "name": "p-mysql"}],
            "pagination": {"next": {"href": "null"}}
        }));
    });
    let null_path = server.mock(|when, then| {
        when.method(GET).path("/null");
        then.status(200).json_body(json!({"resources": []}));
    });

    let offerings = client_for(&server)
        .service_offerings()
        .await
        .expect("offerings");
    assert_eq!(offerings.len(), 1);
    only.assert_hits(1);
    null_path.assert_hits(0);
}

#[tokio::test]
async fn failing_page_aborts_whole_fetch() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET)
            .path("/v3/service_plans")
            .query_param("per_page", "1000");
        then.status(200).json_body(json!({
            "resources": [{"guid": "p1", "name": "small"}],
            "pagination": {"next": {"href": "/v3/service_plans?page=2"}}
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/v3/service_plans")
            .query_param("page", "2");
        then.status(502);
    });

    let err = client_for(&server)
        .service_plans()
        .await
        .err()
        .expect("second page failure should abort");
    assert!(matches!(err, CfError::Status { .. }));
}

#[tokio::test]
async fn malformed_envelope_is_a_parse_error() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET).path("/v3/organizations");
        then.status(200).body("<html>maintenance</html>");
    });

    let err = client_for(&server)
        .organizations()
        .await
        .err()
        .expect("html body should not parse");
    assert!(matches!(err, CfError::Parse { .. }));
}
