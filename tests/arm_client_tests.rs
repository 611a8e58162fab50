//! HTTP-level tests for the ARM client, using a wiremock server as the
//! resource-manager endpoint and token authority.

use std::time::Duration;

use rustible_azure::arm::auth::Credential;
use rustible_azure::arm::{
    wait_for_completion, ArmApi, ArmClient, ArmError, ArmRequest, PollSettings,
};
use rustible_azure::retry::RetryPolicy;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUB: &str = "sub-1";
const RG_PATH: &str = "/subscriptions/sub-1/resourceGroups/rg1";

fn no_wait_retries() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(2)
        .initial_delay(Duration::ZERO)
        .jitter(false)
        .build()
}

fn client(server: &MockServer) -> ArmClient {
    ArmClient::builder()
        .endpoint(server.uri())
        .subscription_id(SUB)
        .credential(Credential::AccessToken("test-token".into()))
        .retry(no_wait_retries())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_sends_token_and_api_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .and(query_param("api-version", "2021-04-01"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": RG_PATH, "location": "eastus"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send(ArmRequest::get(RG_PATH).with_api_version("2021-04-01"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body.unwrap()["location"], json!("eastus"));
}

#[tokio::test]
async fn test_put_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(RG_PATH))
        .and(body_json(json!({"location": "eastus", "tags": {"env": "prod"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": RG_PATH})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send(
            ArmRequest::put(RG_PATH, json!({"location": "eastus", "tags": {"env": "prod"}}))
                .with_api_version("2021-04-01"),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_404_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "ResourceGroupNotFound", "message": "Resource group 'rg1' could not be found."}
        })))
        .mount(&server)
        .await;

    let response = client(&server).send(ArmRequest::get(RG_PATH)).await.unwrap();
    assert_eq!(response.status, 404);

    match response.into_result() {
        Err(ArmError::Cloud { code, .. }) => assert_eq!(code, "ResourceGroupNotFound"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": RG_PATH})))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server).send(ArmRequest::get(RG_PATH)).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(503))
        // First attempt plus two retries
        .expect(3)
        .mount(&server)
        .await;

    let response = client(&server).send(ArmRequest::get(RG_PATH)).await.unwrap();
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn test_non_json_error_body_is_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(ArmRequest::get(RG_PATH))
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    match err {
        ArmError::Cloud {
            status, message, ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Bad Request");
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_service_principal_token_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "sp-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .and(header("authorization", "Bearer sp-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": RG_PATH})))
        .expect(2)
        .mount(&server)
        .await;

    let client = ArmClient::builder()
        .endpoint(server.uri())
        .authority_host(server.uri())
        .subscription_id(SUB)
        .credential(Credential::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "s3cret".into(),
        })
        .retry(RetryPolicy::none())
        .build()
        .unwrap();

    for _ in 0..2 {
        let response = client.send(ArmRequest::get(RG_PATH)).await.unwrap();
        assert_eq!(response.status, 200);
    }
}

#[tokio::test]
async fn test_token_failure_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let client = ArmClient::builder()
        .endpoint(server.uri())
        .authority_host(server.uri())
        .subscription_id(SUB)
        .credential(Credential::ServicePrincipal {
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "wrong".into(),
        })
        .build()
        .unwrap();

    match client.send(ArmRequest::get(RG_PATH)).await {
        Err(ArmError::Auth(msg)) => assert!(msg.contains("401"), "{}", msg),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_async_operation_over_http() {
    let server = MockServer::start().await;
    let operation = format!("{}/providers/operations/op-1?api-version=2021-04-01", server.uri());

    Mock::given(method("PUT"))
        .and(path(RG_PATH))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", operation.as_str())
                .set_body_json(json!({"properties": {"provisioningState": "Accepted"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/providers/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Running"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/providers/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RG_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": RG_PATH,
            "properties": {"provisioningState": "Succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let initial = client
        .send(ArmRequest::put(RG_PATH, json!({"location": "eastus"})).with_api_version("2021-04-01"))
        .await
        .unwrap();

    let result = wait_for_completion(
        &client,
        initial,
        Some(ArmRequest::get(RG_PATH).with_api_version("2021-04-01")),
        &PollSettings::immediate(),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(result["properties"]["provisioningState"], json!("Succeeded"));
}

#[tokio::test]
async fn test_polling_times_out() {
    let server = MockServer::start().await;
    let status = format!("{}/status/1", server.uri());

    Mock::given(method("GET"))
        .and(path("/status/1"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client(&server);
    let initial = rustible_azure::arm::ArmResponse::new(202).with_header("Location", status);
    let settings = PollSettings::new(Duration::from_millis(10), Duration::from_millis(50));

    let err = wait_for_completion(&client, initial, None, &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ArmError::Timeout(_)));
}
