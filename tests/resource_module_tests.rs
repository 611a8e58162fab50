//! Tests for the generic `azure_rm_resource` and `azure_rm_resource_info` modules.

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use reqwest::Method;
use rustible_azure::arm::ArmResponse;
use rustible_azure::modules::{ModuleError, ModuleRegistry};
use serde_json::json;

const API_VERSION: &str = "2023-01-01";

fn registry() -> ModuleRegistry {
    ModuleRegistry::with_builtins()
}

fn vnet_path() -> String {
    provider_path("rg", "Microsoft.Network", "virtualNetworks/vnet1")
}

#[tokio::test]
async fn test_put_by_url() {
    let arm = Arc::new(MockArm::new());
    let body = json!({"location": "eastus", "properties": {"addressSpace": {"addressPrefixes": ["10.0.0.0/16"]}}});

    let output = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({
                "url": vnet_path(),
                "api_version": API_VERSION,
                "body": body
            })),
            &context(&arm),
        )
        .await
        .unwrap();

    assert_changed(&output);
    assert_eq!(output.data["status_code"], json!(201));
    assert_eq!(output.data["url"], json!(vnet_path()));
    assert_eq!(
        output.data["response"]["properties"]["addressSpace"]["addressPrefixes"],
        json!(["10.0.0.0/16"])
    );

    let put = arm.mutations().remove(0);
    assert_eq!(put.api_version.as_deref(), Some(API_VERSION));
}

#[tokio::test]
async fn test_idempotent_put_skips_matching_resource() {
    let arm = Arc::new(MockArm::new());
    arm.insert(
        &vnet_path(),
        json!({
            "location": "eastus",
            "etag": "W/\"1\"",
            "properties": {"provisioningState": "Succeeded", "enableDdosProtection": false}
        }),
    );

    let args = json!({
        "url": vnet_path(),
        "api_version": API_VERSION,
        "idempotency": true,
        "body": {"location": "East US", "properties": {"enableDdosProtection": false}}
    });

    let output = registry()
        .execute("azure_rm_resource", &params(args.clone()), &context(&arm))
        .await
        .unwrap();
    assert_unchanged(&output);
    assert!(arm.mutations().is_empty());

    let mut changed = args;
    changed["body"]["properties"]["enableDdosProtection"] = json!(true);
    let output = registry()
        .execute("azure_rm_resource", &params(changed), &context(&arm))
        .await
        .unwrap();
    assert_changed(&output);
    assert_eq!(arm.count(&Method::PUT), 1);
}

#[tokio::test]
async fn test_check_mode_sends_nothing() {
    let arm = Arc::new(MockArm::new());

    let output = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({
                "url": vnet_path(),
                "api_version": API_VERSION,
                "body": {"location": "eastus"}
            })),
            &check_context(&arm),
        )
        .await
        .unwrap();

    assert_changed(&output);
    assert!(output.msg.starts_with("Would send PUT"));
    assert!(arm.requests().is_empty());
}

#[tokio::test]
async fn test_absent_deletes_and_tolerates_missing() {
    let arm = Arc::new(MockArm::new());
    arm.insert(&vnet_path(), json!({"location": "eastus"}));
    let args = params(json!({
        "url": vnet_path(),
        "api_version": API_VERSION,
        "state": "absent"
    }));

    let output = registry()
        .execute("azure_rm_resource", &args, &context(&arm))
        .await
        .unwrap();
    assert_changed(&output);
    assert!(!arm.contains(&vnet_path()));

    arm.script(
        Method::DELETE,
        &vnet_path(),
        ArmResponse::new(404).with_body(json!({"error": {"code": "NotFound"}})),
    );
    let output = registry()
        .execute("azure_rm_resource", &args, &context(&arm))
        .await
        .unwrap();
    assert_unchanged(&output);
    assert!(output.msg.contains("does not exist"));
}

#[tokio::test]
async fn test_unexpected_status_fails() {
    let arm = Arc::new(MockArm::new());
    arm.script(
        Method::PUT,
        &vnet_path(),
        ArmResponse::new(400).with_body(json!({
            "error": {"code": "InvalidRequestFormat", "message": "bad address space"}
        })),
    );

    let err = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({
                "url": vnet_path(),
                "api_version": API_VERSION,
                "body": {"location": "eastus"}
            })),
            &context(&arm),
        )
        .await
        .unwrap_err();

    match err {
        ModuleError::ExecutionFailed(msg) => {
            assert!(msg.contains("unexpected status 400"), "{}", msg);
            assert!(msg.contains("bad address space"), "{}", msg);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_status_codes_accept_conflict() {
    let arm = Arc::new(MockArm::new());
    arm.script(
        Method::PUT,
        &vnet_path(),
        ArmResponse::new(409).with_body(json!({"error": {"code": "Conflict"}})),
    );

    let output = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({
                "url": vnet_path(),
                "api_version": API_VERSION,
                "status_code": [200, 201, 409],
                "body": {"location": "eastus"}
            })),
            &context(&arm),
        )
        .await
        .unwrap();

    assert_eq!(output.data["status_code"], json!(409));
    assert!(!arm.contains(&vnet_path()));
}

#[tokio::test]
async fn test_api_version_is_looked_up_from_provider() {
    let arm = Arc::new(MockArm::new());
    arm.insert(
        &format!("/subscriptions/{}/providers/Microsoft.Storage", SUBSCRIPTION),
        json!({
            "namespace": "Microsoft.Storage",
            "resourceTypes": [
                {"resourceType": "operations", "apiVersions": ["2024-01-01"]},
                {
                    "resourceType": "storageAccounts",
                    "apiVersions": ["2022-09-01", "2023-01-01-preview", "2023-01-01"]
                }
            ]
        }),
    );
    let account = provider_path("rg", "Microsoft.Storage", "storageAccounts/acct1");
    arm.insert(&account, json!({"location": "eastus"}));

    let output = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({
                "provider": "storage",
                "resource_group": "rg",
                "resource_type": "storageAccounts",
                "resource_name": "acct1",
                "method": "GET"
            })),
            &context(&arm),
        )
        .await
        .unwrap();

    assert_unchanged(&output);
    assert_eq!(output.data["url"], json!(account));

    let get = arm
        .requests()
        .into_iter()
        .find(|r| r.target.eq_ignore_ascii_case(&account))
        .unwrap();
    assert_eq!(get.api_version.as_deref(), Some("2023-01-01"));
}

#[tokio::test]
async fn test_missing_location_is_rejected() {
    let arm = Arc::new(MockArm::new());

    let err = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({"api_version": API_VERSION, "body": {}})),
            &context(&arm),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::MissingParameter(_)));

    let err = registry()
        .execute(
            "azure_rm_resource",
            &params(json!({"url": vnet_path(), "method": "FETCH", "api_version": API_VERSION})),
            &context(&arm),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModuleError::InvalidParameter(_)));
    assert!(arm.requests().is_empty());
}

#[tokio::test]
async fn test_info_follows_next_link() {
    let arm = Arc::new(MockArm::new());
    let collection = provider_path("rg", "Microsoft.Network", "virtualNetworks");
    let page2 = "https://management.azure.com/page2?api-version=2023-01-01&$skiptoken=abc";

    arm.script(
        Method::GET,
        &collection,
        ArmResponse::new(200).with_body(json!({
            "value": [{"name": "a"}, {"name": "b"}],
            "nextLink": page2
        })),
    );
    arm.script(
        Method::GET,
        page2,
        ArmResponse::new(200).with_body(json!({"value": [{"name": "c"}], "nextLink": null})),
    );

    let output = registry()
        .execute(
            "azure_rm_resource_info",
            &params(json!({"url": collection, "api_version": API_VERSION})),
            &context(&arm),
        )
        .await
        .unwrap();

    assert_unchanged(&output);
    assert_eq!(
        output.data["response"],
        json!([{"name": "a"}, {"name": "b"}, {"name": "c"}])
    );
    assert_eq!(arm.count(&Method::GET), 2);
}

#[tokio::test]
async fn test_info_single_resource() {
    let arm = Arc::new(MockArm::new());
    arm.insert(&vnet_path(), json!({"location": "eastus"}));

    let output = registry()
        .execute(
            "azure_rm_resource_info",
            &params(json!({"url": vnet_path(), "api_version": API_VERSION})),
            &context(&arm),
        )
        .await
        .unwrap();

    let response = output.data["response"].as_array().unwrap();
    assert_eq!(response.len(), 1);
    assert_eq!(response[0]["name"], json!("vnet1"));
}

#[tokio::test]
async fn test_info_missing_resource_is_an_error() {
    let arm = Arc::new(MockArm::new());

    let err = registry()
        .execute(
            "azure_rm_resource_info",
            &params(json!({"url": vnet_path(), "api_version": API_VERSION})),
            &context(&arm),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Cloud { .. }));
}
