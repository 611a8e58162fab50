//! Long-running operation polling.
//!
//! ARM signals an asynchronous operation in one of two ways:
//!
//! - `Azure-AsyncOperation: <url>`: GET the URL until its `status` field is
//!   `Succeeded`, `Failed` or `Canceled`, then GET the resource itself.
//! - `Location: <url>` with `202 Accepted`: GET the URL until it stops
//!   answering 202. The final response carries the result.
//!
//! Some resource providers keep answering GET for a while after a delete has
//! been accepted; [`wait_until_absent`] covers that case.

use super::{get_resource, ArmApi, ArmError, ArmRequest, ArmResponse, ArmResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default delay between polls when the server gives no `Retry-After`
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 20;

/// Default upper bound on a single long-running operation
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 3600;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Prefer the server's `Retry-After` over `interval`
    pub honor_retry_after: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            honor_retry_after: true,
        }
    }
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            honor_retry_after: true,
        }
    }

    /// Settings with no delay between polls, for tests
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            timeout: Duration::from_secs(30),
            honor_retry_after: false,
        }
    }

    fn delay(&self, response: &ArmResponse) -> Duration {
        if self.honor_retry_after {
            response.retry_after().unwrap_or(self.interval)
        } else {
            self.interval
        }
    }
}

/// Terminal state of an `Azure-AsyncOperation` status document
#[derive(Debug, Clone, PartialEq, Eq)]
enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

fn operation_status(body: Option<&Value>) -> OperationStatus {
    let status = body
        .and_then(|b| b.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("InProgress");

    match status.to_lowercase().as_str() {
        "succeeded" => OperationStatus::Succeeded,
        "failed" | "canceled" | "cancelled" => {
            let message = body
                .and_then(|b| b.pointer("/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("no error details returned")
                .to_string();
            OperationStatus::Failed(format!("{}: {}", status, message))
        }
        _ => OperationStatus::InProgress,
    }
}

/// Drive a mutating request's response to completion.
///
/// `final_get` is the request that fetches the finished resource after an
/// `Azure-AsyncOperation` completes; pass `None` for deletes. Returns the
/// final resource body, if any.
pub async fn wait_for_completion(
    api: &dyn ArmApi,
    initial: ArmResponse,
    final_get: Option<ArmRequest>,
    settings: &PollSettings,
) -> ArmResult<Option<Value>> {
    let initial = initial.into_result()?;
    let started = Instant::now();

    if let Some(operation_url) = initial.header("azure-asyncoperation").map(String::from) {
        let mut delay = settings.delay(&initial);
        loop {
            check_deadline(started, settings)?;
            tokio::time::sleep(delay).await;

            let response = api
                .send(ArmRequest::poll(operation_url.clone()))
                .await?
                .into_result()?;

            match operation_status(response.body.as_ref()) {
                OperationStatus::Succeeded => break,
                OperationStatus::Failed(message) => {
                    let status = message.split(':').next().unwrap_or("Failed").to_string();
                    return Err(ArmError::OperationFailed { status, message });
                }
                OperationStatus::InProgress => {
                    debug!("Operation still in progress: {}", operation_url);
                    delay = settings.delay(&response);
                }
            }
        }

        return match final_get {
            Some(request) => Ok(api.send(request).await?.into_result()?.body),
            None => Ok(None),
        };
    }

    if initial.status == 202 {
        if let Some(location) = initial.header("location").map(String::from) {
            let mut delay = settings.delay(&initial);
            loop {
                check_deadline(started, settings)?;
                tokio::time::sleep(delay).await;

                let response = api.send(ArmRequest::poll(location.clone())).await?;
                if response.status != 202 {
                    let response = response.into_result()?;
                    // A body-less 200/204 on the status URL means "done"; the
                    // resource itself still has to be fetched.
                    return match (response.body, final_get) {
                        (Some(body), _) => Ok(Some(body)),
                        (None, Some(request)) => Ok(api.send(request).await?.into_result()?.body),
                        (None, None) => Ok(None),
                    };
                }

                debug!("Operation still in progress: {}", location);
                delay = settings.delay(&response);
            }
        }
    }

    Ok(initial.body)
}

/// Poll GET until the resource reports 404
pub async fn wait_until_absent(
    api: &dyn ArmApi,
    path: &str,
    api_version: &str,
    settings: &PollSettings,
) -> ArmResult<()> {
    let started = Instant::now();

    while get_resource(api, path, api_version).await?.is_some() {
        check_deadline(started, settings)?;
        debug!("Waiting for {} to disappear", path);
        tokio::time::sleep(settings.interval).await;
    }

    Ok(())
}

fn check_deadline(started: Instant, settings: &PollSettings) -> ArmResult<()> {
    if started.elapsed() >= settings.timeout {
        Err(ArmError::Timeout(settings.timeout))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_status_parsing() {
        assert_eq!(
            operation_status(Some(&json!({"status": "Succeeded"}))),
            OperationStatus::Succeeded
        );
        assert_eq!(
            operation_status(Some(&json!({"status": "Running"}))),
            OperationStatus::InProgress
        );
        assert_eq!(operation_status(None), OperationStatus::InProgress);

        match operation_status(Some(&json!({
            "status": "Failed",
            "error": {"code": "Boom", "message": "quota exceeded"}
        }))) {
            OperationStatus::Failed(msg) => assert_eq!(msg, "Failed: quota exceeded"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_delay_prefers_retry_after() {
        let settings = PollSettings::default();
        let response = ArmResponse::new(202).with_header("Retry-After", "5");
        assert_eq!(settings.delay(&response), Duration::from_secs(5));
        assert_eq!(
            settings.delay(&ArmResponse::new(202)),
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );

        let settings = PollSettings::immediate();
        assert_eq!(settings.delay(&response), Duration::ZERO);
    }
}
