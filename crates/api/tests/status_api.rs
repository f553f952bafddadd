//! Integration tests for `GET /api/v1/status/{job_id}`.

mod common;

use axum::http::StatusCode;
use common::{build_test_app, status, submit};
use serde_json::json;

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = build_test_app();

    let (code, body) = status(&app.router, "nope").await;

    assert_eq!(code, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["error"], "Job with id nope not found");
}

#[tokio::test]
async fn status_returns_full_camel_case_record() {
    let app = build_test_app();
    submit(
        &app.router,
        json!({"folderId": "F1", "eventName": "E1", "ownerId": "alice"}),
    )
    .await;

    let (code, job) = status(&app.router, "E1").await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(job["id"], "E1");
    assert_eq!(job["ownerId"], "alice");
    assert_eq!(job["folderId"], "F1");
    assert_eq!(job["eventName"], "E1");
    assert!(job["createdAt"].is_string());
    assert!(job["updatedAt"].is_string());
    assert!(job.get("manifest").is_none());
    assert!(job.get("error").is_none());
}

#[tokio::test]
async fn status_never_reports_dispatching_after_submit_returns() {
    let app = build_test_app();

    for i in 0..10 {
        let id = format!("job-{i}");
        submit(&app.router, json!({"folderId": "F", "eventName": id})).await;
        let (_, job) = status(&app.router, &id).await;
        assert_eq!(job["state"], "processing");
    }
}
