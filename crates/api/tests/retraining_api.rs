//! Integration tests for the retraining lifecycle over HTTP.

mod common;

use axum::http::StatusCode;
use common::{body_json, features_json, sample_json, TestApp};
use serde_json::json;

async fn submit_batch(app: &TestApp, range: std::ops::Range<usize>) {
    let samples: Vec<_> = range.map(sample_json).collect();
    let (status, _) = app
        .post("/api/v1/training-data/batch", json!({ "samples": samples }))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn status_starts_empty() {
    let app = TestApp::with_model();
    let response = app.get("/api/v1/retraining/status").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["new_data_samples"], 0);
    assert_eq!(data["should_retrain"], false);
    assert_eq!(data["daily_retrain_attempts"], 0);
    assert_eq!(data["max_daily_attempts"], 2);
    assert_eq!(data["thresholds"]["min_new_samples"], 50);
    assert_eq!(data["model_age_days"], 0);
    assert!(data["recent_retrains"].as_array().unwrap().is_empty());
    assert!(data.get("error").is_none());
}

#[tokio::test]
async fn trigger_without_data_is_rejected_and_not_audited() {
    let app = TestApp::with_model();
    let (status, json) = app.post("/api/v1/retraining/trigger", json!({})).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], "error");
    assert_eq!(json["rejection"]["kind"], "no_new_data");
    assert_eq!(app.service.status().daily_retrain_attempts, 0);
}

#[tokio::test]
async fn trigger_below_threshold_needs_force() {
    let app = TestApp::with_model();
    submit_batch(&app, 0..3).await;

    let (status, json) = app.post("/api/v1/retraining/trigger", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["rejection"]["kind"], "below_threshold");
    assert!(json["message"].as_str().unwrap().contains("3 < 50"));

    let (status, json) = app
        .post("/api/v1/retraining/trigger", json!({ "reason": "operator", "force": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["report"]["new_samples_used"], 3);
}

#[tokio::test]
async fn threshold_retrain_hot_reloads_the_model() {
    let app = TestApp::without_model();

    let (status, _) = app.post("/api/v1/predict", features_json(0)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    submit_batch(&app, 0..50).await;
    let json = body_json(app.get("/api/v1/retraining/status").await).await;
    assert_eq!(json["data"]["should_retrain"], true);

    let (status, json) = app.post("/api/v1/retraining/trigger", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["report"]["training_data_size"], 150);
    assert_eq!(json["report"]["baseline_size"], 100);
    assert!(json["report"]["performance"]["rmse"].is_number());

    let (status, json) = app.post("/api/v1/predict", features_json(0)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["predicted_price"].is_number());

    let json = body_json(app.get("/api/v1/retraining/status").await).await;
    let data = &json["data"];
    assert_eq!(data["new_data_samples"], 0);
    assert_eq!(data["daily_retrain_attempts"], 1);
    let recent = data["recent_retrains"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["reason"], "manual");
    assert_eq!(recent[0]["success"], true);
}

#[tokio::test]
async fn daily_quota_returns_429() {
    let app = TestApp::with_model();

    for _ in 0..2 {
        submit_batch(&app, 0..2).await;
        let (status, _) = app
            .post("/api/v1/retraining/trigger", json!({ "force": true }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    submit_batch(&app, 0..2).await;
    let (status, json) = app
        .post("/api/v1/retraining/trigger", json!({ "force": true }))
        .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["rejection"]["kind"], "quota_exceeded");
    assert_eq!(json["rejection"]["attempts_today"], 2);
    assert_eq!(app.service.status().new_data_samples, 2);
}

#[tokio::test]
async fn retrain_outcomes_reach_prometheus() {
    let app = TestApp::with_model();
    submit_batch(&app, 0..2).await;
    app.post("/api/v1/retraining/trigger", json!({ "force": true }))
        .await;

    let text = app.metrics.render_prometheus(app.service.model_loaded());
    assert!(text.contains("housing_retraining_triggered_total 1\n"));
    assert!(text.contains("housing_retraining_outcomes_total{outcome=\"completed\"} 1\n"));
}
