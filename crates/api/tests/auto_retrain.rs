//! Tests for the periodic auto-retrain check.

mod common;

use assert_matches::assert_matches;
use housing_api::background::auto_retrain::{check_once, AUTOMATIC_REASON};
use housing_retraining::RetrainOutcome;

use common::{features, price_for, TestApp};

fn submit(app: &TestApp, count: usize) {
    for i in 0..count {
        app.service
            .submit_sample(&features(i).to_map(), price_for(i) + 5.0)
            .unwrap();
    }
}

#[tokio::test]
async fn below_threshold_does_not_retrain() {
    let app = TestApp::with_model();
    submit(&app, 3);

    assert!(check_once(&app.service).await.is_none());
    assert_eq!(app.service.status().new_data_samples, 3);
    assert_eq!(app.service.status().daily_retrain_attempts, 0);
}

#[tokio::test]
async fn threshold_reached_runs_an_automatic_retrain() {
    let app = TestApp::without_model();
    submit(&app, app.retrain_config.min_new_samples);

    let outcome = check_once(&app.service).await;
    let report = assert_matches!(outcome, Some(RetrainOutcome::Completed(report)) => report);
    assert_eq!(report.new_samples_used, app.retrain_config.min_new_samples);
    assert!(app.service.model_loaded());

    let status = app.service.status();
    assert_eq!(status.new_data_samples, 0);
    assert_eq!(status.recent_retrains[0].reason, AUTOMATIC_REASON);
}
