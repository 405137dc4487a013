use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{body_json, create_test_app, request, start_time};

fn timestamp(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn test_health_root() {
    let test = create_test_app();

    let response = test
        .app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_health_live() {
    let test = create_test_app();

    let response = test
        .app
        .oneshot(request("GET", "/health/live", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_returns_not_found_envelope() {
    let test = create_test_app();

    let response = test
        .app
        .oneshot(request("GET", "/api/nope", Some("u1"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unauthorized_without_user_header() {
    let test = create_test_app();

    let response = test
        .app
        .oneshot(request("GET", "/api/review-states/due", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_enroll_then_duplicate_conflicts() {
    let test = create_test_app();

    let response = test
        .app
        .clone()
        .oneshot(request("POST", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["wordId"], "apple");
    assert_eq!(data["stage"], 1);
    assert_eq!(data["mode"], "continuous");
    assert_eq!(data["phase"], "NEW");
    assert_eq!(data["masteryLevel"], 0);
    assert_eq!(data["isDue"], false);
    assert_eq!(
        timestamp(&data["nextReviewAt"]),
        start_time() + Duration::minutes(10)
    );

    let response = test
        .app
        .oneshot(request("POST", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_states_are_scoped_per_user() {
    let test = create_test_app();

    test.app
        .clone()
        .oneshot(request("POST", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();

    let response = test
        .app
        .oneshot(request("GET", "/api/review-states/apple", Some("u2"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_outcome_advances_continuous_state() {
    let test = create_test_app();
    test.service.enroll("u1", "apple").await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/review-states/apple/outcome",
            Some("u1"),
            Some(json!({ "outcome": "good" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["stage"], 2);
    assert_eq!(data["masteryLevel"], 1);
    assert_eq!(
        timestamp(&data["nextReviewAt"]),
        start_time() + Duration::minutes(20)
    );

    let response = test
        .app
        .oneshot(request(
            "POST",
            "/api/review-states/apple/outcome",
            Some("u1"),
            Some(json!({ "outcome": "forgot" })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["stage"], 1);
    assert_eq!(timestamp(&body["data"]["nextReviewAt"]), start_time());
}

#[tokio::test]
async fn test_outcome_rejects_unknown_value_and_bad_json() {
    let test = create_test_app();
    test.service.enroll("u1", "apple").await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/api/review-states/apple/outcome",
            Some("u1"),
            Some(json!({ "outcome": "meh" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test
        .app
        .oneshot(request(
            "POST",
            "/api/review-states/apple/outcome",
            Some("u1"),
            Some(json!({ "verdict": "good" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_milestone_toggle_requires_milestone_mode() {
    let test = create_test_app();
    test.service.enroll("u1", "apple").await.unwrap();

    let response = test
        .app
        .oneshot(request(
            "POST",
            "/api/review-states/apple/milestones",
            Some("u1"),
            Some(json!({ "track": "short", "index": 0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "MODE_CONFLICT");
}

#[tokio::test]
async fn test_milestone_check_uncheck_recheck() {
    let test = create_test_app();
    test.service.enroll("u1", "pear").await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/review-states/pear/mode",
            Some("u1"),
            Some(json!({ "mode": "milestone" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["mode"], "milestone");

    let toggle = |index: i64| {
        request(
            "POST",
            "/api/review-states/pear/milestones",
            Some("u1"),
            Some(json!({ "track": "short", "index": index })),
        )
    };

    let first = body_json(test.app.clone().oneshot(toggle(0)).await.unwrap()).await;
    assert_eq!(first["data"]["isNewCompletion"], true);
    assert_eq!(first["data"]["shortSlots"], json!([true, false, false]));
    assert_eq!(
        timestamp(&first["data"]["nextReviewAt"]),
        start_time() + Duration::hours(1)
    );

    test.clock.advance(Duration::minutes(30));
    let uncheck = body_json(test.app.clone().oneshot(toggle(0)).await.unwrap()).await;
    assert_eq!(uncheck["data"]["isNewCompletion"], false);
    assert_eq!(uncheck["data"]["shortSlots"], json!([false, false, false]));
    assert_eq!(
        timestamp(&uncheck["data"]["nextReviewAt"]),
        start_time() + Duration::hours(1)
    );

    let recheck = body_json(test.app.clone().oneshot(toggle(0)).await.unwrap()).await;
    assert_eq!(recheck["data"]["isNewCompletion"], true);
    assert_eq!(
        timestamp(&recheck["data"]["nextReviewAt"]),
        start_time() + Duration::minutes(30) + Duration::hours(4)
    );

    let response = test.app.clone().oneshot(toggle(3)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = test.app.oneshot(toggle(-1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outcome_rejected_in_milestone_mode() {
    let test = create_test_app();
    test.service.enroll("u1", "pear").await.unwrap();
    test.service
        .switch_mode("u1", "pear", danci_srs::scheduler::ScheduleMode::Milestone)
        .await
        .unwrap();

    let response = test
        .app
        .oneshot(request(
            "POST",
            "/api/review-states/pear/outcome",
            Some("u1"),
            Some(json!({ "outcome": "easy" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_due_list_respects_limit() {
    let test = create_test_app();
    for word in ["a", "b", "c"] {
        test.service.enroll("u1", word).await.unwrap();
    }

    let response = test
        .app
        .clone()
        .oneshot(request("GET", "/api/review-states/due", Some("u1"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    test.clock.advance(Duration::minutes(11));

    let response = test
        .app
        .clone()
        .oneshot(request("GET", "/api/review-states/due?limit=2", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = test
        .app
        .oneshot(request("GET", "/api/review-states/due?limit=0", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_fills_with_upcoming_items() {
    let test = create_test_app();
    test.service.enroll("u1", "a").await.unwrap();
    test.service.enroll("u1", "b").await.unwrap();
    test.service
        .advance_on_outcome("u1", "b", danci_srs::scheduler::Outcome::Easy)
        .await
        .unwrap();
    test.clock.advance(Duration::minutes(11));

    let response = test
        .app
        .oneshot(request("GET", "/api/review-states/session?size=5", Some("u1"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["wordId"], "a");
    assert_eq!(items[1]["wordId"], "b");
}

#[tokio::test]
async fn test_stats_reports_phases() {
    let test = create_test_app();
    test.service.enroll("u1", "a").await.unwrap();
    test.service.enroll("u1", "b").await.unwrap();
    test.service
        .advance_on_outcome("u1", "b", danci_srs::scheduler::Outcome::Good)
        .await
        .unwrap();

    let response = test
        .app
        .oneshot(request("GET", "/api/review-states/stats", Some("u1"), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let data = &body["data"];
    assert_eq!(data["totalWords"], 2);
    assert_eq!(data["newWords"], 1);
    assert_eq!(data["learningWords"], 1);
    assert_eq!(data["dueWords"], 0);
}

#[tokio::test]
async fn test_reset_and_delete() {
    let test = create_test_app();
    test.service.enroll("u1", "apple").await.unwrap();
    test.service
        .advance_on_outcome("u1", "apple", danci_srs::scheduler::Outcome::Easy)
        .await
        .unwrap();

    let response = test
        .app
        .clone()
        .oneshot(request("POST", "/api/review-states/apple/reset", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["stage"], 1);
    assert_eq!(body["data"]["reviewCount"], 0);
    assert_eq!(body["data"]["phase"], "NEW");

    let response = test
        .app
        .clone()
        .oneshot(request("DELETE", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = test
        .app
        .clone()
        .oneshot(request("GET", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = test
        .app
        .oneshot(request("DELETE", "/api/review-states/apple", Some("u1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
