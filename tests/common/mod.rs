#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;

use danci_srs::clock::FixedClock;
use danci_srs::config::SchedulerSettings;
use danci_srs::db::ReviewStateStore;
use danci_srs::services::ReviewStateService;

pub struct TestApp {
    pub app: Router,
    pub clock: FixedClock,
    pub service: Arc<ReviewStateService>,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 1, 0, 0).unwrap()
}

pub fn create_service(store: ReviewStateStore) -> (Arc<ReviewStateService>, FixedClock) {
    let clock = FixedClock::new(start_time());
    let service = Arc::new(ReviewStateService::new(
        store,
        Arc::new(clock.clone()),
        SchedulerSettings::default(),
    ));
    (service, clock)
}

pub fn create_test_app() -> TestApp {
    let (service, clock) = create_service(ReviewStateStore::memory());
    TestApp {
        app: danci_srs::create_app(Arc::clone(&service)),
        clock,
        service,
    }
}

pub fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
