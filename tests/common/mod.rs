//! Shared helpers for HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{Days, NaiveDate, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use surf_onboard::config::WizardConfig;
use surf_onboard::onboarding::SessionRegistry;
use surf_onboard::server::build_router;

/// Router over a fresh registry with no simulated latency.
pub fn build_test_app() -> Router {
    build_router(Arc::new(SessionRegistry::simulated(WizardConfig::for_tests())))
}

/// Send a request and return the status and JSON body (`Null` when empty).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

/// Create a session and return its id.
pub async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session"]["sessionId"].as_str().unwrap().to_string()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn signup() -> Value {
    json!({
        "step": "signup",
        "email": "ana@example.com",
        "password": "Aa1!aaaa",
        "confirmPassword": "Aa1!aaaa",
        "firstName": "Ana",
        "lastName": "Lima",
        "acceptTerms": true
    })
}

pub fn assessment() -> Value {
    json!({
        "step": "assessment",
        "sport": "surf",
        "skillLevel": "beginner",
        "yearsExperience": 0,
        "swimmingAbility": "confident",
        "previousLessons": false,
        "goals": ["Stand up"],
        "fitnessLevel": "moderate"
    })
}

pub fn profile() -> Value {
    let dob = today() - Days::new(365 * 25);
    json!({
        "step": "profile",
        "firstName": "Ana",
        "lastName": "Lima",
        "dateOfBirth": dob.format("%Y-%m-%d").to_string(),
        "phone": "+351 912 345 678",
        "heightCm": 168,
        "weightKg": 60,
        "wetsuitSize": "M"
    })
}

pub fn waiver() -> Value {
    json!({
        "step": "waiver",
        "acceptedTerms": true,
        "acceptedLiability": true,
        "acceptedMedical": true,
        "signature": "Ana Lima"
    })
}

pub fn card_payment(number: &str) -> Value {
    json!({
        "method": "card",
        "cardNumber": number,
        "cardHolder": "Ana Lima",
        "expiry": "12/39",
        "cvv": "123"
    })
}

/// Drive a session from welcome through the waiver.
pub async fn complete_through_waiver(app: &Router, id: &str) {
    let uri = format!("/api/sessions/{id}/steps");
    for body in [json!({"step": "welcome"}), signup(), assessment(), profile(), waiver()] {
        let (status, response) = post(app, &uri, body).await;
        assert_eq!(status, StatusCode::OK, "{response}");
    }
}

/// First (date, "HH:MM") with an open slot in the next two weeks.
pub async fn find_open_slot(app: &Router, id: &str) -> (String, String) {
    for offset in 1..15 {
        let date = (today() + Days::new(offset)).format("%Y-%m-%d").to_string();
        let (status, body) = get(app, &format!("/api/sessions/{id}/slots?date={date}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if let Some(slot) = body["slots"].as_array().and_then(|s| s.first()) {
            let start = slot["start"].as_str().unwrap();
            return (date, start[..5].to_string());
        }
    }
    panic!("no open slot in two weeks");
}
