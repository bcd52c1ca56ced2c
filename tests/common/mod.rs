#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use assessment_backend::{
    database::{memory::MemoryStore, AttemptStore, QuestionBank},
    dto::authoring_dto::NewTest,
    middleware::auth::Claims,
    models::test::Test,
    services::course_access::StaticCourseAccess,
    utils::time::Clock,
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct Harness {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_course_access(true)
    }

    pub fn with_course_access(allowed: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::build(store.clone(), store, allowed)
    }

    /// Same wiring over the given storage, e.g. the Postgres stores.
    pub fn with_stores(bank: Arc<dyn QuestionBank>, store: Arc<dyn AttemptStore>) -> Self {
        Self::build(bank, store, true)
    }

    fn build(bank: Arc<dyn QuestionBank>, store: Arc<dyn AttemptStore>, allowed: bool) -> Self {
        let clock = Arc::new(FixedClock::at(
            Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap(),
        ));
        let state = AppState::new(
            bank,
            store,
            Arc::new(StaticCourseAccess(allowed)),
            clock.clone(),
            JWT_SECRET,
        );
        Self { state, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn router(&self, rps: u32) -> Router {
        assessment_backend::routes::api_router(self.state.clone(), rps)
    }

    /// Stores the capitals quiz with `overrides` merged over its top-level fields.
    pub async fn create_test(&self, overrides: JsonValue) -> Test {
        let payload: NewTest = serde_json::from_value(quiz(overrides)).expect("valid test json");
        self.state
            .test_service
            .create_test(payload)
            .await
            .expect("create test")
    }
}

/// single (2 pts) + multiple (4 pts) + short (1 pt); max score 7, pass mark 4.
pub fn quiz(overrides: JsonValue) -> JsonValue {
    let mut base = json!({
        "course_id": 10,
        "lesson_id": 20,
        "title": "Capitals and primes",
        "status": "published",
        "feedback_mode": "immediate",
        "pass_mark": "4",
        "questions": [
            {
                "text": "Capital of France?",
                "type": "single",
                "points": "2",
                "choices": [
                    {"label": "Paris", "is_correct": true},
                    {"label": "Lyon", "feedback": "Lyon is the third largest city."}
                ]
            },
            {
                "text": "Pick the primes",
                "type": "multiple",
                "points": "4",
                "choices": [
                    {"label": "2", "is_correct": true},
                    {"label": "3", "is_correct": true},
                    {"label": "4"}
                ]
            },
            {
                "text": "Capital of Italy?",
                "type": "short",
                "points": "1",
                "accepted": ["Rome"]
            }
        ]
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    base
}

/// Choice ids of question `index` in authored order.
pub fn choice_ids(test: &Test, index: usize) -> Vec<i64> {
    test.questions[index].choices.iter().map(|c| c.id).collect()
}

/// Answers that score `2 + 2 + 1 = 5` on [`quiz`]: right single, superset multiple, right short.
pub fn mostly_right_answers(test: &Test) -> JsonValue {
    let single = choice_ids(test, 0);
    let multiple = choice_ids(test, 1);
    json!([
        {"question": test.questions[0].id, "selected": [single[0]]},
        {"question": test.questions[1].id, "selected": multiple},
        {"question": test.questions[2].id, "text": "  rome "}
    ])
}

pub fn token_for(user_id: Uuid, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: role.map(str::to_string),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let resp = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}
