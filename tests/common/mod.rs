//! Shared fixture for router-level tests: a fully wired app with one account per role.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use coursegate::gate::RateLimitConfig;
use coursegate::identity::{Role, UserRecord};
use coursegate::server::catalog::{Course, NewCourse};
use coursegate::server::{router, AppState};
use coursegate::GateConfig;

pub const SECRET: &str = "integration-secret-0123456789abcdef";

pub struct Fixture {
    pub app: Router,
    pub state: AppState,
    pub admin: UserRecord,
    pub instructor: UserRecord,
    pub other_instructor: UserRecord,
    pub student: UserRecord,
    pub course: Course,
}

pub fn config() -> GateConfig {
    GateConfig {
        jwt_secret: SECRET.to_string(),
        rate_limit: RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 1_000,
            ..RateLimitConfig::default()
        },
        cache_ttl: Duration::from_secs(5),
        demo: false,
        ..GateConfig::default()
    }
}

pub fn fixture() -> Fixture {
    fixture_with(config())
}

pub fn fixture_with(config: GateConfig) -> Fixture {
    let state = AppState::new(&config).expect("state");
    let admin = UserRecord::new("Admin", "admin@test.dev", Role::Admin);
    let instructor = UserRecord::new("Owner", "owner@test.dev", Role::Instructor);
    let other_instructor = UserRecord::new("Other", "other@test.dev", Role::Instructor);
    let student = UserRecord::new("Student", "student@test.dev", Role::Student);
    for u in [&admin, &instructor, &other_instructor, &student] {
        state.users.insert(u.clone());
    }
    let course = NewCourse {
        title: "Arabic Grammar I".into(),
        description: "Nouns, verbs and particles".into(),
        category: "Arabic Language".into(),
        level: "Beginner".into(),
        published: true,
    }
    .into_course(&instructor.id);
    state.courses.upsert(course.clone());
    Fixture { app: router(state.clone()), state, admin, instructor, other_instructor, student, course }
}

impl Fixture {
    pub fn token_for(&self, user: &UserRecord) -> String {
        self.state.tokens().issue(&user.id).expect("issue token")
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let body = match body {
        Some(v) => {
            b = b.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    b.body(body).expect("request")
}

pub fn from_ip(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
    req
}

pub async fn send(app: &Router, req: Request<Body>) -> Reply {
    let resp = app.clone().oneshot(req).await.expect("infallible router");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    Reply { status, headers, bytes }
}
