//!
//! coursegate HTTP server
//! ----------------------
//! Axum router that puts the gate pipeline in front of thin user/course/resource handlers.
//!
//! Responsibilities:
//! - Build the shared state (user store, catalogs, verifier, rate limiter, response cache).
//! - Compose per-route middleware: rate limit for all of `/api`, then verify, role guard and
//!   ownership checks per route, with the response cache around the course routes.
//! - Demo login that issues a bearer token and a `token` cookie.
//! - Seed demo accounts and content when demo mode is on.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{middleware, Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::GateConfig;
use crate::error::{FieldError, GateError, GateResult};
use crate::gate::{
    cache_json, check_ownership, optional_auth, rate_limit, require_auth, require_roles, require_text,
    AuthUser, Loaded, MaybeUser, OwnershipCheck, RateLimiter, ResponseCache, RoleGuard, ValidJson, Validate,
    Verifier,
};
use crate::identity::{InMemoryUserStore, Role, TokenService, UserRecord, UserStore, TOKEN_COOKIE};

pub mod catalog;

use catalog::{Catalog, Course, CourseUpdate, NewCourse, Resource, ResourceUpdate};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<InMemoryUserStore>,
    pub courses: Arc<Catalog<Course>>,
    pub resources: Arc<Catalog<Resource>>,
    pub verifier: Verifier,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
}

impl AppState {
    pub fn new(config: &GateConfig) -> anyhow::Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("jwt_secret is empty; set JWT_SECRET or use demo mode");
        }
        let users = Arc::new(InMemoryUserStore::new());
        let tokens = TokenService::new(&config.jwt_secret, config.token_ttl);
        Ok(Self {
            verifier: Verifier::new(tokens, users.clone(), config.lookup_timeout),
            users,
            courses: Arc::new(Catalog::new()),
            resources: Arc::new(Catalog::new()),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            cache: Arc::new(ResponseCache::new(config.cache_ttl, config.cache_max_entries)),
        })
    }

    pub fn tokens(&self) -> &TokenService { self.verifier.tokens() }
}

pub fn router(state: AppState) -> Router {
    let protect = middleware::from_fn_with_state(state.verifier.clone(), require_auth);
    let optional = middleware::from_fn_with_state(state.verifier.clone(), optional_auth);
    let teaching = middleware::from_fn_with_state(
        RoleGuard::new(&[Role::Instructor, Role::Admin], "course management"),
        require_roles,
    );
    let admin_only = middleware::from_fn_with_state(RoleGuard::new(&[Role::Admin], "user listing"), require_roles);
    let course_owner = middleware::from_fn_with_state(
        OwnershipCheck::<Course>::new(state.courses.clone(), "instructor"),
        check_ownership::<Course>,
    );
    let resource_owner = middleware::from_fn_with_state(
        OwnershipCheck::<Resource>::new(state.resources.clone(), "author"),
        check_ownership::<Resource>,
    );

    // Layers on one method router: the last one added runs first.
    let users = Router::new()
        .route("/profile", get(profile))
        .route("/", get(list_users).layer(admin_only))
        .route_layer(protect.clone());

    let courses = Router::new()
        .route(
            "/",
            get(list_courses)
                .layer(optional)
                .merge(post(create_course).layer(teaching.clone()).layer(protect.clone())),
        )
        .route(
            "/{courseId}",
            get(get_course).merge(
                put(update_course)
                    .delete(delete_course)
                    .layer(course_owner)
                    .layer(teaching)
                    .layer(protect.clone()),
            ),
        )
        .layer(middleware::from_fn_with_state(state.cache.clone(), cache_json));

    let resources = Router::new()
        .route("/", get(list_resources))
        .route(
            "/{resourceId}",
            get(get_resource).merge(put(update_resource).layer(resource_owner).layer(protect.clone())),
        )
        .route("/{resourceId}/like", post(like_resource).layer(protect));

    let api = Router::new()
        .route("/auth/login", post(login))
        .nest("/users", users)
        .nest("/courses", courses)
        .nest("/resources", resources)
        .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit));

    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/api", api)
        .with_state(state)
}

pub async fn run(config: GateConfig) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;
    if config.demo {
        seed_demo(&state);
        tracing::warn!("demo mode: seeded accounts are loaded and the login route issues tokens without passwords");
    }
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(%addr, rate_max = config.rate_limit.max_requests, cache_ttl_secs = config.cache_ttl.as_secs(), "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Populate a fresh state with one account per role plus a little content.
pub fn seed_demo(state: &AppState) {
    let admin = UserRecord::new("Site Admin", "admin@coursegate.dev", Role::Admin);
    let instructor = UserRecord::new("Yusuf Rahman", "instructor@coursegate.dev", Role::Instructor);
    let student = UserRecord::new("Maryam Ali", "student@coursegate.dev", Role::Student);

    let course = NewCourse {
        title: "Foundations of Statistics".into(),
        description: "Descriptive statistics, probability and inference.".into(),
        category: "Statistics".into(),
        level: "Beginner".into(),
        published: true,
    }
    .into_course(&instructor.id);
    state.courses.upsert(course);
    state.resources.upsert(Resource::new(
        "Probability cheat sheet",
        "One-page summary of common distributions",
        "academic",
        "pdf",
        Some(instructor.id.as_str()),
    ));

    for u in [admin, instructor, student] {
        info!(email = %u.email, role = %u.role, "seeded demo account");
        state.users.insert(u);
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
}

impl Validate for LoginPayload {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "email", &self.email, "Email", 254);
        errors
    }
}

fn token_cookie(token: &str) -> GateResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", TOKEN_COOKIE, token))
        .map_err(GateError::internal)
}

async fn login(State(state): State<AppState>, ValidJson(payload): ValidJson<LoginPayload>) -> GateResult<impl IntoResponse> {
    let user = state.users.find_by_email(&payload.email).ok_or_else(|| GateError::Validation {
        details: vec![FieldError::new("email", "No account with this email")],
    })?;
    if !user.is_active {
        return Err(GateError::InactivePrincipal);
    }
    let token = state.tokens().issue(&user.id)?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, token_cookie(&token)?);
    info!(user_id = %user.id, "login");
    Ok((StatusCode::OK, headers, Json(json!({ "status": "success", "data": { "token": token, "user": user } }))))
}

async fn profile(State(state): State<AppState>, AuthUser(principal): AuthUser) -> GateResult<Json<serde_json::Value>> {
    let user = state.users.find_by_id(&principal.id).await?.ok_or(GateError::NotFound)?;
    Ok(Json(json!({ "status": "success", "data": { "user": user } })))
}

async fn list_users(State(state): State<AppState>) -> Json<serde_json::Value> {
    let users = state.users.list();
    Json(json!({ "status": "success", "results": users.len(), "data": { "users": users } }))
}

#[derive(Debug, Deserialize)]
struct CourseQuery {
    category: Option<String>,
    level: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

/// Published courses, plus the caller's own drafts when signed in.
async fn list_courses(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Query(q): Query<CourseQuery>,
) -> Json<serde_json::Value> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(12).clamp(1, 100);
    let visible: Vec<Course> = state
        .courses
        .list()
        .into_iter()
        .filter(|c| c.published || viewer.as_ref().is_some_and(|v| v.id == c.instructor))
        .filter(|c| q.category.as_deref().map_or(true, |cat| c.category == cat))
        .filter(|c| q.level.as_deref().map_or(true, |lvl| c.level == lvl))
        .collect();
    let total = visible.len();
    let courses: Vec<Course> = visible.into_iter().skip(page.saturating_sub(1).saturating_mul(limit)).take(limit).collect();
    Json(json!({
        "status": "success",
        "data": { "courses": courses, "pagination": { "page": page, "limit": limit, "total": total } }
    }))
}

async fn get_course(State(state): State<AppState>, Path(course_id): Path<String>) -> GateResult<Json<serde_json::Value>> {
    let course = state.courses.get(&course_id).filter(|c| c.published).ok_or(GateError::NotFound)?;
    Ok(Json(json!({ "status": "success", "data": { "course": course } })))
}

async fn create_course(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidJson(payload): ValidJson<NewCourse>,
) -> impl IntoResponse {
    let course = payload.into_course(&principal.id);
    state.courses.upsert(course.clone());
    info!(course_id = %course.id, instructor = %principal.id, "course created");
    (
        StatusCode::CREATED,
        Json(json!({ "status": "success", "message": "Course created successfully", "data": { "course": course } })),
    )
}

async fn update_course(
    State(state): State<AppState>,
    Extension(Loaded(course)): Extension<Loaded<Course>>,
    ValidJson(patch): ValidJson<CourseUpdate>,
) -> GateResult<Json<serde_json::Value>> {
    let (course, ()) = state.courses.update(&course.id, |c| patch.apply(c)).ok_or(GateError::NotFound)?;
    Ok(Json(json!({ "status": "success", "message": "Course updated successfully", "data": { "course": course } })))
}

async fn delete_course(
    State(state): State<AppState>,
    Extension(Loaded(course)): Extension<Loaded<Course>>,
) -> GateResult<Json<serde_json::Value>> {
    state.courses.remove(&course.id).ok_or(GateError::NotFound)?;
    info!(course_id = %course.id, "course deleted");
    Ok(Json(json!({ "status": "success", "message": "Course deleted successfully" })))
}

async fn list_resources(State(state): State<AppState>) -> Json<serde_json::Value> {
    let resources = state.resources.list();
    Json(json!({ "status": "success", "results": resources.len(), "data": { "resources": resources } }))
}

async fn get_resource(State(state): State<AppState>, Path(resource_id): Path<String>) -> GateResult<Json<serde_json::Value>> {
    let resource = state.resources.get(&resource_id).ok_or(GateError::NotFound)?;
    Ok(Json(json!({ "status": "success", "data": { "resource": resource } })))
}

async fn update_resource(
    State(state): State<AppState>,
    Extension(Loaded(resource)): Extension<Loaded<Resource>>,
    ValidJson(patch): ValidJson<ResourceUpdate>,
) -> GateResult<Json<serde_json::Value>> {
    let (resource, ()) = state.resources.update(&resource.id, |r| patch.apply(r)).ok_or(GateError::NotFound)?;
    Ok(Json(json!({ "status": "success", "data": { "resource": resource } })))
}

async fn like_resource(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(resource_id): Path<String>,
) -> GateResult<Json<serde_json::Value>> {
    let (resource, liked) = state
        .resources
        .update(&resource_id, |r| r.toggle_like(&principal.id))
        .ok_or(GateError::NotFound)?;
    Ok(Json(json!({
        "status": "success",
        "data": { "liked": liked, "likes": resource.liked_by.len() }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_requires_a_signing_secret() {
        let err = AppState::new(&GateConfig::default()).err().unwrap();
        assert!(err.to_string().contains("jwt_secret"));
        assert!(AppState::new(&GateConfig::demo()).is_ok());
    }

    #[test]
    fn demo_seed_has_one_account_per_role() {
        let state = AppState::new(&GateConfig::demo()).unwrap();
        seed_demo(&state);
        let roles: Vec<Role> = state.users.list().iter().map(|u| u.role).collect();
        assert_eq!(roles.len(), 3);
        for role in [Role::Admin, Role::Instructor, Role::Student] {
            assert!(roles.contains(&role));
        }
        assert_eq!(state.courses.list().len(), 1);
    }
}
