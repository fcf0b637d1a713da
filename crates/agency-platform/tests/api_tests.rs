//! Platform API Integration Tests
//!
//! Drive the assembled router over the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use agency_platform::auth::{Argon2Config, TokenConfig, TokenService};
use agency_platform::seed::RoleSeeder;
use agency_platform::{
    ManualClock, MemoryStore, Platform, PlatformConfig, Repositories, RoleDefaults, UserRepository,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    roles: RoleDefaults,
}

struct TestResponse {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

async fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let roles = RoleDefaults::default();

    let repos = Repositories::from_memory(store.clone());
    RoleSeeder::new(repos.roles.clone(), roles.clone()).seed().await.unwrap();

    let config = PlatformConfig::new(
        TokenConfig::new("test-access-secret", "test-refresh-secret"),
        roles.clone(),
    )
    .with_clock(clock.clone())
    .with_argon2(Argon2Config::testing());

    let platform = Platform::new(config, repos).unwrap();
    TestApp { router: platform.router(), store, clock, roles }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        bearer: Option<&str>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// GET with a verbatim `Authorization` header
    async fn get_with_authorization(&self, uri: &str, authorization: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::AUTHORIZATION, authorization)
            .body(Body::empty())
            .unwrap();
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse { status, set_cookie, body }
    }

    async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body), None, None).await
    }

    /// Register and verify a user, returning its id
    async fn register_verified(&self, email: &str, password: &str) -> String {
        let res = self
            .post(
                "/api/auth/register",
                json!({"email": email, "password": password, "firstName": "Ada", "lastName": "Lovelace"}),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        let user_id = res.body["data"]["user"]["id"].as_str().unwrap().to_string();
        let otp = res.body["data"]["otp"].as_str().unwrap().to_string();

        let res = self
            .post(&format!("/api/auth/verify-email/{}", user_id), json!({"otp": otp}))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        user_id
    }

    async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post("/api/auth/login", json!({"email": email, "password": password})).await
    }

    async fn access_token(&self, email: &str, password: &str) -> String {
        let res = self.login(email, password).await;
        assert_eq!(res.status, StatusCode::OK);
        res.body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    async fn promote_to_admin(&self, email: &str) {
        let mut user = UserRepository::find_by_email(self.store.as_ref(), email)
            .await
            .unwrap()
            .unwrap();
        user.role_id = self.roles.admin_role_id.clone();
        UserRepository::update(self.store.as_ref(), &user).await.unwrap();
    }
}

fn jwt_payload(token: &str) -> Value {
    let payload = token.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

fn cookie_value(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().trim().to_string()
}

/// Token service holding secrets the platform does not know
fn foreign_tokens() -> TokenService {
    TokenService::new(TokenConfig::new("other-access-secret", "other-refresh-secret"))
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_login_sets_refresh_cookie() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let res = app.login("ada@example.com", "secret123").await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["success"], true);
        assert!(res.body["data"]["accessToken"].as_str().is_some());
        assert_eq!(res.body["data"]["user"]["email"], "ada@example.com");
        assert!(res.body["data"]["user"].get("passwordHash").is_none());

        let cookie = res.set_cookie.unwrap();
        assert!(cookie.starts_with("refreshToken="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let wrong_password = app.login("ada@example.com", "nope").await;
        let unknown_email = app.login("nobody@example.com", "secret123").await;

        for res in [wrong_password, unknown_email] {
            assert_eq!(res.status, StatusCode::UNAUTHORIZED);
            assert_eq!(res.body["success"], false);
            assert_eq!(res.body["message"], "Invalid credentials");
            assert!(res.set_cookie.is_none());
        }
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let app = app().await;
        let res = app.post("/api/auth/login", json!({"email": "ada@example.com"})).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["message"], "Password is required");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let res = app
            .post("/api/auth/register", json!({"email": "ADA@example.com", "password": "secret123"}))
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "DUPLICATE");
    }

    #[tokio::test]
    async fn test_reset_token_is_single_use() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let res = app.post("/api/auth/forgot-password", json!({"email": "ada@example.com"})).await;
        assert_eq!(res.status, StatusCode::OK);
        let link = res.body["data"]["token"].as_str().unwrap().to_string();
        assert!(link.starts_with("/reset-password/"));

        let uri = format!("/api/auth{}", link);
        let first = app.post(&uri, json!({"password": "newpass1"})).await;
        assert_eq!(first.status, StatusCode::OK);

        let second = app.post(&uri, json!({"password": "newpass2"})).await;
        assert_eq!(second.status, StatusCode::BAD_REQUEST);
        assert_eq!(second.body["error"], "INVALID_OR_EXPIRED_TOKEN");

        assert_eq!(app.login("ada@example.com", "newpass1").await.status, StatusCode::OK);
        assert_eq!(
            app.login("ada@example.com", "newpass2").await.status,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_forgot_password_single_flight() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let first = app.post("/api/auth/forgot-password", json!({"email": "ada@example.com"})).await;
        assert_eq!(first.status, StatusCode::OK);

        let second = app.post("/api/auth/forgot-password", json!({"email": "ada@example.com"})).await;
        assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);

        app.clock.advance(Duration::seconds(901));
        let third = app.post("/api/auth/forgot-password", json!({"email": "ada@example.com"})).await;
        assert_eq!(third.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let app = app().await;
        let res = app.post("/api/auth/forgot-password", json!({"email": "nobody@example.com"})).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_otp_expires() {
        let app = app().await;
        let res = app
            .post("/api/auth/register", json!({"email": "ada@example.com", "password": "secret123"}))
            .await;
        let user_id = res.body["data"]["user"]["id"].as_str().unwrap().to_string();
        let otp = res.body["data"]["otp"].as_str().unwrap().to_string();
        assert_eq!(otp.len(), 6);

        let again = app.post("/api/auth/resend-otp", json!({"email": "ada@example.com"})).await;
        assert_eq!(again.status, StatusCode::TOO_MANY_REQUESTS);

        app.clock.advance(Duration::seconds(301));

        let res = app
            .post(&format!("/api/auth/verify-email/{}", user_id), json!({"otp": otp}))
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let resent = app.post("/api/auth/resend-otp", json!({"email": "ada@example.com"})).await;
        assert_eq!(resent.status, StatusCode::OK);
        let fresh = resent.body["data"]["otp"].as_str().unwrap();

        let res = app
            .post(&format!("/api/auth/verify-email/{}", user_id), json!({"otp": fresh}))
            .await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["user"]["status"], "verified");
    }

    #[tokio::test]
    async fn test_refresh_issues_full_claims() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let login = app.login("ada@example.com", "secret123").await;
        let cookie = cookie_value(&login.set_cookie.unwrap());

        let res = app
            .send(Method::POST, "/api/auth/refresh-token", None, None, Some(&cookie))
            .await;
        assert_eq!(res.status, StatusCode::OK);

        let claims = jwt_payload(res.body["data"]["accessToken"].as_str().unwrap());
        let mut keys: Vec<&str> = claims.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["email", "exp", "iat", "id", "role"]);
        assert_eq!(claims["email"], "ada@example.com");
        assert_eq!(claims["role"], "user");
    }

    #[tokio::test]
    async fn test_refresh_without_cookie() {
        let app = app().await;
        let res = app.send(Method::POST, "/api/auth/refresh-token", None, None, None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let res = app
            .send(Method::POST, "/api/auth/refresh-token", None, None, Some("refreshToken=garbage"))
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_rejections_are_uniform() {
        let app = app().await;
        let user_id = app.register_verified("ada@example.com", "secret123").await;
        let login = app.login("ada@example.com", "secret123").await;
        let issued = cookie_value(&login.set_cookie.unwrap());

        let forged = foreign_tokens().sign_refresh(&user_id).unwrap();
        let forged = format!("refreshToken={}", forged);

        // Refresh tokens live seven days
        app.clock.advance(Duration::days(7) + Duration::seconds(1));

        let mut bodies = Vec::new();
        for cookie in ["refreshToken=garbage", issued.as_str(), forged.as_str()] {
            let res = app
                .send(Method::POST, "/api/auth/refresh-token", None, None, Some(cookie))
                .await;
            assert_eq!(res.status, StatusCode::UNAUTHORIZED);
            assert_eq!(res.body["message"], "Invalid or expired refresh token");
            bodies.push(res.body.to_string());
        }
        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[1], bodies[2]);
        assert!(!bodies[0].to_lowercase().contains("signature"));
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let app = app().await;
        let res = app.send(Method::POST, "/api/auth/logout", None, None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        let cookie = res.set_cookie.unwrap();
        assert!(cookie.starts_with("refreshToken=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;

        let res = app.send(Method::GET, "/api/auth/me", None, None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["error"], "UNAUTHORIZED");

        let token = app.access_token("ada@example.com", "secret123").await;
        let res = app.send(Method::GET, "/api/auth/me", None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["user"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_bearer_rejections_are_uniform() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;
        let issued = app.access_token("ada@example.com", "secret123").await;

        let user = UserRepository::find_by_email(app.store.as_ref(), "ada@example.com")
            .await
            .unwrap()
            .unwrap();
        let forged = foreign_tokens().sign_access(&user, "admin").unwrap();

        let missing = app.send(Method::GET, "/api/auth/me", None, None, None).await;
        let malformed = app.get_with_authorization("/api/auth/me", "Token abc").await;
        let garbage = app.send(Method::GET, "/api/auth/me", None, Some("not.a.jwt"), None).await;
        let foreign = app.send(Method::GET, "/api/auth/me", None, Some(&forged), None).await;

        // Access tokens live one hour
        app.clock.advance(Duration::seconds(3601));
        let expired = app.send(Method::GET, "/api/auth/me", None, Some(&issued), None).await;

        let expected = json!({"success": false, "message": "Unauthorized", "error": "UNAUTHORIZED"});
        for res in [missing, malformed, garbage, foreign, expired] {
            assert_eq!(res.status, StatusCode::UNAUTHORIZED);
            assert_eq!(res.body, expected);
        }
    }
}

mod admin_tests {
    use super::*;

    #[tokio::test]
    async fn test_admin_routes_reject_users() {
        let app = app().await;
        app.register_verified("ada@example.com", "secret123").await;
        let token = app.access_token("ada@example.com", "secret123").await;

        let res = app.send(Method::GET, "/api/admin/users", None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);

        let res = app.send(Method::GET, "/api/admin/roles", None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_manages_roles() {
        let app = app().await;
        app.register_verified("boss@example.com", "secret123").await;
        app.promote_to_admin("boss@example.com").await;
        let token = app.access_token("boss@example.com", "secret123").await;

        let res = app
            .send(Method::POST, "/api/admin/roles", Some(json!({"title": "manager"})), Some(&token), None)
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        let role_id = res.body["data"]["id"].as_str().unwrap().to_string();

        let res = app
            .send(Method::POST, "/api/admin/roles", Some(json!({"title": "manager"})), Some(&token), None)
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/roles/{}", app.roles.admin_role_id);
        let res = app.send(Method::DELETE, &uri, None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/roles/{}", role_id);
        let res = app.send(Method::DELETE, &uri, None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let res = app.send(Method::GET, "/api/admin/roles", None, Some(&token), None).await;
        assert_eq!(res.body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_role_cannot_take_deleted_role_title() {
        let app = app().await;
        app.register_verified("boss@example.com", "secret123").await;
        app.promote_to_admin("boss@example.com").await;
        let token = app.access_token("boss@example.com", "secret123").await;

        let mut ids = Vec::new();
        for title in ["manager", "ops"] {
            let res = app
                .send(Method::POST, "/api/admin/roles", Some(json!({"title": title})), Some(&token), None)
                .await;
            assert_eq!(res.status, StatusCode::CREATED);
            ids.push(res.body["data"]["id"].as_str().unwrap().to_string());
        }

        let uri = format!("/api/admin/roles/{}", ids[0]);
        let res = app.send(Method::DELETE, &uri, None, Some(&token), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let uri = format!("/api/admin/roles/{}", ids[1]);
        let res = app
            .send(Method::PATCH, &uri, Some(json!({"title": "manager"})), Some(&token), None)
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "DUPLICATE");
    }
}

mod service_request_tests {
    use super::*;

    async fn create_service(app: &TestApp, admin_token: &str) -> Value {
        let body = json!({
            "name": "Website design",
            "plans": [{"name": "Basic", "priceCents": 50000, "features": ["5 pages"]}],
            "fields": [
                {"name": "first_name", "label": "First name", "type": "text", "required": true, "fromUser": true},
                {"name": "budget", "label": "Budget", "type": "select", "options": ["low", "high"], "required": true},
                {"name": "launch", "label": "Launch date", "type": "date", "step": 2}
            ]
        });
        let res = app
            .send(Method::POST, "/api/admin/services", Some(body), Some(admin_token), None)
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        res.body["data"].clone()
    }

    #[tokio::test]
    async fn test_submission_is_validated_against_form() {
        let app = app().await;
        app.register_verified("boss@example.com", "secret123").await;
        app.promote_to_admin("boss@example.com").await;
        let admin = app.access_token("boss@example.com", "secret123").await;
        app.register_verified("ada@example.com", "secret123").await;
        let user = app.access_token("ada@example.com", "secret123").await;

        let service = create_service(&app, &admin).await;
        let service_id = service["id"].as_str().unwrap();
        let plan_id = service["plans"][0]["id"].as_str().unwrap();

        let res = app
            .send(
                Method::POST,
                "/api/service-requests",
                Some(json!({
                    "serviceId": service_id,
                    "planId": plan_id,
                    "formData": {"launch": "next week"}
                })),
                Some(&user),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.body["error"], "FORM_VALIDATION_ERROR");
        let details = res.body["details"].as_array().unwrap();
        let codes: Vec<(&str, &str)> = details
            .iter()
            .map(|d| (d["field"].as_str().unwrap(), d["code"].as_str().unwrap()))
            .collect();
        assert!(codes.contains(&("budget", "MISSING")));
        assert!(codes.contains(&("launch", "INVALID_DATE")));

        let res = app
            .send(
                Method::POST,
                "/api/service-requests",
                Some(json!({
                    "serviceId": service_id,
                    "planId": plan_id,
                    "message": "Hello",
                    "formData": {"budget": "high", "launch": "2027-01-15"}
                })),
                Some(&user),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body["data"]["status"], "in progress");
        assert_eq!(res.body["data"]["formData"]["first_name"], "Ada");
        assert_eq!(res.body["data"]["formData"]["budget"], "high");

        let res = app.send(Method::GET, "/api/service-requests", None, Some(&user), None).await;
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submission_rejects_foreign_plan() {
        let app = app().await;
        app.register_verified("boss@example.com", "secret123").await;
        app.promote_to_admin("boss@example.com").await;
        let admin = app.access_token("boss@example.com", "secret123").await;

        let service = create_service(&app, &admin).await;
        let res = app
            .send(
                Method::POST,
                "/api/service-requests",
                Some(json!({
                    "serviceId": service["id"],
                    "planId": "not-a-plan",
                    "formData": {"budget": "low"}
                })),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_form_is_grouped_by_step() {
        let app = app().await;
        app.register_verified("boss@example.com", "secret123").await;
        app.promote_to_admin("boss@example.com").await;
        let admin = app.access_token("boss@example.com", "secret123").await;

        let service = create_service(&app, &admin).await;
        let uri = format!("/api/services/{}/form", service["id"].as_str().unwrap());
        let res = app.send(Method::GET, &uri, None, Some(&admin), None).await;
        assert_eq!(res.status, StatusCode::OK);

        let steps = res.body["data"]["steps"].as_array().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0]["step"], 1);
        assert_eq!(steps[1]["groups"][0]["fields"][0]["name"], "launch");
    }
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_without_database() {
        let app = app().await;
        let res = app.send(Method::GET, "/health", None, None, None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["status"], "UP");
        assert!(res.body["version"].as_str().is_some());
    }
}
