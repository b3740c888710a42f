use axum::http::StatusCode;
use serde_json::Value;
use tourbook::schemas::auth::{LoginRequest, RegisterRequest};
use tourbook::schemas::profile::ProfileResponse;

mod common;

use common::{TEST_PASSWORD, TestEnv};

const ACCESS_TOKEN: &str = "tourbook_access_token";

fn register_request(username: &str) -> RegisterRequest {
	RegisterRequest {
		username: username.to_string(),
		password: "bobdebouwer1234!".to_string(),
		email:    format!("{username}@example.com"),
	}
}

#[tokio::test(flavor = "multi_thread")]
async fn register() {
	let env = TestEnv::new().await;

	let response =
		env.app.post("/auth/register").json(&register_request("bob")).await;

	assert_eq!(response.status_code(), StatusCode::CREATED);
	assert!(response.maybe_cookie(ACCESS_TOKEN).is_some());

	let body = response.json::<ProfileResponse>();

	assert_eq!(body.username, "bob");
	assert_eq!(body.email, "bob@example.com");
	assert!(!body.is_admin);

	let me = env.app.get("/profile/me").await;

	assert_eq!(me.status_code(), StatusCode::OK);
	assert_eq!(me.json::<ProfileResponse>().id, body.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn register_invalid_username() {
	let env = TestEnv::new().await;

	for username in ["123", "abc.", "a"] {
		let response = env
			.app
			.post("/auth/register")
			.json(&register_request(username))
			.await;

		assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
	}
}

#[tokio::test(flavor = "multi_thread")]
async fn register_short_password() {
	let env = TestEnv::new().await;

	let response = env
		.app
		.post("/auth/register")
		.json(&RegisterRequest {
			password: "short".to_string(),
			..register_request("bob")
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread")]
async fn register_duplicate_username() {
	let env = TestEnv::new().await;

	let response = env
		.app
		.post("/auth/register")
		.json(&RegisterRequest {
			email: "someone-else@example.com".to_string(),
			..register_request("test")
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::CONFLICT);
	assert_eq!(response.json::<Value>()["code"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn login() {
	let env = TestEnv::new().await;

	let response = env
		.app
		.post("/auth/login")
		.json(&LoginRequest {
			username: "test".to_string(),
			password: TEST_PASSWORD.to_string(),
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
	assert!(response.maybe_cookie(ACCESS_TOKEN).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn login_wrong_password() {
	let env = TestEnv::new().await;

	let response = env
		.app
		.post("/auth/login")
		.json(&LoginRequest {
			username: "test".to_string(),
			password: "not-the-password".to_string(),
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
	assert_eq!(response.json::<Value>()["code"], 7);
	assert!(response.maybe_cookie(ACCESS_TOKEN).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn login_unknown_username() {
	let env = TestEnv::new().await;

	let response = env
		.app
		.post("/auth/login")
		.json(&LoginRequest {
			username: "nobody".to_string(),
			password: TEST_PASSWORD.to_string(),
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
	assert_eq!(response.json::<Value>()["code"], 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn current_profile_needs_session() {
	let env = TestEnv::new().await;

	let response = env.app.get("/profile/me").await;

	assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
	assert_eq!(response.json::<Value>()["code"], 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_ends_session() {
	let env = TestEnv::new().await.login("test").await;

	let response = env.app.get("/profile/me").await;
	assert_eq!(response.status_code(), StatusCode::OK);
	assert_eq!(response.json::<ProfileResponse>().username, "test");

	let response = env.app.post("/auth/logout").await;
	assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

	let response = env.app.get("/profile/me").await;
	assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn seeded_admin_is_admin() {
	let env = TestEnv::new().await.login("admin").await;

	let response = env.app.get("/profile/me").await;

	assert_eq!(response.status_code(), StatusCode::OK);
	assert!(response.json::<ProfileResponse>().is_admin);
}

#[tokio::test(flavor = "multi_thread")]
async fn healthcheck() {
	let env = TestEnv::new().await;

	let response = env.app.get("/healthcheck").await;

	assert_eq!(response.status_code(), StatusCode::OK);
	assert_eq!(response.json::<Value>()["status"], "ok");
}
