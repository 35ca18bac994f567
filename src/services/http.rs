use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::tokens::TokenSigner;
use super::ServiceError;
use crate::services::auth::AuthRequest;
use crate::services::referrals::ReferralRequest;
use crate::settings;

mod auth;
mod referrals;

#[derive(Clone)]
struct AppState {
    auth_channel: mpsc::Sender<AuthRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    token_signer: TokenSigner,
}

/// Injected into protected requests by the bearer middleware.
#[derive(Clone)]
struct AuthenticatedUser {
    id: String,
}

async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let user_id = match token.map(|token| state.token_signer.authenticate(token)) {
        Some(Ok(user_id)) => user_id,
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Unauthorized"})),
            )
                .into_response();
        }
    };

    req.extensions_mut().insert(AuthenticatedUser { id: user_id });
    next.run(req).await
}

/// Business-rule errors come back verbatim as 400-level responses; store
/// and internal faults are logged and answered with a fixed, detail-free
/// 500 body.
fn error_response(error: ServiceError) -> (StatusCode, Json<Value>) {
    if error.is_fault() {
        log::error!("Request failed: {}", error);
        return server_error();
    }

    let status = match error {
        ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
        ServiceError::InvalidRefreshToken => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    };

    (status, Json(json!({"error": error.to_string()})))
}

fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Server error, please try again later."})),
    )
}

fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/referrals", get(referrals::get_referrals))
        .route("/referral-stats", get(referrals::get_referral_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/token", post(auth::refresh_token))
        .merge(protected)
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    server: &settings::Server,
    auth_channel: mpsc::Sender<AuthRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    token_signer: TokenSigner,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        auth_channel,
        referral_channel,
        token_signer,
    };
    let app = router(app_state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", server.host, server.port)).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::models::referrals::Referral;
    use crate::models::users::User;
    use crate::services::referrals::{ReferralList, ReferralStats};

    fn sample_user() -> User {
        User {
            id: "user-1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$10$secret".to_string(),
            referral_code: "alice-x4k2qz".to_string(),
            referred_by: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn sample_referral(referrer_id: &str) -> Referral {
        Referral {
            id: "referral-1".to_string(),
            referrer_id: referrer_id.to_string(),
            referred_user_id: "user-2".to_string(),
            status: "successful".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Stands up the router against fake service peers answering the
    /// request channels, the same seam the real services sit behind.
    fn test_app() -> (Router, TokenSigner) {
        let signer = TokenSigner::new("access-secret".to_string(), "refresh-secret".to_string());

        let (auth_tx, mut auth_rx) = mpsc::channel(8);
        let (referral_tx, mut referral_rx) = mpsc::channel(8);

        let auth_signer = signer.clone();
        tokio::spawn(async move {
            while let Some(request) = auth_rx.recv().await {
                match request {
                    AuthRequest::Register {
                        email,
                        referral_code,
                        response,
                        ..
                    } => {
                        let result = match (email.as_str(), referral_code.as_deref()) {
                            ("taken@example.com", _) => Err(ServiceError::DuplicateIdentity),
                            ("boom@example.com", _) => {
                                Err(ServiceError::Database("connection reset".to_string()))
                            }
                            (_, Some("missing-code")) => Err(ServiceError::InvalidReferralCode),
                            (_, Some("own-code")) => Err(ServiceError::SelfReferral),
                            _ => Ok(sample_user()),
                        };
                        let _ = response.send(result);
                    }
                    AuthRequest::Login {
                        identifier,
                        response,
                        ..
                    } => {
                        let result = if identifier == "alice" {
                            auth_signer.issue_session("user-1")
                        } else {
                            Err(ServiceError::InvalidCredentials)
                        };
                        let _ = response.send(result);
                    }
                    AuthRequest::ForgotPassword { email, response } => {
                        let result = if email == "alice@example.com" {
                            Ok(())
                        } else {
                            Err(ServiceError::UnknownEmail)
                        };
                        let _ = response.send(result);
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(request) = referral_rx.recv().await {
                match request {
                    ReferralRequest::ListReferrals { user_id, response } => {
                        let _ = response.send(Ok(ReferralList {
                            referrals: vec![
                                sample_referral(&user_id),
                                sample_referral(&user_id),
                            ],
                            cached: false,
                        }));
                    }
                    ReferralRequest::Stats { response, .. } => {
                        let _ = response.send(Ok(ReferralStats {
                            total: 2,
                            successful: 2,
                        }));
                    }
                }
            }
        });

        let state = AppState {
            auth_channel: auth_tx,
            referral_channel: referral_tx,
            token_signer: signer.clone(),
        };

        (router(state), signer)
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    async fn get_with_bearer(app: Router, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method("GET").uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    #[tokio::test]
    async fn register_returns_created_user_without_password_hash() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app,
            "/register",
            json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "secret1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User registered successfully");
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["referral_code"], "alice-x4k2qz");
        assert!(body["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_identity() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app,
            "/register",
            json!({
                "username": "alice",
                "email": "taken@example.com",
                "password": "secret1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email or username already in use");
    }

    #[tokio::test]
    async fn register_rejects_bad_referral_codes() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app.clone(),
            "/register",
            json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "secret1",
                "referralCode": "missing-code"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid referral code");

        let (status, body) = post_json(
            app,
            "/register",
            json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "secret1",
                "referralCode": "own-code"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "You cannot refer yourself");
    }

    #[tokio::test]
    async fn register_validates_input_before_the_core() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app,
            "/register",
            json!({
                "username": "",
                "email": "not-an-email",
                "password": "short"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn store_failures_never_leak_detail() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app,
            "/register",
            json!({
                "username": "alice",
                "email": "boom@example.com",
                "password": "secret1"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server error, please try again later.");
    }

    #[tokio::test]
    async fn login_returns_token_pair() {
        let (app, signer) = test_app();
        let (status, body) = post_json(
            app,
            "/login",
            json!({"identifier": "alice", "password": "secret1"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let access_token = body["accessToken"].as_str().unwrap();
        assert!(body["refreshToken"].as_str().is_some());
        assert_eq!(signer.authenticate(access_token).unwrap(), "user-1");
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (app, _) = test_app();
        let (status, body) = post_json(
            app,
            "/login",
            json!({"identifier": "mallory", "password": "wrong1"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn token_refresh_lifecycle() {
        let (app, signer) = test_app();
        let session = signer.issue_session("user-1").unwrap();

        let (status, body) =
            post_json(app.clone(), "/token", json!({"token": session.refresh_token})).await;
        assert_eq!(status, StatusCode::OK);
        let access_token = body["accessToken"].as_str().unwrap();
        assert_eq!(signer.authenticate(access_token).unwrap(), "user-1");

        // an access token is not a refresh token
        let (status, body) =
            post_json(app.clone(), "/token", json!({"token": session.access_token})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid refresh token");

        let (status, body) = post_json(app, "/token", json!({})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Refresh token required");
    }

    #[tokio::test]
    async fn referrals_require_a_valid_bearer_token() {
        let (app, signer) = test_app();

        let (status, _) = get_with_bearer(app.clone(), "/referrals", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // refresh tokens are signed with the other secret
        let session = signer.issue_session("user-1").unwrap();
        let (status, _) =
            get_with_bearer(app, "/referrals", Some(&session.refresh_token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn referrals_are_listed_for_the_authenticated_user() {
        let (app, signer) = test_app();
        let session = signer.issue_session("user-1").unwrap();

        let (status, body) =
            get_with_bearer(app, "/referrals", Some(&session.access_token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
        let referrals = body["referrals"].as_array().unwrap();
        assert_eq!(referrals.len(), 2);
        assert_eq!(referrals[0]["referrer_id"], "user-1");
    }

    #[tokio::test]
    async fn referral_stats_are_returned() {
        let (app, signer) = test_app();
        let session = signer.issue_session("user-1").unwrap();

        let (status, body) =
            get_with_bearer(app, "/referral-stats", Some(&session.access_token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["successful"], 2);
    }

    #[tokio::test]
    async fn forgot_password_answers_by_account_presence() {
        let (app, _) = test_app();

        let (status, body) = post_json(
            app.clone(),
            "/forgot-password",
            json!({"email": "alice@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "Password reset instructions sent to your email"
        );

        let (status, body) = post_json(
            app.clone(),
            "/forgot-password",
            json!({"email": "nobody@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email not found");

        let (status, _) =
            post_json(app, "/forgot-password", json!({"email": "not-an-email"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
