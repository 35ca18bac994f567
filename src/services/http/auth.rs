use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tokio::sync::oneshot;

use crate::models::{tokens, users};
use crate::services::auth::AuthRequest;
use crate::utils;

pub async fn register(
    State(state): State<super::AppState>,
    Json(req): Json<users::RegisterPayload>,
) -> impl IntoResponse {
    let errors = utils::validate_registration(&req.username, &req.email, &req.password);
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors })));
    }

    let (auth_tx, auth_rx) = oneshot::channel();
    let send_result = state
        .auth_channel
        .send(AuthRequest::Register {
            username: req.username,
            email: req.email,
            password: req.password,
            referral_code: req.referral_code,
            response: auth_tx,
        })
        .await;
    if send_result.is_err() {
        return super::server_error();
    }

    match auth_rx.await {
        Ok(Ok(user)) => (
            StatusCode::CREATED,
            Json(json!({"message": "User registered successfully", "user": user})),
        ),
        Ok(Err(service_error)) => super::error_response(service_error),
        Err(_) => super::server_error(),
    }
}

pub async fn login(
    State(state): State<super::AppState>,
    Json(req): Json<users::LoginPayload>,
) -> impl IntoResponse {
    let (auth_tx, auth_rx) = oneshot::channel();
    let send_result = state
        .auth_channel
        .send(AuthRequest::Login {
            identifier: req.identifier,
            password: req.password,
            response: auth_tx,
        })
        .await;
    if send_result.is_err() {
        return super::server_error();
    }

    match auth_rx.await {
        Ok(Ok(session)) => (StatusCode::OK, Json(json!(session))),
        Ok(Err(service_error)) => super::error_response(service_error),
        Err(_) => super::server_error(),
    }
}

pub async fn forgot_password(
    State(state): State<super::AppState>,
    Json(req): Json<users::ForgotPasswordPayload>,
) -> impl IntoResponse {
    if !utils::is_valid_email(&req.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"errors": ["Please provide a valid email"]})),
        );
    }

    let (auth_tx, auth_rx) = oneshot::channel();
    let send_result = state
        .auth_channel
        .send(AuthRequest::ForgotPassword {
            email: req.email,
            response: auth_tx,
        })
        .await;
    if send_result.is_err() {
        return super::server_error();
    }

    match auth_rx.await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(json!({"message": "Password reset instructions sent to your email"})),
        ),
        Ok(Err(service_error)) => super::error_response(service_error),
        Err(_) => super::server_error(),
    }
}

/// Token refresh never touches the stores, so it is answered in-line from
/// the signer instead of going through a service channel.
pub async fn refresh_token(
    State(state): State<super::AppState>,
    Json(req): Json<tokens::RefreshPayload>,
) -> impl IntoResponse {
    let Some(token) = req.token.filter(|token| !token.is_empty()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Refresh token required"})),
        );
    };

    match state.token_signer.refresh(&token) {
        Ok(access_token) => (StatusCode::OK, Json(json!({"accessToken": access_token}))),
        Err(service_error) => super::error_response(service_error),
    }
}
