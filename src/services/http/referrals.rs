use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use tokio::sync::oneshot;

use crate::services::referrals::ReferralRequest;

pub async fn get_referrals(
    State(state): State<super::AppState>,
    Extension(user): Extension<super::AuthenticatedUser>,
) -> impl IntoResponse {
    let (referral_tx, referral_rx) = oneshot::channel();
    let send_result = state
        .referral_channel
        .send(ReferralRequest::ListReferrals {
            user_id: user.id,
            response: referral_tx,
        })
        .await;
    if send_result.is_err() {
        return super::server_error();
    }

    match referral_rx.await {
        Ok(Ok(list)) => (
            StatusCode::OK,
            Json(json!({"referrals": list.referrals, "cached": list.cached})),
        ),
        Ok(Err(service_error)) => super::error_response(service_error),
        Err(_) => super::server_error(),
    }
}

pub async fn get_referral_stats(
    State(state): State<super::AppState>,
    Extension(user): Extension<super::AuthenticatedUser>,
) -> impl IntoResponse {
    let (referral_tx, referral_rx) = oneshot::channel();
    let send_result = state
        .referral_channel
        .send(ReferralRequest::Stats {
            user_id: user.id,
            response: referral_tx,
        })
        .await;
    if send_result.is_err() {
        return super::server_error();
    }

    match referral_rx.await {
        Ok(Ok(stats)) => (StatusCode::OK, Json(json!(stats))),
        Ok(Err(service_error)) => super::error_response(service_error),
        Err(_) => super::server_error(),
    }
}
