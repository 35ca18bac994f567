use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    // never leaves the service in a response body
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
    pub referral_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginPayload {
    pub identifier: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    pub email: String,
}
