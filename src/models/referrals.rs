use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESSFUL: &str = "successful";

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: String,
    pub referrer_id: String,
    pub referred_user_id: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
}
