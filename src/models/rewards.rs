use serde::Serialize;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Reward {
    pub id: String,
    pub user_id: String,
    pub reward_points: i32,
    pub description: String,
    pub created_at: chrono::NaiveDateTime,
}
