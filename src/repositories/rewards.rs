use crate::models::rewards;

use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Clone)]
pub struct RewardRepository;

impl RewardRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_reward(
        &self,
        tx: &mut PgConnection,
        user_id: &str,
        reward_points: i32,
        description: &str,
    ) -> Result<rewards::Reward, anyhow::Error> {
        let reward_id = Uuid::new_v4().hyphenated().to_string();

        let reward = sqlx::query_as::<_, rewards::Reward>(
            r#"
                INSERT INTO rewards (id, user_id, reward_points, description)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(&reward_id)
        .bind(user_id)
        .bind(reward_points)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        Ok(reward)
    }
}
