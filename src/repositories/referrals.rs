use crate::models::referrals;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct ReferralRepository {
    conn: PgPool,
}

impl ReferralRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn create_referral(
        &self,
        tx: &mut PgConnection,
        referrer_id: &str,
        referred_user_id: &str,
        status: &str,
    ) -> Result<referrals::Referral, anyhow::Error> {
        let referral_id = Uuid::new_v4().hyphenated().to_string();

        let referral = sqlx::query_as::<_, referrals::Referral>(
            r#"
                INSERT INTO referrals (id, referrer_id, referred_user_id, status)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(&referral_id)
        .bind(referrer_id)
        .bind(referred_user_id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        Ok(referral)
    }

    pub async fn list_by_referrer(
        &self,
        user_id: &str,
    ) -> Result<Vec<referrals::Referral>, anyhow::Error> {
        let referrals = sqlx::query_as::<_, referrals::Referral>(
            "SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(referrals)
    }
}
