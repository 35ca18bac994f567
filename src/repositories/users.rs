use crate::models::users;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Inserts inside a caller-owned transaction so the registration
    /// workflow can commit the user together with its referral and reward.
    pub async fn insert_user(
        &self,
        tx: &mut PgConnection,
        username: &str,
        email: &str,
        password_hash: &str,
        referral_code: &str,
        referred_by: Option<&str>,
    ) -> Result<users::User, anyhow::Error> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let user = sqlx::query_as::<_, users::User>(
            r#"
                INSERT INTO users (id, username, email, password_hash, referral_code, referred_by)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(referral_code)
        .bind(referred_by)
        .fetch_one(&mut *tx)
        .await?;

        Ok(user)
    }

    /// Single-parameter lookup matching either column, used by login and
    /// forgot-password where the caller supplies one identifier.
    pub async fn find_by_email_or_username(
        &self,
        identifier: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            "SELECT * FROM users WHERE email = $1 OR username = $1",
        )
        .bind(identifier)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    /// Duplicate pre-check for registration, where email and username are
    /// submitted separately.
    pub async fn find_by_identity(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            "SELECT * FROM users WHERE email = $1 OR username = $2",
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn find_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE referral_code = $1")
            .bind(code)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }
}
