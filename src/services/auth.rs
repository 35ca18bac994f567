use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::tokens::TokenSigner;
use super::{RequestHandler, Service, ServiceError};
use crate::models::tokens::SessionTokens;
use crate::models::{referrals, users};
use crate::repositories::referrals::ReferralRepository;
use crate::repositories::rewards::RewardRepository;
use crate::repositories::users::UserRepository;
use crate::utils;

const REWARD_DESCRIPTION: &str = "Reward for successful referral";

pub enum AuthRequest {
    Register {
        username: String,
        email: String,
        password: String,
        referral_code: Option<String>,
        response: oneshot::Sender<Result<users::User, ServiceError>>,
    },
    Login {
        identifier: String,
        password: String,
        response: oneshot::Sender<Result<SessionTokens, ServiceError>>,
    },
    ForgotPassword {
        email: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct AuthRequestHandler {
    pool: PgPool,
    users: UserRepository,
    referrals: ReferralRepository,
    rewards: RewardRepository,
    tokens: TokenSigner,
    bcrypt_cost: u32,
    reward_points: i32,
}

impl AuthRequestHandler {
    pub fn new(
        sql_conn: PgPool,
        tokens: TokenSigner,
        bcrypt_cost: u32,
        reward_points: i32,
    ) -> Self {
        let users = UserRepository::new(sql_conn.clone());
        let referrals = ReferralRepository::new(sql_conn.clone());
        let rewards = RewardRepository::new();

        AuthRequestHandler {
            pool: sql_conn,
            users,
            referrals,
            rewards,
            tokens,
            bcrypt_cost,
            reward_points,
        }
    }

    /// Registration runs its gates in fixed order: duplicate check,
    /// password hash, referral-code generation, referrer validation, then
    /// one transaction covering the user row and, for referred signups,
    /// the referral record and the referrer's reward credit.
    async fn register(
        &self,
        username: String,
        email: String,
        password: String,
        referral_code: Option<String>,
    ) -> Result<users::User, ServiceError> {
        let existing = self
            .users
            .find_by_identity(&email, &username)
            .await
            .map_err(map_store_error)?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateIdentity);
        }

        let cost = self.bcrypt_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let user_referral_code = utils::generate_referral_code(&username);

        let referred_by = match &referral_code {
            Some(code) => {
                let referrer = self
                    .users
                    .find_by_referral_code(code)
                    .await
                    .map_err(map_store_error)?;
                let Some(referrer) = referrer else {
                    return Err(ServiceError::InvalidReferralCode);
                };
                // self-referral prevention: the referrer's email is compared
                // against the submitted email, not against user ids
                if referrer.email == email {
                    return Err(ServiceError::SelfReferral);
                }
                Some(referrer.id)
            }
            None => None,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let user = self
            .users
            .insert_user(
                &mut tx,
                &username,
                &email,
                &password_hash,
                &user_referral_code,
                referred_by.as_deref(),
            )
            .await
            .map_err(map_store_error)?;

        if let Some(referrer_id) = referred_by {
            self.referrals
                .create_referral(
                    &mut tx,
                    &referrer_id,
                    &user.id,
                    referrals::STATUS_SUCCESSFUL,
                )
                .await
                .map_err(map_store_error)?;

            self.rewards
                .create_reward(&mut tx, &referrer_id, self.reward_points, REWARD_DESCRIPTION)
                .await
                .map_err(map_store_error)?;
        }

        tx.commit()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        Ok(user)
    }

    async fn login(
        &self,
        identifier: String,
        password: String,
    ) -> Result<SessionTokens, ServiceError> {
        let user = self
            .users
            .find_by_email_or_username(&identifier)
            .await
            .map_err(map_store_error)?;
        let Some(user) = user else {
            return Err(ServiceError::InvalidCredentials);
        };

        let password_hash = user.password_hash.clone();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &password_hash))
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if !matches {
            return Err(ServiceError::InvalidCredentials);
        }

        self.tokens.issue_session(&user.id)
    }

    async fn forgot_password(&self, email: String) -> Result<(), ServiceError> {
        let user = self
            .users
            .find_by_email_or_username(&email)
            .await
            .map_err(map_store_error)?;
        if user.is_none() {
            return Err(ServiceError::UnknownEmail);
        }

        // mail delivery is an external collaborator; nothing is sent here
        log::info!("Password reset requested for {}", email);
        Ok(())
    }
}

fn map_store_error(e: anyhow::Error) -> ServiceError {
    if let Some(db_error) = e
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
    {
        // the unique constraints are the real duplicate guard; the
        // pre-check only catches the common case early
        if db_error.is_unique_violation() {
            return ServiceError::DuplicateIdentity;
        }
    }

    ServiceError::Database(e.to_string())
}

#[async_trait]
impl RequestHandler<AuthRequest> for AuthRequestHandler {
    async fn handle_request(&self, request: AuthRequest) {
        match request {
            AuthRequest::Register {
                username,
                email,
                password,
                referral_code,
                response,
            } => {
                let user = self.register(username, email, password, referral_code).await;
                let _ = response.send(user);
            }
            AuthRequest::Login {
                identifier,
                password,
                response,
            } => {
                let tokens = self.login(identifier, password).await;
                let _ = response.send(tokens);
            }
            AuthRequest::ForgotPassword { email, response } => {
                let result = self.forgot_password(email).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        AuthService {}
    }
}

#[async_trait]
impl Service<AuthRequest, AuthRequestHandler> for AuthService {}
