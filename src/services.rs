use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::repositories::cache::RedisCache;
use crate::settings::Settings;

pub mod auth;
mod http;
pub mod referrals;
pub mod tokens;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Email or username already in use")]
    DuplicateIdentity,
    #[error("Invalid referral code")]
    InvalidReferralCode,
    #[error("You cannot refer yourself")]
    SelfReferral,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Email not found")]
    UnknownEmail,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl ServiceError {
    /// Store and internal faults get logged and answered with a generic
    /// 500; everything else is an expected business outcome.
    pub fn is_fault(&self) -> bool {
        matches!(self, ServiceError::Internal(_) | ServiceError::Database(_))
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let cache = match RedisCache::connect(&settings.redis.url).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            log::warn!("Could not connect to Redis, referral caching disabled: {}", e);
            None
        }
    };

    let token_signer = tokens::TokenSigner::new(
        settings.auth.access_token_secret.clone(),
        settings.auth.refresh_token_secret.clone(),
    );

    let (auth_tx, mut auth_rx) = mpsc::channel(512);
    let (referral_tx, mut referral_rx) = mpsc::channel(512);

    let mut auth_service = auth::AuthService::new();
    let mut referral_service = referrals::ReferralService::new();

    log::info!("Starting auth service.");
    let auth_pool = pool.clone();
    let auth_signer = token_signer.clone();
    let bcrypt_cost = settings.auth.bcrypt_cost;
    let reward_points = settings.auth.referral_reward_points;
    tokio::spawn(async move {
        auth_service
            .run(
                auth::AuthRequestHandler::new(auth_pool, auth_signer, bcrypt_cost, reward_points),
                &mut auth_rx,
            )
            .await;
    });

    log::info!("Starting referral service.");
    let referral_pool = pool.clone();
    tokio::spawn(async move {
        referral_service
            .run(
                referrals::ReferralRequestHandler::new(referral_pool, cache),
                &mut referral_rx,
            )
            .await;
    });

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.server, auth_tx, referral_tx, token_signer).await?;

    Ok(())
}
