use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::referrals::{Referral, STATUS_SUCCESSFUL};
use crate::repositories::cache::RedisCache;
use crate::repositories::referrals::ReferralRepository;

const REFERRALS_CACHE_TTL_SECS: u64 = 3600;

pub enum ReferralRequest {
    ListReferrals {
        user_id: String,
        response: oneshot::Sender<Result<ReferralList, ServiceError>>,
    },
    Stats {
        user_id: String,
        response: oneshot::Sender<Result<ReferralStats, ServiceError>>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralList {
    pub referrals: Vec<Referral>,
    pub cached: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralStats {
    pub total: usize,
    pub successful: usize,
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    repository: ReferralRepository,
    cache: Option<RedisCache>,
}

impl ReferralRequestHandler {
    pub fn new(sql_conn: PgPool, cache: Option<RedisCache>) -> Self {
        let repository = ReferralRepository::new(sql_conn);

        ReferralRequestHandler { repository, cache }
    }

    /// Read-through: serve the cached list when present, otherwise read the
    /// ledger and write back with a 1-hour expiry. Cache trouble never
    /// fails the request.
    async fn list_referrals(&self, user_id: &str) -> Result<ReferralList, ServiceError> {
        let cache_key = referrals_cache_key(user_id);

        if let Some(cache) = &self.cache {
            if let Some(referrals) = cache.get_json::<Vec<Referral>>(&cache_key).await {
                return Ok(ReferralList {
                    referrals,
                    cached: true,
                });
            }
        }

        let referrals = self
            .repository
            .list_by_referrer(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .set_json(&cache_key, &referrals, REFERRALS_CACHE_TTL_SECS)
                .await
            {
                log::warn!("Failed to cache referrals for {}: {}", user_id, e);
            }
        }

        Ok(ReferralList {
            referrals,
            cached: false,
        })
    }

    /// Stats always read fresh; counts are derived per call, not persisted.
    async fn stats(&self, user_id: &str) -> Result<ReferralStats, ServiceError> {
        let referrals = self
            .repository
            .list_by_referrer(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        Ok(derive_stats(&referrals))
    }
}

fn referrals_cache_key(user_id: &str) -> String {
    format!("referrals:{}", user_id)
}

fn derive_stats(referrals: &[Referral]) -> ReferralStats {
    ReferralStats {
        total: referrals.len(),
        successful: referrals
            .iter()
            .filter(|r| r.status == STATUS_SUCCESSFUL)
            .count(),
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::ListReferrals { user_id, response } => {
                let referrals = self.list_referrals(&user_id).await;
                let _ = response.send(referrals);
            }
            ReferralRequest::Stats { user_id, response } => {
                let stats = self.stats(&user_id).await;
                let _ = response.send(stats);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}
