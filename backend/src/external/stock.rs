//! On-hand stock lookups against the inventory collaborator
//!
//! Lookups are retried with backoff; a lookup that still fails yields
//! `Availability::Unknown`, which the alert engine treats as no stock.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::Availability;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::retry::StockBackoff;
use crate::config::{InventoryConfig, StockSource};

#[derive(Debug, Error)]
pub enum StockError {
    #[error("stock query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stock request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stock service returned {0}")]
    Status(StatusCode),

    #[error("stock service is not configured: {0}")]
    Misconfigured(String),
}

impl StockError {
    /// Client errors other than throttling will not improve on retry
    pub fn is_transient(&self) -> bool {
        match self {
            StockError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            StockError::Misconfigured(_) => false,
            StockError::Database(_) | StockError::Http(_) => true,
        }
    }
}

/// Source of on-hand quantities
#[async_trait]
pub trait StockProvider: Send + Sync {
    async fn on_hand(&self, variant_id: Uuid) -> Result<Decimal, StockError>;
}

/// Reads `inventory_levels`; a variant without a row has nothing on hand
pub struct DatabaseStockProvider {
    db: PgPool,
}

impl DatabaseStockProvider {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockProvider for DatabaseStockProvider {
    async fn on_hand(&self, variant_id: Uuid) -> Result<Decimal, StockError> {
        let quantity: Option<Decimal> = sqlx::query_scalar(
            "SELECT on_hand_quantity FROM inventory_levels WHERE variant_id = $1",
        )
        .bind(variant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }
}

/// Inventory service client
pub struct HttpStockProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StockResponse {
    on_hand_quantity: Decimal,
}

impl HttpStockProvider {
    pub fn new(base_url: String, config: &InventoryConfig) -> Result<Self, StockError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StockProvider for HttpStockProvider {
    async fn on_hand(&self, variant_id: Uuid) -> Result<Decimal, StockError> {
        let url = format!("{}/variants/{}/stock", self.base_url, variant_id);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(StockError::Status(response.status()));
        }

        let data: StockResponse = response.json().await?;
        Ok(data.on_hand_quantity)
    }
}


/// Retrying stock lookup shared by the alert engine
#[derive(Clone)]
pub struct StockLookup {
    provider: Arc<dyn StockProvider>,
    backoff: StockBackoff,
}

impl StockLookup {
    pub fn new(provider: Arc<dyn StockProvider>, backoff: StockBackoff) -> Self {
        Self { provider, backoff }
    }

    /// Build the provider named by configuration
    pub fn from_config(config: &InventoryConfig, db: PgPool) -> Result<Self, StockError> {
        let provider: Arc<dyn StockProvider> = match config.stock_source {
            StockSource::Database => Arc::new(DatabaseStockProvider::new(db)),
            StockSource::Http => {
                let endpoint = config.stock_endpoint.clone().ok_or_else(|| {
                    StockError::Misconfigured("inventory.stock_endpoint is required".into())
                })?;
                Arc::new(HttpStockProvider::new(endpoint, config)?)
            }
        };
        Ok(Self::new(provider, StockBackoff::from_config(config)))
    }

    pub async fn availability(&self, variant_id: Uuid) -> Availability {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.provider.on_hand(variant_id).await {
                Ok(quantity) => {
                    if attempt > 1 {
                        tracing::debug!(variant_id = %variant_id, attempt, "Stock lookup recovered");
                    }
                    return Availability::Known(quantity);
                }
                Err(e) => e,
            };

            match self.backoff.delay_after(attempt).filter(|_| error.is_transient()) {
                Some(delay) => {
                    tracing::debug!(
                        variant_id = %variant_id,
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        "Stock lookup failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(
                        variant_id = %variant_id,
                        attempts = attempt,
                        error = %error,
                        "Stock lookup failed, treating availability as unknown"
                    );
                    return Availability::Unknown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Flaky {
        failures_left: AtomicU32,
        quantity: Decimal,
    }

    #[async_trait]
    impl StockProvider for Flaky {
        async fn on_hand(&self, _variant_id: Uuid) -> Result<Decimal, StockError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StockError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(self.quantity)
        }
    }

    #[derive(Default)]
    struct Missing {
        calls: AtomicU32,
    }

    #[async_trait]
    impl StockProvider for Missing {
        async fn on_hand(&self, _variant_id: Uuid) -> Result<Decimal, StockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StockError::Status(StatusCode::NOT_FOUND))
        }
    }

    fn lookup(provider: Arc<dyn StockProvider>, attempts: u32) -> StockLookup {
        StockLookup::new(provider, StockBackoff::new(attempts, Duration::ZERO))
    }

    #[test]
    fn test_transient_errors() {
        assert!(StockError::Status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(StockError::Status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!StockError::Status(StatusCode::NOT_FOUND).is_transient());
        assert!(!StockError::Misconfigured("no endpoint".into()).is_transient());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let provider = Arc::new(Flaky {
            failures_left: AtomicU32::new(2),
            quantity: Decimal::from(40),
        });
        let availability = lookup(provider, 3).availability(Uuid::new_v4()).await;
        assert_eq!(availability, Availability::Known(Decimal::from(40)));
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_unknown() {
        let provider = Arc::new(Flaky {
            failures_left: AtomicU32::new(5),
            quantity: Decimal::from(40),
        });
        let availability = lookup(provider, 3).availability(Uuid::new_v4()).await;
        assert_eq!(availability, Availability::Unknown);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let provider = Arc::new(Missing::default());
        let availability = lookup(provider.clone(), 3)
            .availability(Uuid::new_v4())
            .await;
        assert!(!availability.is_known());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
