//! Read-through cache over the process/subprocess/variant catalog
//!
//! The catalog is owned by other systems. Entries expire after the configured
//! TTL and can be dropped explicitly when the catalog changes upstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{GroupRule, SubprocessTemplate, SubstituteGroup, VariantRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Subprocess template plus its fixed labor/overhead cost items
#[derive(Debug, Clone)]
pub struct SubprocessEntry {
    pub template: SubprocessTemplate,
    pub fixed_costs: Vec<Decimal>,
}

/// Which cached entries to drop; all fields empty clears everything
#[derive(Debug, Default, Deserialize)]
pub struct CatalogInvalidation {
    pub process_id: Option<Uuid>,
    pub subprocess_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
}

impl CatalogInvalidation {
    pub fn is_everything(&self) -> bool {
        self.process_id.is_none() && self.subprocess_id.is_none() && self.variant_id.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct InvalidationReport {
    pub cleared: usize,
}

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    loaded_at: Instant,
}

fn fresh<T: Clone>(map: &DashMap<Uuid, Cached<T>>, key: &Uuid, ttl: Duration) -> Option<T> {
    let entry = map.get(key)?;
    if entry.loaded_at.elapsed() < ttl {
        Some(entry.value.clone())
    } else {
        drop(entry);
        map.remove(key);
        None
    }
}

fn store<T>(map: &DashMap<Uuid, Cached<T>>, key: Uuid, value: T) {
    map.insert(
        key,
        Cached {
            value,
            loaded_at: Instant::now(),
        },
    );
}

/// Catalog cache shared across requests
pub struct CatalogCache {
    db: PgPool,
    ttl: Duration,
    processes: DashMap<Uuid, Cached<Arc<Vec<Uuid>>>>,
    subprocesses: DashMap<Uuid, Cached<Arc<SubprocessEntry>>>,
    variants: DashMap<Uuid, Cached<VariantRecord>>,
}

impl CatalogCache {
    pub fn new(db: PgPool, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            processes: DashMap::new(),
            subprocesses: DashMap::new(),
            variants: DashMap::new(),
        }
    }

    /// Subprocess ids of a process in sequence order
    pub async fn process_subprocesses(&self, process_id: Uuid) -> AppResult<Arc<Vec<Uuid>>> {
        if let Some(hit) = fresh(&self.processes, &process_id, self.ttl) {
            return Ok(hit);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM processes WHERE id = $1)")
                .bind(process_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Process".to_string()));
        }

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT subprocess_id
            FROM process_subprocesses
            WHERE process_id = $1
            ORDER BY sequence_order, subprocess_id
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.db)
        .await?;

        let ids = Arc::new(ids);
        store(&self.processes, process_id, ids.clone());
        Ok(ids)
    }

    pub async fn subprocess(&self, subprocess_id: Uuid) -> AppResult<Arc<SubprocessEntry>> {
        if let Some(hit) = fresh(&self.subprocesses, &subprocess_id, self.ttl) {
            return Ok(hit);
        }

        let header = sqlx::query_as::<_, (String, Option<Decimal>)>(
            "SELECT name, yield_multiplier FROM subprocesses WHERE id = $1",
        )
        .bind(subprocess_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Subprocess".to_string()))?;

        let groups = sqlx::query_as::<_, (Uuid, String, String)>(
            r#"
            SELECT id, name, selection_rule
            FROM substitute_groups
            WHERE subprocess_id = $1
            ORDER BY name, id
            "#,
        )
        .bind(subprocess_id)
        .fetch_all(&self.db)
        .await?;

        let pool = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"
            SELECT variant_id, substitute_group_id
            FROM subprocess_variants
            WHERE subprocess_id = $1
            "#,
        )
        .bind(subprocess_id)
        .fetch_all(&self.db)
        .await?;

        let fixed_costs: Vec<Decimal> = sqlx::query_scalar(
            "SELECT amount FROM subprocess_cost_items WHERE subprocess_id = $1",
        )
        .bind(subprocess_id)
        .fetch_all(&self.db)
        .await?;

        let substitute_groups = groups
            .into_iter()
            .map(|(id, name, rule)| SubstituteGroup {
                id,
                name,
                rule: GroupRule::parse(&rule),
                variant_ids: pool
                    .iter()
                    .filter(|(_, group)| *group == Some(id))
                    .map(|(variant_id, _)| *variant_id)
                    .collect(),
            })
            .collect();

        let entry = Arc::new(SubprocessEntry {
            template: SubprocessTemplate {
                id: subprocess_id,
                name: header.0,
                yield_multiplier: header.1,
                variant_pool: pool.iter().map(|(variant_id, _)| *variant_id).collect(),
                substitute_groups,
            },
            fixed_costs,
        });
        store(&self.subprocesses, subprocess_id, entry.clone());
        Ok(entry)
    }

    pub async fn variant(&self, variant_id: Uuid) -> AppResult<Option<VariantRecord>> {
        Ok(self.variants_by_id(&[variant_id]).await?.remove(&variant_id))
    }

    /// Look up several variants; missing ids are absent from the map
    pub async fn variants_by_id(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, VariantRecord>> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut misses = Vec::new();
        for id in ids {
            match fresh(&self.variants, id, self.ttl) {
                Some(record) => {
                    found.insert(*id, record);
                }
                None => misses.push(*id),
            }
        }

        if !misses.is_empty() {
            let rows = sqlx::query_as::<_, (Uuid, String, String, Option<Decimal>)>(
                "SELECT id, sku, name, unit_cost FROM variants WHERE id = ANY($1)",
            )
            .bind(&misses)
            .fetch_all(&self.db)
            .await?;

            for (id, sku, name, unit_cost) in rows {
                let record = VariantRecord {
                    id,
                    sku,
                    name,
                    unit_cost,
                };
                store(&self.variants, id, record.clone());
                found.insert(id, record);
            }
        }

        Ok(found)
    }

    /// Drop cached entries; returns how many were removed
    pub fn invalidate(&self, request: &CatalogInvalidation) -> usize {
        if request.is_everything() {
            let cleared = self.processes.len() + self.subprocesses.len() + self.variants.len();
            self.processes.clear();
            self.subprocesses.clear();
            self.variants.clear();
            tracing::info!(cleared, "Catalog cache cleared");
            return cleared;
        }

        let mut cleared = 0;
        if let Some(id) = request.process_id {
            cleared += usize::from(self.processes.remove(&id).is_some());
        }
        if let Some(id) = request.subprocess_id {
            cleared += usize::from(self.subprocesses.remove(&id).is_some());
        }
        if let Some(id) = request.variant_id {
            cleared += usize::from(self.variants.remove(&id).is_some());
            // Pool membership may have changed with the variant
            let before = self.subprocesses.len();
            self.subprocesses
                .retain(|_, cached| !cached.value.template.in_pool(id));
            cleared += before - self.subprocesses.len();
        }
        tracing::info!(cleared, ?request, "Catalog cache entries invalidated");
        cleared
    }
}
