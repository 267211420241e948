//! # Master-Data Read-Through Cache (C3)
//!
//! Items, taxes, payments, and categories are owned by the master-data
//! service; the cart engine only ever reads them through this cache. Per
//! spec §4.3 the cache is bounded, keyed by code, TTL-based, and scoped to
//! one cart instance — sharing it across requests would let one cart see
//! prices that changed after another cart started, which would make a
//! finalized cart's totals unreproducible.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{TerminalError, TerminalResult};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemRecord {
    pub item_code: String,
    pub name: String,
    pub unit_price: i64,
    pub tax_code: Option<String>,
    pub is_discount_restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxRecord {
    pub tax_code: String,
    pub rate_bps: u32,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentMethodRecord {
    pub payment_code: String,
    pub name: String,
    pub allows_change: bool,
    pub allows_over_deposit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryRecord {
    pub category_code: String,
    pub name: String,
}

/// HTTP/RPC access to the master-data collaborator. `pos-cart` depends on
/// this trait, not on a concrete transport, so tests can supply a fixed
/// in-memory collaborator.
#[async_trait]
pub trait MasterDataClient: Send + Sync {
    async fn get_item(&self, tenant_id: &str, item_code: &str) -> TerminalResult<ItemRecord>;
    async fn get_tax(&self, tenant_id: &str, tax_code: &str) -> TerminalResult<TaxRecord>;
    async fn get_payment_method(&self, tenant_id: &str, payment_code: &str) -> TerminalResult<PaymentMethodRecord>;
    async fn get_category(&self, tenant_id: &str, category_code: &str) -> TerminalResult<CategoryRecord>;
}

/// `reqwest`-backed implementation. Process-global and shared across
/// requests (spec §5 "shared resource policy") — unlike the per-cart cache
/// built on top of it, the HTTP client pool itself is not request-scoped.
pub struct HttpMasterDataClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMasterDataClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpMasterDataClient { http: reqwest::Client::new(), base_url: base_url.into() }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> TerminalResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.map_err(|e| TerminalError::MasterDataLookup {
            kind: "http".to_string(),
            code: url.clone(),
            reason: e.to_string(),
        })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TerminalError::MasterDataNotFound { kind: "http".to_string(), code: url });
        }
        response
            .error_for_status()
            .map_err(|e| TerminalError::MasterDataLookup { kind: "http".to_string(), code: url.clone(), reason: e.to_string() })?
            .json::<T>()
            .await
            .map_err(|e| TerminalError::MasterDataLookup { kind: "http".to_string(), code: url, reason: e.to_string() })
    }
}

#[async_trait]
impl MasterDataClient for HttpMasterDataClient {
    async fn get_item(&self, tenant_id: &str, item_code: &str) -> TerminalResult<ItemRecord> {
        self.get_json(&format!("/tenants/{tenant_id}/items/{item_code}")).await
    }

    async fn get_tax(&self, tenant_id: &str, tax_code: &str) -> TerminalResult<TaxRecord> {
        self.get_json(&format!("/tenants/{tenant_id}/taxes/{tax_code}")).await
    }

    async fn get_payment_method(&self, tenant_id: &str, payment_code: &str) -> TerminalResult<PaymentMethodRecord> {
        self.get_json(&format!("/tenants/{tenant_id}/payments/{payment_code}")).await
    }

    async fn get_category(&self, tenant_id: &str, category_code: &str) -> TerminalResult<CategoryRecord> {
        self.get_json(&format!("/tenants/{tenant_id}/categories/{category_code}")).await
    }
}

/// Channel pool keyed by `(tenant, store)`, process-global and amortized
/// across requests per spec §4.3's closing note. The protocol this crate
/// speaks to master-data over HTTP today; this is the seam a gRPC
/// transport would plug into without changing `MasterDataClient` callers.
#[derive(Default)]
pub struct GrpcChannelPool {
    // Intentionally empty: no gRPC transport is wired up yet. Kept as a
    // named type so `pos-cart` can depend on the pooling contract
    // (`channel_for`) without caring which transport backs it.
}

impl GrpcChannelPool {
    pub fn new() -> Self {
        GrpcChannelPool::default()
    }

    pub fn channel_for(&self, _tenant_id: &str, _store_code: &str) {}
}

struct CacheEntry<T> {
    value: T,
    cached_at: Instant,
}

/// Per-cart-instance bounded TTL cache over one master-data entity kind.
/// Never constructed standalone in `pos-cart` — see `MasterDataCaches`,
/// which bundles one of these per entity kind.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_seconds: u64) -> Self {
        TtlCache { ttl: Duration::from_secs(ttl_seconds), entries: HashMap::new() }
    }

    /// Returns a cached, non-expired value for `code`, purging it first if
    /// it has expired (spec §4.3: "expired entries are purged lazily
    /// during lookup").
    pub fn get(&mut self, code: &str) -> Option<T> {
        if let Some(entry) = self.entries.get(code) {
            if entry.cached_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            self.entries.remove(code);
        }
        None
    }

    pub fn put(&mut self, code: &str, value: T) {
        self.entries.insert(code.to_string(), CacheEntry { value, cached_at: Instant::now() });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The four read-through caches a single cart instance holds, per spec
/// §4.3. Disabled entirely when `USE_ITEM_CACHE=false`, in which case
/// every lookup falls through to the collaborator.
pub struct MasterDataCaches {
    enabled: bool,
    items: TtlCache<ItemRecord>,
    taxes: TtlCache<TaxRecord>,
    payments: TtlCache<PaymentMethodRecord>,
    categories: TtlCache<CategoryRecord>,
}

impl MasterDataCaches {
    pub fn new(enabled: bool, ttl_seconds: u64) -> Self {
        MasterDataCaches {
            enabled,
            items: TtlCache::new(ttl_seconds),
            taxes: TtlCache::new(ttl_seconds),
            payments: TtlCache::new(ttl_seconds),
            categories: TtlCache::new(ttl_seconds),
        }
    }

    pub async fn item(&mut self, client: &dyn MasterDataClient, tenant_id: &str, code: &str) -> TerminalResult<ItemRecord> {
        if self.enabled {
            if let Some(hit) = self.items.get(code) {
                return Ok(hit);
            }
        }
        let value = client.get_item(tenant_id, code).await?;
        if self.enabled {
            self.items.put(code, value.clone());
        }
        Ok(value)
    }

    pub async fn tax(&mut self, client: &dyn MasterDataClient, tenant_id: &str, code: &str) -> TerminalResult<TaxRecord> {
        if self.enabled {
            if let Some(hit) = self.taxes.get(code) {
                return Ok(hit);
            }
        }
        let value = client.get_tax(tenant_id, code).await?;
        if self.enabled {
            self.taxes.put(code, value.clone());
        }
        Ok(value)
    }

    pub async fn payment_method(
        &mut self,
        client: &dyn MasterDataClient,
        tenant_id: &str,
        code: &str,
    ) -> TerminalResult<PaymentMethodRecord> {
        if self.enabled {
            if let Some(hit) = self.payments.get(code) {
                return Ok(hit);
            }
        }
        let value = client.get_payment_method(tenant_id, code).await?;
        if self.enabled {
            self.payments.put(code, value.clone());
        }
        Ok(value)
    }

    pub async fn category(&mut self, client: &dyn MasterDataClient, tenant_id: &str, code: &str) -> TerminalResult<CategoryRecord> {
        if self.enabled {
            if let Some(hit) = self.categories.get(code) {
                return Ok(hit);
            }
        }
        let value = client.get_category(tenant_id, code).await?;
        if self.enabled {
            self.categories.put(code, value.clone());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MasterDataClient for CountingClient {
        async fn get_item(&self, _tenant_id: &str, item_code: &str) -> TerminalResult<ItemRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ItemRecord {
                item_code: item_code.to_string(),
                name: "Widget".to_string(),
                unit_price: 1000,
                tax_code: Some("STD".to_string()),
                is_discount_restricted: false,
            })
        }
        async fn get_tax(&self, _tenant_id: &str, tax_code: &str) -> TerminalResult<TaxRecord> {
            Ok(TaxRecord { tax_code: tax_code.to_string(), rate_bps: 1000, kind: "External".to_string() })
        }
        async fn get_payment_method(&self, _tenant_id: &str, payment_code: &str) -> TerminalResult<PaymentMethodRecord> {
            Ok(PaymentMethodRecord {
                payment_code: payment_code.to_string(),
                name: "Cash".to_string(),
                allows_change: true,
                allows_over_deposit: true,
            })
        }
        async fn get_category(&self, _tenant_id: &str, category_code: &str) -> TerminalResult<CategoryRecord> {
            Ok(CategoryRecord { category_code: category_code.to_string(), name: "General".to_string() })
        }
    }

    #[tokio::test]
    async fn cache_hit_avoids_second_collaborator_call() {
        let client = CountingClient { calls: AtomicUsize::new(0) };
        let mut caches = MasterDataCaches::new(true, 60);

        caches.item(&client, "tenant-1", "SKU-1").await.unwrap();
        caches.item(&client, "tenant-1", "SKU-1").await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_calls_through_every_time() {
        let client = CountingClient { calls: AtomicUsize::new(0) };
        let mut caches = MasterDataCaches::new(false, 60);

        caches.item(&client, "tenant-1", "SKU-1").await.unwrap();
        caches.item(&client, "tenant-1", "SKU-1").await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_purged_and_refetched() {
        let client = CountingClient { calls: AtomicUsize::new(0) };
        let mut cache = TtlCache::<ItemRecord>::new(0);
        cache.put("SKU-1", client.get_item("tenant-1", "SKU-1").await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.get("SKU-1").is_none());
        assert!(cache.is_empty());
    }
}
