//! Shared process state and the per-tenant bundle it lazily builds.
//!
//! `StorageGateway` is scoped to one tenant's logical database (spec §4.1);
//! `CartEngine` wraps exactly one `StorageGateway`. Since this process
//! serves every tenant from one HTTP listener, `AppState` keeps a
//! lazily-populated cache of [`TenantContext`] keyed by `tenant_id`,
//! built with `StorageGateway::for_tenant` so every tenant shares the one
//! pooled `mongodb::Client` (mirrors `pos-storage`'s own doc comment on
//! `for_tenant`, written for exactly this multi-tenant fan-out).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use pos_cart::{CartEngine, CartEngineConfig, InProcessCartLocks, PaymentRegistry};
use pos_events::{EventBus, Publisher, RedisBus};
use pos_stock::{AlertHub, SnapshotGate};
use pos_storage::StorageGateway;
use pos_terminal::{GrpcChannelPool, HttpMasterDataClient, MasterDataClient};

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::notifier::SlackNotifier;

/// Everything one tenant's requests need, built once and cached.
pub struct TenantContext {
    pub storage: StorageGateway,
    pub cart_engine: CartEngine,
    pub publisher: Publisher,
    pub alert_hub: Arc<AlertHub>,
    pub snapshot_gate: Arc<SnapshotGate>,
}

pub struct AppState {
    pub config: ApiConfig,
    pub jwt: JwtManager,
    pub notifier: SlackNotifier,
    root_storage: StorageGateway,
    master_data_client: Arc<dyn MasterDataClient>,
    bus: Arc<dyn EventBus>,
    /// Unused placeholder for a future non-HTTP master-data transport
    /// (`pos-terminal::cache`'s own doc comment names this exact seam).
    _grpc_pool: GrpcChannelPool,
    tenants: Mutex<HashMap<String, Arc<TenantContext>>>,
}

impl AppState {
    pub async fn new(config: ApiConfig, root_storage: StorageGateway, master_data_base_url: &str) -> Result<Self, ApiError> {
        let jwt = JwtManager::new(config.secret_key.clone(), &config.algorithm, config.token_expire_minutes);
        let notifier = SlackNotifier::new(config.slack_webhook_url.clone());
        let bus: Arc<dyn EventBus> = Arc::new(RedisBus::new(&config.redis_url).map_err(ApiError::from)?);

        Ok(AppState {
            jwt,
            notifier,
            root_storage,
            master_data_client: Arc::new(HttpMasterDataClient::new(master_data_base_url.to_string())),
            bus,
            _grpc_pool: GrpcChannelPool::new(),
            tenants: Mutex::new(HashMap::new()),
            config,
        })
    }

    pub fn bus(&self) -> Arc<dyn EventBus> {
        self.bus.clone()
    }

    pub fn root_storage(&self) -> &StorageGateway {
        &self.root_storage
    }

    /// Returns the cached tenant bundle, building and registering it on
    /// first use. Registration (index creation) happens once per tenant
    /// per process lifetime.
    pub async fn tenant(&self, tenant_id: &str) -> Result<Arc<TenantContext>, ApiError> {
        {
            let tenants = self.tenants.lock().await;
            if let Some(ctx) = tenants.get(tenant_id) {
                return Ok(ctx.clone());
            }
        }

        let storage = self.root_storage.for_tenant(tenant_id);
        storage.register_tenant().await.map_err(ApiError::from)?;

        let publisher_for_engine = Publisher::new(storage.clone(), self.bus.clone());
        let publisher_for_routes = Publisher::new(storage.clone(), self.bus.clone());
        let locks = Arc::new(InProcessCartLocks::new());
        let payments = PaymentRegistry::new();
        let engine_config = CartEngineConfig {
            rounding: self.config.round_method_for_discount,
            cache_enabled: self.config.use_item_cache,
            cache_ttl_seconds: self.config.item_cache_ttl_seconds,
        };
        let cart_engine = CartEngine::new(
            storage.clone(),
            self.master_data_client.clone(),
            publisher_for_engine,
            locks,
            payments,
            engine_config,
        );

        let ctx = Arc::new(TenantContext {
            storage,
            cart_engine,
            publisher: publisher_for_routes,
            alert_hub: Arc::new(AlertHub::new(self.config.alert_cooldown_seconds.max(0) as u64)),
            snapshot_gate: Arc::new(SnapshotGate::new()),
        });

        let mut tenants = self.tenants.lock().await;
        tenants.entry(tenant_id.to_string()).or_insert_with(|| ctx.clone());
        Ok(ctx)
    }
}
