//! # Tenant-Scoped Storage Gateway (C1)
//!
//! One logical database per tenant, named `<prefix>_<tenant_id>`; a single
//! `<prefix>_commons` namespace holds cross-tenant delivery-status records
//! (spec §4.1). This module exposes the gateway's contract operations —
//! `get`/`list`/`create`/`update_fields`/`replace`/`delete`/`count`,
//! transaction bracketing, and `atomic_upsert_inc` — generically over bson
//! documents; `pos-terminal`/`pos-cart`/`pos-stock`/`pos-events` layer
//! typed repositories on top.

use bson::{doc, Document};
use mongodb::options::{FindOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Database};
use tracing::{debug, info};

use crate::collections::{self, IndexSpec};
use crate::error::{StorageError, StorageResult};

/// Handle to one tenant's logical database plus the shared `commons`
/// database. Cheap to clone — it just holds `mongodb::Database` handles,
/// which themselves wrap a pooled `Client`.
#[derive(Clone)]
pub struct StorageGateway {
    client: Client,
    db_name_prefix: String,
    tenant_id: String,
    db: Database,
    commons: Database,
}

impl StorageGateway {
    /// Connects to `uri` and returns a gateway scoped to `tenant_id`. Does
    /// not create indexes — call `register_tenant` once per tenant on
    /// first use.
    pub async fn connect(uri: &str, db_name_prefix: &str, tenant_id: &str) -> StorageResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(&format!("{db_name_prefix}_{tenant_id}"));
        let commons = client.database(&format!("{db_name_prefix}_commons"));
        Ok(StorageGateway {
            client,
            db_name_prefix: db_name_prefix.to_string(),
            tenant_id: tenant_id.to_string(),
            db,
            commons,
        })
    }

    /// Returns a gateway for a different tenant sharing this connection's
    /// pooled client — used by the admin CLI, which addresses many
    /// tenants from one process.
    pub fn for_tenant(&self, tenant_id: &str) -> Self {
        StorageGateway {
            client: self.client.clone(),
            db_name_prefix: self.db_name_prefix.clone(),
            tenant_id: tenant_id.to_string(),
            db: self.client.database(&format!("{}_{}", self.db_name_prefix, tenant_id)),
            commons: self.commons.clone(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn commons(&self) -> &Database {
        &self.commons
    }

    /// Creates this tenant's collections and indexes, idempotently. Called
    /// once on first tenant registration (spec §4.1).
    pub async fn register_tenant(&self) -> StorageResult<()> {
        collections::ensure_indexes(&self.db, &collections::registry()).await?;
        info!(tenant_id = %self.tenant_id, "tenant storage namespace registered");
        Ok(())
    }

    /// Creates the cross-tenant `commons` indexes (delivery-status,
    /// subscriber dedupe). Idempotent; safe to call from every process on
    /// startup.
    pub async fn register_commons(&self) -> StorageResult<()> {
        collections::ensure_indexes(&self.commons, &collections::commons_registry()).await?;
        Ok(())
    }

    pub async fn recreate_snapshot_ttl(&self, retention_days: i64) -> StorageResult<()> {
        collections::recreate_snapshot_ttl(&self.db, retention_days).await
    }

    // -------------------------------------------------------------------
    // Contract operations (spec §4.1)
    // -------------------------------------------------------------------

    pub async fn get(&self, collection: &str, filter: Document) -> StorageResult<Option<Document>> {
        Ok(self.db.collection::<Document>(collection).find_one(filter).await?)
    }

    pub async fn list(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
        page: u64,
        sort: Option<Document>,
    ) -> StorageResult<(Vec<Document>, u64)> {
        let coll = self.db.collection::<Document>(collection);
        let total = coll.count_documents(filter.clone()).await?;

        let mut opts = FindOptions::builder().limit(Some(limit)).skip(Some(page * limit.max(0) as u64));
        if let Some(s) = sort {
            opts = opts.sort(Some(s));
        }
        let mut cursor = coll.find(filter).with_options(opts.build()).await?;

        let mut docs = Vec::new();
        use futures_util::stream::TryStreamExt;
        while let Some(doc) = cursor.try_next().await? {
            docs.push(doc);
        }
        Ok((docs, total))
    }

    pub async fn create(&self, collection: &str, doc: Document) -> StorageResult<bool> {
        insert_classifying_duplicates(&self.db, collection, doc).await
    }

    /// Same as `create` but against the cross-tenant `commons` database —
    /// used by the event pipeline's delivery-status and subscriber-dedupe
    /// writes, which are not scoped to one tenant's logical database.
    pub async fn create_commons(&self, collection: &str, doc: Document) -> StorageResult<bool> {
        insert_classifying_duplicates(&self.commons, collection, doc).await
    }

    pub async fn update_fields(&self, collection: &str, filter: Document, patch: Document) -> StorageResult<bool> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(filter, doc! { "$set": patch })
            .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn replace(&self, collection: &str, filter: Document, replacement: Document) -> StorageResult<bool> {
        let result = self.db.collection::<Document>(collection).replace_one(filter, replacement).await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete(&self, collection: &str, filter: Document) -> StorageResult<bool> {
        let result = self.db.collection::<Document>(collection).delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn count(&self, collection: &str, filter: Document) -> StorageResult<u64> {
        Ok(self.db.collection::<Document>(collection).count_documents(filter).await?)
    }

    /// Opens a client session used to pair a domain write with a journal
    /// write atomically (spec §4.1, used by cart finalization §4.4.5).
    pub async fn start_transaction(&self) -> StorageResult<ClientSession> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    pub async fn commit(&self, session: &mut ClientSession) -> StorageResult<()> {
        session.commit_transaction().await.map_err(|e| {
            if matches!(*e.kind, mongodb::error::ErrorKind::Transaction { .. }) {
                StorageError::TransactionAborted(e.to_string())
            } else {
                e.into()
            }
        })
    }

    pub async fn abort(&self, session: &mut ClientSession) -> StorageResult<()> {
        Ok(session.abort_transaction().await?)
    }

    /// `atomic_upsert_inc(filter, {field: delta}, default_doc) -> post_image`
    /// (spec §4.1), used by the stock ledger (C6). `$inc` on an absent
    /// document creates it seeded by `default_doc` merged with the
    /// incremented field.
    pub async fn atomic_upsert_inc(
        &self,
        collection: &str,
        filter: Document,
        increments: Document,
        default_doc: Document,
    ) -> StorageResult<Document> {
        let coll = self.db.collection::<Document>(collection);
        let update = doc! {
            "$inc": increments,
            "$setOnInsert": default_doc,
        };
        let result = coll
            .find_one_and_update(filter, update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;

        result.ok_or_else(|| StorageError::Internal("atomic_upsert_inc returned no document".to_string()))
    }

    /// Conditional-reset counter advance (spec §4.2): if `field` is absent
    /// or `>= end`, set it to `start`; otherwise increment it by 1. Returns
    /// the post-image value. Expressed as a single aggregation-pipeline
    /// update so the read-conditional-write happens atomically on the
    /// server — no process-local lock is sufficient since multiple service
    /// instances share one counter document.
    ///
    /// Callers whose storage substrate cannot execute a pipeline update
    /// atomically should fall back to optimistic-CAS: read the document,
    /// compute the next value, and `replace` conditioned on the read
    /// version, retrying a bounded number of times on a mismatch.
    pub async fn advance_counter(
        &self,
        collection: &str,
        filter: Document,
        field: &str,
        start: i64,
        end: i64,
    ) -> StorageResult<i64> {
        let coll = self.db.collection::<Document>(collection);
        let current = format!("${field}");
        let pipeline = vec![doc! {
            "$set": {
                field: {
                    "$cond": [
                        { "$or": [ { "$eq": [&current, bson::Bson::Null] }, { "$gte": [&current, end] } ] },
                        start,
                        { "$add": [&current, 1] },
                    ]
                }
            }
        }];
        let result = coll
            .find_one_and_update(filter, mongodb::options::UpdateModifications::Pipeline(pipeline))
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| StorageError::Internal("advance_counter returned no document".to_string()))?;

        result
            .get_i64(field)
            .map_err(|_| StorageError::Internal(format!("counter field {field} missing or not an integer")))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) if we.code == 11000)
}

async fn insert_classifying_duplicates(db: &Database, collection: &str, doc: Document) -> StorageResult<bool> {
    match db.collection::<Document>(collection).insert_one(doc).await {
        Ok(_) => Ok(true),
        Err(e) if is_duplicate_key(&e) => Err(StorageError::AlreadyExists {
            collection: collection.to_string(),
            key: "duplicate key".to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Ensures a `(collection, key)` indexes list is declared before any
/// gateway instance writes to it — exposed for callers that want to
/// sanity-check a custom index set in tests.
pub fn known_collections() -> Vec<&'static str> {
    collections::registry().iter().map(|s: &IndexSpec| s.collection).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_collections_cover_core_subsystems() {
        let names = known_collections();
        assert!(names.contains(&"carts"));
        assert!(names.contains(&"transaction_logs"));
        assert!(names.contains(&"stocks"));
        assert!(names.contains(&"terminal_counters"));
    }
}
