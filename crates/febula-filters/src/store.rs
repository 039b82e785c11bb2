//! Validated table store shared by the filter object and filter rule
//! services.
//!
//! Every write runs the same pipeline: key generation, owner stamping,
//! the entity's validation hook, ownership validation, persist. Deletes are
//! tombstone upserts through the same pipeline.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use febula_core::error::{FebulaError, FebulaResult};
use febula_core::models::context::CallerContext;
use febula_core::models::filter_object::UpsertFilterObject;
use febula_core::models::filter_rule::UpsertFilterRule;
use febula_core::repository::{TableEntity, TableRepository};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::info;
use uuid::Uuid;

use crate::ownership;

/// Write payload of a table: every field optional, `Hidden` marking a
/// tombstone.
pub trait UpsertInput: Send + Sync + 'static {
    fn key(&self) -> Option<&str>;
    fn set_key(&mut self, key: String);
    fn addon_owner(&self) -> Option<&str>;
    fn set_addon_owner(&mut self, owner: Option<String>);
    fn mark_tombstone(&mut self);
}

/// Entity-specific validation hook run by [`TableStore::upsert`].
pub trait Validate<T: TableEntity>: Send + Sync {
    type Input: UpsertInput + From<T>;

    /// Builds the entity to persist. The store has already assigned the key
    /// and owner; `stored` is the current row under that key.
    fn validate(
        &self,
        input: Self::Input,
        stored: Option<&T>,
        now: DateTime<Utc>,
    ) -> impl Future<Output = FebulaResult<T>> + Send;
}

pub struct TableStore<T, R, V> {
    repo: R,
    validator: V,
    trusted_owners: BTreeMap<String, String>,
    max_parallel_writes: usize,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R, V> TableStore<T, R, V>
where
    T: TableEntity,
    R: TableRepository<T>,
    V: Validate<T>,
{
    pub fn new(
        repo: R,
        validator: V,
        trusted_owners: BTreeMap<String, String>,
        max_parallel_writes: usize,
    ) -> Self {
        Self {
            repo,
            validator,
            trusted_owners,
            max_parallel_writes: max_parallel_writes.max(1),
            _entity: PhantomData,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub async fn upsert(
        &self,
        ctx: &CallerContext,
        mut input: V::Input,
        as_system: bool,
    ) -> FebulaResult<T> {
        let key = match input.key() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                let key = Uuid::new_v4().to_string();
                input.set_key(key.clone());
                key
            }
        };
        let owner = ownership::stamped_owner(ctx, as_system, input.addon_owner());
        input.set_addon_owner(owner);

        let stored = self.repo.get_by_key(&key).await?;
        let entity = self
            .validator
            .validate(input, stored.as_ref(), Utc::now())
            .await?;

        ownership::validate_ownership(
            ctx,
            as_system,
            stored.as_ref().map(T::addon_owner),
            entity.addon_owner(),
            &self.trusted_owners,
        )?;

        let saved = self.repo.upsert(entity).await?;
        info!(
            table = T::TABLE,
            key = %saved.key(),
            deleted = saved.lifecycle().is_deleted(),
            created = stored.is_none(),
            "Row upserted"
        );
        Ok(saved)
    }

    pub async fn get(&self, query: &T::Query) -> FebulaResult<Vec<T>> {
        self.repo.find(query).await
    }

    pub async fn get_by_keys(&self, keys: &[String]) -> FebulaResult<Vec<T>> {
        self.repo.get_by_keys(keys).await
    }

    /// Soft-deletes every key, at most `max_parallel_writes` at a time.
    ///
    /// The first failure aborts the batch; tombstones already written stay.
    pub async fn delete(
        &self,
        ctx: &CallerContext,
        keys: &[String],
        as_system: bool,
    ) -> FebulaResult<Vec<T>> {
        let tombstones: Vec<T> = stream::iter(keys.iter().cloned())
            .map(|key| self.delete_one(ctx, key, as_system))
            .buffer_unordered(self.max_parallel_writes)
            .try_collect()
            .await?;

        info!(table = T::TABLE, count = tombstones.len(), "Rows soft-deleted");
        Ok(tombstones)
    }

    async fn delete_one(
        &self,
        ctx: &CallerContext,
        key: String,
        as_system: bool,
    ) -> FebulaResult<T> {
        let stored = self
            .repo
            .get_by_key(&key)
            .await?
            .ok_or_else(|| FebulaError::NotFound {
                entity: T::ENTITY.into(),
                key: key.clone(),
            })?;

        let mut input = V::Input::from(stored);
        input.mark_tombstone();
        self.upsert(ctx, input, as_system).await
    }
}

impl UpsertInput for UpsertFilterObject {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn set_key(&mut self, key: String) {
        self.key = Some(key);
    }

    fn addon_owner(&self) -> Option<&str> {
        self.addon_owner.as_deref()
    }

    fn set_addon_owner(&mut self, owner: Option<String>) {
        self.addon_owner = owner;
    }

    fn mark_tombstone(&mut self) {
        self.hidden = Some(true);
    }
}

impl UpsertInput for UpsertFilterRule {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn set_key(&mut self, key: String) {
        self.key = Some(key);
    }

    fn addon_owner(&self) -> Option<&str> {
        self.addon_owner.as_deref()
    }

    fn set_addon_owner(&mut self, owner: Option<String>) {
        self.addon_owner = owner;
    }

    fn mark_tombstone(&mut self) {
        self.hidden = Some(true);
    }
}

/// Creation time of the row being written: the stored one, or `now` for
/// inserts.
pub(crate) fn created_at<T: TableEntity>(stored: Option<&T>, now: DateTime<Utc>) -> DateTime<Utc> {
    stored.map_or(now, T::created_at)
}

/// Serialized payload quoted in validation messages.
pub(crate) fn payload_json<P: serde::Serialize>(payload: &P) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "<unserializable>".into())
}
