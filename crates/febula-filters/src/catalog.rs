//! Read-only view over the resource catalog.
//!
//! Every resource handed out carries the synthetic `Key` field. The list is
//! fetched at most once per adapter, and an adapter lives for one request.

use febula_core::error::FebulaResult;
use febula_core::models::filter_object::FilterObject;
use febula_core::models::resource::Resource;
use febula_core::repository::ResourceCatalog;
use tokio::sync::OnceCell;
use tracing::debug;

pub struct CatalogAdapter<'a, C: ResourceCatalog> {
    catalog: &'a C,
    resources: OnceCell<Vec<Resource>>,
    min_chain_hop_fields: usize,
}

impl<'a, C: ResourceCatalog> CatalogAdapter<'a, C> {
    pub fn new(catalog: &'a C, min_chain_hop_fields: usize) -> Self {
        Self {
            catalog,
            resources: OnceCell::new(),
            min_chain_hop_fields,
        }
    }

    /// All resources, sorted by name.
    pub async fn list_resources(&self) -> FebulaResult<&[Resource]> {
        let resources = self
            .resources
            .get_or_try_init(|| async {
                let mut resources: Vec<Resource> = self
                    .catalog
                    .list_resources()
                    .await?
                    .into_iter()
                    .map(Resource::with_key_field)
                    .collect();
                resources.sort_by(|a, b| a.name.cmp(&b.name));
                debug!(count = resources.len(), "Resource catalog loaded");
                FebulaResult::Ok(resources)
            })
            .await?;
        Ok(resources.as_slice())
    }

    /// Served from the cached list, so one validation costs a single
    /// catalog round-trip.
    pub async fn get_resource(&self, name: &str) -> FebulaResult<Option<Resource>> {
        Ok(find(self.list_resources().await?, name).cloned())
    }

    /// Resources declaring enough reference fields to serve as a chain hop.
    pub async fn chain_hop_resources(&self) -> FebulaResult<Vec<Resource>> {
        let min = self.min_chain_hop_fields;
        Ok(self
            .list_resources()
            .await?
            .iter()
            .filter(|r| r.declared_reference_fields().count() >= min)
            .cloned()
            .collect())
    }

    /// True if some resource declares a field pointing at `name`.
    pub async fn is_referenced(&self, name: &str) -> FebulaResult<bool> {
        let resources = self.list_resources().await?;
        Ok(find(resources, name).is_some_and(|target| is_referenced(resources, target)))
    }

    /// Resources that at least one resource points at, sorted by name.
    pub async fn referenced_resources(&self) -> FebulaResult<Vec<Resource>> {
        let resources = self.list_resources().await?;
        Ok(resources
            .iter()
            .filter(|target| is_referenced(resources, target))
            .cloned()
            .collect())
    }
}

pub(crate) fn find<'r>(resources: &'r [Resource], name: &str) -> Option<&'r Resource> {
    resources.iter().find(|r| r.name == name)
}

fn is_referenced(resources: &[Resource], target: &Resource) -> bool {
    resources.iter().any(|r| r.references(target))
}

/// Resource whose keys `object` yields: the target of its `Field` on its
/// own `Resource`.
pub fn chain_target<'r>(resources: &'r [Resource], object: &FilterObject) -> Option<&'r str> {
    find(resources, &object.resource).and_then(|r| r.reference_target(&object.field))
}
