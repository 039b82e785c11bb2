//! Febula Filters: filter-chain validation, rule resolution and lineage
//! rendering.
//!
//! This crate provides:
//! - Validated stores for filter objects and filter rules
//!   ([`FilterObjectService`], [`FilterRuleService`])
//! - Chain resolution and rule-text rendering ([`ChainSnapshot`])
//! - Basic filter seeding, duplicate repair and lifecycle hooks
//! - Form options and request dispatch ([`OptionsService`], [`Router`])

pub mod api;
pub mod bootstrap;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter_object;
pub mod filter_rule;
pub mod lifecycle;
pub mod options;
pub mod ownership;
pub mod repair;
pub mod store;

pub use api::{Method, Router};
pub use catalog::CatalogAdapter;
pub use chain::{ChainSnapshot, SYNC_RULE_ERROR, SyncRuleRow};
pub use config::FiltersConfig;
pub use engine::FilterEngine;
pub use error::ChainError;
pub use filter_object::FilterObjectService;
pub use filter_rule::{FilterRuleService, RuleListing};
pub use lifecycle::{LifecycleReport, install, upgrade};
pub use options::OptionsService;
pub use repair::DuplicateFiltersRepair;
pub use store::TableStore;
