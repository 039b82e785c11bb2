//! SurrealDB repository implementations.

mod filter_object;
mod filter_rule;
mod resource;

pub use filter_object::SurrealFilterObjectRepository;
pub use filter_rule::SurrealFilterRuleRepository;
pub use resource::SurrealResourceCatalog;

/// Joins optional `WHERE` conditions into a clause, empty when there are
/// none.
fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}
