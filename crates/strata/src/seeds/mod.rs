//! Data seed scripts, registered in prefix order.
//!
//! Seeds assume a freshly migrated store: rows reference each other through
//! the sequence ids a clean database assigns (admin is user 1, the first
//! seeded post is post 1, and so on). Timestamp columns are left to their
//! `now()` defaults.

mod admin_user;
mod default_categories;
mod sample_comments;
mod sample_posts;
mod sample_users;

pub use admin_user::AdminUser;
pub use default_categories::DefaultCategories;
pub use sample_comments::SampleComments;
pub use sample_posts::SamplePosts;
pub use sample_users::SampleUsers;

use serde_json::Value;

use strata_core::error::{Result, StrataError};
use strata_core::executor::Row;
use strata_core::script::ScriptRegistry;

/// All data seed scripts.
pub fn registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register(AdminUser);
    registry.register(DefaultCategories);
    registry.register(SampleUsers);
    registry.register(SamplePosts);
    registry.register(SampleComments);
    registry
}

pub(crate) fn row(fields: &[(&str, Value)]) -> Row {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

pub(crate) fn hash_password(plain: &str, cost: u32) -> Result<String> {
    bcrypt::hash(plain, cost)
        .map_err(|e| StrataError::Storage(format!("password hashing failed: {}", e)))
}
