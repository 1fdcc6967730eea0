//! Schema change scripts, registered in prefix order.

mod create_categories;
mod create_comments;
mod create_posts;
mod create_users;

pub use create_categories::CreateCategories;
pub use create_comments::CreateComments;
pub use create_posts::CreatePosts;
pub use create_users::CreateUsers;

use strata_core::script::ScriptRegistry;

/// All schema change scripts.
pub fn registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register(CreateUsers);
    registry.register(CreateCategories);
    registry.register(CreatePosts);
    registry.register(CreateComments);
    registry
}
