use serde_json::json;

use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::script::ChangeScript;

use super::row;

/// The default category tree: four top-level categories plus two children
/// under "Backend".
pub struct DefaultCategories;

const SLUGS: [&str; 6] = [
    "tech",
    "frontend",
    "backend",
    "nodejs",
    "database",
    "architecture",
];

impl ChangeScript for DefaultCategories {
    fn name(&self) -> &'static str {
        "002_default_categories"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let categories: Vec<Row> = vec![
                row(&[
                    ("name", json!("Tech")),
                    ("description", json!("Technical articles and tutorials")),
                    ("slug", json!("tech")),
                    ("is_active", json!(true)),
                    ("sort_order", json!(1)),
                ]),
                row(&[
                    ("name", json!("Frontend")),
                    ("description", json!("Frontend frameworks and tooling")),
                    ("slug", json!("frontend")),
                    ("is_active", json!(true)),
                    ("sort_order", json!(2)),
                ]),
                row(&[
                    ("name", json!("Backend")),
                    ("description", json!("Backend architecture and design")),
                    ("slug", json!("backend")),
                    ("is_active", json!(true)),
                    ("sort_order", json!(3)),
                ]),
                row(&[
                    ("name", json!("Node.js")),
                    ("description", json!("Node.js techniques and best practices")),
                    ("slug", json!("nodejs")),
                    ("parent_id", json!(3)),
                    ("is_active", json!(true)),
                    ("sort_order", json!(1)),
                ]),
                row(&[
                    ("name", json!("Databases")),
                    ("description", json!("Database design, tuning and operations")),
                    ("slug", json!("database")),
                    ("parent_id", json!(3)),
                    ("is_active", json!(true)),
                    ("sort_order", json!(2)),
                ]),
                row(&[
                    ("name", json!("Architecture")),
                    ("description", json!("Software architecture and system design")),
                    ("slug", json!("architecture")),
                    ("is_active", json!(true)),
                    ("sort_order", json!(4)),
                ]),
            ];
            exec.bulk_insert("categories", &categories).await
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = Filter::new();
            filter.insert("slug".into(), json!(SLUGS));
            exec.bulk_delete("categories", &filter).await?;
            Ok(())
        })
    }
}
