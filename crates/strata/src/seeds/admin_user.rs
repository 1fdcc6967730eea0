use serde_json::{json, Value};

use strata_core::executor::{BoxFuture, Executor, Filter};
use strata_core::script::ChangeScript;

use super::{hash_password, row};

/// The initial administrator account (username `admin`).
pub struct AdminUser;

impl ChangeScript for AdminUser {
    fn name(&self) -> &'static str {
        "001_admin_user"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let password = hash_password("admin123", 12)?;
            let admin = row(&[
                ("username", json!("admin")),
                ("email", json!("admin@example.com")),
                ("password", Value::String(password)),
                ("first_name", json!("System")),
                ("last_name", json!("Administrator")),
                ("role", json!("admin")),
                ("is_active", json!(true)),
            ]);
            exec.bulk_insert("users", &[admin]).await
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = Filter::new();
            filter.insert("username".into(), json!("admin"));
            exec.bulk_delete("users", &filter).await?;
            Ok(())
        })
    }
}
