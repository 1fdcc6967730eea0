use serde_json::{json, Value};

use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::script::ChangeScript;

use super::{hash_password, row};

/// A handful of demo accounts, including one inactive user.
pub struct SampleUsers;

const USERNAMES: [&str; 4] = ["johndoe", "janedoe", "bobsmith", "alicejohnson"];

impl ChangeScript for SampleUsers {
    fn name(&self) -> &'static str {
        "003_sample_users"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut users: Vec<Row> = Vec::new();
            for (username, email, first, last, role, active) in [
                ("johndoe", "john@example.com", "John", "Doe", "user", true),
                ("janedoe", "jane@example.com", "Jane", "Doe", "moderator", true),
                ("bobsmith", "bob@example.com", "Bob", "Smith", "user", true),
                (
                    "alicejohnson",
                    "alice@example.com",
                    "Alice",
                    "Johnson",
                    "user",
                    false,
                ),
            ] {
                let password = hash_password("password123", 10)?;
                users.push(row(&[
                    ("username", json!(username)),
                    ("email", json!(email)),
                    ("password", Value::String(password)),
                    ("first_name", json!(first)),
                    ("last_name", json!(last)),
                    ("role", json!(role)),
                    ("is_active", json!(active)),
                ]));
            }
            exec.bulk_insert("users", &users).await
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = Filter::new();
            filter.insert("username".into(), json!(USERNAMES));
            exec.bulk_delete("users", &filter).await?;
            Ok(())
        })
    }
}
