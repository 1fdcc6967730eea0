use strata_core::executor::{BoxFuture, Executor};
use strata_core::schema::{ColumnDef, IndexDef, SqlType, TableDef};
use strata_core::script::ChangeScript;

pub struct CreateUsers;

impl CreateUsers {
    fn table() -> TableDef {
        TableDef::new("users")
            .column(
                ColumnDef::new("id", SqlType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(
                ColumnDef::new("username", SqlType::Varchar(Some(50)))
                    .not_null()
                    .unique(),
            )
            .column(
                ColumnDef::new("email", SqlType::Varchar(Some(255)))
                    .not_null()
                    .unique(),
            )
            .column(ColumnDef::new("password", SqlType::Varchar(Some(255))).not_null())
            .column(ColumnDef::new("first_name", SqlType::Varchar(Some(50))))
            .column(ColumnDef::new("last_name", SqlType::Varchar(Some(50))))
            .column(
                ColumnDef::new(
                    "role",
                    SqlType::Enum(vec!["user".into(), "moderator".into(), "admin".into()]),
                )
                .not_null()
                .default_sql("'user'"),
            )
            .column(
                ColumnDef::new("is_active", SqlType::Boolean)
                    .not_null()
                    .default_sql("true"),
            )
            .column(ColumnDef::new("last_login_at", SqlType::Timestamptz))
            .column(
                ColumnDef::new("created_at", SqlType::Timestamptz)
                    .not_null()
                    .default_sql("now()"),
            )
            .column(
                ColumnDef::new("updated_at", SqlType::Timestamptz)
                    .not_null()
                    .default_sql("now()"),
            )
    }
}

impl ChangeScript for CreateUsers {
    fn name(&self) -> &'static str {
        "001_create_users"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            exec.create_table(&Self::table()).await?;
            exec.add_index(&IndexDef::new("users", &["role"])).await?;
            exec.add_index(&IndexDef::new("users", &["is_active"])).await?;
            exec.add_index(&IndexDef::new("users", &["created_at"])).await?;
            Ok(())
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move { exec.drop_table("users").await })
    }
}
