use strata_core::executor::{BoxFuture, Executor};
use strata_core::schema::{ColumnDef, ForeignKeyAction, IndexDef, SqlType, TableDef};
use strata_core::script::ChangeScript;

pub struct CreateCategories;

impl CreateCategories {
    fn table() -> TableDef {
        TableDef::new("categories")
            .column(
                ColumnDef::new("id", SqlType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(
                ColumnDef::new("name", SqlType::Varchar(Some(100)))
                    .not_null()
                    .unique(),
            )
            .column(ColumnDef::new("description", SqlType::Text))
            .column(
                ColumnDef::new("slug", SqlType::Varchar(Some(100)))
                    .not_null()
                    .unique(),
            )
            // Self-referencing tree; deleting a parent orphans its children
            // rather than cascading through the hierarchy.
            .column(
                ColumnDef::new("parent_id", SqlType::Integer).references(
                    "categories",
                    "id",
                    ForeignKeyAction::SetNull,
                ),
            )
            .column(
                ColumnDef::new("is_active", SqlType::Boolean)
                    .not_null()
                    .default_sql("true"),
            )
            .column(
                ColumnDef::new("sort_order", SqlType::Integer)
                    .not_null()
                    .default_sql("0"),
            )
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

impl ChangeScript for CreateCategories {
    fn name(&self) -> &'static str {
        "002_create_categories"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            exec.create_table(&Self::table()).await?;
            exec.add_index(&IndexDef::new("categories", &["parent_id"])).await?;
            exec.add_index(&IndexDef::new("categories", &["is_active"])).await?;
            exec.add_index(&IndexDef::new("categories", &["sort_order"])).await?;
            Ok(())
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move { exec.drop_table("categories").await })
    }
}
