use strata_core::executor::{BoxFuture, Executor};
use strata_core::schema::{ColumnDef, ForeignKeyAction, IndexDef, SqlType, TableDef};
use strata_core::script::ChangeScript;

pub struct CreatePosts;

impl CreatePosts {
    fn table() -> TableDef {
        TableDef::new("posts")
            .column(
                ColumnDef::new("id", SqlType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDef::new("title", SqlType::Varchar(Some(255))).not_null())
            .column(ColumnDef::new("content", SqlType::Text).not_null())
            .column(ColumnDef::new("excerpt", SqlType::Text))
            .column(
                ColumnDef::new("slug", SqlType::Varchar(Some(255)))
                    .not_null()
                    .unique(),
            )
            .column(
                ColumnDef::new(
                    "status",
                    SqlType::Enum(vec!["draft".into(), "published".into(), "archived".into()]),
                )
                .not_null()
                .default_sql("'draft'"),
            )
            .column(ColumnDef::new("featured_image", SqlType::Varchar(Some(500))))
            .column(
                ColumnDef::new("tags", SqlType::Json)
                    .not_null()
                    .default_sql("'[]'::jsonb"),
            )
            .column(
                ColumnDef::new("view_count", SqlType::Integer)
                    .not_null()
                    .default_sql("0"),
            )
            .column(
                ColumnDef::new("author_id", SqlType::Integer)
                    .not_null()
                    .references("users", "id", ForeignKeyAction::Cascade),
            )
            .column(ColumnDef::new("category_id", SqlType::Integer).references(
                "categories",
                "id",
                ForeignKeyAction::SetNull,
            ))
            .column(ColumnDef::new("published_at", SqlType::Timestamptz))
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

impl ChangeScript for CreatePosts {
    fn name(&self) -> &'static str {
        "003_create_posts"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            exec.create_table(&Self::table()).await?;
            exec.add_index(&IndexDef::new("posts", &["status"])).await?;
            exec.add_index(&IndexDef::new("posts", &["author_id"])).await?;
            exec.add_index(&IndexDef::new("posts", &["category_id"])).await?;
            exec.add_index(&IndexDef::new("posts", &["published_at"])).await?;
            exec.add_index(&IndexDef::new("posts", &["created_at"])).await?;
            exec.add_index(&IndexDef::new("posts", &["view_count"])).await?;
            Ok(())
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move { exec.drop_table("posts").await })
    }
}
