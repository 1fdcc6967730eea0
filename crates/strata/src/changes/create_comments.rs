use strata_core::executor::{BoxFuture, Executor};
use strata_core::schema::{ColumnDef, ForeignKeyAction, IndexDef, SqlType, TableDef};
use strata_core::script::ChangeScript;

pub struct CreateComments;

impl CreateComments {
    fn table() -> TableDef {
        TableDef::new("comments")
            .column(
                ColumnDef::new("id", SqlType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDef::new("content", SqlType::Text).not_null())
            .column(
                ColumnDef::new(
                    "status",
                    SqlType::Enum(vec![
                        "pending".into(),
                        "approved".into(),
                        "rejected".into(),
                        "spam".into(),
                    ]),
                )
                .not_null()
                .default_sql("'pending'"),
            )
            .column(
                ColumnDef::new("author_id", SqlType::Integer)
                    .not_null()
                    .references("users", "id", ForeignKeyAction::Cascade),
            )
            .column(
                ColumnDef::new("post_id", SqlType::Integer)
                    .not_null()
                    .references("posts", "id", ForeignKeyAction::Cascade),
            )
            // Threaded replies; removing a comment removes its subtree.
            .column(ColumnDef::new("parent_id", SqlType::Integer).references(
                "comments",
                "id",
                ForeignKeyAction::Cascade,
            ))
            .column(
                ColumnDef::new("like_count", SqlType::Integer)
                    .not_null()
                    .default_sql("0"),
            )
            .column(
                ColumnDef::new("is_edited", SqlType::Boolean)
                    .not_null()
                    .default_sql("false"),
            )
            .column(ColumnDef::new("ip_address", SqlType::Varchar(Some(45))))
            .column(ColumnDef::new("user_agent", SqlType::Varchar(Some(500))))
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

impl ChangeScript for CreateComments {
    fn name(&self) -> &'static str {
        "004_create_comments"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            exec.create_table(&Self::table()).await?;
            exec.add_index(&IndexDef::new("comments", &["post_id"])).await?;
            exec.add_index(&IndexDef::new("comments", &["author_id"])).await?;
            exec.add_index(&IndexDef::new("comments", &["parent_id"])).await?;
            exec.add_index(&IndexDef::new("comments", &["status"])).await?;
            exec.add_index(&IndexDef::new("comments", &["created_at"])).await?;
            Ok(())
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move { exec.drop_table("comments").await })
    }
}
