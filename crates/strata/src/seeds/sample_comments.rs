use serde_json::{json, Value};

use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::script::ChangeScript;

use super::row;

/// Ten comments across the seeded posts, including two threaded replies and
/// a spam/pending pair awaiting moderation.
pub struct SampleComments;

struct Comment {
    content: &'static str,
    status: &'static str,
    author_id: i64,
    post_id: i64,
    parent_id: Option<i64>,
    like_count: i64,
    ip_address: &'static str,
    user_agent: &'static str,
}

const WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

// parent_id values reference the sequence ids of earlier rows in this batch.
const COMMENTS: [Comment; 10] = [
    Comment {
        content: "Great introduction! I just started learning Node.js and this helped a lot.",
        status: "approved",
        author_id: 2,
        post_id: 1,
        parent_id: None,
        like_count: 3,
        ip_address: "192.168.1.100",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "Thanks for sharing! Could you go deeper into how the event loop works?",
        status: "approved",
        author_id: 3,
        post_id: 1,
        parent_id: None,
        like_count: 1,
        ip_address: "192.168.1.101",
        user_agent: MAC_UA,
    },
    Comment {
        content: "Good question! The event loop really is the heart of Node.js. \
                  I'll consider writing a dedicated article about it.",
        status: "approved",
        author_id: 1,
        post_id: 1,
        parent_id: Some(2),
        like_count: 5,
        ip_address: "192.168.1.102",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "The middleware section is very clear, especially the part on error \
                  handling. Really useful in real projects!",
        status: "approved",
        author_id: 3,
        post_id: 2,
        parent_id: None,
        like_count: 2,
        ip_address: "192.168.1.101",
        user_agent: MAC_UA,
    },
    Comment {
        content: "In what order do custom middleware functions run when several are \
                  registered?",
        status: "approved",
        author_id: 1,
        post_id: 2,
        parent_id: None,
        like_count: 0,
        ip_address: "192.168.1.102",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "Express runs middleware in registration order, and each one has to \
                  call next() for the chain to continue.",
        status: "approved",
        author_id: 2,
        post_id: 2,
        parent_id: Some(5),
        like_count: 4,
        ip_address: "192.168.1.100",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "API design really matters! These practices have all proven useful in \
                  my projects.",
        status: "approved",
        author_id: 2,
        post_id: 3,
        parent_id: None,
        like_count: 1,
        ip_address: "192.168.1.100",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "On versioning: do you prefer the version in the URL or in a header?",
        status: "approved",
        author_id: 3,
        post_id: 3,
        parent_id: None,
        like_count: 2,
        ip_address: "192.168.1.101",
        user_agent: MAC_UA,
    },
    Comment {
        content: "This spam comment should get filtered out...",
        status: "spam",
        author_id: 4,
        post_id: 1,
        parent_id: None,
        like_count: 0,
        ip_address: "192.168.1.200",
        user_agent: WINDOWS_UA,
    },
    Comment {
        content: "A comment still waiting for review...",
        status: "pending",
        author_id: 4,
        post_id: 2,
        parent_id: None,
        like_count: 0,
        ip_address: "192.168.1.200",
        user_agent: WINDOWS_UA,
    },
];

impl ChangeScript for SampleComments {
    fn name(&self) -> &'static str {
        "005_sample_comments"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let rows: Vec<Row> = COMMENTS
                .iter()
                .map(|c| {
                    let mut r = row(&[
                        ("content", json!(c.content)),
                        ("status", json!(c.status)),
                        ("author_id", json!(c.author_id)),
                        ("post_id", json!(c.post_id)),
                        ("like_count", json!(c.like_count)),
                        ("is_edited", json!(false)),
                        ("ip_address", json!(c.ip_address)),
                        ("user_agent", json!(c.user_agent)),
                    ]);
                    // Top-level comments leave parent_id to its NULL default.
                    if let Some(parent) = c.parent_id {
                        r.insert("parent_id".into(), Value::from(parent));
                    }
                    r
                })
                .collect();
            exec.bulk_insert("comments", &rows).await
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let ids: Vec<i64> = (1..=COMMENTS.len() as i64).collect();
            let mut filter = Filter::new();
            filter.insert("id".into(), json!(ids));
            exec.bulk_delete("comments", &filter).await?;
            Ok(())
        })
    }
}
