use serde_json::json;

use strata_core::executor::{BoxFuture, Executor, Filter, Row};
use strata_core::script::ChangeScript;

use super::row;

/// Three published posts and one draft, spread across the seeded users and
/// categories.
pub struct SamplePosts;

const SLUGS: [&str; 4] = [
    "nodejs-backend-guide",
    "express-middleware-deep-dive",
    "restful-api-best-practices",
    "database-optimization-strategies",
];

impl ChangeScript for SamplePosts {
    fn name(&self) -> &'static str {
        "004_sample_posts"
    }

    fn apply<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let posts: Vec<Row> = vec![
                row(&[
                    ("title", json!("Getting Started with Node.js Backend Development")),
                    (
                        "content",
                        json!(
                            "# Getting Started with Node.js Backend Development\n\n\
                             Node.js is a JavaScript runtime built on the V8 engine that \
                             lets you write server-side programs in JavaScript.\n\n\
                             ## Why Node.js?\n\n\
                             1. One language across the stack\n\
                             2. An event-driven, non-blocking I/O model\n\
                             3. A huge module ecosystem via npm\n\n\
                             ## Core concepts\n\n\
                             The event loop lets a single thread serve many concurrent \
                             requests, and the CommonJS module system splits programs into \
                             small reusable pieces.\n\n\
                             ```javascript\n\
                             const express = require('express');\n\
                             const app = express();\n\n\
                             app.get('/', (req, res) => {\n\
                               res.send('Hello, Node.js!');\n\
                             });\n\n\
                             app.listen(3000);\n\
                             ```"
                        ),
                    ),
                    (
                        "excerpt",
                        json!(
                            "An introduction to the core concepts of Node.js and how to \
                             write your first server."
                        ),
                    ),
                    ("slug", json!("nodejs-backend-guide")),
                    ("status", json!("published")),
                    ("tags", json!(["Node.js", "backend", "tutorial"])),
                    ("view_count", json!(245)),
                    ("author_id", json!(1)),
                    ("category_id", json!(4)),
                ]),
                row(&[
                    ("title", json!("Express.js Middleware in Depth")),
                    (
                        "content",
                        json!(
                            "# Express.js Middleware in Depth\n\n\
                             Middleware is the central abstraction in Express: a function \
                             with access to the request, the response, and the next \
                             middleware in the chain.\n\n\
                             ## Kinds of middleware\n\n\
                             Application-level middleware binds to the app instance, \
                             router-level middleware to a router, and error-handling \
                             middleware takes four arguments.\n\n\
                             ```javascript\n\
                             app.use((err, req, res, next) => {\n\
                               console.error(err.stack);\n\
                               res.status(500).send('Something broke!');\n\
                             });\n\
                             ```\n\n\
                             Used well, middleware keeps request handling composable and \
                             easy to reason about."
                        ),
                    ),
                    (
                        "excerpt",
                        json!(
                            "How Express middleware works, from application-level handlers \
                             to error-handling middleware."
                        ),
                    ),
                    ("slug", json!("express-middleware-deep-dive")),
                    ("status", json!("published")),
                    ("tags", json!(["Express.js", "middleware", "Node.js"])),
                    ("view_count", json!(189)),
                    ("author_id", json!(2)),
                    ("category_id", json!(4)),
                ]),
                row(&[
                    ("title", json!("RESTful API Design Best Practices")),
                    (
                        "content",
                        json!(
                            "# RESTful API Design Best Practices\n\n\
                             REST is an architectural style that constrains how web \
                             services expose resources.\n\n\
                             ## Principles\n\n\
                             Keep requests stateless, present a uniform interface, and use \
                             HTTP methods for what they mean: GET to read, POST to create, \
                             PUT and PATCH to update, DELETE to remove.\n\n\
                             ```\n\
                             GET    /api/users          # list users\n\
                             GET    /api/users/123      # fetch one user\n\
                             POST   /api/users          # create a user\n\
                             DELETE /api/users/123      # delete a user\n\
                             ```\n\n\
                             Pair every response with the right status code: 200 for \
                             success, 201 for creation, 400 for bad input, 404 for a \
                             missing resource."
                        ),
                    ),
                    (
                        "excerpt",
                        json!(
                            "Core REST principles: HTTP method semantics, URL design and \
                             status code conventions."
                        ),
                    ),
                    ("slug", json!("restful-api-best-practices")),
                    ("status", json!("published")),
                    ("tags", json!(["REST", "API design", "backend"])),
                    ("view_count", json!(312)),
                    ("author_id", json!(1)),
                    ("category_id", json!(3)),
                ]),
                row(&[
                    ("title", json!("Database Optimization Strategies")),
                    (
                        "content",
                        json!(
                            "# Database Optimization Strategies\n\n\
                             Database performance work usually starts with the queries.\n\n\
                             ## Query optimization\n\n\
                             Index the columns you filter and sort on, select only the \
                             columns you need, and bound large result sets with LIMIT.\n\n\
                             ```sql\n\
                             CREATE INDEX idx_post_status_date ON posts(status, created_at);\n\
                             ```\n\n\
                             ## Beyond queries\n\n\
                             Pick the smallest data types that fit, size the connection \
                             pool for your workload, and cache what you read often."
                        ),
                    ),
                    (
                        "excerpt",
                        json!(
                            "Practical database tuning: indexes, query shape, connection \
                             pools and caching."
                        ),
                    ),
                    ("slug", json!("database-optimization-strategies")),
                    ("status", json!("draft")),
                    ("tags", json!(["databases", "performance", "SQL"])),
                    ("view_count", json!(0)),
                    ("author_id", json!(3)),
                    ("category_id", json!(5)),
                ]),
            ];
            exec.bulk_insert("posts", &posts).await
        })
    }

    fn revert<'a>(&'a self, exec: &'a dyn Executor) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut filter = Filter::new();
            filter.insert("slug".into(), json!(SLUGS));
            exec.bulk_delete("posts", &filter).await?;
            Ok(())
        })
    }
}
