//! Walks through both repository facades against the in-memory store.
//!
//! Run with `RUST_LOG=debug cargo run --example quickstart` to see the store traffic.

use docrepo::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    first_name: String,
    last_name: String,
}

impl User {
    fn new(id: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn container_name() -> &'static str {
        "users"
    }

    fn fields() -> &'static [&'static str] {
        &["id", "firstName", "lastName"]
    }
}

const FIND_BY_ID: QueryMethod = QueryMethod::equals("id");
const FIND_BY_FIRST_NAME: QueryMethod = QueryMethod::equals("firstName");
const FIND_BY_LAST_NAME: QueryMethod = QueryMethod::equals("lastName");
const FIND_BY_LAST_NAMES: QueryMethod = QueryMethod::is_in("lastName");

fn by_last_name(user: &User) -> PartitionKey {
    PartitionKey::new(user.last_name.clone())
}

fn main() -> RepositoryResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = DocumentStore::new(InMemoryStore::new(), RetryPolicy::default());
    let users = store.blocking_repository::<User>(by_last_name)?;

    users.delete_all()?;

    let first = users.save(&User::new("1", "testFirstName", "testLastName1"))?;
    let second = users.save(&User::new("2", "testFirstName", "testLastName2"))?;
    info!(?first, ?second, "Saved users");

    let found = users.find_by_id(&first.id, &by_last_name(&first))?;
    info!(?found, "Point read");

    let exact = users.find_by(
        Query::filter(FIND_BY_ID.bind_one(first.id.as_str()))
            .and(FIND_BY_LAST_NAME.bind_one(first.last_name.as_str())),
    )?;
    info!(?exact, "Found by id and last name");

    let by_first_name = users.find_by(FIND_BY_FIRST_NAME.bind_one("testFirstName"))?;
    info!(count = by_first_name.len(), "Found by first name");

    let by_last_names = users.find_by(FIND_BY_LAST_NAMES.bind(["testLastName1", "testLastName2"]))?;
    info!(count = by_last_names.len(), "Found by last names");

    let everyone = users.find_all()?;
    info!(count = everyone.len(), "Found all users");

    // The non-blocking facade streams the same query page by page.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| RepositoryError::Initialization(e.to_string()))?;

    runtime.block_on(async {
        let users = users.as_async();
        let mut stream = users.find_by(FIND_BY_FIRST_NAME.bind_one("testFirstName"))?;

        while let Some(user) = stream.try_next().await? {
            info!(?user, "Streamed user");
        }

        store.shutdown().await
    })
}
