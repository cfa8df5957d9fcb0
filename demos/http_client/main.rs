//! Talk to a running recordkit server through the HTTP adapter
//!
//! Start the `file_server` demo first, then:
//!
//! ```sh
//! RECORDKIT_BASE_URL=http://127.0.0.1:3000 cargo run --example http_client
//! ```

use anyhow::Result;
use recordkit::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    age: u32,
}

#[derive(Debug, Serialize)]
struct NewUser<'a> {
    name: &'a str,
    age: u32,
}

#[derive(Debug, Default, Serialize)]
struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
}

impl Writable for NewUser<'static> {
    type Patch = UserPatch;
}

#[tokio::main]
async fn main() -> Result<()> {
    recordkit::init_tracing();

    let mut config = StoreConfig::from_env();
    if config.http.base_url.is_empty() {
        config.http.base_url = "http://127.0.0.1:3000".to_string();
    }

    let users: HttpAdapter<User, NewUser<'static>> = HttpAdapter::from_config(&config.http)?.typed();

    for (name, age) in [("alice", 30), ("bob", 17), ("carol", 45)] {
        let user = users
            .create(CreateProps::new("users", NewUser { name, age }))
            .await?;
        println!("created {} ({})", user.name, user.id);
    }

    let adults = users
        .list(ListProps::new("users").with_query(Query::new().gte("age", 18).sort_desc("age")))
        .await?;
    for user in &adults {
        println!("adult: {} is {}", user.name, user.age);
    }

    if let Some(oldest) = adults.first() {
        let older = users
            .update(UpdateProps::new(
                "users",
                oldest.id.clone(),
                UserPatch {
                    age: Some(oldest.age + 1),
                },
            ))
            .await?;
        println!("{} is now {}", older.name, older.age);

        let removed = users.remove(RemoveProps::new("users", older.id)).await?;
        println!("removed {}", removed.name);
    }

    match users.find(FindProps::new("users", "nobody")).await {
        Err(err) if err.is_not_found() => println!("nobody is not there, as expected"),
        other => println!("unexpected: {:?}", other.map(|u| u.id)),
    }

    Ok(())
}
