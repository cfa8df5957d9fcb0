//! Serve a file-backed store over REST
//!
//! ```sh
//! RECORDKIT_DATABASE_PATH=./data cargo run --example file_server
//! # or with a YAML config file
//! cargo run --example file_server -- demos/file_server/recordkit.yaml
//! ```
//!
//! Then:
//!
//! ```sh
//! curl -X POST localhost:3000/users -H 'content-type: application/json' -d '{"name":"alice","age":30}'
//! curl 'localhost:3000/users?age[$gte]=18&$sort[age]=-1'
//! ```

use anyhow::Result;
use recordkit::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    recordkit::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => StoreConfig::from_yaml_file(&path)?.with_env_overrides(),
        None => StoreConfig::from_env(),
    };

    tracing::info!(path = %config.database_path.display(), "using storage root");

    ServerBuilder::new()
        .with_adapter(FileAdapter::from_config(&config))
        .with_permissive_cors()
        .serve("127.0.0.1:3000")
        .await
}
