use anyhow::Result;
use tracing::info;

use super::initdb::init_database;
use super::serve::serve;

/// Convenience for deployments: apply pending migrations, then serve.
pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    info!("Running migrations before starting the server");
    init_database(database_url).await?;
    serve(database_url, bind_address).await
}
