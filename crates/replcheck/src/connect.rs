//! Opening backing stores.

use replcheck_store::{Backend, PostgresBackend, SqliteBackend};
use tracing::info;

use crate::config::{Endpoint, EndpointSource};
use crate::error::{Result, ToolError};

/// Open the backend for one endpoint. Each call opens its own connection.
pub async fn open_backend(endpoint: &Endpoint) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match &endpoint.source {
        EndpointSource::Network(config) => Box::new(
            PostgresBackend::connect(config)
                .await
                .map_err(ToolError::Connect)?,
        ),
        EndpointSource::Snapshot(path) => {
            Box::new(SqliteBackend::open(path, &endpoint.schema).map_err(ToolError::Connect)?)
        }
    };
    info!(source = %backend.describe(), schema = %endpoint.schema, "opened backing store");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replcheck_core::Schema;

    #[tokio::test]
    async fn test_missing_snapshot_is_connect_error() {
        let endpoint = Endpoint {
            source: EndpointSource::Snapshot("/nonexistent/snapshot.db".into()),
            schema: Schema::new("LDAPDB2").unwrap(),
        };
        assert!(matches!(
            open_backend(&endpoint).await,
            Err(ToolError::Connect(_))
        ));
    }
}
