use crate::error::CliError;
use connectors::{
    adapter::{DataFormat, DriverConnector},
    sql::base::adapter::{Connector, QueryConnection},
};
use model::execution::connection::ConnectionDescriptor;
use std::sync::Arc;
use tracing::{error, info};

/// Opens a driver connection for `descriptor`, logging the outcome.
pub async fn open(
    descriptor: &ConnectionDescriptor,
    session_id: Option<&str>,
) -> Result<Arc<dyn QueryConnection>, CliError> {
    let format = descriptor.protocol.parse::<DataFormat>()?;
    info!("Connecting to {} at '{}'", format, descriptor);

    DriverConnector
        .connect(descriptor, session_id)
        .await
        .map_err(|e| {
            error!("{} connection to '{}' failed: {}", format, descriptor, e);
            CliError::Connector(e)
        })
}

/// Connects and round-trips a trivial query.
pub async fn ping(
    descriptor: &ConnectionDescriptor,
    session_id: Option<&str>,
) -> Result<(), CliError> {
    let connection = open(descriptor, session_id).await?;

    connection.ping().await.map_err(|e| {
        error!("Ping query on '{}' failed: {}", descriptor, e.message());
        CliError::Db(e)
    })?;

    info!("Ping to '{}' succeeded", descriptor);
    Ok(())
}
