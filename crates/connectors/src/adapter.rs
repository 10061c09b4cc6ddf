use crate::{
    error::ConnectorError,
    sql::{
        base::adapter::{Connector, QueryConnection},
        mysql::adapter::MySqlConnection,
        postgres::adapter::PgConnection,
    },
};
use async_trait::async_trait;
use model::execution::connection::ConnectionDescriptor;
use std::{fmt, str::FromStr, sync::Arc};

/// Database families a descriptor's protocol can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    MySql,
    Postgres,
}

impl FromStr for DataFormat {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let scheme = s.split('+').next().unwrap_or_default();
        match scheme.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DataFormat::MySql),
            "pg" | "postgres" | "postgresql" => Ok(DataFormat::Postgres),
            _ => Err(ConnectorError::UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::MySql => write!(f, "MySQL"),
            DataFormat::Postgres => write!(f, "Postgres"),
        }
    }
}

#[derive(Clone)]
pub enum Adapter {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

impl Adapter {
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Self, ConnectorError> {
        match descriptor.protocol.parse::<DataFormat>()? {
            DataFormat::MySql => {
                let conn = MySqlConnection::connect(descriptor, session_id).await?;
                Ok(Adapter::MySql(conn))
            }
            DataFormat::Postgres => {
                let conn = PgConnection::connect(descriptor, session_id).await?;
                Ok(Adapter::Postgres(conn))
            }
        }
    }

    pub fn into_connection(self) -> Arc<dyn QueryConnection> {
        match self {
            Adapter::MySql(conn) => Arc::new(conn),
            Adapter::Postgres(conn) => Arc::new(conn),
        }
    }
}

/// Opens real driver connections, picking the driver from the protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        session_id: Option<&str>,
    ) -> Result<Arc<dyn QueryConnection>, ConnectorError> {
        let adapter = Adapter::connect(descriptor, session_id).await?;
        Ok(adapter.into_connection())
    }
}
