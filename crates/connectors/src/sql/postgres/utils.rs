use crate::error::ConnectorError;
use model::execution::connection::ConnectionDescriptor;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{Client, Config, NoTls, config::SslMode};
use tracing::{error, warn};

const DEFAULT_PORT: u16 = 5432;

/// Builds a driver config from connection data.
///
/// `postgres+tls` forces TLS, `postgres+notls` disables it, anything else
/// prefers TLS and falls back to plain TCP.
pub(crate) fn config_from_descriptor(
    descriptor: &ConnectionDescriptor,
    session_id: Option<&str>,
) -> Result<Config, ConnectorError> {
    if descriptor.host.is_empty() {
        return Err(ConnectorError::InvalidDescriptor(
            "host is required".to_string(),
        ));
    }

    let mut config = Config::new();
    config
        .host(&descriptor.host)
        .port(descriptor.port.unwrap_or(DEFAULT_PORT));

    if !descriptor.database.is_empty() {
        config.dbname(&descriptor.database);
    }
    if !descriptor.user.is_empty() {
        config.user(&descriptor.user);
    }
    if !descriptor.password.is_empty() {
        config.password(&descriptor.password);
    }
    if let Some(session) = session_id.filter(|s| !s.is_empty()) {
        config.application_name(session);
    }

    let ssl_mode = match descriptor.protocol.to_ascii_lowercase().as_str() {
        p if p.ends_with("+tls") => SslMode::Require,
        p if p.ends_with("+notls") => SslMode::Disable,
        _ => SslMode::Prefer,
    };
    config.ssl_mode(ssl_mode);

    Ok(config)
}

pub(crate) async fn connect_client(config: Config) -> Result<Client, ConnectorError> {
    match config.get_ssl_mode() {
        SslMode::Disable => connect_without_tls(config).await,
        SslMode::Require => connect_with_tls(config).await,
        SslMode::Prefer => match connect_with_tls(config.clone()).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                connect_without_tls(config).await
            }
        },
        _ => connect_with_tls(config).await,
    }
}

pub(crate) async fn connect_with_tls(config: Config) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

pub(crate) async fn connect_without_tls(config: Config) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(protocol: &str) -> ConnectionDescriptor {
        ConnectionDescriptor {
            protocol: protocol.into(),
            host: "db.local".into(),
            port: None,
            database: "sales".into(),
            user: "admin".into(),
            password: "pw".into(),
        }
    }

    #[test]
    fn test_config_from_descriptor() {
        let config = config_from_descriptor(&descriptor("postgres"), Some("abc")).unwrap();
        assert_eq!(config.get_ports(), &[DEFAULT_PORT]);
        assert_eq!(config.get_dbname(), Some("sales"));
        assert_eq!(config.get_user(), Some("admin"));
        assert_eq!(config.get_application_name(), Some("abc"));
        assert_eq!(config.get_ssl_mode(), SslMode::Prefer);
    }

    #[test]
    fn test_protocol_suffix_selects_tls_mode() {
        let tls = config_from_descriptor(&descriptor("postgres+tls"), None).unwrap();
        assert_eq!(tls.get_ssl_mode(), SslMode::Require);
        let plain = config_from_descriptor(&descriptor("postgres+notls"), None).unwrap();
        assert_eq!(plain.get_ssl_mode(), SslMode::Disable);
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let mut desc = descriptor("postgres");
        desc.host.clear();
        assert!(matches!(
            config_from_descriptor(&desc, None),
            Err(ConnectorError::InvalidDescriptor(_))
        ));
    }
}
