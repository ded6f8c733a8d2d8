// ABOUTME: PostgreSQL connection setup for local and managed servers
// ABOUTME: Builds the client configuration, negotiates TLS, and explains connect failures

use crate::config::ConnectionParams;
use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::config::SslMode;
use tokio_postgres::Client;

/// Connect to PostgreSQL with TLS support
///
/// TLS is required when `params.tls` is set (managed servers reject plain
/// connections) and disabled otherwise. The connection task is spawned onto
/// the runtime and ends when the returned client is dropped.
pub async fn connect_client(params: &ConnectionParams) -> Result<Client> {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&params.host)
        .port(params.port)
        .dbname(&params.database)
        .user(&params.username)
        .password(&params.password)
        .application_name("relational-migrator")
        .ssl_mode(if params.tls {
            SslMode::Require
        } else {
            SslMode::Disable
        });

    let tls_connector = TlsConnector::builder()
        .danger_accept_invalid_certs(false)
        .build()
        .context("Failed to build TLS connector")?;
    let tls = MakeTlsConnector::new(tls_connector);

    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| explain_connect_error(&e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    Ok(client)
}

/// Turn a raw connect error into a message an operator can act on
fn explain_connect_error(error_msg: &str) -> anyhow::Error {
    if error_msg.contains("password authentication failed") {
        anyhow::anyhow!(
            "Authentication failed: Invalid username or password.\n\
             Managed servers expect the user as <username>@<server>."
        )
    } else if error_msg.contains("database") && error_msg.contains("does not exist") {
        anyhow::anyhow!(
            "Database does not exist: {}\n\
             Create the target database before importing.",
            error_msg
        )
    } else if error_msg.contains("Connection refused") || error_msg.contains("could not connect")
    {
        anyhow::anyhow!(
            "Connection refused: Unable to reach database server.\n\
             Please check:\n\
             - The host and port are correct\n\
             - The database server is running\n\
             - Firewall rules allow connections\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
        anyhow::anyhow!(
            "Connection timeout: Database server did not respond in time.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("SSL") || error_msg.contains("TLS") {
        anyhow::anyhow!(
            "TLS/SSL error: Failed to establish secure connection.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("no pg_hba.conf entry") {
        anyhow::anyhow!(
            "Access denied: No pg_hba.conf entry for host.\n\
             The server (or its firewall rules) does not accept connections from this machine.\n\
             Error: {}",
            error_msg
        )
    } else {
        anyhow::anyhow!("Failed to connect to database: {}", error_msg)
    }
}
