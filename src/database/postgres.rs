//! PostgreSQL sessions over a single sqlx connection.

use super::classify::classify_sqlx_error;
use super::{ConnectionFactory, ResourceError, Session};
use crate::config::DatabaseConfig;
use crate::infra::secrets::Credential;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lists database roles together with their password expiry.
const LIST_USERS_SQL: &str = "SELECT usename::text, valuntil::text FROM pg_user ORDER BY usename";

const APPLICATION_NAME: &str = "rotaconn";

/// A row of `pg_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgUser {
    pub name: String,
    /// Password expiry as rendered by the server, if any.
    pub valid_until: Option<String>,
}

// ============================================================================
// Factory
// ============================================================================

/// Opens one `PgConnection` per session.
pub struct PostgresConnectionFactory {
    host: String,
    port: u16,
    database: String,
    ssl_mode: PgSslMode,
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl PostgresConnectionFactory {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)
            .with_context(|| format!("Invalid database sslMode '{}'", config.ssl_mode))?;

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            database: config.name.clone(),
            ssl_mode,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            statement_timeout: Duration::from_millis(config.statement_timeout_ms),
        })
    }

    fn options(&self, credential: &Credential) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(credential.identity())
            .password(credential.secret())
            .ssl_mode(self.ssl_mode)
            .application_name(APPLICATION_NAME)
    }
}

#[async_trait]
impl ConnectionFactory for PostgresConnectionFactory {
    type Session = PgSession;

    async fn open(&self, credential: &Credential) -> Result<PgSession, ResourceError> {
        debug!(
            host = %self.host,
            port = self.port,
            database = %self.database,
            identity = %credential.identity(),
            "Opening PostgreSQL connection"
        );

        let options = self.options(credential);
        let connect = PgConnection::connect_with(&options);
        let conn = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(classify_sqlx_error(&e)),
            Err(_) => {
                return Err(ResourceError::Unreachable(format!(
                    "connecting to {}:{} timed out after {}ms",
                    self.host,
                    self.port,
                    self.connect_timeout.as_millis()
                )))
            }
        };

        Ok(PgSession {
            conn: Mutex::new(Some(conn)),
            statement_timeout: self.statement_timeout,
            broken: AtomicBool::new(false),
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// A live PostgreSQL connection.
///
/// Statements are serialized on the connection; concurrent callers queue.
pub struct PgSession {
    conn: Mutex<Option<PgConnection>>,
    statement_timeout: Duration,
    broken: AtomicBool,
}

impl PgSession {
    /// List roles from `pg_user`.
    pub async fn list_users(&self) -> Result<Vec<PgUser>, ResourceError> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ResourceError::Unreachable("session is closed".into()))?;

        let query = sqlx::query_as::<_, (String, Option<String>)>(LIST_USERS_SQL).fetch_all(conn);
        let rows = self.bounded(query).await?;

        Ok(rows
            .into_iter()
            .map(|(name, valid_until)| PgUser { name, valid_until })
            .collect())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ResourceError>
    where
        F: std::future::Future<Output = Result<T, sqlx::Error>>,
    {
        let err = match tokio::time::timeout(self.statement_timeout, fut).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => classify_sqlx_error(&e),
            Err(_) => ResourceError::Unreachable(format!(
                "statement timed out after {}ms",
                self.statement_timeout.as_millis()
            )),
        };

        if matches!(err, ResourceError::Unreachable(_)) {
            self.broken.store(true, Ordering::Release);
        }
        Err(err)
    }
}

#[async_trait]
impl Session for PgSession {
    fn is_healthy(&self) -> bool {
        !self.broken.load(Ordering::Acquire)
    }

    async fn close(&self) {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            if let Err(e) = conn.close().await {
                warn!("Closing PostgreSQL connection failed: {e}");
            }
        }
    }
}
