//! Connection descriptors
//!
//! A [`ConnectionDescriptor`] is validated once when a session connects and
//! never changes afterwards. [`ConnectParams`] is the form-style input
//! (kind, host, credentials, database) a front end collects to build one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConnectionError;

const SQLITE_MEMORY: &str = ":memory:";

// ============================================================================
// Database Kind
// ============================================================================

/// Supported database backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseKind {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgresql", alias = "postgres")]
    PostgreSql,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl DatabaseKind {
    /// Port used when the caller does not give one
    pub fn default_port(self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::PostgreSql => Some(5432),
            Self::Sqlite => None,
        }
    }

    /// Scheme written into connection strings built from [`ConnectParams`]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Infer the kind from a URL scheme
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::PostgreSql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// SQL dialect name used in prompts
    pub fn dialect(self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_scheme(s).ok_or_else(|| {
            format!("Unknown database kind: {s} (expected sqlite, mysql or postgresql)")
        })
    }
}

// ============================================================================
// Connection Descriptor
// ============================================================================

/// Validated connection string for one database
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    kind: DatabaseKind,
    uri: String,
}

impl ConnectionDescriptor {
    /// Validate `uri` as a connection string for `kind`
    ///
    /// For SQLite the referenced file must already exist. In-memory SQLite
    /// is rejected: every statement opens its own connection, and each
    /// connection would see a fresh empty database.
    pub fn new(kind: DatabaseKind, uri: impl Into<String>) -> Result<Self, ConnectionError> {
        let uri = uri.into();
        let parsed = url::Url::parse(&uri).map_err(|e| ConnectionError::InvalidUri(e.to_string()))?;

        if DatabaseKind::from_scheme(parsed.scheme()) != Some(kind) {
            return Err(ConnectionError::SchemeMismatch {
                kind,
                scheme: parsed.scheme().to_string(),
            });
        }

        let descriptor = Self { kind, uri };

        match kind {
            DatabaseKind::Sqlite => {
                let path = descriptor
                    .sqlite_path()
                    .ok_or(ConnectionError::MissingField("database"))?;
                if descriptor.is_sqlite_memory(&path) {
                    return Err(ConnectionError::InMemoryDatabase);
                }
                if !path.exists() {
                    return Err(ConnectionError::MissingDatabaseFile(path));
                }
            }
            DatabaseKind::MySql | DatabaseKind::PostgreSql => {
                if parsed.host_str().map_or(true, str::is_empty) {
                    return Err(ConnectionError::MissingField("host"));
                }
            }
        }

        Ok(descriptor)
    }

    /// Validate a connection string, inferring the kind from its scheme
    pub fn parse(uri: &str) -> Result<Self, ConnectionError> {
        let scheme = uri
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| ConnectionError::InvalidUri(format!("no scheme in '{uri}'")))?;
        let kind = DatabaseKind::from_scheme(scheme).ok_or_else(|| {
            ConnectionError::InvalidUri(format!("unsupported scheme '{scheme}'"))
        })?;
        Self::new(kind, uri)
    }

    /// Descriptor for an existing SQLite file
    pub fn sqlite(path: impl AsRef<Path>) -> Result<Self, ConnectionError> {
        Self::new(
            DatabaseKind::Sqlite,
            format!("sqlite://{}", path.as_ref().display()),
        )
    }

    /// Database backend
    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    /// Full connection string, credentials included
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// File path for SQLite descriptors
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        if self.kind != DatabaseKind::Sqlite {
            return None;
        }
        let rest = self
            .uri
            .strip_prefix("sqlite://")
            .or_else(|| self.uri.strip_prefix("sqlite:"))?;
        let file = rest.split('?').next().unwrap_or_default();
        if file.is_empty() {
            return None;
        }
        let decoded = urlencoding::decode(file).ok()?;
        Some(PathBuf::from(decoded.into_owned()))
    }

    fn is_sqlite_memory(&self, path: &Path) -> bool {
        let query = self.uri.split_once('?').map_or("", |(_, q)| q);
        path.as_os_str() == SQLITE_MEMORY || query.split('&').any(|pair| pair == "mode=memory")
    }

    /// Connection string with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        match url::Url::parse(&self.uri) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            _ => self.uri.clone(),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("kind", &self.kind)
            .field("uri", &self.redacted())
            .finish()
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.redacted())
    }
}

// ============================================================================
// Connect Parameters
// ============================================================================

/// Connection form input
#[derive(Clone, Deserialize)]
pub struct ConnectParams {
    pub kind: DatabaseKind,
    /// SQLite: path to the database file. Servers: database name.
    pub database: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ConnectParams {
    /// Parameters for a SQLite file
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            kind: DatabaseKind::Sqlite,
            database: path.into(),
            host: None,
            port: None,
            username: None,
            password: None,
        }
    }

    /// Parameters for a MySQL or PostgreSQL server
    pub fn server(kind: DatabaseKind, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            kind,
            database: database.into(),
            host: Some(host.into()),
            port: None,
            username: None,
            password: None,
        }
    }

    /// Set the server port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set login credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Build and validate the connection descriptor
    pub fn build(&self) -> Result<ConnectionDescriptor, ConnectionError> {
        let database = self.database.trim();
        if database.is_empty() {
            return Err(ConnectionError::MissingField("database"));
        }

        match self.kind {
            DatabaseKind::Sqlite => {
                let expanded = shellexpand::full(database)
                    .map_err(|e| ConnectionError::InvalidUri(e.to_string()))?;
                ConnectionDescriptor::sqlite(expanded.as_ref())
            }
            kind => {
                let host = self
                    .host
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .unwrap_or("localhost");
                let port = self.port.or(kind.default_port()).unwrap_or_default();

                let auth = match (&self.username, &self.password) {
                    (Some(user), Some(pass)) if !user.is_empty() => format!(
                        "{}:{}@",
                        urlencoding::encode(user),
                        urlencoding::encode(pass)
                    ),
                    (Some(user), _) if !user.is_empty() => format!("{}@", urlencoding::encode(user)),
                    _ => String::new(),
                };

                let uri = format!("{}://{}{}:{}/{}", kind.scheme(), auth, host, port, database);
                ConnectionDescriptor::new(kind, uri)
            }
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("kind", &self.kind)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
