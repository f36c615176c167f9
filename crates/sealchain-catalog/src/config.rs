//! Database configuration value-object.
//!
//! The dialect is a closed sum resolved once at startup: no runtime type
//! lookup per operation. Only `Sled` is wired to a live store in this
//! workspace; the client-server dialects are validated here and handed to
//! the external driver collaborators.

use serde::{Deserialize, Serialize};

use sealchain_core::SealError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Dialect {
    /// Embedded pure-Rust store (the default; wired in-process).
    Sled,
    /// Embedded single-file relational engine.
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    pub fn parse(value: &str) -> Result<Self, SealError> {
        match value.to_ascii_lowercase().as_str() {
            "sled" => Ok(Self::Sled),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(SealError::InvalidInput(format!("unknown database type: {other}"))),
        }
    }

    /// Client-server engines need credentials and TLS-bearing URLs.
    pub fn is_client_server(self) -> bool {
        matches!(self, Self::Postgres | Self::MySql)
    }
}

/// Schema-management mode handed to the external migration collaborator.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchemaMode {
    Validate,
    Update,
    Create,
    CreateDrop,
    None,
}

impl SchemaMode {
    pub fn parse(value: &str) -> Result<Self, SealError> {
        match value.to_ascii_lowercase().as_str() {
            "validate" => Ok(Self::Validate),
            "update" => Ok(Self::Update),
            "create" => Ok(Self::Create),
            "create-drop" => Ok(Self::CreateDrop),
            "none" => Ok(Self::None),
            other => Err(SealError::InvalidInput(format!("unknown schema mode: {other}"))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    /// Connection URL, or the on-disk path for embedded dialects.
    pub url: String,
    pub username: Option<String>,
    /// Never logged; absent from [`DatabaseConfig::summary`].
    password: Option<String>,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub connection_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub max_lifetime_ms: u64,
    pub schema_mode: SchemaMode,
    pub show_sql: bool,
    pub format_sql: bool,
    pub highlight_sql: bool,
    pub enable_statistics: bool,
}

impl DatabaseConfig {
    /// A config with the standard defaults for `dialect` and `url`.
    /// Call [`validate`](Self::validate) after adjusting fields.
    pub fn new(dialect: Dialect, url: impl Into<String>) -> Self {
        Self {
            dialect,
            url: url.into(),
            username: None,
            password: None,
            pool_min_size: 1,
            pool_max_size: 10,
            connection_timeout_ms: 20_000,
            idle_timeout_ms: 600_000,
            max_lifetime_ms: 1_800_000,
            schema_mode: SchemaMode::Update,
            show_sql: false,
            format_sql: false,
            highlight_sql: false,
            enable_statistics: false,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Reject invalid combinations at construction time.
    pub fn validate(&self) -> Result<(), SealError> {
        if self.url.is_empty() {
            return Err(SealError::InvalidInput("database url must not be empty".into()));
        }
        if self.pool_min_size < 1 {
            return Err(SealError::InvalidInput("pool min size must be at least 1".into()));
        }
        if self.pool_max_size < self.pool_min_size {
            return Err(SealError::InvalidInput(format!(
                "pool max size {} is below pool min size {}",
                self.pool_max_size, self.pool_min_size
            )));
        }
        if self.connection_timeout_ms < 1_000 {
            return Err(SealError::InvalidInput(
                "connection timeout must be at least 1000 ms".into(),
            ));
        }
        if self.dialect.is_client_server() && self.username.is_none() {
            return Err(SealError::InvalidInput(format!(
                "dialect {:?} requires credentials",
                self.dialect
            )));
        }
        Ok(())
    }

    /// Loggable one-line description. The password is redacted.
    pub fn summary(&self) -> String {
        format!(
            "{:?} url={} user={} pool={}..{} timeout={}ms schema={:?}",
            self.dialect,
            self.url,
            self.username.as_deref().unwrap_or("-"),
            self.pool_min_size,
            self.pool_max_size,
            self.connection_timeout_ms,
            self.schema_mode,
        )
    }

    /// Build a client-server config from the conventional environment
    /// variables: `DB_TYPE`, `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`,
    /// `DB_PASSWORD`.
    pub fn from_env() -> Result<Self, SealError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| SealError::InvalidInput(format!("missing environment variable {name}")))
        };
        let dialect = Dialect::parse(&var("DB_TYPE")?)?;
        let host = var("DB_HOST")?;
        let port = var("DB_PORT")?;
        let name = var("DB_NAME")?;
        let url = match dialect {
            Dialect::Sled | Dialect::Sqlite => name.clone(),
            Dialect::Postgres => format!("postgres://{host}:{port}/{name}"),
            Dialect::MySql => format!("mysql://{host}:{port}/{name}"),
        };
        let mut config = Self::new(dialect, url);
        if dialect.is_client_server() {
            config = config.with_credentials(var("DB_USER")?, var("DB_PASSWORD")?);
        }
        config.validate()?;
        Ok(config)
    }
}
