use std::collections::HashSet;
use std::fmt;
use std::sync::{LazyLock, Mutex};

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::connection::ConnectionContext;
use crate::driver::NativeDriver;
use crate::encoding::Codepage;
use crate::error::OpenEdgeDbError;
use crate::identifiers::{DEFAULT_MAX_NAME_LENGTH, IdentifierPolicy};
use crate::render::DEFAULT_DUAL_TABLE;
use crate::types::DatabaseFeatures;

/// Settings keys that are no longer honored, with the option that replaced each.
pub const DEPRECATED_KEYS: [(&str, &str); 3] = [
    ("DATABASE_ODBC_DRIVER", "driver"),
    ("DATABASE_ODBC_DSN", "dsn"),
    ("DATABASE_ODBC_EXTRA_PARAMS", "extra_params"),
];

static WARNED_KEYS: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Log a deprecation warning for `key`, once per process. Returns whether it was logged.
pub(crate) fn warn_deprecated(key: &str, replacement: &str) -> bool {
    let mut warned = match WARNED_KEYS.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let first = warned.insert(key.to_string());
    if first {
        warn!(key, "the {key} setting is deprecated, use OPTIONS['{replacement}'] instead");
    }
    first
}

/// How the native driver locates the database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ConnectionType {
    /// A configured data source name.
    #[serde(rename = "DSN")]
    Dsn(String),
    /// A driver name, connecting without a DSN.
    #[serde(rename = "DRIVER")]
    Driver(String),
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Dsn(name) => write!(f, "DSN={name}"),
            ConnectionType::Driver(name) => write!(f, "DRIVER={{{name}}}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortSetting {
    Number(u16),
    Text(String),
}

/// Settings bundle as it appears in a configuration file.
#[derive(Deserialize)]
struct Settings {
    #[serde(rename = "TYPECNX")]
    typecnx: Option<ConnectionType>,
    #[serde(rename = "HOST")]
    host: Option<String>,
    #[serde(rename = "PORT")]
    port: Option<PortSetting>,
    #[serde(rename = "USER")]
    user: Option<String>,
    #[serde(rename = "PASSWORD")]
    password: Option<String>,
    #[serde(rename = "NAME")]
    name: Option<String>,
    #[serde(rename = "DEFAULTSCHEMA")]
    default_schema: Option<String>,
    #[serde(rename = "DUALTABLE")]
    dual_table: Option<String>,
    #[serde(rename = "CPINTERNAL")]
    codepage: Option<Codepage>,
    #[serde(rename = "BULKINSERT")]
    bulk_insert: Option<bool>,
}

/// Everything needed to open and run a connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Settings")]
pub struct ConnectionOptions {
    pub connection_type: ConnectionType,
    pub host: String,
    pub port: Option<String>,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Schema (owner) for unqualified names, the dual table and key sequences.
    pub default_schema: String,
    pub dual_table: String,
    pub codepage: Codepage,
    pub bulk_insert: bool,
    pub max_name_length: usize,
}

impl TryFrom<Settings> for ConnectionOptions {
    type Error = OpenEdgeDbError;

    fn try_from(settings: Settings) -> Result<Self, Self::Error> {
        let connection_type = settings
            .typecnx
            .ok_or_else(|| OpenEdgeDbError::ConfigError("TYPECNX must give a DSN or a DRIVER".into()))?;
        let name = non_empty(settings.name)
            .ok_or_else(|| OpenEdgeDbError::ConfigError("NAME is required".into()))?;
        let user = settings.user.unwrap_or_default();

        let mut opts = ConnectionOptions::new(connection_type, name, user);
        if let Some(host) = non_empty(settings.host) {
            opts.host = host;
        }
        opts.port = match settings.port {
            Some(PortSetting::Number(port)) => Some(port.to_string()),
            Some(PortSetting::Text(port)) => non_empty(Some(port)),
            None => None,
        };
        opts.password = settings.password.unwrap_or_default();
        if let Some(schema) = non_empty(settings.default_schema) {
            opts.default_schema = schema;
        }
        if let Some(dual) = non_empty(settings.dual_table) {
            opts.dual_table = dual;
        }
        if let Some(codepage) = settings.codepage {
            opts.codepage = codepage;
        }
        if let Some(bulk) = settings.bulk_insert {
            opts.bulk_insert = bulk;
        }
        opts.validate()?;
        Ok(opts)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ConnectionOptions {
    /// Options with defaults: host `localhost`, empty password, schema = `user`, dual table
    /// `DUAL`, codepage `iso8859-1`, bulk insert on.
    #[must_use]
    pub fn new(connection_type: ConnectionType, name: String, user: String) -> Self {
        Self {
            connection_type,
            host: "localhost".to_string(),
            port: None,
            default_schema: user.clone(),
            user,
            password: String::new(),
            name,
            dual_table: DEFAULT_DUAL_TABLE.to_string(),
            codepage: Codepage::default(),
            bulk_insert: true,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }

    /// Parse a JSON settings bundle.
    ///
    /// Deprecated keys are ignored, with a warning logged the first time each one is seen.
    ///
    /// # Errors
    /// Returns `OpenEdgeDbError::ConfigError` for malformed JSON, a missing `NAME` or
    /// `TYPECNX`, or an unknown codepage.
    pub fn from_json_str(json: &str) -> Result<Self, OpenEdgeDbError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| OpenEdgeDbError::ConfigError(e.to_string()))?;
        if let Value::Object(map) = &value {
            for (key, replacement) in DEPRECATED_KEYS {
                if map.contains_key(key) {
                    warn_deprecated(key, replacement);
                }
            }
        }
        serde_json::from_value(value).map_err(|e| OpenEdgeDbError::ConfigError(e.to_string()))
    }

    /// `<TYPE>;HOST=<host>;DB=<name>;UID=<user>;PWD=<password>;PORT=<port>`
    #[must_use]
    pub fn connection_string(&self) -> String {
        format!(
            "{};HOST={};DB={};UID={};PWD={};PORT={}",
            self.connection_type,
            self.host,
            self.name,
            self.user,
            self.password,
            self.port.as_deref().unwrap_or_default()
        )
    }

    /// # Errors
    /// Returns `OpenEdgeDbError::ConfigError` when a required value is empty or the
    /// identifier limit is too small to build sequence names.
    pub fn validate(&self) -> Result<(), OpenEdgeDbError> {
        if self.name.trim().is_empty() {
            return Err(OpenEdgeDbError::ConfigError("NAME is required".into()));
        }
        if self.default_schema.trim().is_empty() {
            return Err(OpenEdgeDbError::ConfigError(
                "DEFAULTSCHEMA or USER is required".into(),
            ));
        }
        if self.dual_table.trim().is_empty() {
            return Err(OpenEdgeDbError::ConfigError("DUALTABLE must not be empty".into()));
        }
        if self.max_name_length <= 3 {
            return Err(OpenEdgeDbError::ConfigError(format!(
                "identifier limit {} is too small",
                self.max_name_length
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::new(self.max_name_length)
    }

    #[must_use]
    pub fn features(&self) -> DatabaseFeatures {
        DatabaseFeatures {
            has_bulk_insert: self.bulk_insert,
            max_name_length: self.max_name_length,
            ..DatabaseFeatures::default()
        }
    }
}

/// Fluent builder for connection options.
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(connection_type: ConnectionType, name: String, user: String) -> Self {
        Self {
            opts: ConnectionOptions::new(connection_type, name, user),
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.opts.port = port.map(|p| p.to_string());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = password.into();
        self
    }

    #[must_use]
    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.opts.default_schema = schema.into();
        self
    }

    #[must_use]
    pub fn dual_table(mut self, dual_table: impl Into<String>) -> Self {
        self.opts.dual_table = dual_table.into();
        self
    }

    #[must_use]
    pub fn codepage(mut self, codepage: Codepage) -> Self {
        self.opts.codepage = codepage;
        self
    }

    #[must_use]
    pub fn bulk_insert(mut self, enabled: bool) -> Self {
        self.opts.bulk_insert = enabled;
        self
    }

    #[must_use]
    pub fn max_name_length(mut self, max_name_length: usize) -> Self {
        self.opts.max_name_length = max_name_length;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }

    /// Open a connection with these options.
    ///
    /// # Errors
    ///
    /// Returns `OpenEdgeDbError` if the options are invalid, the driver cannot connect, or
    /// the session setup statements fail.
    pub fn open<D: NativeDriver>(
        self,
        driver: &D,
    ) -> Result<ConnectionContext<D::Connection>, OpenEdgeDbError> {
        ConnectionContext::open(driver, self.finish())
    }
}
