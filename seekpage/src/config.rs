//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `SEEKPAGE_`, nested keys separated by `__`)
//! 2. Current working directory: ./seekpage.toml
//! 3. XDG config directory: ~/.config/seekpage/seekpage.toml
//! 4. System directory: /etc/seekpage/seekpage.toml
//! 5. Default values
//!
//! Entity whitelists are declared as arrays of tables so that field order (the
//! default projection order) is preserved:
//!
//! ```toml
//! [pagination]
//! cursor_secret = "change me"
//!
//! [entities.users]
//! default_sort = "created_at DESC, id DESC"
//!
//! [[entities.users.fields]]
//! name = "id"
//! type = "identifier"
//! sortable = true
//!
//! [[entities.users.fields]]
//! name = "status"
//! type = "enum"
//! filterable = true
//! values = ["active", "suspended"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cursor::{CursorCodec, MAX_TOKEN_LEN};
use crate::error::Result;
use crate::registry::{
    FieldDef, FieldRegistry, FieldType, Registries, RegistryError, DEFAULT_LIMIT, MAX_LIMIT,
};

const CONFIG_FILE: &str = "seekpage.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Pagination defaults and cursor signing
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Per-entity field whitelists, keyed by entity name
    #[serde(default)]
    pub entities: BTreeMap<String, EntityConfig>,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Pagination configuration shared by every entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when a request has no `limit`
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Largest page size; larger requests are clamped
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Secret the cursor MAC key is derived from
    ///
    /// Without one, a random key is generated at startup and tokens do not
    /// survive restarts or work across instances.
    #[serde(default)]
    pub cursor_secret: Option<String>,

    /// Longest accepted cursor token, in characters
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            cursor_secret: None,
            max_token_len: default_max_token_len(),
        }
    }
}

/// Whitelist of one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Unique field used as the sort tie-breaker
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Sort used when a request has none; defaults to the identifier ascending
    #[serde(default)]
    pub default_sort: Option<String>,

    /// Overrides `pagination.default_limit`
    #[serde(default)]
    pub default_limit: Option<u32>,

    /// Overrides `pagination.max_limit`
    #[serde(default)]
    pub max_limit: Option<u32>,

    /// Declared fields, in default projection order
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// One field of an entity whitelist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldKind,

    #[serde(default)]
    pub sortable: bool,

    #[serde(default)]
    pub filterable: bool,

    #[serde(default = "default_true")]
    pub selectable: bool,

    /// Allowed values of an `enum` field
    #[serde(default)]
    pub values: Vec<String>,
}

/// Field type as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Timestamp,
    Identifier,
    Enum,
}

impl FieldConfig {
    fn to_def(&self) -> FieldDef {
        let ty = match self.kind {
            FieldKind::String => FieldType::String,
            FieldKind::Integer => FieldType::Integer,
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::Timestamp => FieldType::Timestamp,
            FieldKind::Identifier => FieldType::Identifier,
            FieldKind::Enum => FieldType::Enum(self.values.clone()),
        };
        FieldDef {
            name: self.name.clone(),
            ty,
            sortable: self.sortable,
            filterable: self.filterable,
            selectable: self.selectable,
        }
    }
}

impl EntityConfig {
    /// Build the immutable registry for entity `name`
    pub fn registry(
        &self,
        name: &str,
        pagination: &PaginationConfig,
    ) -> std::result::Result<FieldRegistry, RegistryError> {
        let mut builder = FieldRegistry::builder(name)
            .identifier(&self.identifier)
            .limits(
                self.default_limit.unwrap_or(pagination.default_limit),
                self.max_limit.unwrap_or(pagination.max_limit),
            );
        if let Some(sort) = &self.default_sort {
            builder = builder.default_sort(sort);
        }
        for field in &self.fields {
            builder = builder.field(field.to_def());
        }
        builder.build()
    }
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found wins on conflicts):
    /// 1. Current working directory: ./seekpage.toml
    /// 2. XDG config directory: ~/.config/seekpage/seekpage.toml
    /// 3. System directory: /etc/seekpage/seekpage.toml
    ///
    /// Environment variables (`SEEKPAGE_` prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        let config_paths = Self::find_config_paths();

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("SEEKPAGE_").split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses the search path; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("SEEKPAGE_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Possible config file paths, highest priority first
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("seekpage");
        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc/seekpage").join(CONFIG_FILE));
        paths
    }

    /// Build every configured entity registry
    pub fn registries(&self) -> Result<Registries> {
        let mut registries = Registries::new();
        for (name, entity) in &self.entities {
            registries.insert(entity.registry(name, &self.pagination)?)?;
        }
        tracing::debug!(entities = registries.len(), "Built field registries");
        Ok(registries)
    }

    /// Cursor codec keyed from `pagination.cursor_secret`
    pub fn cursor_codec(&self) -> CursorCodec {
        let codec = match self.pagination.cursor_secret.as_deref() {
            Some(secret) if !secret.is_empty() => CursorCodec::new(secret),
            _ => {
                tracing::warn!(
                    "No pagination.cursor_secret configured; using a random key, \
                     cursor tokens will not survive a restart"
                );
                CursorCodec::random()
            }
        };
        codec.with_max_token_len(self.pagination.max_token_len)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: default_service_name(),
                log_level: default_log_level(),
            },
            pagination: PaginationConfig::default(),
            entities: BTreeMap::new(),
        }
    }
}

fn default_service_name() -> String {
    "seekpage".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_max_limit() -> u32 {
    MAX_LIMIT
}

fn default_max_token_len() -> usize {
    MAX_TOKEN_LEN
}

fn default_identifier() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}
