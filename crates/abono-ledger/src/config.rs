//! # Ledger Configuration
//!
//! Configuration for the database connection and the ledger's policy knobs.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ABONO_DB_PATH=/var/lib/abono/abono.db                              │
//! │     ABONO_CASH_SALE_PRODUCT_STATE=claimed                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/abono/abono.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.abono.ledger/abono.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Closed cash sales, one editable installment, 20-char cards         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # abono.toml
//! [database]
//! path = "/var/lib/abono/abono.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [ledger]
//! cash_sale_product_state = "closed"  # closed | claimed
//! editable_installment_window = 1     # trailing installments that may be corrected
//! max_card_number_len = 20
//! ```
//!
//! ## Environment Variables
//! | Variable | Field |
//! |----------|-------|
//! | `ABONO_DB_PATH` | `database.path` |
//! | `ABONO_MAX_CONNECTIONS` | `database.max_connections` |
//! | `ABONO_BUSY_TIMEOUT_SECS` | `database.busy_timeout_secs` |
//! | `ABONO_CASH_SALE_PRODUCT_STATE` | `ledger.cash_sale_product_state` |
//! | `ABONO_EDITABLE_INSTALLMENT_WINDOW` | `ledger.editable_installment_window` |
//! | `ABONO_MAX_CARD_NUMBER_LEN` | `ledger.max_card_number_len` |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use abono_core::{ProductState, DEFAULT_MAX_CARD_NUMBER_LEN};
use abono_db::DbConfig;

/// Path value that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Config Error
// =============================================================================

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid ledger configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Cash Sale Product State
// =============================================================================

/// The product state a cash sale leaves behind.
///
/// ## Modes
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  CLOSED (Default)                                                      │
/// │  ────────────────                                                      │
/// │  • Product goes Pending → Closed when the cash sale is created         │
/// │  • FinalizeCashSale is refused (nothing left to finalize)              │
/// │                                                                         │
/// │  CLAIMED                                                               │
/// │  ───────                                                               │
/// │  • Product goes Pending → Claimed when the cash sale is created        │
/// │  • FinalizeCashSale moves it to Closed (delivery confirmed)            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashSaleProductState {
    #[default]
    Closed,
    Claimed,
}

impl CashSaleProductState {
    /// Product state written when a cash sale claims a product.
    pub fn product_state(&self) -> ProductState {
        match self {
            CashSaleProductState::Closed => ProductState::Closed,
            CashSaleProductState::Claimed => ProductState::Claimed,
        }
    }

    /// Whether `FinalizeCashSale` has work to do in this mode.
    pub fn needs_finalize(&self) -> bool {
        matches!(self, CashSaleProductState::Claimed)
    }
}

impl std::fmt::Display for CashSaleProductState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashSaleProductState::Closed => write!(f, "closed"),
            CashSaleProductState::Claimed => write!(f, "claimed"),
        }
    }
}

impl std::str::FromStr for CashSaleProductState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "closed" => Ok(CashSaleProductState::Closed),
            "claimed" => Ok(CashSaleProductState::Claimed),
            other => Err(ConfigError::Invalid(format!(
                "Unknown cash sale product state: '{}'. Valid options: closed, claimed",
                other
            ))),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `:memory:` selects an in-memory database.
    /// Default: `abono.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Default: 5
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits for a competing transaction.
    /// Default: 5
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "abono", "ledger")
        .map(|dirs| dirs.data_dir().join("abono.db"))
        .unwrap_or_else(|| PathBuf::from("abono.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

/// `[ledger]` section: the policy knobs `SaleLedger` consults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSettings {
    #[serde(default)]
    pub cash_sale_product_state: CashSaleProductState,

    /// Number of trailing installments `UpdateInstallment` may correct.
    /// Installment 1 is never part of the window. Default: 1
    #[serde(default = "default_editable_window")]
    pub editable_installment_window: u32,

    /// Default: 20
    #[serde(default = "default_max_card_len")]
    pub max_card_number_len: usize,
}

fn default_editable_window() -> u32 {
    1
}

fn default_max_card_len() -> usize {
    DEFAULT_MAX_CARD_NUMBER_LEN
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            cash_sale_product_state: CashSaleProductState::default(),
            editable_installment_window: default_editable_window(),
            max_card_number_len: default_max_card_len(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl LedgerConfig {
    /// Configuration for an isolated in-memory database (tests, demos).
    pub fn in_memory() -> Self {
        LedgerConfig {
            database: DatabaseSettings {
                path: PathBuf::from(IN_MEMORY_PATH),
                max_connections: 1,
                busy_timeout_secs: default_busy_timeout(),
            },
            ledger: LedgerSettings::default(),
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (abono.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.is_in_memory() && self.database.max_connections != 1 {
            return Err(ConfigError::Invalid(
                "an in-memory database requires max_connections = 1".into(),
            ));
        }

        if self.ledger.editable_installment_window == 0 {
            return Err(ConfigError::Invalid(
                "editable_installment_window must be at least 1".into(),
            ));
        }

        if self.ledger.max_card_number_len == 0 {
            return Err(ConfigError::Invalid(
                "max_card_number_len must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `ABONO_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("ABONO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("ABONO_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Invalid ABONO_MAX_CONNECTIONS"),
            }
        }

        if let Some(secs) = lookup("ABONO_BUSY_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.database.busy_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Invalid ABONO_BUSY_TIMEOUT_SECS"),
            }
        }

        if let Some(state) = lookup("ABONO_CASH_SALE_PRODUCT_STATE") {
            match state.parse() {
                Ok(parsed) => {
                    debug!(state = %state, "Overriding cash sale product state from environment");
                    self.ledger.cash_sale_product_state = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring ABONO_CASH_SALE_PRODUCT_STATE"),
            }
        }

        if let Some(window) = lookup("ABONO_EDITABLE_INSTALLMENT_WINDOW") {
            match window.parse::<u32>() {
                Ok(w) => self.ledger.editable_installment_window = w,
                Err(_) => warn!(value = %window, "Invalid ABONO_EDITABLE_INSTALLMENT_WINDOW"),
            }
        }

        if let Some(len) = lookup("ABONO_MAX_CARD_NUMBER_LEN") {
            match len.parse::<usize>() {
                Ok(l) => self.ledger.max_card_number_len = l,
                Err(_) => warn!(value = %len, "Invalid ABONO_MAX_CARD_NUMBER_LEN"),
            }
        }
    }

    /// Builds the pool configuration for `abono-db`.
    pub fn to_db_config(&self) -> DbConfig {
        let base = if self.database.is_in_memory() {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
        };

        base.busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "abono", "ledger")
            .map(|dirs| dirs.config_dir().join("abono.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_cash_state_parsing() {
        assert_eq!(
            "closed".parse::<CashSaleProductState>().unwrap(),
            CashSaleProductState::Closed
        );
        assert_eq!(
            " Claimed ".parse::<CashSaleProductState>().unwrap(),
            CashSaleProductState::Claimed
        );
        assert!("pending".parse::<CashSaleProductState>().is_err());
        assert_eq!(CashSaleProductState::Claimed.to_string(), "claimed");
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.ledger.cash_sale_product_state, CashSaleProductState::Closed);
        assert_eq!(config.ledger.editable_installment_window, 1);
        assert_eq!(config.ledger.max_card_number_len, 20);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [ledger]
            cash_sale_product_state = "claimed"
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.cash_sale_product_state, CashSaleProductState::Claimed);
        assert_eq!(config.ledger.editable_installment_window, 1);
        assert_eq!(config.database.busy_timeout_secs, 5);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abono.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/x.db\"\n\n[ledger]\neditable_installment_window = 3\n",
        )
        .unwrap();

        let config = LedgerConfig::load(Some(path)).unwrap();
        assert_eq!(config.ledger.editable_installment_window, 3);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[ledger]\neditable_installment_window = \"many\"\n").unwrap();
        assert!(matches!(LedgerConfig::load(Some(bad)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ABONO_DB_PATH", ":memory:"),
            ("ABONO_MAX_CONNECTIONS", "1"),
            ("ABONO_CASH_SALE_PRODUCT_STATE", "claimed"),
            ("ABONO_EDITABLE_INSTALLMENT_WINDOW", "2"),
            ("ABONO_MAX_CARD_NUMBER_LEN", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.database.is_in_memory());
        assert_eq!(config.ledger.cash_sale_product_state, CashSaleProductState::Claimed);
        assert_eq!(config.ledger.editable_installment_window, 2);
        assert_eq!(config.ledger.max_card_number_len, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = LedgerConfig::in_memory();
        assert!(config.validate().is_ok());

        config.ledger.editable_installment_window = 0;
        assert!(config.validate().is_err());

        config.ledger.editable_installment_window = 1;
        config.database.max_connections = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = LedgerConfig::in_memory();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[ledger]"));
        assert!(toml_str.contains("cash_sale_product_state = \"closed\""));
    }
}
