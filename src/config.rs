use std::{env, str::FromStr};

/// Environment variable selecting the [`DuplicateTimestampPolicy`]
pub const DUPLICATE_TIMESTAMPS_ENV: &str = "POINTS_LEDGER_DUPLICATE_TIMESTAMPS";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    pub duplicate_timestamps: DuplicateTimestampPolicy,
}

impl LedgerConfig {
    /// Load the configuration from the process environment
    ///
    /// Unset variables fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let duplicate_timestamps = match lookup(DUPLICATE_TIMESTAMPS_ENV) {
            Some(value) => value.parse()?,
            None => DuplicateTimestampPolicy::default(),
        };

        Ok(Self {
            duplicate_timestamps,
        })
    }
}

/// What happens when a transaction arrives at an instant that is already in the ledger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateTimestampPolicy {
    /// Refuse the new transaction
    #[default]
    Reject,
    /// Replace the stored transaction, even if it belongs to another payer
    Overwrite,
}

impl FromStr for DuplicateTimestampPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "overwrite" => Ok(Self::Overwrite),
            _ => Err(ConfigError::InvalidValue {
                key: DUPLICATE_TIMESTAMPS_ENV,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
