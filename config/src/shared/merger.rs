use serde::Deserialize;

use crate::Config;
use crate::shared::{MergeConfig, PgConnectionConfig, ValidationError};

/// Complete configuration for the `merge-rivers` binary.
///
/// This intentionally does not implement `Serialize` to avoid leaking the
/// database password into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct MergerConfig {
    /// Connection to the database holding both the source and destination tables.
    pub database: PgConnectionConfig,
    /// Merge pipeline settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

impl MergerConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.merge.validate()
    }
}

impl Config for MergerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
