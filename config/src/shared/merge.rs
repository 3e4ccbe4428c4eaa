use serde::Deserialize;

use crate::shared::ValidationError;

/// Settings that drive the merge pipeline.
///
/// Every field has a default, so an empty `merge` section (or none at all) yields
/// the behavior used for NHDPlus refreshes.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MergeConfig {
    /// Table holding the source flowline segments.
    #[serde(default = "default_source_table")]
    pub source_table: String,
    /// Table that is dropped and rebuilt with the merged rivers.
    #[serde(default = "default_destination_table")]
    pub destination_table: String,
    /// Total attempts for one grouped insert when the store reports the
    /// transient geometry union failure.
    #[serde(default = "default_max_insert_attempts")]
    pub max_insert_attempts: u32,
    /// Suffix of the database error message that marks the transient failure.
    #[serde(default = "default_transient_error_suffix")]
    pub transient_error_suffix: String,
    /// Number of remaining identity keys between two progress lines.
    #[serde(default = "default_identity_progress_interval")]
    pub identity_progress_interval: u64,
    /// Number of remaining watershed codes between two progress lines.
    #[serde(default = "default_fallback_progress_interval")]
    pub fallback_progress_interval: u64,
    /// Rough throughput used for the identity pass duration estimate.
    #[serde(default = "default_identity_keys_per_second")]
    pub identity_keys_per_second: f64,
    /// Rough throughput used for the fallback pass duration estimate.
    #[serde(default = "default_fallback_codes_per_second")]
    pub fallback_codes_per_second: f64,
    /// Whether indexes and statistics are built once both passes finished.
    #[serde(default = "default_finalize")]
    pub finalize: bool,
}

impl MergeConfig {
    pub const DEFAULT_SOURCE_TABLE: &'static str = "rivers";

    pub const DEFAULT_DESTINATION_TABLE: &'static str = "merged_rivers";

    pub const DEFAULT_MAX_INSERT_ATTEMPTS: u32 = 3;

    pub const DEFAULT_TRANSIENT_ERROR_SUFFIX: &'static str = "Invalid argument";

    pub const DEFAULT_IDENTITY_PROGRESS_INTERVAL: u64 = 10_000;

    pub const DEFAULT_FALLBACK_PROGRESS_INTERVAL: u64 = 100;

    pub const DEFAULT_IDENTITY_KEYS_PER_SECOND: f64 = 70.0;

    pub const DEFAULT_FALLBACK_CODES_PER_SECOND: f64 = 6.0;

    /// Validates merge settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_table.is_empty() {
            return Err(invalid("merge.source_table", "must not be empty"));
        }

        if self.destination_table.is_empty() {
            return Err(invalid("merge.destination_table", "must not be empty"));
        }

        if self.source_table == self.destination_table {
            return Err(invalid(
                "merge.destination_table",
                "must differ from `merge.source_table`",
            ));
        }

        if self.max_insert_attempts == 0 {
            return Err(invalid("merge.max_insert_attempts", "must be greater than 0"));
        }

        if self.identity_progress_interval == 0 {
            return Err(invalid(
                "merge.identity_progress_interval",
                "must be greater than 0",
            ));
        }

        if self.fallback_progress_interval == 0 {
            return Err(invalid(
                "merge.fallback_progress_interval",
                "must be greater than 0",
            ));
        }

        if self.identity_keys_per_second <= 0.0 || self.fallback_codes_per_second <= 0.0 {
            return Err(invalid(
                "merge.*_per_second",
                "throughput estimates must be positive",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, constraint: &str) -> ValidationError {
    ValidationError::InvalidFieldValue {
        field: field.to_string(),
        constraint: constraint.to_string(),
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            source_table: default_source_table(),
            destination_table: default_destination_table(),
            max_insert_attempts: default_max_insert_attempts(),
            transient_error_suffix: default_transient_error_suffix(),
            identity_progress_interval: default_identity_progress_interval(),
            fallback_progress_interval: default_fallback_progress_interval(),
            identity_keys_per_second: default_identity_keys_per_second(),
            fallback_codes_per_second: default_fallback_codes_per_second(),
            finalize: default_finalize(),
        }
    }
}

fn default_source_table() -> String {
    MergeConfig::DEFAULT_SOURCE_TABLE.to_string()
}

fn default_destination_table() -> String {
    MergeConfig::DEFAULT_DESTINATION_TABLE.to_string()
}

fn default_max_insert_attempts() -> u32 {
    MergeConfig::DEFAULT_MAX_INSERT_ATTEMPTS
}

fn default_transient_error_suffix() -> String {
    MergeConfig::DEFAULT_TRANSIENT_ERROR_SUFFIX.to_string()
}

fn default_identity_progress_interval() -> u64 {
    MergeConfig::DEFAULT_IDENTITY_PROGRESS_INTERVAL
}

fn default_fallback_progress_interval() -> u64 {
    MergeConfig::DEFAULT_FALLBACK_PROGRESS_INTERVAL
}

fn default_identity_keys_per_second() -> f64 {
    MergeConfig::DEFAULT_IDENTITY_KEYS_PER_SECOND
}

fn default_fallback_codes_per_second() -> f64 {
    MergeConfig::DEFAULT_FALLBACK_CODES_PER_SECOND
}

fn default_finalize() -> bool {
    true
}
