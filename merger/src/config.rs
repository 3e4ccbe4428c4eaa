use config::load_config;
use config::shared::MergerConfig;

/// Loads and validates the merger configuration.
///
/// Reads `configuration/base.yaml`, the file of the current `APP_ENVIRONMENT` and
/// `APP_`-prefixed environment overrides.
pub fn load_merger_config() -> anyhow::Result<MergerConfig> {
    let config = load_config::<MergerConfig>()?;
    config.validate()?;

    Ok(config)
}
