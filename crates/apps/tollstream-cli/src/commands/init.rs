//! Initialize configuration command.

use std::path::Path;

use tollstream_types::SettlementModel;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{InitOutput, OutputFormat, Render};

/// Execute the init command.
///
/// Writes a default configuration to `path`, applying any overrides. An
/// existing file is only replaced with `force`.
pub fn init(
    path: &Path,
    format: OutputFormat,
    force: bool,
    api_url: Option<String>,
    viewer: Option<String>,
    model: Option<SettlementModel>,
) -> CliResult<String> {
    let exists = path.exists();
    if exists && !force {
        return Err(CliError::ConfigExists(path.display().to_string()));
    }

    let mut config = CliConfig::default();
    if let Some(url) = api_url {
        config.api.base_url = url;
    }
    if let Some(viewer) = viewer {
        config.api.viewer_id = viewer;
    }
    if let Some(model) = model {
        config.session.model = model;
    }
    config.save(path)?;

    let output = InitOutput {
        config_path: path.to_string_lossy().to_string(),
        base_url: config.api.base_url,
        model: config.session.model,
        overwritten: exists,
    };

    Ok(output.render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TOKEN;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let output = init(
            &path,
            OutputFormat::Human,
            false,
            Some("https://api.example.com/api/v1".to_string()),
            Some("viewer-7".to_string()),
            Some(SettlementModel::X402),
        )
        .unwrap();
        assert!(output.contains("Configuration saved"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(DEFAULT_TOKEN));

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com/api/v1");
        assert_eq!(config.api.viewer_id, "viewer-7");
        assert_eq!(config.session.model, SettlementModel::X402);
    }

    #[test]
    fn test_init_fails_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        init(&path, OutputFormat::Human, false, None, None, None).unwrap();

        let result = init(&path, OutputFormat::Human, false, None, None, None);
        assert!(matches!(result, Err(CliError::ConfigExists(_))));
    }

    #[test]
    fn test_init_force_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        init(&path, OutputFormat::Human, false, None, None, None).unwrap();

        let output = init(&path, OutputFormat::Json, true, None, None, None).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["overwritten"], true);
        assert_eq!(json["model"], "channel");
    }
}
