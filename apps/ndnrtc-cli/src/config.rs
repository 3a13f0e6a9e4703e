// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered configuration for the demo CLI: engine defaults merged with an
//! optional TOML file and `NDNRTC_`-prefixed environment overrides, the same
//! layering `streamkit-skit`'s `config::load` uses.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use ndnrtc_core::config::EngineConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `demo` subcommand's synthetic producer/consumer run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DemoConfig {
    /// Stream name the demo producer publishes under.
    pub stream: String,
    /// Thread (encoding ladder) name the demo producer publishes under.
    pub thread: String,
    /// Number of synthetic frames the demo producer publishes.
    pub frame_count: u32,
    /// Synthetic capture frame rate, used both to pace timestamps and as
    /// the consumer's sample period.
    pub fps: f64,
    /// Size of each synthetic frame's payload, in bytes.
    pub payload_bytes: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { stream: "cam".into(), thread: "hi".into(), frame_count: 30, fps: 30.0, payload_bytes: 1200 }
    }
}

/// Top-level CLI configuration: the shared engine config plus demo knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub demo: DemoConfig,
}

pub struct ConfigLoadResult {
    pub config: AppConfig,
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, an optional TOML file, and
/// environment variables (e.g. `NDNRTC_ENGINE__SEGMENTER__WIRE_LEN=4000`).
///
/// # Errors
///
/// Returns an error if the config file exists but fails to parse, or if an
/// environment override can't be coerced into its target type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: AppConfig = figment.merge(Env::prefixed("NDNRTC_").split("__")).extract().map_err(Box::new)?;
    Ok(ConfigLoadResult { config, file_missing })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_without_file_falls_back_to_defaults() {
        let result = load("/nonexistent/ndnrtc.toml").unwrap();
        assert!(result.file_missing.is_some());
        assert_eq!(result.config.demo.stream, "cam");
        assert_eq!(result.config.engine.segmenter.wire_len, EngineConfig::default().segmenter.wire_len);
    }

    #[test]
    fn test_default_demo_config_publishes_at_least_one_frame() {
        assert!(DemoConfig::default().frame_count > 0);
    }
}
