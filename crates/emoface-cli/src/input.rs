use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use emoface_classifiers::config::ExperimentConfig;

/// Read an `ExperimentConfig` from a JSON file, field by field.
///
/// Missing or invalid fields keep their defaults with a warning. Without a
/// path the defaults are used as-is.
pub fn load_experiment_config(path: Option<&Path>) -> Result<ExperimentConfig> {
    let mut config = ExperimentConfig::default();
    let Some(path) = path else {
        log::info!(
            "No config file provided; using defaults:\n{}",
            serde_json::to_string_pretty(&config).unwrap_or_default()
        );
        return Ok(config);
    };

    let config_json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let partial: serde_json::Value = serde_json::from_str(&config_json)
        .with_context(|| format!("Config file is not valid JSON: {:?}", path))?;

    macro_rules! load_or_default {
        ($field:ident) => {
            if let Some(val) = partial.get(stringify!($field)) {
                if let Ok(parsed) = serde_json::from_value(val.clone()) {
                    config.$field = parsed;
                } else {
                    log::warn!(
                        "Config Invalid value for '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            } else {
                log::warn!(
                    "Config Missing field '{}', using default: {:?}",
                    stringify!($field),
                    config.$field
                );
            }
        };
    }

    load_or_default!(data_dir);
    load_or_default!(seed);
    load_or_default!(split);
    load_or_default!(eigenfaces_components);
    load_or_default!(fisherfaces_pca_components);
    load_or_default!(model);
    load_or_default!(detector);

    config
        .split
        .validate()
        .with_context(|| format!("Invalid split in config file: {:?}", path))?;
    Ok(config)
}

/// Load the optional `config` argument, then apply the flag overrides shared
/// by every subcommand.
pub fn from_arguments(matches: &ArgMatches) -> Result<ExperimentConfig> {
    let config_path = matches.get_one::<PathBuf>("config");
    let mut config = load_experiment_config(config_path.map(PathBuf::as_path))?;

    if let Some(data_dir) = matches.get_one::<PathBuf>("data_dir") {
        config.data_dir = data_dir.clone();
    }
    if let Ok(Some(model_path)) = matches.try_get_one::<PathBuf>("detector_model") {
        config.detector.model_path = model_path.clone();
    }

    Ok(config)
}
