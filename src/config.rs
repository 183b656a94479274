//! Plaintext `.params` configuration files
//!
//! Two files configure the core: `rl_system.params` (network dimensions,
//! the Boltzmann policy block, and the replay buffer capacity) and
//! `nn_system.params` (Adam hyperparameters for the DQN and RND network
//! pairs). The grammar is `Name { KEY=value; ... }` blocks plus standalone
//! `KEY=value` entries; `#` lines are comments, trailing semicolons are
//! optional, and whitespace and key order are free. Both files are parsed
//! once, at trainer construction.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::nn::optim::AdamParams;
use crate::nn::NetworkSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("missing required key `{key}` in {}", path.display())]
    MissingKey { path: PathBuf, key: String },

    #[error("malformed value `{value}` for key `{key}` in {}", path.display())]
    InvalidValue {
        path: PathBuf,
        key: String,
        value: String,
    },
}

/// The `BoltzmannPolicy_specs` block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoltzmannSpec {
    pub initial_temp: f64,
    pub decay_rate: f64,
    pub min_temp: f64,
    pub decay_interval: f64,
}

/// Contents of `rl_system.params`
#[derive(Debug, Clone, PartialEq)]
pub struct RlSystemParams {
    pub dqn: NetworkSpec,
    pub rnd: NetworkSpec,
    pub boltzmann: BoltzmannSpec,
    pub replay_buffer_capacity: usize,
}

impl RlSystemParams {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw = RawConfig::parse(text);
        Ok(Self {
            dqn: network_spec(&raw, path, "DQN_req_specs", "DQN")?,
            rnd: network_spec(&raw, path, "RND_req_specs", "RND")?,
            boltzmann: BoltzmannSpec {
                initial_temp: raw.get(path, "BoltzmannPolicy_specs", "initial_temp")?,
                decay_rate: raw.get(path, "BoltzmannPolicy_specs", "decay_rate")?,
                min_temp: raw.get(path, "BoltzmannPolicy_specs", "min_temp")?,
                decay_interval: raw.get(path, "BoltzmannPolicy_specs", "decay_interval")?,
            },
            replay_buffer_capacity: raw.get_root(path, "REPLAY_BUFFER_CAPACITY")?,
        })
    }
}

/// Contents of `nn_system.params`
#[derive(Debug, Clone, PartialEq)]
pub struct NnSystemParams {
    pub dqn: AdamParams,
    pub rnd: AdamParams,
}

impl NnSystemParams {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw = RawConfig::parse(text);
        Ok(Self {
            dqn: adam_params(&raw, path, "DQN_specs")?,
            rnd: adam_params(&raw, path, "RND_specs")?,
        })
    }
}

fn network_spec(
    raw: &RawConfig,
    path: &Path,
    block: &str,
    prefix: &str,
) -> Result<NetworkSpec, ConfigError> {
    Ok(NetworkSpec {
        input_dim: raw.get(path, block, &format!("{}_INPUT_DIM", prefix))?,
        output_dim: raw.get(path, block, &format!("{}_OUTPUT_DIM", prefix))?,
        hidden_dim: raw.get(path, block, &format!("{}_HIDDEN_DIM", prefix))?,
        num_layers: raw.get(path, block, &format!("{}_NUM_LAYERS", prefix))?,
        batch_size: raw.get(path, block, &format!("{}_BATCH_SIZE", prefix))?,
    })
}

fn adam_params(raw: &RawConfig, path: &Path, block: &str) -> Result<AdamParams, ConfigError> {
    Ok(AdamParams {
        lr_initial: raw.get(path, block, "LR_INITIAL")?,
        beta1: raw.get(path, block, "BETA1")?,
        beta2: raw.get(path, block, "BETA2")?,
        eps: raw.get(path, block, "EPS")?,
        max_training_steps: raw.get(path, block, "max_training_steps")?,
        min_learning_rate: raw.get(path, block, "min_learning_rate")?,
    })
}

/// Untyped `block -> key -> value` view of a params file
#[derive(Debug, Default)]
struct RawConfig {
    blocks: HashMap<String, HashMap<String, String>>,
    root: HashMap<String, String>,
}

impl RawConfig {
    fn parse(text: &str) -> Self {
        let mut raw = RawConfig::default();
        let mut block: Option<(String, HashMap<String, String>)> = None;
        let mut buf = String::new();

        let without_comments: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");

        for ch in without_comments.chars() {
            match ch {
                '{' => {
                    block = Some((buf.trim().to_string(), HashMap::new()));
                    buf.clear();
                }
                '}' => {
                    Self::flush(&mut buf, &mut block, &mut raw.root);
                    if let Some((name, entries)) = block.take() {
                        raw.blocks.insert(name, entries);
                    }
                }
                ';' | '\n' => Self::flush(&mut buf, &mut block, &mut raw.root),
                _ => buf.push(ch),
            }
        }
        Self::flush(&mut buf, &mut block, &mut raw.root);

        raw
    }

    fn flush(
        buf: &mut String,
        block: &mut Option<(String, HashMap<String, String>)>,
        root: &mut HashMap<String, String>,
    ) {
        if let Some((key, value)) = buf.split_once('=') {
            let entry = (key.trim().to_string(), value.trim().to_string());
            match block {
                Some((_, entries)) => entries.insert(entry.0, entry.1),
                None => root.insert(entry.0, entry.1),
            };
        }
        buf.clear();
    }

    fn get<T: FromStr>(&self, path: &Path, block: &str, key: &str) -> Result<T, ConfigError> {
        let value = self
            .blocks
            .get(block)
            .and_then(|entries| entries.get(key))
            .ok_or_else(|| ConfigError::MissingKey {
                path: path.to_path_buf(),
                key: format!("{}.{}", block, key),
            })?;
        value.parse().map_err(|_| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            key: format!("{}.{}", block, key),
            value: value.clone(),
        })
    }

    fn get_root<T: FromStr>(&self, path: &Path, key: &str) -> Result<T, ConfigError> {
        let value = self.root.get(key).ok_or_else(|| ConfigError::MissingKey {
            path: path.to_path_buf(),
            key: key.to_string(),
        })?;
        value.parse().map_err(|_| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            key: key.to_string(),
            value: value.clone(),
        })
    }
}
