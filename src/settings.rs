// Copyright (c) 2026 The Jetledger Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use config::{Config, ConfigError, Environment, File};
use lazy_static::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::fs::{metadata, File as FsFile};
use std::io::Write;

lazy_static! {
    pub static ref SETTINGS: Settings = Settings::new().unwrap();
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Node settings.
    pub node: Node,

    /// Ledger settings.
    pub ledger: Ledger,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut config_path = dirs::config_dir().unwrap();
        config_path.push("Jetledger");
        config_path.push("config.toml");
        let default_settings = Settings::default();
        if metadata(config_path.clone()).is_err() {
            let settings_str = toml::ser::to_string_pretty(&default_settings).unwrap();
            match FsFile::create(config_path.clone()) {
                Ok(mut file) => {
                    file.write_all(settings_str.as_bytes()).unwrap_or(());
                }
                Err(err) => {
                    // If this fails, do nothing and fall back to environment variables
                    error!("Failed to create configuration! Reason: {err:#?}");
                }
            }
        }

        let s = Config::builder()
            .add_source(
                File::with_name(&config_path.into_os_string().into_string().unwrap())
                    .required(false),
            )
            .add_source(Environment::with_prefix("jetledger").separator("__"))
            .set_default("node.network_name", default_settings.node.network_name)?
            .set_default(
                "node.verbosity",
                i64::from(default_settings.node.verbosity),
            )?
            .set_default(
                "ledger.light_chain_limit",
                i64::from(default_settings.ledger.light_chain_limit),
            )?
            .set_default(
                "ledger.split_threshold",
                default_settings.ledger.split_threshold as i64,
            )?
            .set_default(
                "ledger.drop_history_size",
                default_settings.ledger.drop_history_size as i64,
            )?
            .set_default(
                "ledger.heavy_sync_enabled",
                default_settings.ledger.heavy_sync_enabled,
            )?
            .set_default(
                "ledger.heavy_sync_message_limit",
                default_settings.ledger.heavy_sync_message_limit as i64,
            )?
            .set_default(
                "ledger.recent_object_ttl",
                i64::from(default_settings.ledger.recent_object_ttl),
            )?
            .build()?;

        s.try_deserialize()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    /// The network we are joining.
    pub network_name: String,

    /// Log verbosity, 0 to 4.
    pub verbosity: u8,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            network_name: "mainnet".to_owned(),
            verbosity: 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Ledger {
    /// How many pulses back light material nodes retain data before the
    /// heavy holder takes over.
    pub light_chain_limit: u32,

    /// Drop byte size above which a jet becomes a split candidate.
    pub split_threshold: u64,

    /// Length of the per-jet drop size history consulted on splits.
    pub drop_history_size: usize,

    /// Replicate sealed material to heavy storage in the background.
    pub heavy_sync_enabled: bool,

    /// Maximum records per heavy replication message.
    pub heavy_sync_message_limit: usize,

    /// Pulses a touched object stays in the hot working set.
    pub recent_object_ttl: u32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            light_chain_limit: 5,
            split_threshold: 10 * 100,
            drop_history_size: 5,
            heavy_sync_enabled: true,
            heavy_sync_message_limit: 100,
            recent_object_ttl: 10,
        }
    }
}
