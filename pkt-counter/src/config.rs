// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs::{self},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use clap::ValueEnum;
use dirs::home_dir;
use serde::{Deserialize, Serialize};

/// How the XDP program is hooked into the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// Let the kernel pick native mode and fall back to generic.
    #[default]
    Default,
    /// Generic (skb) mode, works on every driver.
    Skb,
    /// Native driver mode.
    Drv,
    /// Offload to the NIC.
    Hw,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub iface: String,
    /// Seconds between two counter reads.
    pub poll_interval: u64,
    pub xdp_mode: XdpMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iface: "eth0".to_string(),
            poll_interval: 1,
            xdp_mode: XdpMode::Default,
        }
    }
}

impl Config {
    /// Command line values win over the file.
    pub fn override_with(
        mut self,
        iface: Option<String>,
        poll_interval: Option<u64>,
        xdp_mode: Option<XdpMode>,
    ) -> Self {
        if let Some(iface) = iface {
            self.iface = iface;
        }
        if let Some(poll_interval) = poll_interval {
            self.poll_interval = poll_interval;
        }
        if let Some(xdp_mode) = xdp_mode {
            self.xdp_mode = xdp_mode;
        }
        self
    }

    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.iface.trim().is_empty() {
            anyhow::bail!("Interface name must not be empty");
        }
        if self.poll_interval == 0 {
            anyhow::bail!("poll_interval must be at least 1 second");
        }
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// Reads `~/.config/pkt_counter/config.toml`, writing the defaults first if
/// the file does not exist.
pub fn create_or_read_config() -> Result<Config, anyhow::Error> {
    let config_path = get_config_path()?;
    create_or_read_config_at(&config_path)
}

pub fn create_or_read_config_at(config_path: &Path) -> Result<Config, anyhow::Error> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory at {parent:?}"))?;
    }

    match fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = Config::default();
            let toml = toml::to_string(&config)
                .map_err(|e| anyhow!("Failed to serialize default config: {e}"))?;
            fs::write(config_path, toml)
                .with_context(|| format!("Failed to write config file at {config_path:?}"))?;
            Ok(config)
        }
        Err(e) => Err(anyhow!("Failed to read config file: {}", e)),
    }
}

/// Reads a config file given on the command line. It is never created.
pub fn read_config(config_path: &Path) -> Result<Config, anyhow::Error> {
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {config_path:?}"))?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<Config, anyhow::Error> {
    toml::from_str(content).map_err(|e| anyhow!("Failed to parse config file:\n \t{e}"))
}

fn get_config_path() -> Result<PathBuf, anyhow::Error> {
    home_dir()
        .map(|mut path| {
            path.push(".config");
            path.push("pkt_counter");
            path.push("config.toml");
            path
        })
        .ok_or_else(|| anyhow!("HOME dir not found"))
}
