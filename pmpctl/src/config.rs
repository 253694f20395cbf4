// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pmpfs::SessionConfig;
use pmpfs::pmp300::StorageMedium;
use pmpio::prelude::wire::DEFAULT_BAUD;

pub const DEFAULT_CONFIG_FILE: &str = "pmpctl.toml";
pub const DEVICE_ENV: &str = "PMP300_DEVICE";

/// Time the bridge needs after the port opens (boards reset on DTR).
pub const DEFAULT_SETTLE_MS: u64 = 2_000;
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 1_000;

/// Optional TOML settings file. Every key may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baud: Option<u32>,
    pub external: Option<bool>,
    pub settle_ms: Option<u64>,
    pub serial_timeout_ms: Option<u64>,
    pub status_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub fill_byte: Option<u8>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Reads `explicit` (which must exist) or the default file if present.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display())),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    crate::log_verbose!("Using config {}", path.display());
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Command-line values that take priority over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub device: Option<String>,
    pub external: bool,
    pub capacity: Option<u16>,
}

/// Fully resolved connection and session settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: Option<String>,
    pub baud: u32,
    pub settle: Duration,
    pub serial_timeout: Duration,
    pub session: SessionConfig,
}

impl Settings {
    /// Flags first, then the environment, then the file.
    pub fn resolve(overrides: &Overrides, env_device: Option<String>, file: FileConfig) -> Self {
        let defaults = SessionConfig::default();
        let ms = |v: Option<u64>, d: Duration| v.map_or(d, Duration::from_millis);

        let external = overrides.external || file.external.unwrap_or(false);
        let device = overrides
            .device
            .clone()
            .or(env_device.filter(|d| !d.is_empty()))
            .or(file.device);

        Self {
            device,
            baud: file.baud.unwrap_or(DEFAULT_BAUD),
            settle: Duration::from_millis(file.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
            serial_timeout: Duration::from_millis(
                file.serial_timeout_ms.unwrap_or(DEFAULT_SERIAL_TIMEOUT_MS),
            ),
            session: SessionConfig {
                medium: if external {
                    StorageMedium::External
                } else {
                    StorageMedium::Internal
                },
                status_timeout: ms(file.status_timeout_ms, defaults.status_timeout),
                probe_timeout: ms(file.probe_timeout_ms, defaults.probe_timeout),
                poll_interval: ms(file.poll_interval_ms, defaults.poll_interval),
                fill_byte: file.fill_byte.unwrap_or(defaults.fill_byte),
                capacity_override: overrides.capacity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flag_beats_env_beats_file() {
        let file = FileConfig {
            device: Some("/dev/file".into()),
            ..FileConfig::default()
        };
        let mut ov = Overrides::default();
        let s = Settings::resolve(&ov, Some("/dev/env".into()), file);
        assert_eq!(s.device.as_deref(), Some("/dev/env"));

        ov.device = Some("/dev/flag".into());
        let s = Settings::resolve(&ov, Some("/dev/env".into()), FileConfig::default());
        assert_eq!(s.device.as_deref(), Some("/dev/flag"));

        let s = Settings::resolve(&Overrides::default(), Some(String::new()), FileConfig::default());
        assert_eq!(s.device, None);
    }

    #[test]
    fn test_load_toml_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "device = \"/dev/ttyACM0\"\nexternal = true\nstatus_timeout_ms = 750\nfill_byte = 255"
        )
        .unwrap();

        let file = FileConfig::load(Some(f.path())).unwrap();
        let s = Settings::resolve(&Overrides::default(), None, file);
        assert_eq!(s.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(s.session.medium, StorageMedium::External);
        assert_eq!(s.session.status_timeout, Duration::from_millis(750));
        assert_eq!(s.session.fill_byte, 0xFF);
        assert_eq!(s.baud, DEFAULT_BAUD);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "devise = \"/dev/typo\"").unwrap();
        assert!(FileConfig::load(Some(f.path())).is_err());
    }
}
