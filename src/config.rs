// ============================================================================
// src/config.rs – strict config loader
// ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/bootpatch.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct System {
    /// Prefix every well-known path hangs off (a chroot or a test sandbox).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// dm-crypt mapping name of the encrypted root volume.
    #[serde(default = "default_mapping_name")]
    pub mapping_name: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_mapping_name() -> String {
    "osencrypt".to_string()
}

impl Default for System {
    fn default() -> Self {
        Self {
            root: default_root(),
            mapping_name: default_mapping_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnlockModule {
    /// Directory name under modules.d, priority prefix included.
    #[serde(default = "default_module_name")]
    pub name: String,
    /// Shipped copy of the module tree that gets installed.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_udev_rule")]
    pub udev_rule: String,
    #[serde(default = "default_placeholder")]
    pub partition_placeholder: String,
}

fn default_module_name() -> String {
    "91ade".to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("/usr/share/bootpatch/91ade")
}

fn default_udev_rule() -> String {
    "50-udev-ade.rules".to_string()
}

fn default_placeholder() -> String {
    "ENCRYPTED_DISK_PARTITION".to_string()
}

impl Default for UnlockModule {
    fn default() -> Self {
        Self {
            name: default_module_name(),
            source_dir: default_source_dir(),
            udev_rule: default_udev_rule(),
            partition_placeholder: default_placeholder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeouts {
    /// Long-running mutations (dracut, grub2-mkconfig, grubby).
    #[serde(default = "default_command_secs")]
    pub command_secs: u64,
    /// Read-only queries (cryptsetup status, udevadm info, rpm -q).
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
    #[serde(default = "default_package_install_secs")]
    pub package_install_secs: u64,
}

fn default_command_secs() -> u64 {
    600
}

fn default_query_secs() -> u64 {
    30
}

fn default_package_install_secs() -> u64 {
    100
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_secs: default_command_secs(),
            query_secs: default_query_secs(),
            package_install_secs: default_package_install_secs(),
        }
    }
}

impl Timeouts {
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs.max(1))
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs.max(1))
    }

    pub fn package_install(&self) -> Duration {
        Duration::from_secs(self.package_install_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelArgs {
    #[serde(default)]
    pub default: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub system: System,
    #[serde(default)]
    pub unlock_module: UnlockModule,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub kernel_args: KernelArgs,
}

impl Config {
    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let s = fs::read_to_string(&p)
            .with_context(|| format!("read config: {}", p.as_ref().display()))?;
        let cfg: Self = if p.as_ref().extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&s).context("toml parse")?
        } else {
            serde_yaml::from_str(&s).context("yaml parse")?
        };
        Ok(cfg)
    }

    /// An explicitly requested file must exist; the default path is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }
}
