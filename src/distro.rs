// ============================================================================
// src/distro.rs – Release detection and the per-release tool-path table
// ============================================================================

use crate::error::{PatchError, PatchResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const OS_RELEASE: &str = "etc/os-release";
const REDHAT_RELEASE: &str = "etc/redhat-release";

/// Releases at or above this version can encrypt the OS volume online.
const MIN_ONLINE_ENCRYPTION: (u32, u32) = (8, 1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistroRelease {
    pub id: String,
    pub version: String,
    pub major: u32,
    pub minor: u32,
}

impl DistroRelease {
    /// Read the release of the system mounted at `root`.
    pub fn detect(root: &Path) -> PatchResult<Self> {
        let os_release = root.join(OS_RELEASE);
        if let Ok(text) = fs::read_to_string(&os_release) {
            if let Some(release) = Self::from_os_release(&text) {
                return Ok(release);
            }
        }

        let redhat_release = root.join(REDHAT_RELEASE);
        let text = fs::read_to_string(&redhat_release)
            .map_err(|e| PatchError::io("read release file", &redhat_release, e))?;
        Self::from_redhat_release(&text).ok_or_else(|| {
            PatchError::Config(format!(
                "unrecognised release string in {}",
                redhat_release.display()
            ))
        })
    }

    fn from_os_release(text: &str) -> Option<Self> {
        let mut id = None;
        let mut version = None;
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.trim() {
                "ID" => id = Some(value.to_string()),
                "VERSION_ID" => version = Some(value.to_string()),
                _ => {}
            }
        }
        let mut release = Self::parse_version(&version?).ok()?;
        release.id = id.unwrap_or_else(|| "linux".to_string());
        Some(release)
    }

    /// `CentOS Linux release 7.9.2009 (Core)` style banners.
    fn from_redhat_release(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let first = words.clone().next()?.to_ascii_lowercase();
        let version = words.find(|w| w.starts_with(|c: char| c.is_ascii_digit()))?;
        let mut release = Self::parse_version(version).ok()?;
        release.id = match first.as_str() {
            "red" => "rhel".to_string(),
            other => other.to_string(),
        };
        Some(release)
    }

    pub fn parse_version(version: &str) -> PatchResult<Self> {
        let mut parts = version.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| PatchError::Config(format!("invalid release version {version:?}")))?;
        let minor = parts
            .next()
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| PatchError::Config(format!("invalid release version {version:?}")))
            })
            .transpose()?
            .unwrap_or(0);
        Ok(Self {
            id: "linux".to_string(),
            version: version.trim().to_string(),
            major,
            minor,
        })
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// The dracut module patching flow only targets the 7.x boot pipeline.
    pub fn supports_module_patching(&self) -> bool {
        self.major == 7
    }

    pub fn supports_online_encryption(&self) -> bool {
        self.at_least(MIN_ONLINE_ENCRYPTION.0, MIN_ONLINE_ENCRYPTION.1)
    }

    fn is_legacy_layout(&self) -> bool {
        self.major == 6
    }
}

/// Absolute paths of every external tool the patcher may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub cryptsetup: PathBuf,
    pub udevadm: PathBuf,
    pub dracut: PathBuf,
    pub grubby: PathBuf,
    pub grub2_mkconfig: PathBuf,
    pub rpm: PathBuf,
    pub yum: PathBuf,
}

impl ToolPaths {
    pub fn for_release(release: &DistroRelease) -> Self {
        if release.is_legacy_layout() {
            Self {
                cryptsetup: "/sbin/cryptsetup".into(),
                udevadm: "/sbin/udevadm".into(),
                dracut: "/sbin/dracut".into(),
                grubby: "/sbin/grubby".into(),
                grub2_mkconfig: "/sbin/grub2-mkconfig".into(),
                rpm: "/bin/rpm".into(),
                yum: "/usr/bin/yum".into(),
            }
        } else {
            Self {
                cryptsetup: "/usr/sbin/cryptsetup".into(),
                udevadm: "/usr/bin/udevadm".into(),
                dracut: "/usr/sbin/dracut".into(),
                grubby: "/usr/sbin/grubby".into(),
                grub2_mkconfig: "/usr/sbin/grub2-mkconfig".into(),
                rpm: "/usr/bin/rpm".into(),
                yum: "/usr/bin/yum".into(),
            }
        }
    }

    pub fn all(&self) -> Vec<&Path> {
        vec![
            &self.cryptsetup,
            &self.udevadm,
            &self.dracut,
            &self.grubby,
            &self.grub2_mkconfig,
            &self.rpm,
            &self.yum,
        ]
    }
}

/// Packages providing the encryption tooling itself.
pub fn base_packages(release: &DistroRelease) -> Vec<&'static str> {
    if release.is_legacy_layout() {
        vec!["cryptsetup-reencrypt"]
    } else {
        vec!["cryptsetup"]
    }
}

/// Full utility set needed by the wider encryption workflow.
pub fn extra_packages(release: &DistroRelease) -> Vec<&'static str> {
    let mut packages = vec![
        "cryptsetup",
        "lsscsi",
        "psmisc",
        "lvm2",
        "uuid",
        "at",
        "patch",
        "procps-ng",
        "util-linux",
    ];
    if release.is_legacy_layout() {
        packages.retain(|p| !matches!(*p, "cryptsetup" | "procps-ng" | "util-linux"));
        packages.push("cryptsetup-reencrypt");
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn detects_release_from_os_release() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(
            root.path().join(OS_RELEASE),
            "NAME=\"CentOS Linux\"\nID=\"centos\"\nVERSION_ID=\"7.9\"\n",
        )
        .unwrap();

        let release = DistroRelease::detect(root.path()).unwrap();
        assert_eq!(release.id, "centos");
        assert_eq!((release.major, release.minor), (7, 9));
        assert!(release.supports_module_patching());
    }

    #[test]
    fn falls_back_to_redhat_release_banner() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("etc")).unwrap();
        fs::write(
            root.path().join(REDHAT_RELEASE),
            "Red Hat Enterprise Linux Server release 6.10 (Santiago)\n",
        )
        .unwrap();

        let release = DistroRelease::detect(root.path()).unwrap();
        assert_eq!(release.id, "rhel");
        assert_eq!((release.major, release.minor), (6, 10));
        assert!(!release.supports_module_patching());
    }

    #[test]
    fn missing_release_files_are_a_config_error() {
        let root = TempDir::new().unwrap();
        assert!(DistroRelease::detect(root.path()).is_err());
    }

    #[test]
    fn online_encryption_compares_numerically() {
        let check = |v: &str| DistroRelease::parse_version(v).unwrap().supports_online_encryption();
        assert!(!check("7.9"));
        assert!(!check("8.0"));
        assert!(check("8.1"));
        assert!(check("8.10"));
        assert!(check("9"));
    }

    #[test]
    fn tool_table_follows_release_layout() {
        let six = ToolPaths::for_release(&DistroRelease::parse_version("6.10").unwrap());
        let seven = ToolPaths::for_release(&DistroRelease::parse_version("7.9").unwrap());
        assert_eq!(six.cryptsetup, PathBuf::from("/sbin/cryptsetup"));
        assert_eq!(seven.cryptsetup, PathBuf::from("/usr/sbin/cryptsetup"));
        assert_eq!(seven.all().len(), 7);
    }

    #[test]
    fn legacy_release_swaps_package_set() {
        let six = DistroRelease::parse_version("6.10").unwrap();
        let seven = DistroRelease::parse_version("7.9").unwrap();

        assert_eq!(base_packages(&six), vec!["cryptsetup-reencrypt"]);
        assert_eq!(base_packages(&seven), vec!["cryptsetup"]);

        let extras = extra_packages(&six);
        assert!(extras.contains(&"cryptsetup-reencrypt"));
        assert!(!extras.contains(&"cryptsetup"));
        assert!(!extras.contains(&"procps-ng"));
        assert!(!extras.contains(&"util-linux"));
        assert_eq!(extra_packages(&seven).len(), 9);
    }
}
