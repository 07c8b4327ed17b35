// ============================================================================
// src/extract.rs – Strict fragment extraction from free-text tool output
// ============================================================================
//
// Tool output is never scraped best-effort: a pattern either yields a value
// or the caller gets `PatchError::Extraction`. When a pattern matches more
// than once the first match wins; the match count travels with the value so
// callers can log the ambiguity.

use crate::error::{PatchError, PatchResult};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Pattern {
    what: String,
    regex: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub value: String,
    pub match_count: usize,
}

impl Extracted {
    pub fn is_ambiguous(&self) -> bool {
        self.match_count > 1
    }
}

impl Pattern {
    /// `marker` followed by a value up to end of line, e.g. `device: /dev/sda2`.
    pub fn marker(marker: &str) -> PatchResult<Self> {
        Self::build(
            format!("{marker} marker"),
            &format!("(?m){}(.*)$", regex::escape(marker)),
        )
    }

    /// udev attribute-walk style `ATTR{name}=="value"`.
    pub fn quoted_attribute(name: &str) -> PatchResult<Self> {
        Self::build(
            format!("ATTR{{{name}}}"),
            &format!(r#"ATTR\{{{}\}}=="([^"]*)""#, regex::escape(name)),
        )
    }

    fn build(what: String, expr: &str) -> PatchResult<Self> {
        let regex = Regex::new(expr)
            .map_err(|e| PatchError::Config(format!("invalid pattern for {what}: {e}")))?;
        Ok(Self { what, regex })
    }

    /// Every non-empty captured value, trimmed, in output order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// `command` only labels the error; it is the command that produced `text`.
    pub fn extract(&self, text: &str, command: &str) -> PatchResult<Extracted> {
        let mut matches = self.matches(text);
        let match_count = matches.len();
        if match_count == 0 {
            return Err(PatchError::Extraction {
                what: self.what.clone(),
                command: command.to_string(),
            });
        }
        Ok(Extracted {
            value: matches.swap_remove(0),
            match_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRYPTSETUP_STATUS: &str = "/dev/mapper/osencrypt is active and is in use.
  type:    LUKS1
  cipher:  aes-xts-plain64
  keysize: 256 bits
  device:  /dev/sda2
  offset:  4096 sectors
  size:    62908383 sectors
  mode:    read/write
";

    const ATTRIBUTE_WALK: &str = r#"
  looking at device '/devices/pci0000:00/0000:00:07.1/ata1/host0/target0:0:0/0:0:0:0/block/sda/sda2':
    KERNEL=="sda2"
    SUBSYSTEM=="block"
    DRIVER==""
    ATTR{alignment_offset}=="0"
    ATTR{partition}=="2"
    ATTR{ro}=="0"
    ATTR{size}=="62912479"
"#;

    #[test]
    fn device_marker_yields_trimmed_path() {
        let pattern = Pattern::marker("device:").unwrap();
        let got = pattern
            .extract("type: LUKS1\ndevice: /dev/mapper/osencrypt\n", "cryptsetup status")
            .unwrap();
        assert_eq!(got.value, "/dev/mapper/osencrypt");
        assert!(!got.is_ambiguous());

        let got = pattern.extract(CRYPTSETUP_STATUS, "cryptsetup status").unwrap();
        assert_eq!(got.value, "/dev/sda2");
    }

    #[test]
    fn missing_marker_is_an_error_not_an_empty_string() {
        let pattern = Pattern::marker("device:").unwrap();
        let err = pattern
            .extract("/dev/mapper/osencrypt is inactive.\n", "cryptsetup status osencrypt")
            .unwrap_err();
        match err {
            PatchError::Extraction { what, command } => {
                assert_eq!(what, "device: marker");
                assert_eq!(command, "cryptsetup status osencrypt");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn marker_with_blank_value_counts_as_absent() {
        let pattern = Pattern::marker("device:").unwrap();
        assert!(pattern.extract("device:   \n", "cryptsetup status").is_err());
    }

    #[test]
    fn partition_attribute_among_unrelated_lines() {
        let pattern = Pattern::quoted_attribute("partition").unwrap();
        let got = pattern.extract(ATTRIBUTE_WALK, "udevadm info").unwrap();
        assert_eq!(got.value, "2");

        let got = pattern
            .extract("ATTR{ro}==\"0\"\nATTR{partition}==\"3\"\nATTR{size}==\"9\"\n", "udevadm info")
            .unwrap();
        assert_eq!(got.value, "3");
    }

    #[test]
    fn partition_attribute_absent_fails() {
        let pattern = Pattern::quoted_attribute("partition").unwrap();
        let err = pattern
            .extract("    ATTR{ro}==\"0\"\n    ATTR{size}==\"62912479\"\n", "udevadm info")
            .unwrap_err();
        assert!(matches!(err, PatchError::Extraction { .. }));
    }

    #[test]
    fn multiple_matches_take_the_first_and_report_ambiguity() {
        let pattern = Pattern::quoted_attribute("partition").unwrap();
        let got = pattern
            .extract("ATTR{partition}==\"1\"\nATTR{partition}==\"5\"\n", "udevadm info")
            .unwrap();
        assert_eq!(got.value, "1");
        assert_eq!(got.match_count, 2);
        assert!(got.is_ambiguous());
    }
}
