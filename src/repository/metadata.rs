// src/repository/metadata.rs

//! Addon repository metadata
//!
//! The addons.mozilla.org 1.5 API answers with an XML document per addon:
//!
//! ```xml
//! <addon id="1865">
//!   <name>Adblock Plus</name>
//!   <guid>{d10d0bf8-f5b5-c8b4-a8b2-2b9879e08c5d}</guid>
//!   <version>2.6.9</version>
//!   <install hash="sha256:..." os="ALL">https://.../adblock_plus-2.6.9.xpi</install>
//!   <install hash="sha256:..." os="ALL" status="Beta">https://.../adblock_plus-2.7b1.xpi</install>
//! </addon>
//! ```
//!
//! Elements flint does not use are ignored.

use crate::package::Channel;
use serde::{Deserialize, Serialize};

/// Status marker the repository uses for development builds
const BETA_STATUS: &str = "Beta";

/// Addon record returned by the repository API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "addon")]
pub struct AddonMetadata {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Extension identifier; becomes the installed file name in the profile
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "install", default)]
    pub installs: Vec<InstallVariant>,
}

/// One downloadable build of an addon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallVariant {
    /// `algorithm:hexdigest`
    #[serde(rename = "@hash", default)]
    pub hash: Option<String>,
    #[serde(rename = "@os", default)]
    pub os: Option<String>,
    /// Absent for stable builds, `Beta` for development builds
    #[serde(rename = "@status", default)]
    pub status: Option<String>,
    #[serde(rename = "$text", default)]
    pub url: String,
}

impl InstallVariant {
    /// Whether this build belongs to the given release channel
    pub fn matches_channel(&self, channel: Channel) -> bool {
        match (channel, self.status.as_deref()) {
            (Channel::Stable, None) => true,
            (Channel::Stable, Some(status)) => status.trim().is_empty(),
            (Channel::Dev, Some(status)) => status.trim().eq_ignore_ascii_case(BETA_STATUS),
            (Channel::Dev, None) => false,
        }
    }

    /// Whether this build can be installed on the running platform
    pub fn supports_os(&self, platform: &str) -> bool {
        match self.os.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(os) => os.eq_ignore_ascii_case("ALL") || os.eq_ignore_ascii_case(platform),
        }
    }

    /// Download URL with surrounding whitespace removed
    pub fn download_url(&self) -> &str {
        self.url.trim()
    }
}

impl AddonMetadata {
    /// Parse an API response body
    pub fn parse(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// First build matching the channel that runs on this platform
    pub fn select(&self, channel: Channel) -> Option<&InstallVariant> {
        self.select_for_platform(channel, current_platform())
    }

    /// First build matching the channel that runs on `platform`
    pub fn select_for_platform(&self, channel: Channel, platform: &str) -> Option<&InstallVariant> {
        self.installs.iter().find(|variant| {
            variant.matches_channel(channel)
                && variant.supports_os(platform)
                && !variant.download_url().is_empty()
        })
    }
}

/// Platform name as the repository spells it
pub fn current_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "WINNT"
    } else if cfg!(target_os = "macos") {
        "Darwin"
    } else {
        "Linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<addon id="1865">
  <name>Adblock Plus</name>
  <type id="1">Extension</type>
  <guid>{d10d0bf8-f5b5-c8b4-a8b2-2b9879e08c5d}</guid>
  <slug>adblock-plus</slug>
  <version>2.6.9</version>
  <status id="4">Fully Reviewed</status>
  <install hash="sha256:aaaa" os="WINNT">https://example.org/abp-win.xpi</install>
  <install hash="sha256:bbbb" os="ALL">https://example.org/abp.xpi?src=api&amp;x=1</install>
  <install hash="sha256:cccc" os="ALL" status="Beta">https://example.org/abp-beta.xpi</install>
</addon>"#;

    #[test]
    fn test_parse_sample() {
        let meta = AddonMetadata::parse(SAMPLE).unwrap();
        assert_eq!(meta.id.as_deref(), Some("1865"));
        assert_eq!(meta.name.as_deref(), Some("Adblock Plus"));
        assert_eq!(
            meta.guid.as_deref(),
            Some("{d10d0bf8-f5b5-c8b4-a8b2-2b9879e08c5d}")
        );
        assert_eq!(meta.installs.len(), 3);
        assert_eq!(meta.installs[1].download_url(), "https://example.org/abp.xpi?src=api&x=1");
    }

    #[test]
    fn test_select_by_channel_and_platform() {
        let meta = AddonMetadata::parse(SAMPLE).unwrap();

        let stable = meta.select_for_platform(Channel::Stable, "Linux").unwrap();
        assert_eq!(stable.hash.as_deref(), Some("sha256:bbbb"));

        let stable_win = meta.select_for_platform(Channel::Stable, "WINNT").unwrap();
        assert_eq!(stable_win.hash.as_deref(), Some("sha256:aaaa"));

        let dev = meta.select_for_platform(Channel::Dev, "Linux").unwrap();
        assert_eq!(dev.download_url(), "https://example.org/abp-beta.xpi");
    }

    #[test]
    fn test_no_dev_build() {
        let xml = r#"<addon id="9"><name>X</name><install os="ALL">https://example.org/x.xpi</install></addon>"#;
        let meta = AddonMetadata::parse(xml).unwrap();
        assert!(meta.select_for_platform(Channel::Dev, "Linux").is_none());
        assert!(meta.select_for_platform(Channel::Stable, "Linux").is_some());
    }

    #[test]
    fn test_garbage_fails() {
        assert!(AddonMetadata::parse("").is_err());
    }
}
