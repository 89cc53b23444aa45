//! Throttle profiles and the fixed catalog of named network conditions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Download/upload caps, injected latency and the offline switch.
///
/// A speed of `0` means unlimited. `offline` overrides both speeds and makes
/// every relay reject its request before any outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThrottleProfile {
    /// Download cap (origin → client) in kbps.
    pub download_kbps: u32,
    /// Upload cap (client → origin) in kbps.
    pub upload_kbps: u32,
    /// One-time latency applied before an HTTP request is sent.
    pub latency_ms: u64,
    /// Reject all traffic.
    pub offline: bool,
}

impl ThrottleProfile {
    pub const fn new(download_kbps: u32, upload_kbps: u32, latency_ms: u64) -> Self {
        Self {
            download_kbps,
            upload_kbps,
            latency_ms,
            offline: false,
        }
    }

    pub const fn offline() -> Self {
        Self {
            download_kbps: 0,
            upload_kbps: 0,
            latency_ms: 0,
            offline: true,
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    /// True when nothing is shaped at all.
    pub fn is_unlimited(&self) -> bool {
        !self.offline && self.download_kbps == 0 && self.upload_kbps == 0 && self.latency_ms == 0
    }
}

impl Default for ThrottleProfile {
    fn default() -> Self {
        ProfileName::Normal.profile()
    }
}

/// Names of the built-in profiles, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProfileName {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "fast_4g")]
    Fast4g,
    #[serde(rename = "normal_4g")]
    Normal4g,
    #[serde(rename = "slow_4g")]
    Slow4g,
    #[serde(rename = "fast_3g")]
    Fast3g,
    #[serde(rename = "normal_3g")]
    Normal3g,
    #[serde(rename = "slow_3g")]
    Slow3g,
    #[serde(rename = "fast_2g")]
    Fast2g,
    #[serde(rename = "normal_2g")]
    Normal2g,
    #[serde(rename = "slow_2g")]
    Slow2g,
    #[serde(rename = "gprs")]
    Gprs,
    #[serde(rename = "very_slow")]
    VerySlow,
    #[serde(rename = "offline")]
    Offline,
}

impl ProfileName {
    pub const ALL: [ProfileName; 13] = [
        ProfileName::Normal,
        ProfileName::Fast4g,
        ProfileName::Normal4g,
        ProfileName::Slow4g,
        ProfileName::Fast3g,
        ProfileName::Normal3g,
        ProfileName::Slow3g,
        ProfileName::Fast2g,
        ProfileName::Normal2g,
        ProfileName::Slow2g,
        ProfileName::Gprs,
        ProfileName::VerySlow,
        ProfileName::Offline,
    ];

    /// The constant profile behind this name.
    pub const fn profile(self) -> ThrottleProfile {
        match self {
            ProfileName::Normal => ThrottleProfile::new(0, 0, 0),
            ProfileName::Fast4g => ThrottleProfile::new(50_000, 25_000, 50),
            ProfileName::Normal4g => ThrottleProfile::new(20_000, 10_000, 100),
            ProfileName::Slow4g => ThrottleProfile::new(5_000, 2_000, 200),
            ProfileName::Fast3g => ThrottleProfile::new(2_000, 1_000, 300),
            ProfileName::Normal3g => ThrottleProfile::new(1_000, 500, 500),
            ProfileName::Slow3g => ThrottleProfile::new(500, 200, 800),
            ProfileName::Fast2g => ThrottleProfile::new(200, 100, 1_000),
            ProfileName::Normal2g => ThrottleProfile::new(100, 50, 1_500),
            ProfileName::Slow2g => ThrottleProfile::new(50, 20, 2_000),
            ProfileName::Gprs => ThrottleProfile::new(20, 10, 3_000),
            ProfileName::VerySlow => ThrottleProfile::new(10, 5, 5_000),
            ProfileName::Offline => ThrottleProfile::offline(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProfileName::Normal => "normal",
            ProfileName::Fast4g => "fast_4g",
            ProfileName::Normal4g => "normal_4g",
            ProfileName::Slow4g => "slow_4g",
            ProfileName::Fast3g => "fast_3g",
            ProfileName::Normal3g => "normal_3g",
            ProfileName::Slow3g => "slow_3g",
            ProfileName::Fast2g => "fast_2g",
            ProfileName::Normal2g => "normal_2g",
            ProfileName::Slow2g => "slow_2g",
            ProfileName::Gprs => "gprs",
            ProfileName::VerySlow => "very_slow",
            ProfileName::Offline => "offline",
        }
    }

    /// Reverse lookup. Catalog entries are all distinct, so this is exact;
    /// custom profiles return `None`.
    pub fn identify(profile: &ThrottleProfile) -> Option<ProfileName> {
        Self::ALL.into_iter().find(|name| name.profile() == *profile)
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown throttle profile '{0}'")]
pub struct UnknownProfile(pub String);

impl FromStr for ProfileName {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}
