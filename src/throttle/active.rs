//! The shared, atomically swapped active profile.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::throttle::profile::{ProfileName, ThrottleProfile};

/// Handle to the profile every relay consults.
///
/// Cloning the handle shares the same slot. Writers replace the whole
/// snapshot, so a reader sees either the old or the new profile, never a mix.
#[derive(Debug, Clone)]
pub struct ActiveProfile {
    slot: Arc<ArcSwap<ThrottleProfile>>,
}

impl ActiveProfile {
    pub fn new(initial: ThrottleProfile) -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Snapshot of the current profile.
    pub fn current(&self) -> ThrottleProfile {
        **self.slot.load()
    }

    /// Replace the active profile, returning the one it displaced.
    pub fn set(&self, profile: ThrottleProfile) -> ThrottleProfile {
        let previous = *self.slot.swap(Arc::new(profile));
        if previous != profile {
            let name = ProfileName::identify(&profile);
            tracing::info!(
                profile = name.map(|n| n.as_str()).unwrap_or("custom"),
                download_kbps = profile.download_kbps,
                upload_kbps = profile.upload_kbps,
                latency_ms = profile.latency_ms,
                offline = profile.offline,
                "Throttle profile changed"
            );
            metrics::record_profile_change(name);
        }
        previous
    }

    pub fn set_named(&self, name: ProfileName) -> ThrottleProfile {
        self.set(name.profile())
    }

    /// Catalog name of the current profile, if it is one.
    pub fn current_name(&self) -> Option<ProfileName> {
        ProfileName::identify(&self.current())
    }
}

impl Default for ActiveProfile {
    fn default() -> Self {
        Self::new(ThrottleProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_slot() {
        let active = ActiveProfile::default();
        let reader = active.clone();
        assert_eq!(reader.current_name(), Some(ProfileName::Normal));

        let previous = active.set_named(ProfileName::Slow2g);
        assert_eq!(previous, ProfileName::Normal.profile());
        assert_eq!(reader.current(), ProfileName::Slow2g.profile());
    }

    #[test]
    fn set_returns_the_displaced_profile() {
        let active = ActiveProfile::new(ThrottleProfile::new(10, 20, 30));
        let previous = active.set(ThrottleProfile::new(40, 50, 60));
        assert_eq!(previous, ThrottleProfile::new(10, 20, 30));

        let previous = active.set(ThrottleProfile::new(40, 50, 60));
        assert_eq!(previous, ThrottleProfile::new(40, 50, 60));
        assert_eq!(active.current().latency_ms, 60);
    }

    #[test]
    fn custom_profiles_have_no_name() {
        let active = ActiveProfile::new(ThrottleProfile::new(123, 45, 6));
        assert_eq!(active.current_name(), None);
        assert_eq!(active.current().upload_kbps, 45);
    }

    #[test]
    fn concurrent_readers_never_see_torn_profiles() {
        let active = ActiveProfile::default();
        let writer = active.clone();
        let handle = std::thread::spawn(move || {
            for i in 0..2_000 {
                let name = if i % 2 == 0 { ProfileName::Gprs } else { ProfileName::Fast4g };
                writer.set_named(name);
            }
        });
        for _ in 0..2_000 {
            let seen = active.current();
            assert!(ProfileName::identify(&seen).is_some(), "torn read: {:?}", seen);
        }
        handle.join().unwrap();
    }
}
