//! Volume and mute bookkeeping for one player.
//!
//! Muting must not destroy the volume the user had dialed in: muting saves
//! the current level into a per-player slot, pushes 0 to the engine, and
//! unmuting restores the slot. Setting a volume explicitly always un-mutes.
//!
//! This is a pure state machine; the facade owns pushing the returned
//! levels to the engine and refreshing the cache from live queries while a
//! session is open.

/// Cached level plus the saved-for-unmute slot.
///
/// The cache resets with the session; `muted` and the saved slot are user
/// preferences that outlive a close.
#[derive(Debug)]
pub(crate) struct VolumeCtl {
    level: f64,
    saved: f64,
    muted: bool,
}

impl VolumeCtl {
    pub(crate) fn new() -> Self {
        Self {
            level: 1.0,
            saved: 1.0,
            muted: false,
        }
    }

    /// Set an explicit level. Clamps to `[0.0, 1.0]`, clears mute, and
    /// returns the level to push to the engine. Non-finite input is
    /// ignored and the current level returned unchanged.
    pub(crate) fn set_level(&mut self, volume: f64) -> f64 {
        if !volume.is_finite() {
            return self.level;
        }
        self.level = volume.clamp(0.0, 1.0);
        self.muted = false;
        self.level
    }

    /// Refresh the cache from a live engine answer.
    pub(crate) fn observe(&mut self, live: f64) {
        self.level = live;
    }

    pub(crate) fn level(&self) -> f64 {
        self.level
    }

    pub(crate) fn muted(&self) -> bool {
        self.muted
    }

    /// Save the current level and go silent. Returns the level to push (0).
    ///
    /// A level of 0 has nothing worth saving, so only the flag changes
    /// then; this keeps repeated mutes from clobbering the saved level.
    /// Otherwise the last save wins.
    pub(crate) fn mute(&mut self) -> f64 {
        if self.level != 0.0 {
            self.saved = self.level;
        }
        self.level = 0.0;
        self.muted = true;
        0.0
    }

    /// Restore the saved level and re-arm the slot to 1.0, so a later
    /// unmute cannot restore a value the user has since replaced. No-op
    /// when not muted. Returns the level to push.
    pub(crate) fn unmute(&mut self) -> f64 {
        if !self.muted {
            return self.level;
        }
        self.muted = false;
        self.level = self.saved;
        self.saved = 1.0;
        self.level
    }

    /// Session teardown: the cache resets, the mute preference and saved
    /// slot stay. A muted player keeps reading as silent, an unmuted one
    /// as the fresh-engine default.
    pub(crate) fn reset_level(&mut self) {
        self.level = if self.muted { 0.0 } else { 1.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_reports_zero_and_unmute_restores_exactly() {
        let mut v = VolumeCtl::new();
        v.set_level(0.37);
        assert_eq!(v.mute(), 0.0);
        assert_eq!(v.level(), 0.0);
        assert!(v.muted());

        assert_eq!(v.unmute(), 0.37);
        assert_eq!(v.level(), 0.37);
        assert!(!v.muted());
    }

    #[test]
    fn set_level_while_muted_clears_mute() {
        let mut v = VolumeCtl::new();
        v.set_level(0.5);
        v.mute();
        assert_eq!(v.set_level(0.8), 0.8);
        assert!(!v.muted());
        assert_eq!(v.level(), 0.8);
    }

    #[test]
    fn saved_slot_rearms_after_unmute() {
        let mut v = VolumeCtl::new();
        v.set_level(0.25);
        v.mute();
        v.unmute();
        // The user has since chosen silence outright; muting at zero has
        // nothing to save, so unmute falls back to the re-armed default
        // instead of the stale 0.25.
        v.set_level(0.0);
        v.mute();
        assert_eq!(v.unmute(), 1.0);
    }

    #[test]
    fn double_mute_does_not_clobber_the_saved_level() {
        let mut v = VolumeCtl::new();
        v.set_level(0.4);
        v.mute();
        v.mute();
        assert_eq!(v.unmute(), 0.4);
    }

    #[test]
    fn unmute_when_not_muted_is_a_no_op() {
        let mut v = VolumeCtl::new();
        v.set_level(0.4);
        v.mute();
        // An explicit volume un-muted already; a redundant unmute must not
        // jump back to the old saved level.
        v.set_level(0.8);
        assert_eq!(v.unmute(), 0.8);
        assert!(!v.muted());
    }

    #[test]
    fn last_save_wins_across_mute_cycles() {
        let mut v = VolumeCtl::new();
        v.set_level(0.3);
        v.mute();
        v.set_level(0.8);
        v.mute();
        assert_eq!(v.unmute(), 0.8);
    }

    #[test]
    fn set_level_clamps_and_ignores_non_finite() {
        let mut v = VolumeCtl::new();
        assert_eq!(v.set_level(2.5), 1.0);
        assert_eq!(v.set_level(-0.1), 0.0);
        v.set_level(0.6);
        assert_eq!(v.set_level(f64::NAN), 0.6);
        assert_eq!(v.set_level(f64::INFINITY), 0.6);
        assert_eq!(v.level(), 0.6);
    }

    #[test]
    fn reset_level_keeps_the_mute_preference() {
        let mut v = VolumeCtl::new();
        v.reset_level();
        assert_eq!(v.level(), 1.0);

        v.set_level(0.4);
        v.mute();
        v.reset_level();
        // Still muted, so the cache must not jump back to an audible level.
        assert_eq!(v.level(), 0.0);
        assert!(v.muted());
        assert_eq!(v.unmute(), 0.4, "the saved slot survives the reset");
    }

    #[test]
    fn observe_refreshes_the_cache() {
        let mut v = VolumeCtl::new();
        v.observe(0.55);
        assert_eq!(v.level(), 0.55);
        // A mute after an observe saves the live value.
        v.mute();
        assert_eq!(v.unmute(), 0.55);
    }
}
