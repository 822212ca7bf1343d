//! Mount-time configuration.

use fat32_types::FatDateTime;

/// Default capacity of the open-file table.
pub const MAX_OPEN_FILES: usize = 10;

// ─── Time providers ───────────────────────────────────────────────────────────

/// Source of the timestamps written into created and modified entries.
pub trait TimeProvider: core::fmt::Debug {
    fn now(&self) -> FatDateTime;
}

/// System clock (UTC) when built with `std`, the FAT epoch otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTimeProvider;

impl TimeProvider for DefaultTimeProvider {
    #[cfg(feature = "std")]
    fn now(&self) -> FatDateTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        FatDateTime::from_unix_seconds(secs)
    }

    #[cfg(not(feature = "std"))]
    fn now(&self) -> FatDateTime { FatDateTime::EPOCH }
}

/// Always 1980-01-01 00:00:00. Keeps images byte-for-byte reproducible.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTimeProvider;

impl TimeProvider for NullTimeProvider {
    fn now(&self) -> FatDateTime { FatDateTime::EPOCH }
}

static DEFAULT_TIME_PROVIDER: DefaultTimeProvider = DefaultTimeProvider;

// ─── Options ──────────────────────────────────────────────────────────────────

/// Options applied when a volume is mounted.
#[derive(Clone, Copy, Debug)]
pub struct MountOptions {
    pub(crate) max_open_files: usize,
    pub(crate) time_provider:  &'static dyn TimeProvider,
}

impl MountOptions {
    pub fn new() -> Self {
        Self { max_open_files: MAX_OPEN_FILES, time_provider: &DEFAULT_TIME_PROVIDER }
    }

    /// Capacity of the open-file table. Fixed for the lifetime of the mount.
    pub fn max_open_files(mut self, n: usize) -> Self {
        self.max_open_files = n;
        self
    }

    pub fn time_provider(mut self, provider: &'static dyn TimeProvider) -> Self {
        self.time_provider = provider;
        self
    }
}

impl Default for MountOptions {
    fn default() -> Self { Self::new() }
}
