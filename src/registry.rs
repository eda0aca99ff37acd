use crate::types::{DeviceIdentity, Extrinsics};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Shared calibration and discovery state for all sessions of a process.
///
/// Calibration discovered from one stream must be visible to code handling
/// another stream of the same physical device, so this lives outside any one
/// session: construct it once, share it via `Arc`, and pass it to every
/// [`crate::Session`]. Reads are concurrent; decode application takes the
/// write lock for its duration.
#[derive(Debug, Default)]
pub struct CalibrationRegistry {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// (source sensor key, target sensor index) -> transform.
    extrinsics: HashMap<(i32, i32), Extrinsics>,
    identities: HashMap<Url, DeviceIdentity>,
    /// Raw session descriptions by camera URL, so re-discovery of an
    /// already-seen camera can skip the network exchange.
    descriptions: HashMap<Url, String>,
    compression_enabled: bool,
}

impl CalibrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transform from the sensor with `source_key` to target sensor index
    /// `target`. `None` means no calibration was ever decoded for the pair;
    /// a stored all-NaN value means a record existed but was unusable.
    pub fn extrinsics(&self, source_key: i32, target: i32) -> Option<Extrinsics> {
        self.read().extrinsics.get(&(source_key, target)).copied()
    }

    pub fn set_extrinsics(&self, source_key: i32, target: i32, extrinsics: Extrinsics) {
        self.write()
            .extrinsics
            .insert((source_key, target), extrinsics);
    }

    pub fn identity(&self, url: &Url) -> Option<DeviceIdentity> {
        self.read().identities.get(url).cloned()
    }

    pub fn set_identity(&self, url: &Url, identity: DeviceIdentity) {
        self.write().identities.insert(url.clone(), identity);
    }

    pub fn cached_description(&self, url: &Url) -> Option<String> {
        self.read().descriptions.get(url).cloned()
    }

    pub fn cache_description(&self, url: &Url, text: &str) {
        self.write()
            .descriptions
            .insert(url.clone(), text.to_string());
    }

    /// Whether the camera compresses its media payloads, per the last
    /// decoded description.
    pub fn compression_enabled(&self) -> bool {
        self.read().compression_enabled
    }

    pub fn set_compression_enabled(&self, enabled: bool) {
        self.write().compression_enabled = enabled;
    }
}
