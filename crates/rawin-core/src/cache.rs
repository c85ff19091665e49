//! Device metadata cache.
//!
//! Readers on any thread see a consistent snapshot without locking. Misses are
//! resolved through the [`DeviceDirectory`] and stored, including the empty
//! value, so a device whose metadata cannot be read is only queried once.

use crate::device::{DeviceHandle, DeviceMetadata};
use crate::platform::DeviceDirectory;
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

type Entries = HashMap<DeviceHandle, Arc<DeviceMetadata>>;

#[derive(Default)]
pub struct DeviceMetadataCache {
    entries: ArcSwap<Entries>,
}

impl DeviceMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: DeviceHandle) -> Option<Arc<DeviceMetadata>> {
        self.entries.load().get(&handle).cloned()
    }

    /// Look up `handle`, resolving and storing it on a miss.
    ///
    /// Concurrent misses for the same handle may both resolve; the last store
    /// wins, which is harmless since both resolved the same device.
    pub fn resolve<D>(&self, handle: DeviceHandle, directory: &D) -> Arc<DeviceMetadata>
    where
        D: DeviceDirectory + ?Sized,
    {
        if let Some(metadata) = self.get(handle) {
            return metadata;
        }
        let metadata = Arc::new(directory.resolve_metadata(handle));
        if metadata.is_empty() {
            debug!(%handle, "No metadata available for device");
        }
        self.insert(handle, Arc::clone(&metadata));
        metadata
    }

    pub fn insert(&self, handle: DeviceHandle, metadata: Arc<DeviceMetadata>) {
        self.entries.rcu(|entries| {
            let mut next = Entries::clone(entries);
            next.insert(handle, Arc::clone(&metadata));
            next
        });
    }

    /// Resolve every attached device up front. Returns the number of entries
    /// added.
    pub fn prime<D>(&self, directory: &D) -> usize
    where
        D: DeviceDirectory + ?Sized,
    {
        let mut added = 0;
        for handle in directory.attached_devices() {
            if self.get(handle).is_none() {
                self.resolve(handle, directory);
                added += 1;
            }
        }
        info!(devices = added, "Device metadata cache primed");
        added
    }

    /// Drop entries for devices no longer in `attached`. Returns the removed
    /// handles.
    pub fn invalidate_removed(&self, attached: &HashSet<DeviceHandle>) -> Vec<DeviceHandle> {
        let previous = self.entries.rcu(|entries| {
            entries
                .iter()
                .filter(|(handle, _)| attached.contains(*handle))
                .map(|(handle, metadata)| (*handle, Arc::clone(metadata)))
                .collect::<Entries>()
        });

        let mut removed: Vec<DeviceHandle> = previous
            .keys()
            .filter(|handle| !attached.contains(*handle))
            .copied()
            .collect();
        removed.sort();
        if !removed.is_empty() {
            info!(count = removed.len(), "Evicted metadata of removed devices");
        }
        removed
    }

    pub fn remove(&self, handle: DeviceHandle) -> bool {
        let previous = self.entries.rcu(|entries| {
            let mut next = Entries::clone(entries);
            next.remove(&handle);
            next
        });
        previous.contains_key(&handle)
    }

    pub fn contains(&self, handle: DeviceHandle) -> bool {
        self.entries.load().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Cached handles, sorted.
    pub fn handles(&self) -> Vec<DeviceHandle> {
        let mut handles: Vec<_> = self.entries.load().keys().copied().collect();
        handles.sort();
        handles
    }
}
