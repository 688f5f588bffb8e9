//! Placement policies deciding which disks may serve merge I/O.

use std::{collections::HashMap, time::SystemTime};

use thiserror::Error;

use crate::part::DiskId;

/// Errors raised when a placement policy cannot answer a query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// The disk is not part of the policy; the policy is misconfigured.
    #[error("disk `{disk}` is not part of storage policy `{policy}`")]
    UnknownDisk {
        /// Policy queried.
        policy: String,
        /// Disk that was not found.
        disk: DiskId,
    },
    /// The policy has no volumes at all.
    #[error("storage policy `{0}` has no volumes")]
    EmptyPolicy(String),
}

/// Read-only query for merge eligibility of a disk at a point in time.
pub trait PlacementPolicy: Send + Sync {
    /// Returns whether parts on `disk` may be read for a merge at `now`.
    fn is_eligible(&self, disk: &DiskId, now: SystemTime) -> Result<bool, PlacementError>;
}

/// Physical disk entry of a storage policy.
#[derive(Clone, Debug)]
pub struct Disk {
    id: DiskId,
    read_only: bool,
    decommission_at: Option<SystemTime>,
}

impl Disk {
    /// Writable disk with no scheduled decommission.
    pub fn new(id: impl Into<DiskId>) -> Self {
        Self {
            id: id.into(),
            read_only: false,
            decommission_at: None,
        }
    }

    /// Mark the disk read-only.
    pub fn read_only(self, read_only: bool) -> Self {
        Self { read_only, ..self }
    }

    /// Stop serving merges from `at` onwards.
    pub fn decommission_at(self, at: SystemTime) -> Self {
        Self {
            decommission_at: Some(at),
            ..self
        }
    }

    fn serves_merges_at(&self, now: SystemTime) -> bool {
        if self.read_only {
            return false;
        }
        match self.decommission_at {
            Some(at) => now < at,
            None => true,
        }
    }
}

/// Ordered group of disks sharing merge settings.
#[derive(Clone, Debug, Default)]
pub struct Volume {
    disks: Vec<Disk>,
    prefer_not_to_merge: bool,
}

impl Volume {
    /// Empty volume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a disk.
    pub fn disk(mut self, disk: Disk) -> Self {
        self.disks.push(disk);
        self
    }

    /// Exclude every disk of this volume from merges.
    pub fn prefer_not_to_merge(self, prefer_not_to_merge: bool) -> Self {
        Self {
            prefer_not_to_merge,
            ..self
        }
    }
}

/// Named set of volumes; the concrete placement policy of a table.
#[derive(Clone, Debug)]
pub struct StoragePolicy {
    name: String,
    volumes: Vec<Volume>,
    // (volume index, disk index)
    index: HashMap<DiskId, (usize, usize)>,
}

impl StoragePolicy {
    /// Empty policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volumes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Single-volume policy over `disks`, all merge-eligible.
    pub fn single_volume<I, D>(name: impl Into<String>, disks: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<DiskId>,
    {
        let volume = disks
            .into_iter()
            .fold(Volume::new(), |volume, id| volume.disk(Disk::new(id)));
        Self::new(name).volume(volume)
    }

    /// Append a volume. A disk listed twice resolves to its first occurrence.
    pub fn volume(mut self, volume: Volume) -> Self {
        let volume_idx = self.volumes.len();
        for (disk_idx, disk) in volume.disks.iter().enumerate() {
            self.index
                .entry(disk.id.clone())
                .or_insert((volume_idx, disk_idx));
        }
        self.volumes.push(volume);
        self
    }
}

impl PlacementPolicy for StoragePolicy {
    fn is_eligible(&self, disk: &DiskId, now: SystemTime) -> Result<bool, PlacementError> {
        if self.volumes.is_empty() {
            return Err(PlacementError::EmptyPolicy(self.name.clone()));
        }
        let &(volume_idx, disk_idx) =
            self.index
                .get(disk)
                .ok_or_else(|| PlacementError::UnknownDisk {
                    policy: self.name.clone(),
                    disk: disk.clone(),
                })?;
        let volume = &self.volumes[volume_idx];
        Ok(!volume.prefer_not_to_merge && volume.disks[disk_idx].serves_merges_at(now))
    }
}
