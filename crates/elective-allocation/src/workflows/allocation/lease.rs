use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::domain::PackageId;

/// Registry of packages that currently have an allocation run in flight.
#[derive(Debug, Clone, Default)]
pub struct PackageLeases {
    held: Arc<Mutex<HashSet<PackageId>>>,
}

impl PackageLeases {
    /// Claims the package, failing immediately if another run holds it.
    pub fn acquire(&self, package_id: &PackageId) -> Result<PackageLease, LeaseError> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(package_id.clone()) {
            return Err(LeaseError::Held(package_id.clone()));
        }

        Ok(PackageLease {
            package_id: package_id.clone(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self, package_id: &PackageId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(package_id)
    }
}

/// Exclusive claim on a package, released on drop.
#[derive(Debug)]
pub struct PackageLease {
    package_id: PackageId,
    held: Arc<Mutex<HashSet<PackageId>>>,
}

impl PackageLease {
    pub fn package_id(&self) -> &PackageId {
        &self.package_id
    }
}

impl Drop for PackageLease {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.package_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseError {
    #[error("an allocation run is already in progress for package {0}")]
    Held(PackageId),
}
