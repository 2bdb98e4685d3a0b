//! Process-wide record of surfaces that have a messenger.
//!
//! A surface delivers messages to exactly one listener, so binding two
//! messengers to the same surface would silently starve one of them.

use std::collections::HashSet;
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use tether_core::SurfaceId;
use tracing::debug;

use crate::error::{MessengerError, MessengerResult};

static BOUND_SURFACES: LazyLock<Mutex<HashSet<SurfaceId>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

fn bound() -> MutexGuard<'static, HashSet<SurfaceId>> {
    BOUND_SURFACES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Claim on a surface. Released on drop.
#[derive(Debug)]
pub struct SurfaceBinding {
    id: SurfaceId,
}

impl SurfaceBinding {
    /// The bound surface.
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        self.id
    }
}

impl Drop for SurfaceBinding {
    fn drop(&mut self) {
        bound().remove(&self.id);
        debug!(surface = %self.id, "Released script surface");
    }
}

/// Claim `id` for a new messenger.
///
/// # Errors
///
/// Returns [`MessengerError::SurfaceInUse`] if the surface is already bound.
pub fn bind(id: SurfaceId) -> MessengerResult<SurfaceBinding> {
    if !bound().insert(id) {
        return Err(MessengerError::SurfaceInUse(id));
    }
    debug!(surface = %id, "Bound script surface");
    Ok(SurfaceBinding { id })
}

/// Whether a messenger currently holds `id`.
#[must_use]
pub fn is_bound(id: SurfaceId) -> bool {
    bound().contains(&id)
}
