//! Capacity bookkeeping shared by every backend: monotonic buffer growth
//! and the required-capacity computation driven off settings + flame shape.

use std::collections::HashMap;

use flame_core::{Flame, Settings};

use crate::role::BufferRole;

/// Required element counts for one flame under one settings value. Backends
/// translate these into byte sizes for their own buffer representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredCapacities {
    pub work_items: u64,
    pub transform_count: u64,
    pub variation_count: u64,
    pub pixel_count: u64,
}

impl RequiredCapacities {
    pub fn for_flame(settings: &Settings, flame: &Flame, work_items: u64) -> Self {
        let transform_count = flame.xforms.len() as u64 + flame.final_xform.is_some() as u64;
        let variation_count = flame
            .xforms
            .iter()
            .chain(flame.final_xform.iter())
            .map(|x| x.variations.len() as u64)
            .sum();
        RequiredCapacities {
            work_items,
            transform_count: transform_count.max(1),
            variation_count: variation_count.max(1),
            pixel_count: settings.pixel_count(),
        }
    }

    /// Required element count for a given buffer role.
    pub fn for_role(&self, role: BufferRole) -> u64 {
        match role {
            BufferRole::RngState | BufferRole::Point | BufferRole::Color => self.work_items,
            BufferRole::TransformWeight
            | BufferRole::TransformMix
            | BufferRole::TransformPalette
            | BufferRole::TransformAffine => self.transform_count,
            BufferRole::VariationCoefficient | BufferRole::VariationParameter => {
                self.variation_count
            }
            BufferRole::FlameView | BufferRole::FlameColoration | BufferRole::FlameBackground => 1,
            BufferRole::Histogram => self.pixel_count * 4,
            BufferRole::PreRaster => self.pixel_count,
            BufferRole::FinalRaster => self.pixel_count,
            BufferRole::HitCounters => 2,
        }
    }
}

/// Per-role recorded buffer capacities. Never shrinks within a session.
#[derive(Debug, Default)]
pub struct DeviceResources {
    capacities: HashMap<BufferRole, u64>,
}

impl DeviceResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self, role: BufferRole) -> u64 {
        self.capacities.get(&role).copied().unwrap_or(0)
    }

    /// Record a grow to at least `required` elements for `role`. Returns
    /// `true` iff the recorded capacity actually increased (a grow
    /// happened and kernel args bound to `role` must be re-bound).
    pub fn grow(&mut self, role: BufferRole, required: u64) -> bool {
        let current = self.capacity(role);
        if required > current {
            tracing::debug!(?role, from = current, to = required, "growing device buffer");
            self.capacities.insert(role, required);
            true
        } else {
            false
        }
    }

    /// Drop every recorded capacity, as `freeResources` requires: a fresh
    /// session must re-allocate from zero.
    pub fn clear(&mut self) {
        tracing::debug!("releasing all device buffer capacities");
        self.capacities.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_is_monotonic() {
        let mut res = DeviceResources::new();
        assert!(res.grow(BufferRole::Histogram, 100));
        assert_eq!(res.capacity(BufferRole::Histogram), 100);
        assert!(!res.grow(BufferRole::Histogram, 50));
        assert_eq!(res.capacity(BufferRole::Histogram), 100);
        assert!(res.grow(BufferRole::Histogram, 200));
        assert_eq!(res.capacity(BufferRole::Histogram), 200);
    }

    #[test]
    fn clear_resets_for_new_session() {
        let mut res = DeviceResources::new();
        res.grow(BufferRole::Point, 64);
        res.clear();
        assert_eq!(res.capacity(BufferRole::Point), 0);
    }
}
