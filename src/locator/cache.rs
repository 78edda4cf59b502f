use crate::host::{Host, ObjectHandle, TypeHandle, Vec3};

/// Nearest cached instance to a reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearest {
    pub object: ObjectHandle,
    pub position: Vec3,
    pub distance: f32,
}

/// Live instances of the target type, refreshed at most once per cooldown.
#[derive(Debug)]
pub struct InstanceCache {
    instances: Vec<ObjectHandle>,
    last_scan: Option<f64>,
    cooldown: f64,
}

impl InstanceCache {
    pub fn new(cooldown: f64) -> Self {
        Self {
            instances: Vec::new(),
            last_scan: None,
            cooldown,
        }
    }

    /// Re-enumerates instances of `ty` unless the previous rebuild is younger than the cooldown
    /// and `force` is off. Destroyed objects are dropped here, not on read. Returns whether an
    /// enumeration happened.
    pub fn rebuild(&mut self, host: &dyn Host, ty: &TypeHandle, now: f64, force: bool) -> bool {
        if !force {
            if let Some(last) = self.last_scan {
                if now - last < self.cooldown {
                    return false;
                }
            }
        }
        self.instances = host
            .live_instances(ty)
            .into_iter()
            .filter(|o| host.is_alive(o))
            .collect();
        self.last_scan = Some(now);
        true
    }

    /// Linear scan for the smallest Euclidean distance to `reference`. Ties keep the instance
    /// that comes first in enumeration order. Instances without a readable position, or whose
    /// distance is not finite, are skipped.
    pub fn find_nearest(&self, host: &dyn Host, reference: Vec3) -> Option<Nearest> {
        let mut best: Option<Nearest> = None;
        for object in &self.instances {
            let Some(position) = host.position(object) else {
                continue;
            };
            let distance = reference.distance(&position);
            if !distance.is_finite() {
                continue;
            }
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(Nearest {
                    object: *object,
                    position,
                    distance,
                });
            }
        }
        best
    }

    pub fn instances(&self) -> &[ObjectHandle] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn last_scan(&self) -> Option<f64> {
        self.last_scan
    }
}
