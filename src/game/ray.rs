//! Ray casts through entities, bounded by world geometry
//!
//! Two flavours share the same broad phase: [`raycast_entities`] hits every
//! contact along the ray that is not behind geometry, [`raycast_entity`]
//! returns only the nearest one.

use glam::Vec3;
use uuid::Uuid;

use super::geometry::Aabb;
use super::world::{Environment, EntityView};

/// Outcome of a multi-target ray cast
#[derive(Debug, Clone, PartialEq)]
pub struct RayHits {
    /// Every entity hit, in broad-phase order
    pub hits: Vec<Uuid>,
    /// Distance to the farthest hit, or the full range on a clean miss
    pub distance: f32,
}

impl RayHits {
    pub fn any(&self) -> bool {
        !self.hits.is_empty()
    }

    /// Distance with the sign carrying the hit flag: negative when anything was hit
    pub fn signed_distance(&self) -> f32 {
        if self.any() {
            -self.distance
        } else {
            self.distance
        }
    }
}

/// Nearest entity contact along a ray
#[derive(Debug, Clone, PartialEq)]
pub struct RayContact {
    pub entity: Uuid,
    pub point: Vec3,
}

struct Ray {
    origin: Vec3,
    target: Vec3,
    broad_phase: Aabb,
}

impl Ray {
    fn from_source(source: &EntityView, range: f32, margin: f32) -> Self {
        let origin = source.eye_position();
        let delta = source.look() * range;
        let test_margin = margin.max(1.0);
        Self {
            origin,
            target: origin + delta,
            broad_phase: source.bounding_box().stretch(delta).expand(test_margin),
        }
    }

    fn candidates<E: Environment + ?Sized>(&self, env: &E, source: &EntityView) -> Vec<EntityView> {
        env.entities_within(&self.broad_phase)
            .into_iter()
            .filter(|e| e.id != source.id && e.is_targetable())
            .collect()
    }
}

fn target_box(entity: &EntityView, margin: f32) -> Aabb {
    entity.bounding_box().expand(entity.targeting_margin.max(margin))
}

/// Cast a ray from the source's eyes and hit every entity along it that is
/// not hidden behind world geometry.
///
/// The geometry test runs at most once, and only after the first contact is
/// found. Distances compare the source position against entity positions and
/// the geometry hit point, squared.
pub fn raycast_entities<E: Environment + ?Sized>(
    env: &E,
    source: &EntityView,
    range: f32,
    margin: f32,
) -> RayHits {
    let ray = Ray::from_source(source, range, margin);

    // None until computed; Some(None) when the ray reaches full range.
    let mut occlusion: Option<Option<f32>> = None;
    let mut farthest: f32 = -1.0;
    let mut hits = Vec::new();

    for entity in ray.candidates(env, source) {
        let bounds = target_box(&entity, margin);
        if !bounds.contains(ray.origin) && bounds.raycast(ray.origin, ray.target).is_none() {
            continue;
        }

        let blocked_at = *occlusion.get_or_insert_with(|| {
            env.raycast_geometry(ray.origin, ray.target)
                .map(|point| source.position.distance_squared(point))
        });

        let entity_distance = source.position.distance_squared(entity.position);
        if let Some(block_distance) = blocked_at {
            if entity_distance > block_distance {
                continue;
            }
        }

        hits.push(entity.id);
        farthest = farthest.max(entity_distance);
    }

    let distance = if farthest < 0.0 { range } else { farthest.sqrt() };
    RayHits { hits, distance }
}

/// Cast a ray from the source's eyes and return the closest entity contact
/// that is not hidden behind world geometry.
///
/// An entity whose target box already contains the eye position wins
/// immediately.
pub fn raycast_entity<E: Environment + ?Sized>(
    env: &E,
    source: &EntityView,
    range: f32,
    margin: f32,
) -> Option<RayContact> {
    let ray = Ray::from_source(source, range, margin);

    let mut min_distance = range * range;
    let mut nearest: Option<RayContact> = None;

    for entity in ray.candidates(env, source) {
        let bounds = target_box(&entity, margin);
        let trace = bounds.raycast(ray.origin, ray.target);

        if bounds.contains(ray.origin) {
            return Some(RayContact {
                entity: entity.id,
                point: trace.unwrap_or(ray.origin),
            });
        }

        if let Some(point) = trace {
            let distance = ray.origin.distance_squared(point);
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(RayContact {
                    entity: entity.id,
                    point,
                });
            }
        }
    }

    let contact = nearest?;
    match env.raycast_geometry(ray.origin, ray.target) {
        Some(block) if ray.origin.distance_squared(block) < min_distance => None,
        _ => Some(contact),
    }
}

/// Segment for the shot trace effect: from just below the eyes, clipped at geometry
pub fn trace_segment<E: Environment + ?Sized>(env: &E, source: &EntityView, range: f32) -> (Vec3, Vec3) {
    let origin = source.eye_position() - Vec3::Y * 0.5;
    let target = origin + source.look() * range;
    let end = env.raycast_geometry(origin, target).unwrap_or(target);
    (origin, end)
}
