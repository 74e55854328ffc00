//! Spawn point selection
//!
//! Recently used spawns are kept in a small ring so consecutive respawns
//! spread over the arena, and crowded spawns are avoided.

use std::collections::VecDeque;

use glam::Vec3;
use rand::Rng;
use uuid::Uuid;

use super::geometry::Aabb;
use super::world::{EntityView, Environment, WorldCommand};
use crate::arena::SpawnPoint;

/// Half extents of the area counted as "near" a spawn
pub const CROWD_RADIUS: Vec3 = Vec3::new(16.0, 5.0, 16.0);

/// Bounded ring of recently selected spawn indices
#[derive(Debug, Clone)]
pub struct SpawnCache {
    capacity: usize,
    recent: VecDeque<usize>,
}

impl SpawnCache {
    /// Cache sized to half the spawn count, at least one
    pub fn for_spawns(count: usize) -> Self {
        let capacity = (count / 2).max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, index: usize) -> bool {
        self.recent.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Record a selection, evicting the oldest entry when full
    pub fn push(&mut self, index: usize) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(index);
    }

    /// Random start followed by a bounded linear probe for an uncached index.
    /// `count` must be non-zero.
    fn roll<R: Rng>(&mut self, rng: &mut R, count: usize) -> usize {
        let mut index = rng.gen_range(0..count);
        let mut tries = 0;
        while self.contains(index) && tries <= self.capacity {
            index = (index + 1) % count;
            tries += 1;
        }
        self.push(index);
        index
    }
}

/// Chooses spawn points for combatants
#[derive(Debug, Clone)]
pub struct SpawnSelector {
    spawns: Vec<SpawnPoint>,
    cache: SpawnCache,
}

impl SpawnSelector {
    /// `None` when there is nothing to spawn at
    pub fn new(spawns: Vec<SpawnPoint>) -> Option<Self> {
        if spawns.is_empty() {
            return None;
        }
        let cache = SpawnCache::for_spawns(spawns.len());
        Some(Self { spawns, cache })
    }

    pub fn spawns(&self) -> &[SpawnPoint] {
        &self.spawns
    }

    pub fn cache(&self) -> &SpawnCache {
        &self.cache
    }

    /// Pick the uncached spawn with the fewest avatars nearby.
    ///
    /// `roster_size` is the threshold a spawn must stay under; `counts` says
    /// whether a nearby entity is a present avatar. Ties go to the lowest index.
    pub fn select<E, R, F>(&mut self, env: &E, rng: &mut R, roster_size: usize, counts: F) -> usize
    where
        E: Environment + ?Sized,
        R: Rng,
        F: Fn(&EntityView) -> bool,
    {
        let mut best: Option<usize> = None;
        let mut lowest = roster_size;

        for (index, spawn) in self.spawns.iter().enumerate() {
            if self.cache.contains(index) {
                continue;
            }
            let area = Aabb::from_center(spawn.position, CROWD_RADIUS);
            let nearby = env
                .entities_within(&area)
                .iter()
                .filter(|e| area.contains(e.position) && counts(e))
                .count();
            if nearby < lowest {
                lowest = nearby;
                best = Some(index);
            }
        }

        match best {
            Some(index) => {
                self.cache.push(index);
                index
            }
            None => self.cache.roll(rng, self.spawns.len()),
        }
    }

    /// Select a spawn and teleport `avatar` there
    pub fn spawn_avatar<E, R, F>(
        &mut self,
        env: &mut E,
        rng: &mut R,
        avatar: Uuid,
        roster_size: usize,
        counts: F,
    ) -> usize
    where
        E: Environment + ?Sized,
        R: Rng,
        F: Fn(&EntityView) -> bool,
    {
        let index = self.select(env, rng, roster_size, |e| e.id != avatar && counts(e));
        let spawn = &self.spawns[index];
        env.apply(WorldCommand::Teleport {
            entity: avatar,
            position: spawn.position,
            yaw: spawn.yaw,
            pitch: 0.0,
        });
        index
    }
}

/// Place an avatar at a random spot on the floor of the waiting area
pub fn spawn_waiting<E, R>(env: &mut E, rng: &mut R, area: &Aabb, avatar: Uuid)
where
    E: Environment + ?Sized,
    R: Rng,
{
    let x = if area.max.x > area.min.x {
        rng.gen_range(area.min.x..area.max.x)
    } else {
        area.min.x
    };
    let z = if area.max.z > area.min.z {
        rng.gen_range(area.min.z..area.max.z)
    } else {
        area.min.z
    };
    env.apply(WorldCommand::Teleport {
        entity: avatar,
        position: Vec3::new(x, area.min.y + 0.5, z),
        yaw: 0.0,
        pitch: 0.0,
    });
}
