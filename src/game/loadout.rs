//! Per-participant weapon state: secondary cooldowns, ammo, item cooldowns

use std::collections::BTreeMap;

use rand::Rng;

use super::weapon::{Shot, WeaponKind};
use super::world::{EntityView, Environment};

/// Cells in the secondary cooldown bar
pub const COOLDOWN_BAR_CELLS: u32 = 10;

/// One weapon in a loadout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadoutSlot {
    pub weapon: WeaponKind,
    secondary_cooldown: u32,
    clip: u32,
    /// Rounds not yet loaded; unlimited when `None`
    reserve: Option<u32>,
}

impl LoadoutSlot {
    fn new(weapon: WeaponKind) -> Self {
        let mut slot = Self {
            weapon,
            secondary_cooldown: 0,
            clip: 0,
            reserve: None,
        };
        slot.refill();
        slot
    }

    fn refill(&mut self) {
        let stats = self.weapon.stats();
        let capacity = stats.clip_size.or(stats.ammo_size);
        match capacity {
            Some(clip) => {
                let total = stats.ammo_size.unwrap_or(clip);
                self.clip = clip.min(total);
                self.reserve = stats.ammo_size.map(|ammo| ammo - self.clip);
            }
            None => {
                self.clip = 0;
                self.reserve = None;
            }
        }
        self.secondary_cooldown = 0;
    }

    /// Rounds left in the clip, `None` for weapons without ammo
    pub fn clip(&self) -> Option<u32> {
        self.has_ammo().then_some(self.clip)
    }

    pub fn reserve(&self) -> Option<u32> {
        self.reserve
    }

    pub fn secondary_cooldown(&self) -> u32 {
        self.secondary_cooldown
    }

    fn has_ammo(&self) -> bool {
        let stats = self.weapon.stats();
        stats.clip_size.is_some() || stats.ammo_size.is_some()
    }

    /// Consume a round. Returns the cooldown to apply, or `None` when out of ammo.
    fn take_round(&mut self) -> Option<u32> {
        let stats = self.weapon.stats();
        if !self.has_ammo() {
            return Some(stats.primary_cooldown);
        }
        if self.clip == 0 {
            return None;
        }

        self.clip -= 1;
        if self.clip > 0 {
            return Some(stats.primary_cooldown);
        }

        let clip_size = stats.clip_size.or(stats.ammo_size).unwrap_or(0);
        let loaded = match self.reserve.as_mut() {
            Some(reserve) => {
                let loaded = (*reserve).min(clip_size);
                *reserve -= loaded;
                loaded
            }
            None => clip_size,
        };
        self.clip = loaded;

        if loaded > 0 {
            Some(stats.primary_cooldown.max(stats.reload_cooldown.unwrap_or(0)))
        } else {
            Some(stats.primary_cooldown)
        }
    }

    fn tick(&mut self) {
        self.secondary_cooldown = self.secondary_cooldown.saturating_sub(1);
    }
}

/// Secondary cooldown bar of the held weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownBar {
    pub remaining: u32,
    pub total: u32,
    pub ready_cells: u32,
}

/// Ordered weapon set held by a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    slots: Vec<LoadoutSlot>,
}

impl Default for Loadout {
    fn default() -> Self {
        Self::new(&WeaponKind::LOADOUT)
    }
}

impl Loadout {
    pub fn new(weapons: &[WeaponKind]) -> Self {
        Self {
            slots: weapons.iter().copied().map(LoadoutSlot::new).collect(),
        }
    }

    /// Item types to hand out, in slot order
    pub fn items(&self) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| slot.weapon.item().to_string())
            .collect()
    }

    /// Slot for the held item, if it is one of ours
    pub fn get(&self, held: Option<&str>) -> Option<&LoadoutSlot> {
        let held = held?;
        self.slots.iter().find(|slot| slot.weapon.matches(held))
    }

    fn get_mut(&mut self, held: Option<&str>) -> Option<&mut LoadoutSlot> {
        let held = held?;
        self.slots.iter_mut().find(|slot| slot.weapon.matches(held))
    }

    /// Restore ammo and clear secondary cooldowns
    pub fn refill(&mut self) {
        self.slots.iter_mut().for_each(LoadoutSlot::refill);
    }

    pub fn tick(&mut self) {
        self.slots.iter_mut().for_each(LoadoutSlot::tick);
    }

    /// Fire the held weapon's primary action.
    ///
    /// Returns the primary cooldown to apply together with the shot, or `None`
    /// when the held item is not a weapon or the weapon is out of ammo.
    pub fn on_primary<E, R>(
        &mut self,
        env: &mut E,
        rng: &mut R,
        shooter: &EntityView,
    ) -> Option<(u32, Shot)>
    where
        E: Environment + ?Sized,
        R: Rng,
    {
        let slot = self.get_mut(shooter.main_hand.as_deref())?;
        let cooldown = slot.take_round()?;
        let shot = slot.weapon.on_primary(env, rng, shooter);
        Some((cooldown, shot))
    }

    /// Fire the held weapon's secondary ability if it has one and it is ready
    pub fn on_secondary<E: Environment + ?Sized>(&mut self, env: &mut E, shooter: &EntityView) -> bool {
        let Some(slot) = self.get_mut(shooter.main_hand.as_deref()) else {
            return false;
        };
        let Some(cooldown) = slot.weapon.stats().secondary_cooldown else {
            return false;
        };
        if slot.secondary_cooldown > 0 {
            return false;
        }
        if slot.weapon.on_secondary(env, shooter) {
            slot.secondary_cooldown = cooldown;
            return true;
        }
        false
    }

    /// Cooldown bar of the held weapon's secondary ability
    pub fn cooldown_bar(&self, held: Option<&str>) -> Option<CooldownBar> {
        let slot = self.get(held)?;
        let total = slot.weapon.stats().secondary_cooldown?;
        let remaining = slot.secondary_cooldown;
        let spent = (remaining * COOLDOWN_BAR_CELLS) / total.max(1);
        Some(CooldownBar {
            remaining,
            total,
            ready_cells: COOLDOWN_BAR_CELLS - spent.min(COOLDOWN_BAR_CELLS),
        })
    }
}

/// Primary-fire cooldowns per item type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCooldowns {
    remaining: BTreeMap<String, u32>,
}

impl ItemCooldowns {
    pub fn is_cooling(&self, item: &str) -> bool {
        self.remaining.get(item).is_some_and(|ticks| *ticks > 0)
    }

    pub fn set(&mut self, item: &str, ticks: u32) {
        if ticks > 0 {
            self.remaining.insert(item.to_string(), ticks);
        }
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    pub fn tick(&mut self) {
        self.remaining.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::{SimWorld, WorldCommand};
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn holding(kind: WeaponKind) -> EntityView {
        EntityView::avatar(Uuid::new_v4(), Vec3::ZERO).holding(kind.item())
    }

    #[test]
    fn rocket_clip_reloads_from_reserve_and_runs_dry() {
        let mut world = SimWorld::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut loadout = Loadout::default();
        let shooter = holding(WeaponKind::RocketLauncher);

        let mut fired = 0;
        while loadout.on_primary(&mut world, &mut rng, &shooter).is_some() {
            fired += 1;
            assert!(fired <= 20, "fired more rounds than carried");
        }
        assert_eq!(fired, 20);

        let slot = loadout.get(shooter.main_hand.as_deref()).expect("slot");
        assert_eq!(slot.clip(), Some(0));
        assert_eq!(slot.reserve(), Some(0));

        loadout.refill();
        let slot = loadout.get(shooter.main_hand.as_deref()).expect("slot");
        assert_eq!(slot.clip(), Some(4));
        assert_eq!(slot.reserve(), Some(16));
    }

    #[test]
    fn secondary_respects_its_cooldown() {
        let mut world = SimWorld::new();
        let mut loadout = Loadout::default();
        let shooter = holding(WeaponKind::AdvancedShooter);

        assert!(loadout.on_secondary(&mut world, &shooter));
        assert!(!loadout.on_secondary(&mut world, &shooter));

        for _ in 0..80 {
            loadout.tick();
        }
        assert!(loadout.on_secondary(&mut world, &shooter));
        let dashes = world
            .commands()
            .iter()
            .filter(|c| matches!(c, WorldCommand::SetVelocity { .. }))
            .count();
        assert_eq!(dashes, 2);
    }

    #[test]
    fn cooldown_bar_fills_as_the_ability_recovers() {
        let mut world = SimWorld::new();
        let mut loadout = Loadout::default();
        let shooter = holding(WeaponKind::AdvancedShooter);
        let held = shooter.main_hand.as_deref();

        assert_eq!(loadout.cooldown_bar(held).map(|b| b.ready_cells), Some(10));
        loadout.on_secondary(&mut world, &shooter);
        assert_eq!(loadout.cooldown_bar(held).map(|b| b.ready_cells), Some(0));
        for _ in 0..40 {
            loadout.tick();
        }
        assert_eq!(loadout.cooldown_bar(held).map(|b| b.ready_cells), Some(5));
        assert!(loadout.cooldown_bar(Some(WeaponKind::RocketLauncher.item())).is_none());
    }

    #[test]
    fn unknown_items_do_not_fire() {
        let mut world = SimWorld::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut loadout = Loadout::default();
        let shooter = EntityView::avatar(Uuid::new_v4(), Vec3::ZERO).holding("bread");
        assert!(loadout.on_primary(&mut world, &mut rng, &shooter).is_none());
        assert!(world.commands().is_empty());
    }

    #[test]
    fn item_cooldowns_expire() {
        let mut cooldowns = ItemCooldowns::default();
        cooldowns.set("iron_hoe", 2);
        assert!(cooldowns.is_cooling("iron_hoe"));
        cooldowns.tick();
        assert!(cooldowns.is_cooling("iron_hoe"));
        cooldowns.tick();
        assert!(!cooldowns.is_cooling("iron_hoe"));
        assert!(!cooldowns.is_cooling("iron_axe"));
    }
}
