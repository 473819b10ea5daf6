//! Structure-of-arrays storage for units and players.
//!
//! Unit slots are recycled through a free list; the generation column is
//! bumped on reuse so two handles with the same index but different
//! generations never both validate. Accessors take the silent-failure
//! contract of the simulation loop: an invalid handle yields
//! `None`/default, never a panic.

use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::attributes::{Attribute, AttributeSet};
use crate::handle::{Generation, PlayerHandle, UnitHandle, UnitIndex};
use crate::visual::{Visual, VisualId};

/// Parallel-array storage for every simulated unit and player.
pub struct EntityDatabase {
    // Unit columns, all indexed by UnitIndex.
    attributes: Vec<AttributeSet>,
    locations: Vec<Vec3>,
    rotations: Vec<f32>,
    owners: Vec<PlayerHandle>,
    generations: Vec<Generation>,
    active: Vec<bool>,
    visuals: Vec<Option<Box<dyn Visual>>>,
    free_list: Vec<UnitIndex>,
    /// Reverse lookup so an external visual can find its unit.
    visual_units: FxHashMap<VisualId, UnitHandle>,

    // Player columns. No free list: players deactivate but are not reused.
    player_attributes: Vec<AttributeSet>,
    player_active: Vec<bool>,
}

impl Default for EntityDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            locations: Vec::new(),
            rotations: Vec::new(),
            owners: Vec::new(),
            generations: Vec::new(),
            active: Vec::new(),
            visuals: Vec::new(),
            free_list: Vec::new(),
            visual_units: FxHashMap::default(),
            player_attributes: Vec::new(),
            player_active: Vec::new(),
        }
    }

    /// Allocate a unit, reusing a freed slot when one is available.
    ///
    /// Reuse bumps the slot's generation, invalidating any handle that
    /// pointed at the previous occupant.
    pub fn alloc_unit(&mut self, owner: PlayerHandle, position: Vec3, yaw: f32) -> UnitHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = index as usize;
            let generation = self.generations[slot].next();
            self.generations[slot] = generation;
            self.attributes[slot] = AttributeSet::new();
            self.locations[slot] = position;
            self.rotations[slot] = yaw;
            self.owners[slot] = owner;
            self.active[slot] = true;
            self.visuals[slot] = None;
            UnitHandle::new(index, generation)
        } else {
            let index = self.generations.len() as UnitIndex;
            let generation = Generation::new();
            self.attributes.push(AttributeSet::new());
            self.locations.push(position);
            self.rotations.push(yaw);
            self.owners.push(owner);
            self.generations.push(generation);
            self.active.push(true);
            self.visuals.push(None);
            UnitHandle::new(index, generation)
        }
    }

    /// Free a unit, despawning its visual and recycling the slot.
    ///
    /// No-op on an invalid handle.
    pub fn free_unit(&mut self, handle: UnitHandle) {
        if !self.is_valid(handle) {
            debug!(%handle, "free_unit on invalid handle");
            return;
        }
        let slot = handle.index() as usize;
        self.active[slot] = false;
        if let Some(mut visual) = self.visuals[slot].take() {
            self.visual_units.remove(&visual.id());
            visual.despawn();
        }
        self.free_list.push(handle.index());
    }

    /// Check whether a handle still refers to a live unit.
    #[must_use]
    pub fn is_valid(&self, handle: UnitHandle) -> bool {
        let slot = handle.index() as usize;
        slot < self.generations.len()
            && self.generations[slot] == handle.generation()
            && self.active[slot]
    }

    /// Number of live units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Read a unit's attributes.
    #[must_use]
    pub fn attrs(&self, handle: UnitHandle) -> Option<&AttributeSet> {
        self.is_valid(handle)
            .then(|| &self.attributes[handle.index() as usize])
    }

    /// Mutate a unit's attributes.
    pub fn attrs_mut(&mut self, handle: UnitHandle) -> Option<&mut AttributeSet> {
        self.is_valid(handle)
            .then(|| &mut self.attributes[handle.index() as usize])
    }

    /// Add a delta to one attribute. Health clamps into `[0, MaxHealth]`.
    /// No-op on an invalid handle.
    pub fn modify_attribute(&mut self, handle: UnitHandle, attribute: Attribute, delta: f32) {
        if let Some(attrs) = self.attrs_mut(handle) {
            attrs.modify(attribute, delta);
        }
    }

    /// Read a unit's position. Defaults to the origin on an invalid handle.
    #[must_use]
    pub fn location(&self, handle: UnitHandle) -> Vec3 {
        if self.is_valid(handle) {
            self.locations[handle.index() as usize]
        } else {
            Vec3::ZERO
        }
    }

    /// Write a unit's position. No-op on an invalid handle.
    pub fn set_location(&mut self, handle: UnitHandle, position: Vec3) {
        if self.is_valid(handle) {
            self.locations[handle.index() as usize] = position;
        }
    }

    /// Read a unit's yaw rotation. Defaults to 0 on an invalid handle.
    #[must_use]
    pub fn rotation(&self, handle: UnitHandle) -> f32 {
        if self.is_valid(handle) {
            self.rotations[handle.index() as usize]
        } else {
            0.0
        }
    }

    /// Write a unit's yaw rotation. No-op on an invalid handle.
    pub fn set_rotation(&mut self, handle: UnitHandle, yaw: f32) {
        if self.is_valid(handle) {
            self.rotations[handle.index() as usize] = yaw;
        }
    }

    /// The player that owns a unit.
    #[must_use]
    pub fn owner(&self, handle: UnitHandle) -> Option<PlayerHandle> {
        self.is_valid(handle)
            .then(|| self.owners[handle.index() as usize])
    }

    /// Bind an external visual actor to a unit, replacing (and
    /// despawning) any previous one. No-op on an invalid handle.
    pub fn attach_visual(&mut self, handle: UnitHandle, visual: Box<dyn Visual>) {
        if !self.is_valid(handle) {
            debug!(%handle, "attach_visual on invalid handle");
            return;
        }
        let slot = handle.index() as usize;
        self.visual_units.insert(visual.id(), handle);
        if let Some(mut previous) = self.visuals[slot].replace(visual) {
            self.visual_units.remove(&previous.id());
            previous.despawn();
        }
    }

    /// Reverse lookup: the unit an external visual belongs to.
    #[must_use]
    pub fn visual_unit(&self, id: VisualId) -> Option<UnitHandle> {
        self.visual_units.get(&id).copied()
    }

    /// Pull the unit's logical position from its visual transform.
    ///
    /// One-way sync (visual to logic) used while a flow is blocked on the
    /// unit and an external mover is driving the actor. Returns the
    /// position that is now current, or `None` for an invalid handle.
    pub fn sync_from_visual(&mut self, handle: UnitHandle) -> Option<Vec3> {
        if !self.is_valid(handle) {
            return None;
        }
        let slot = handle.index() as usize;
        if let Some(position) = self.visuals[slot].as_ref().and_then(|v| v.world_position()) {
            self.locations[slot] = position;
        }
        Some(self.locations[slot])
    }

    /// Allocate a player slot. Player handles are never recycled.
    pub fn alloc_player(&mut self) -> PlayerHandle {
        let index = self.player_attributes.len() as u32;
        self.player_attributes.push(AttributeSet::new());
        self.player_active.push(true);
        PlayerHandle::new(index)
    }

    /// Deactivate a player. The slot stays allocated.
    pub fn deactivate_player(&mut self, handle: PlayerHandle) {
        let slot = handle.index() as usize;
        if slot < self.player_active.len() {
            self.player_active[slot] = false;
        }
    }

    /// Check whether a player is active.
    #[must_use]
    pub fn is_player_valid(&self, handle: PlayerHandle) -> bool {
        let slot = handle.index() as usize;
        slot < self.player_active.len() && self.player_active[slot]
    }

    /// Read a player's attributes.
    #[must_use]
    pub fn player_attrs(&self, handle: PlayerHandle) -> Option<&AttributeSet> {
        self.is_player_valid(handle)
            .then(|| &self.player_attributes[handle.index() as usize])
    }

    /// Mutate a player's attributes.
    pub fn player_attrs_mut(&mut self, handle: PlayerHandle) -> Option<&mut AttributeSet> {
        self.is_player_valid(handle)
            .then(|| &mut self.player_attributes[handle.index() as usize])
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_alloc_free_validity() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        let unit = db.alloc_unit(player, Vec3::new(1.0, 2.0, 3.0), 0.5);

        assert!(db.is_valid(unit));
        assert_eq!(db.location(unit), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(db.rotation(unit), 0.5);
        assert_eq!(db.owner(unit), Some(player));

        db.free_unit(unit);
        assert!(!db.is_valid(unit));
        assert_eq!(db.location(unit), Vec3::ZERO);
        assert!(db.owner(unit).is_none());
    }

    #[test]
    fn test_stale_handle_never_revalidates() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        let first = db.alloc_unit(player, Vec3::ZERO, 0.0);
        db.free_unit(first);

        // Reuse takes the same slot with a bumped generation.
        let second = db.alloc_unit(player, Vec3::ONE, 0.0);
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(db.is_valid(second));
        assert!(!db.is_valid(first));
    }

    #[test]
    fn test_reused_slot_resets_state() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        let first = db.alloc_unit(player, Vec3::ZERO, 0.0);
        db.attrs_mut(first)
            .unwrap()
            .set(Attribute::AttackPower, 50.0);
        db.free_unit(first);

        let second = db.alloc_unit(player, Vec3::ZERO, 0.0);
        assert_eq!(db.attrs(second).unwrap().get(Attribute::AttackPower), 0.0);
    }

    struct TestVisual {
        id: VisualId,
        position: Vec3,
        despawned: Rc<Cell<bool>>,
    }

    impl Visual for TestVisual {
        fn id(&self) -> VisualId {
            self.id
        }

        fn world_position(&self) -> Option<Vec3> {
            Some(self.position)
        }

        fn despawn(&mut self) {
            self.despawned.set(true);
        }
    }

    #[test]
    fn test_free_despawns_visual() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        let unit = db.alloc_unit(player, Vec3::ZERO, 0.0);

        let despawned = Rc::new(Cell::new(false));
        db.attach_visual(
            unit,
            Box::new(TestVisual {
                id: VisualId(7),
                position: Vec3::ZERO,
                despawned: Rc::clone(&despawned),
            }),
        );
        assert_eq!(db.visual_unit(VisualId(7)), Some(unit));

        db.free_unit(unit);
        assert!(despawned.get());
        assert!(db.visual_unit(VisualId(7)).is_none());
    }

    #[test]
    fn test_sync_from_visual() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        let unit = db.alloc_unit(player, Vec3::ZERO, 0.0);

        db.attach_visual(
            unit,
            Box::new(TestVisual {
                id: VisualId(1),
                position: Vec3::new(10.0, 0.0, -4.0),
                despawned: Rc::new(Cell::new(false)),
            }),
        );

        let synced = db.sync_from_visual(unit).unwrap();
        assert_eq!(synced, Vec3::new(10.0, 0.0, -4.0));
        assert_eq!(db.location(unit), Vec3::new(10.0, 0.0, -4.0));
    }

    #[test]
    fn test_player_deactivation() {
        let mut db = EntityDatabase::new();
        let player = db.alloc_player();
        assert!(db.is_player_valid(player));

        db.player_attrs_mut(player)
            .unwrap()
            .set(Attribute::MaxMana, 200.0);
        db.deactivate_player(player);
        assert!(!db.is_player_valid(player));
        assert!(db.player_attrs(player).is_none());

        // No reuse: a later player gets a fresh index.
        let next = db.alloc_player();
        assert_ne!(next.index(), player.index());
    }
}
