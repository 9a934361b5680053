use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::types::EntityKey;

/// Simulation-wide mutable state, owned by the host and lent to the integrator.
///
/// Holds what would otherwise be process globals: the entity id counter, the random
/// source and the simulated clock. Seeding it makes a run reproducible.
#[derive(Debug)]
pub struct SimContext {
    next_id: u64,
    rng: StdRng,
    clock: f64,
    frame: u64,
    removals: Vec<EntityKey>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            next_id: 1,
            rng: StdRng::seed_from_u64(seed),
            clock: 0.0,
            frame: 0,
            removals: Vec::new(),
        }
    }

    /// Monotonic id for a new entity.
    pub fn next_entity_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Simulated seconds since creation.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Queue `key` for removal from its layer. Applied right after the current
    /// callback returns; safe to call for the calling entity itself.
    pub fn remove_entity(&mut self, key: EntityKey) {
        if !self.removals.contains(&key) {
            self.removals.push(key);
        }
    }

    pub(crate) fn take_removals(&mut self) -> Vec<EntityKey> {
        std::mem::take(&mut self.removals)
    }

    pub(crate) fn has_removals(&self) -> bool {
        !self.removals.is_empty()
    }

    pub(crate) fn advance(&mut self, elapsed: f32) {
        self.clock += elapsed as f64;
        self.frame += 1;
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new(0)
    }
}
