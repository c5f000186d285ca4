// emberbot-core/src/models/collection.rs

use rand::Rng;

/// Number of reward slots per collection.
pub const REWARD_SLOTS: u8 = 8;

/// One (user, collection type) row. Slots only ever flip false→true, except
/// through an explicit reset that zeroes the whole row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRow {
    pub user_id: String,
    pub username: String,
    pub collection_type: String,
    pub reward1: bool,
    pub reward2: bool,
    pub reward3: bool,
    pub reward4: bool,
    pub reward5: bool,
    pub reward6: bool,
    pub reward7: bool,
    pub reward8: bool,
}

impl CollectionRow {
    pub fn has_slot(&self, slot: u8) -> bool {
        match slot {
            1 => self.reward1,
            2 => self.reward2,
            3 => self.reward3,
            4 => self.reward4,
            5 => self.reward5,
            6 => self.reward6,
            7 => self.reward7,
            8 => self.reward8,
            _ => false,
        }
    }

    /// Slot numbers currently owned, in ascending order.
    pub fn owned_slots(&self) -> Vec<u8> {
        (1..=REWARD_SLOTS).filter(|s| self.has_slot(*s)).collect()
    }
}

/// Result of recording one reward draw.
#[derive(Debug, Clone)]
pub struct RewardOutcome {
    /// True if the slot was not owned before this draw.
    pub is_new: bool,
    /// The full owned-slot list after the draw.
    pub owned: Vec<u8>,
}

/// Collections completed by at least one user, with the users that hold them.
#[derive(Debug, Clone)]
pub struct CompletedCollection {
    pub collection_type: String,
    pub usernames: Vec<String>,
}

/// A reward slot and its draw weight.
#[derive(Debug, Clone)]
pub struct RewardWeight {
    pub slot: u8,
    pub weight: u32,
}

impl RewardWeight {
    pub fn new(slot: u8, weight: u32) -> Self {
        Self { slot, weight }
    }
}

/// Draw a slot with exactly proportional odds: each slot appears `weight`
/// times in the pool, so weight 12 vs weight 1 is 12:1 exactly. A zero
/// weight can never be drawn; an empty pool falls back to slot 1.
pub fn draw_weighted_reward<R: Rng + ?Sized>(weights: &[RewardWeight], rng: &mut R) -> u8 {
    let mut pool = Vec::new();
    for w in weights {
        for _ in 0..w.weight {
            pool.push(w.slot);
        }
    }
    if pool.is_empty() {
        return 1;
    }
    pool[rng.random_range(0..pool.len())]
}
