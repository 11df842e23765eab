use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use anyhow::{Context, bail};

use serfnet::{DirtyMap, GameStateSource, SyncEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Resource {
    Planks = 0,
    Stones = 1,
    Fish = 2,
    Wheat = 3,
    Coal = 4,
    Iron = 5,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Planks,
        Resource::Stones,
        Resource::Fish,
        Resource::Wheat,
        Resource::Coal,
        Resource::Iron,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Stock of one warehouse. Entries are tracked so only changed warehouses
/// are pushed on a sync tick.
pub struct Inventory {
    id: u32,
    stock: DirtyMap<Resource, u32>,
}

impl Inventory {
    fn new(id: u32) -> Self {
        let stock = DirtyMap::new();
        stock.initialize(Resource::ALL.iter().map(|&r| (r, 8)));
        Self { id, stock }
    }

    pub fn count(&self, resource: Resource) -> u32 {
        self.stock.get(&resource).unwrap_or(0)
    }
}

impl SyncEntity for Inventory {
    fn sync_id(&self) -> u32 {
        self.id
    }

    fn is_dirty(&self) -> bool {
        self.stock.is_dirty()
    }

    /// `[resource u8, count u32 LE]` per resource, ordered by resource.
    fn encode_state(&self) -> Vec<u8> {
        let mut entries: Vec<_> = self.stock.snapshot().into_iter().collect();
        entries.sort();
        let mut out = Vec::with_capacity(entries.len() * 5);
        for (resource, count) in entries {
            out.push(resource as u8);
            out.extend_from_slice(&count.to_le_bytes());
        }
        out
    }

    fn take_dirty(&self) -> bool {
        self.stock.take_dirty()
    }
}

/// Tiny deterministic economy standing in for the real game simulation.
pub struct Economy {
    time: AtomicU32,
    seed: AtomicU64,
    inventories: Vec<Inventory>,
}

impl Economy {
    pub fn new(inventories: u32, seed: u64) -> Self {
        Self {
            time: AtomicU32::new(0),
            seed: AtomicU64::new(seed.max(1)),
            inventories: (0..inventories).map(Inventory::new).collect(),
        }
    }

    pub fn inventory(&self, id: u32) -> Option<&Inventory> {
        self.inventories.iter().find(|i| i.id == id)
    }

    /// One simulation step: a random warehouse produces or consumes a good.
    pub fn step(&self) {
        self.time.fetch_add(1, Ordering::SeqCst);
        if self.inventories.is_empty() {
            return;
        }

        let roll = self.next_random();
        // Most steps leave everything untouched so in-sync ticks happen.
        if roll % 4 != 0 {
            return;
        }
        let inventory = &self.inventories[(roll >> 8) as usize % self.inventories.len()];
        let resource = Resource::ALL[(roll >> 16) as usize % Resource::ALL.len()];
        let produce = (roll >> 24) % 3 != 0;

        inventory.stock.update(resource, |count| {
            if produce {
                count.saturating_add(1)
            } else {
                count.saturating_sub(1)
            }
        });
    }

    /// Applies a transfer `[from, to, resource, amount]` sent by a player.
    pub fn apply_action(&self, player_index: u8, payload: &[u8]) -> anyhow::Result<()> {
        let [from, to, resource, amount] = payload else {
            bail!("player {} sent a {}-byte action", player_index, payload.len());
        };
        let resource = Resource::from_u8(*resource)
            .with_context(|| format!("unknown resource {}", resource))?;
        let source = self
            .inventory(*from as u32)
            .with_context(|| format!("no inventory {}", from))?;
        let target = self
            .inventory(*to as u32)
            .with_context(|| format!("no inventory {}", to))?;

        let moved = (*amount as u32).min(source.count(resource));
        source.stock.update(resource, |count| count - moved);
        target.stock.update(resource, |count| count.saturating_add(moved));

        log::debug!(
            "Player {} moved {} {:?} from {} to {}",
            player_index,
            moved,
            resource,
            from,
            to
        );
        Ok(())
    }

    fn next_random(&self) -> u64 {
        // xorshift64
        let mut x = self.seed.load(Ordering::Relaxed);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.seed.store(x, Ordering::Relaxed);
        x
    }
}

impl GameStateSource for Economy {
    fn game_time(&self) -> u32 {
        self.time.load(Ordering::SeqCst)
    }

    fn visit_entities(&self, visitor: &mut dyn FnMut(&dyn SyncEntity)) {
        for inventory in &self.inventories {
            visitor(inventory);
        }
    }
}
