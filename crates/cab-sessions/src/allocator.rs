use serde::{Deserialize, Serialize};

/// Chooses the id for a new session.
pub trait SessionAllocator {
    /// Pick an id for a lease on `slot`. `in_use` reports ids held by any slot right now.
    /// Ids never have bit 7 set; that space belongs to consists.
    fn allocate(&mut self, slot: usize, in_use: &dyn Fn(u8) -> bool) -> Option<u8>;

    fn name(&self) -> &'static str;
}

/// Session id = the slot's position in the controller table.
///
/// Matches what existing CBUS DC controller firmware puts on the wire, at the price of
/// colliding with identical nodes sharing the bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotIndexAllocator;

impl SessionAllocator for SlotIndexAllocator {
    fn allocate(&mut self, slot: usize, _in_use: &dyn Fn(u8) -> bool) -> Option<u8> {
        u8::try_from(slot).ok().filter(|s| *s < 0x80)
    }

    fn name(&self) -> &'static str {
        "slot_index"
    }
}

/// Hands out ids 1..=127 round-robin, skipping ids still held.
#[derive(Debug, Clone, Copy)]
pub struct RotatingAllocator {
    next: u8,
}

impl RotatingAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Start handing out ids at `first` (wrapped into 1..=127).
    pub fn starting_at(first: u8) -> Self {
        Self {
            next: (first & 0x7F).max(1),
        }
    }
}

impl Default for RotatingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAllocator for RotatingAllocator {
    fn allocate(&mut self, _slot: usize, in_use: &dyn Fn(u8) -> bool) -> Option<u8> {
        for _ in 0..0x7F {
            let candidate = self.next;
            self.next = if candidate >= 0x7F { 1 } else { candidate + 1 };
            if !in_use(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "rotating"
    }
}

/// Configured choice of [`SessionAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIdScheme {
    SlotIndex,
    #[default]
    Rotating,
}

impl SessionIdScheme {
    pub fn allocator(self) -> Box<dyn SessionAllocator> {
        match self {
            SessionIdScheme::SlotIndex => Box::new(SlotIndexAllocator),
            SessionIdScheme::Rotating => Box::new(RotatingAllocator::new()),
        }
    }
}
