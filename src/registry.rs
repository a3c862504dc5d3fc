//! The client registry: a fixed-capacity table of connection slots.
//!
//! Sized at [`MAX_CLIENTS`] with no growth, mirroring the original's static
//! `clientarray`. Socket I/O itself is out of scope here — slots carry an
//! opaque [`ConnId`] assigned by the transport layer, so this module (and
//! everything built on it) can be exercised without a real socket.

/// Fixed capacity of the registry; never grows.
pub const MAX_CLIENTS: usize = 30;
/// Maximum canonical name length, body + `.` + suffix.
pub const NAME_SIZE: usize = 12;

/// Opaque handle identifying a live connection, assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(pub u64);

/// Index into the registry's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u8);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Replaces the original's `-1/0/1` tri-state `playing` int with a proper
/// sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    NotPlaying,
    Alive,
    Eliminated,
}

/// Per-connection state. Transient fields (`fighting`, `offer_sent`, `sent`)
/// are scratch space the engine and broadcaster reset each time they're
/// done with them; they are not meaningful between ticks.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub used: bool,
    pub joined: bool,
    pub playing: PlayState,
    pub fighting: bool,
    pub name: String,
    pub socket: Option<ConnId>,
    pub residual: Vec<u8>,
    pub strikes: u32,
    pub resync: bool,
    pub troops: u32,
    pub offers: u32,
    pub offer_sent: bool,
    pub sent: bool,
}

impl Slot {
    fn reset(&mut self) {
        *self = Slot::default();
    }
}

/// Fixed-capacity table of [`MAX_CLIENTS`] slots.
pub struct ClientRegistry {
    slots: [Slot; MAX_CLIENTS],
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self { slots: std::array::from_fn(|_| Slot::default()) }
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the first free slot and marks it used, returning its id.
    /// Returns `None` when all [`MAX_CLIENTS`] slots are occupied — the
    /// caller should respond with `snovac` and close the connection.
    pub fn allocate(&mut self) -> Option<SlotId> {
        let idx = self.slots.iter().position(|s| !s.used)?;
        self.slots[idx].used = true;
        Some(SlotId(idx as u8))
    }

    /// Associates a freshly allocated slot with its connection handle.
    pub fn bind(&mut self, id: SlotId, conn: ConnId) {
        self.slots[id.index()].socket = Some(conn);
    }

    /// Resets a slot to its default (unused) state, preserving its position
    /// in the table so the `SlotId` space stays stable.
    pub fn clear(&mut self, id: SlotId) {
        self.slots[id.index()].reset();
    }

    pub fn get(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id.index()]
    }

    pub fn find_by_socket(&self, conn: ConnId) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.used && s.socket == Some(conn))
            .map(|i| SlotId(i as u8))
    }

    /// Case-sensitive lookup by exact stored name, used both for normal
    /// canonical-name resolution and for the raw-token recipient match
    /// the wire codec requires.
    pub fn find_by_name(&self, name: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.joined && s.name == name)
            .map(|i| SlotId(i as u8))
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    pub fn num_users(&self) -> usize {
        self.slots.iter().filter(|s| s.joined).count()
    }

    /// All slot ids, ascending — the iteration order every phase uses.
    pub fn ids(&self) -> impl Iterator<Item = SlotId> {
        (0..MAX_CLIENTS as u8).map(SlotId)
    }

    pub fn joined_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.ids().filter(move |&id| self.get(id).joined)
    }

    pub fn playing_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.ids().filter(move |&id| self.get(id).playing == PlayState::Alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_fills_then_exhausts() {
        let mut reg = ClientRegistry::new();
        let mut ids = Vec::new();
        for _ in 0..MAX_CLIENTS {
            ids.push(reg.allocate().expect("capacity available"));
        }
        assert!(reg.allocate().is_none());
        assert_eq!(ids.first(), Some(&SlotId(0)));
        assert_eq!(ids.last(), Some(&SlotId((MAX_CLIENTS - 1) as u8)));
    }

    #[test]
    fn clear_frees_slot_for_reuse() {
        let mut reg = ClientRegistry::new();
        let id = reg.allocate().unwrap();
        reg.bind(id, ConnId(1));
        reg.get_mut(id).joined = true;
        reg.get_mut(id).name = "BOB".into();
        reg.clear(id);
        assert!(!reg.get(id).joined);
        assert_eq!(reg.get(id).name, "");
        assert_eq!(reg.allocate(), Some(id));
    }

    #[test]
    fn find_by_name_is_case_sensitive_exact_match() {
        let mut reg = ClientRegistry::new();
        let id = reg.allocate().unwrap();
        reg.get_mut(id).joined = true;
        reg.get_mut(id).name = "BOB".into();
        assert_eq!(reg.find_by_name("BOB"), Some(id));
        assert_eq!(reg.find_by_name("bob"), None);
    }

    #[test]
    fn num_users_counts_only_joined() {
        let mut reg = ClientRegistry::new();
        let a = reg.allocate().unwrap();
        let _b = reg.allocate().unwrap();
        reg.get_mut(a).joined = true;
        assert_eq!(reg.num_users(), 1);
    }
}
