//! The broadcaster: queues outbound bytes per slot and builds the
//! `sstat`/`sjoin` list payloads.
//!
//! Outbound I/O is kept out of this module on purpose — `Outbox` just
//! accumulates `(slot, bytes)` pairs and slots to close, which the
//! transport layer drains after each engine step. That keeps the engine a
//! plain value a test can drive without a socket in sight, per the
//! "single `Engine` value" restructuring the write-up calls for.

use crate::registry::{ClientRegistry, SlotId};

/// Accumulates the effects of one engine step: bytes queued for delivery,
/// and connections that should be closed once those bytes are flushed.
#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<(SlotId, Vec<u8>)>,
    pub closes: Vec<SlotId>,
}

impl Outbox {
    pub fn send(&mut self, id: SlotId, bytes: Vec<u8>) {
        self.messages.push((id, bytes));
    }

    pub fn send_to<I: IntoIterator<Item = SlotId>>(&mut self, ids: I, bytes: &[u8]) {
        for id in ids {
            self.messages.push((id, bytes.to_vec()));
        }
    }

    pub fn close(&mut self, id: SlotId) {
        self.closes.push(id);
    }
}

/// Attempts delivery to `id`; on a reported transport failure, clears the
/// slot and — if it had joined — rebroadcasts `sstat` to the remaining
/// joined slots and reports that a drop happened so the engine can react
/// (e.g. advance past a cursor that pointed at the dropped slot).
///
/// In this actor-based design the "write failed" signal arrives asynchronously
/// from the transport layer as a closed-connection event; this function is
/// what the engine calls once it learns of that failure, so the handling is
/// identical whether the peer closed the socket or a write errored.
pub fn handle_disconnect(registry: &mut ClientRegistry, outbox: &mut Outbox, id: SlotId) -> bool {
    let was_joined = registry.get(id).joined;
    registry.clear(id);
    if was_joined {
        broadcast_sstat(registry, outbox);
    }
    was_joined
}

/// `name,strikes,troops` triples, comma-joined, ordered by slot index.
pub fn build_user_list(registry: &ClientRegistry) -> String {
    registry
        .joined_ids()
        .map(|id| {
            let slot = registry.get(id);
            format!("{},{},{}", slot.name, slot.strikes, slot.troops)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Comma-joined names only, used inside `sjoin`.
pub fn build_user_list_names(registry: &ClientRegistry) -> String {
    registry.joined_ids().map(|id| registry.get(id).name.clone()).collect::<Vec<_>>().join(",")
}

pub fn broadcast_sstat(registry: &ClientRegistry, outbox: &mut Outbox) {
    let triples = build_user_list(registry);
    let bytes = crate::codec::sstat(&triples);
    outbox.send_to(registry.joined_ids().collect::<Vec<_>>(), &bytes);
}
