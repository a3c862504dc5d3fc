//! The strike manager: every protocol-discipline penalty funnels through
//! [`strike`], which is the single place that escalates to a connection
//! drop on the third offense.

use crate::broadcast::{broadcast_sstat, Outbox};
use crate::codec;
use crate::registry::{ClientRegistry, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeReason {
    Malformed,
    BadInt,
    Timeout,
    TooLong,
}

impl StrikeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StrikeReason::Malformed => "malformed",
            StrikeReason::BadInt => "badint",
            StrikeReason::Timeout => "timeout",
            StrikeReason::TooLong => "toolong",
        }
    }

    /// Whether this reason puts the parser into resync and empties the
    /// residual buffer (`timeout` does neither — it isn't a parse fault).
    fn triggers_resync(self) -> bool {
        !matches!(self, StrikeReason::Timeout)
    }
}

/// Whether the connection was dropped as a consequence of this strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeOutcome {
    pub dropped: bool,
}

/// Issues one strike to `id`: increments the count, notifies the client,
/// and — on the third strike — closes the connection, clears the slot, and
/// (if it had joined) rebroadcasts `sstat`.
pub fn strike(
    registry: &mut ClientRegistry,
    outbox: &mut Outbox,
    id: SlotId,
    reason: StrikeReason,
) -> StrikeOutcome {
    let slot = registry.get_mut(id);
    slot.strikes += 1;
    let n = slot.strikes;
    outbox.send(id, codec::strike_message(n, reason.as_str()));

    if reason.triggers_resync() {
        let slot = registry.get_mut(id);
        slot.resync = true;
        slot.residual.clear();
    }

    if registry.get(id).strikes >= 3 {
        let was_joined = registry.get(id).joined;
        outbox.close(id);
        registry.clear(id);
        if was_joined {
            broadcast_sstat(registry, outbox);
        }
        StrikeOutcome { dropped: true }
    } else {
        StrikeOutcome { dropped: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_strike_drops_and_clears() {
        let mut reg = ClientRegistry::new();
        let id = reg.allocate().unwrap();
        reg.get_mut(id).joined = true;
        reg.get_mut(id).name = "BOB".into();
        let mut outbox = Outbox::default();

        let o1 = strike(&mut reg, &mut outbox, id, StrikeReason::Malformed);
        assert!(!o1.dropped);
        assert_eq!(reg.get(id).strikes, 1);
        assert!(reg.get(id).resync);

        let o2 = strike(&mut reg, &mut outbox, id, StrikeReason::BadInt);
        assert!(!o2.dropped);

        let o3 = strike(&mut reg, &mut outbox, id, StrikeReason::TooLong);
        assert!(o3.dropped);
        assert!(!reg.get(id).joined);
        assert!(outbox.closes.contains(&id));
    }

    #[test]
    fn timeout_does_not_set_resync() {
        let mut reg = ClientRegistry::new();
        let id = reg.allocate().unwrap();
        let mut outbox = Outbox::default();
        strike(&mut reg, &mut outbox, id, StrikeReason::Timeout);
        assert!(!reg.get(id).resync);
    }
}
