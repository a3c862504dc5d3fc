//! The game engine: the Lobby → Plan → Offer → Action → Battle phase state
//! machine, turn ordering, per-move timeouts, and dispatch of prompts.
//!
//! `Engine` is a plain value — nothing here touches a socket — so scenario
//! tests can drive it directly with parsed wire bytes and a virtual clock,
//! per the "single `Engine` value owned by the event loop" restructuring
//! the original design notes call for.

use std::time::Duration;

use crate::battle::{self, AttackGrid, BattleGrid, SquareGrid};
use crate::broadcast::{self, Outbox};
use crate::clock::Clock;
use crate::codec::{self, ClientMessage, ParseOutcome};
use crate::config::Config;
use crate::name::{self, NameError};
use crate::registry::{ClientRegistry, ConnId, PlayState, SlotId, MAX_CLIENTS};
use crate::rng::{AnyPicker, DiceRoller};
use crate::strike::{self, StrikeReason};

/// Round numbers wrap back to `1` once they exceed this.
pub const MAX_ROUND: u32 = 99_999;
/// Any parsed numeric field above this is a `badint` strike.
pub const MAX_INT_FIELD: u32 = 99_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Plan,
    Offer,
    Action,
}

/// `offergrid[ally][proposer]`: set when `proposer` has asked `ally` to
/// jointly attack `target` this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OfferCell {
    pub used: bool,
    pub target: Option<SlotId>,
}

pub type OfferGrid = SquareGrid<OfferCell>;

fn next_slot(id: SlotId) -> SlotId {
    SlotId(id.0 + 1)
}

/// Parses a round-number field the way the original's `strtol(fieldstart,
/// NULL, 10)` does: skip leading ASCII whitespace, accept one optional
/// sign, then consume decimal digits and stop at the first non-digit —
/// `"1x"` and `" 5"` both parse successfully, unlike a strict `str::parse`.
/// Returns `None` only when no digits were present at all.
fn parse_leading_int(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let negative = match bytes.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    let magnitude: i64 = s[digits_start..i].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// The phase state machine plus the grids and registry it drives. Owns
/// every piece of process-wide mutable state the original server kept as
/// globals (component C, the offer/attack/battle grids, and the phase
/// cursors), collapsed into one value per the design notes.
pub struct Engine {
    pub registry: ClientRegistry,
    offergrid: OfferGrid,
    attackgrid: AttackGrid,
    battlegrid: BattleGrid,
    phase: Phase,
    round_num: u32,
    waiting_for: Option<SlotId>,
    response_to: Option<SlotId>,
    timer: Option<std::time::Instant>,
    lobby_timer: Option<std::time::Instant>,
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            registry: ClientRegistry::new(),
            offergrid: OfferGrid::new(MAX_CLIENTS),
            attackgrid: AttackGrid::new(MAX_CLIENTS),
            battlegrid: BattleGrid::new(MAX_CLIENTS),
            phase: Phase::Lobby,
            round_num: 1,
            waiting_for: None,
            response_to: None,
            timer: None,
            lobby_timer: None,
            config,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_num(&self) -> u32 {
        self.round_num
    }

    /// Allocates a registry slot for a freshly accepted connection.
    /// `None` means the registry is full — the caller sends `snovac` and
    /// closes without ever binding a socket.
    pub fn accept(&mut self) -> Option<SlotId> {
        self.registry.allocate()
    }

    pub fn bind(&mut self, id: SlotId, conn: ConnId) {
        self.registry.bind(id, conn);
    }

    /// Handles a peer close or write failure: clears the slot and, if it
    /// had joined, rebroadcasts `sstat`. The phase cursors need no direct
    /// repair — a cursor pointing at a just-cleared slot sees `playing ==
    /// NotPlaying` on the very next tick and advances past it.
    pub fn on_disconnect(&mut self, id: SlotId, outbox: &mut Outbox) {
        broadcast::handle_disconnect(&mut self.registry, outbox, id);
    }

    /// Feeds newly-read bytes through the printable filter and the
    /// wire parser, dispatching every complete message it yields.
    pub fn on_bytes<R: AnyPicker>(
        &mut self,
        id: SlotId,
        bytes: &[u8],
        outbox: &mut Outbox,
        rng: &mut R,
    ) {
        let filtered = codec::filter_printable(bytes);
        let slot = self.registry.get_mut(id);
        if !slot.used {
            return;
        }
        slot.residual.extend_from_slice(&filtered);
        if slot.resync {
            if !codec::resync(&mut slot.residual) {
                return;
            }
            slot.resync = false;
        }

        loop {
            if !self.registry.get(id).used {
                return;
            }
            let mut residual = std::mem::take(&mut self.registry.get_mut(id).residual);
            match codec::parse_one(&residual) {
                ParseOutcome::Message { message, consumed } => {
                    residual.drain(0..consumed);
                    self.registry.get_mut(id).residual = residual;
                    self.dispatch_message(id, message, outbox, rng);
                }
                ParseOutcome::NeedMore => {
                    self.registry.get_mut(id).residual = residual;
                    break;
                }
                ParseOutcome::Malformed => {
                    self.registry.get_mut(id).residual = residual;
                    strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
                    break;
                }
                ParseOutcome::TooLong => {
                    self.registry.get_mut(id).residual = residual;
                    strike::strike(&mut self.registry, outbox, id, StrikeReason::TooLong);
                    break;
                }
            }
        }
    }

    fn dispatch_message<R: AnyPicker>(
        &mut self,
        id: SlotId,
        message: ClientMessage,
        outbox: &mut Outbox,
        rng: &mut R,
    ) {
        match message {
            ClientMessage::Join { name } => self.handle_join(id, &name, outbox),
            ClientMessage::Stat => self.handle_stat(id, outbox),
            ClientMessage::Chat { recipients, text } => {
                self.handle_chat(id, &recipients, &text, outbox, rng)
            }
        }
    }

    fn handle_join(&mut self, id: SlotId, raw: &str, outbox: &mut Outbox) {
        if self.registry.get(id).joined {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        let registry = &self.registry;
        let assigned = name::assign_unique(raw, |candidate| registry.is_name_taken(candidate));
        match assigned {
            Ok(canon) => {
                {
                    let slot = self.registry.get_mut(id);
                    slot.joined = true;
                    slot.name = canon.clone();
                }
                let namelist = broadcast::build_user_list_names(&self.registry);
                outbox.send(
                    id,
                    codec::sjoin(
                        &canon,
                        &namelist,
                        self.config.min_players,
                        self.config.lobby_time,
                        self.config.timeout,
                    ),
                );
                let triples = broadcast::build_user_list(&self.registry);
                let sstat = codec::sstat(&triples);
                for other in self.registry.joined_ids().collect::<Vec<_>>() {
                    if other != id {
                        outbox.send(other, sstat.clone());
                    }
                }
            }
            Err(NameError::Empty) | Err(NameError::Reserved) => {
                strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            }
        }
    }

    fn handle_stat(&mut self, id: SlotId, outbox: &mut Outbox) {
        if !self.registry.get(id).joined {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        let triples = broadcast::build_user_list(&self.registry);
        outbox.send(id, codec::sstat(&triples));
    }

    fn handle_chat<R: AnyPicker>(
        &mut self,
        id: SlotId,
        recipients: &str,
        text: &str,
        outbox: &mut Outbox,
        rng: &mut R,
    ) {
        if !self.registry.get(id).joined {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        let mut tokens = recipients.split(',');
        let first = tokens.next().unwrap_or("");
        if tokens.next().is_none() {
            // Single-name field: ALL/ANY/SERVER are only recognized when
            // they are the field's sole token, matching the original's
            // `find_name_end` stopping at the first comma before the
            // keyword check runs.
            if first.eq_ignore_ascii_case("ALL") {
                let clean_text = codec::sanitize_chat_text(text);
                self.deliver_all(id, &clean_text, outbox);
                return;
            }
            if first.eq_ignore_ascii_case("ANY") {
                let clean_text = codec::sanitize_chat_text(text);
                self.deliver_any(id, &clean_text, outbox, rng);
                return;
            }
            if first == "SERVER" {
                // Unlike the delivery paths below, the SERVER game-engine
                // command is parsed from the raw text: the original never
                // truncates or strips `(` before dispatching it, only
                // before broadcasting an actual chat.
                self.handle_server_command(id, text, outbox);
                return;
            }
        }
        let clean_text = codec::sanitize_chat_text(text);
        self.deliver_list(id, recipients, &clean_text, outbox);
    }

    fn deliver_all(&mut self, sender: SlotId, text: &str, outbox: &mut Outbox) {
        let sender_name = self.registry.get(sender).name.clone();
        let bytes = codec::schat(&sender_name, text);
        for id in self.registry.joined_ids().collect::<Vec<_>>() {
            outbox.send(id, bytes.clone());
        }
    }

    fn deliver_any<R: AnyPicker>(
        &mut self,
        sender: SlotId,
        text: &str,
        outbox: &mut Outbox,
        rng: &mut R,
    ) {
        let others: Vec<SlotId> =
            self.registry.joined_ids().filter(|&id| id != sender).collect();
        if others.is_empty() {
            return;
        }
        let target = if others.len() == 1 { others[0] } else { others[rng.pick(others.len())] };
        let sender_name = self.registry.get(sender).name.clone();
        outbox.send(target, codec::schat(&sender_name, text));
    }

    /// Delivers to a literal comma-separated name list. Recipients are
    /// matched against the *raw* token, case-sensitively, against each
    /// slot's stored canonical name — not against a re-canonicalized form
    /// of the token, which the original computes but never uses.
    fn deliver_list(&mut self, sender: SlotId, recipients: &str, text: &str, outbox: &mut Outbox) {
        let sender_name = self.registry.get(sender).name.clone();
        let bytes = codec::schat(&sender_name, text);
        let mut strike_sent = false;
        for token in recipients.split(',') {
            match self.registry.find_by_name(token) {
                Some(target_id) => {
                    if !self.registry.get(target_id).sent {
                        outbox.send(target_id, bytes.clone());
                        self.registry.get_mut(target_id).sent = true;
                    } else if !strike_sent {
                        strike::strike(&mut self.registry, outbox, sender, StrikeReason::Malformed);
                        strike_sent = true;
                    }
                }
                None => {
                    if !strike_sent {
                        strike::strike(&mut self.registry, outbox, sender, StrikeReason::Malformed);
                        strike_sent = true;
                    }
                }
            }
        }
        for id in self.registry.joined_ids().collect::<Vec<_>>() {
            self.registry.get_mut(id).sent = false;
        }
    }

    fn handle_server_command(&mut self, id: SlotId, text: &str, outbox: &mut Outbox) {
        let fields: Vec<&str> = text.split(',').collect();
        match self.phase {
            Phase::Plan => self.handle_plan_reply(id, &fields, outbox),
            Phase::Offer => self.handle_offer_reply(id, &fields, outbox),
            Phase::Action => self.handle_action_reply(id, &fields, outbox),
            Phase::Lobby => {
                strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            }
        }
    }

    fn check_round(&self, field: Option<&str>) -> Result<(), StrikeReason> {
        let raw = field.ok_or(StrikeReason::Malformed)?;
        let value = parse_leading_int(raw).ok_or(StrikeReason::Malformed)?;
        if value > MAX_INT_FIELD as i64 {
            return Err(StrikeReason::BadInt);
        }
        if value as u32 != self.round_num {
            return Err(StrikeReason::Malformed);
        }
        Ok(())
    }

    fn handle_plan_reply(&mut self, id: SlotId, fields: &[&str], outbox: &mut Outbox) {
        if self.waiting_for != Some(id) {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        if fields.first() != Some(&"PLAN") {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_plan_turn();
            return;
        }
        if let Err(reason) = self.check_round(fields.get(1).copied()) {
            strike::strike(&mut self.registry, outbox, id, reason);
            self.finish_plan_turn();
            return;
        }
        match fields.get(2).copied() {
            Some("PASS") if fields.len() == 3 => {}
            Some("APPROACH") if fields.len() == 5 => {
                let ally = self.registry.find_by_name(fields[3]);
                let target = self.registry.find_by_name(fields[4]);
                match (ally, target) {
                    (Some(ally), Some(target)) => {
                        // A proposer naming themselves as ally is silently
                        // ignored: no grid update, no strike, still a
                        // valid turn. The proposed target must still name
                        // a real slot either way.
                        if ally != id {
                            self.offergrid.set(
                                ally,
                                id,
                                OfferCell { used: true, target: Some(target) },
                            );
                            self.registry.get_mut(ally).offers += 1;
                        }
                    }
                    _ => {
                        strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
                    }
                }
            }
            _ => {
                strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            }
        }
        self.finish_plan_turn();
    }

    fn finish_plan_turn(&mut self) {
        self.waiting_for = self.waiting_for.map(next_slot);
        self.timer = None;
    }

    fn handle_offer_reply(&mut self, id: SlotId, fields: &[&str], outbox: &mut Outbox) {
        if self.waiting_for != Some(id) {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        let action = fields.first().copied();
        if !matches!(action, Some("ACCEPT") | Some("DECLINE")) {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_offer_turn();
            return;
        }
        if let Err(reason) = self.check_round(fields.get(1).copied()) {
            strike::strike(&mut self.registry, outbox, id, reason);
            self.finish_offer_turn();
            return;
        }
        if fields.len() != 3 {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_offer_turn();
            return;
        }
        let Some(proposer) = self.response_to else {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_offer_turn();
            return;
        };
        if self.registry.get(proposer).name != fields[2] {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_offer_turn();
            return;
        }

        let ally_name = self.registry.get(id).name.clone();
        if action == Some("ACCEPT") {
            if let Some(target) = self.offergrid.get(id, proposer).target {
                self.attackgrid.set(id, target, true);
            }
            outbox.send(
                proposer,
                codec::schat("SERVER", &format!("ACCEPT,{},{}", self.round_num, ally_name)),
            );
        } else {
            outbox.send(
                proposer,
                codec::schat("SERVER", &format!("DECLINE,{},{}", self.round_num, ally_name)),
            );
        }
        self.finish_offer_turn();
    }

    fn finish_offer_turn(&mut self) {
        self.response_to = self.response_to.map(next_slot);
        self.timer = None;
    }

    fn handle_action_reply(&mut self, id: SlotId, fields: &[&str], outbox: &mut Outbox) {
        if self.waiting_for != Some(id) {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            return;
        }
        if fields.first() != Some(&"ACTION") {
            strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            self.finish_action_turn();
            return;
        }
        if let Err(reason) = self.check_round(fields.get(1).copied()) {
            strike::strike(&mut self.registry, outbox, id, reason);
            self.finish_action_turn();
            return;
        }
        match fields.get(2).copied() {
            Some("PASS") if fields.len() == 3 => {}
            Some("ATTACK") if fields.len() == 4 => match self.registry.find_by_name(fields[3]) {
                Some(target) if self.registry.get(target).playing == PlayState::Alive => {
                    if target != id {
                        self.attackgrid.set(id, target, true);
                    }
                }
                _ => {
                    strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
                }
            },
            _ => {
                strike::strike(&mut self.registry, outbox, id, StrikeReason::Malformed);
            }
        }
        self.finish_action_turn();
    }

    fn finish_action_turn(&mut self) {
        self.waiting_for = self.waiting_for.map(next_slot);
        self.timer = None;
    }

    /// Runs exactly one step of phase advancement. Called unconditionally
    /// once per event-loop wakeup, whether or not any socket was ready.
    pub fn tick<C: Clock, R: DiceRoller>(&mut self, outbox: &mut Outbox, clock: &C, rng: &mut R) {
        match self.phase {
            Phase::Lobby => self.tick_lobby(clock),
            Phase::Plan => self.tick_plan(outbox, clock),
            Phase::Offer => self.tick_offer(outbox, clock),
            Phase::Action => self.tick_action(outbox, clock, rng),
        }
    }

    fn tick_lobby<C: Clock>(&mut self, clock: &C) {
        let num_users = self.registry.num_users();
        if num_users < self.config.min_players as usize {
            self.lobby_timer = None;
            return;
        }
        match self.lobby_timer {
            None => self.lobby_timer = Some(clock.now()),
            Some(start) => {
                if clock.now().duration_since(start)
                    >= Duration::from_secs(self.config.lobby_time as u64)
                {
                    for id in self.registry.joined_ids().collect::<Vec<_>>() {
                        let slot = self.registry.get_mut(id);
                        slot.playing = PlayState::Alive;
                        slot.troops = self.config.starting_force;
                    }
                    self.lobby_timer = None;
                    self.phase = Phase::Plan;
                    self.waiting_for = Some(SlotId(0));
                    self.response_to = None;
                }
            }
        }
    }

    fn tick_plan<C: Clock>(&mut self, outbox: &mut Outbox, clock: &C) {
        let cursor = self.waiting_for.expect("waiting_for set on phase entry");
        if cursor.index() >= MAX_CLIENTS {
            self.waiting_for = Some(SlotId(0));
            self.response_to = Some(SlotId(0));
            self.phase = Phase::Offer;
            return;
        }
        if self.registry.get(cursor).playing != PlayState::Alive {
            self.waiting_for = Some(next_slot(cursor));
            return;
        }
        match self.timer {
            None => {
                outbox.send(
                    cursor,
                    codec::schat("SERVER", &format!("PLAN,{}", self.round_num)),
                );
                self.timer = Some(clock.now());
            }
            Some(start) => {
                if clock.now().duration_since(start)
                    >= Duration::from_secs(self.config.timeout as u64)
                {
                    strike::strike(&mut self.registry, outbox, cursor, StrikeReason::Timeout);
                    self.waiting_for = Some(next_slot(cursor));
                    self.timer = None;
                }
            }
        }
    }

    fn tick_offer<C: Clock>(&mut self, outbox: &mut Outbox, clock: &C) {
        let ally = self.waiting_for.expect("waiting_for set on phase entry");
        if ally.index() >= MAX_CLIENTS {
            self.waiting_for = Some(SlotId(0));
            self.response_to = None;
            self.phase = Phase::Action;
            return;
        }
        let proposer = self.response_to.expect("response_to set on phase entry");
        if proposer.index() >= MAX_CLIENTS {
            self.registry.get_mut(ally).offer_sent = false;
            self.waiting_for = Some(next_slot(ally));
            self.response_to = Some(SlotId(0));
            return;
        }
        if self.registry.get(ally).playing != PlayState::Alive {
            // Preserves an original quirk: an ally going inactive mid-scan
            // advances only the outer cursor, leaving `response_to` where
            // it was rather than resetting it to 0.
            self.waiting_for = Some(next_slot(ally));
            return;
        }

        let cell = *self.offergrid.get(ally, proposer);
        if cell.used {
            match self.timer {
                None => {
                    let proposer_name = self.registry.get(proposer).name.clone();
                    let target_name =
                        cell.target.map(|t| self.registry.get(t).name.clone()).unwrap_or_default();
                    let tag = if self.registry.get(ally).offers > 1 { "OFFER" } else { "OFFERL" };
                    outbox.send(
                        ally,
                        codec::schat(
                            "SERVER",
                            &format!("{tag},{},{},{}", self.round_num, proposer_name, target_name),
                        ),
                    );
                    self.registry.get_mut(ally).offer_sent = true;
                    self.registry.get_mut(ally).offers -= 1;
                    self.timer = Some(clock.now());
                }
                Some(start) => {
                    if clock.now().duration_since(start)
                        >= Duration::from_secs(self.config.timeout as u64)
                    {
                        strike::strike(&mut self.registry, outbox, ally, StrikeReason::Timeout);
                        self.response_to = Some(next_slot(proposer));
                        self.timer = None;
                    }
                }
            }
        } else if self.registry.get(ally).offers == 0 && !self.registry.get(ally).offer_sent {
            outbox.send(ally, codec::schat("SERVER", &format!("OFFERL,{}", self.round_num)));
            self.waiting_for = Some(next_slot(ally));
            self.response_to = Some(SlotId(0));
        } else {
            self.response_to = Some(next_slot(proposer));
        }
    }

    fn tick_action<C: Clock, R: DiceRoller>(&mut self, outbox: &mut Outbox, clock: &C, rng: &mut R) {
        let cursor = self.waiting_for.expect("waiting_for set on phase entry");
        if cursor.index() >= MAX_CLIENTS {
            self.run_battle_step(outbox, rng);
            return;
        }
        if self.registry.get(cursor).playing != PlayState::Alive {
            self.waiting_for = Some(next_slot(cursor));
            return;
        }
        match self.timer {
            None => {
                outbox.send(
                    cursor,
                    codec::schat("SERVER", &format!("ACTION,{}", self.round_num)),
                );
                self.timer = Some(clock.now());
            }
            Some(start) => {
                if clock.now().duration_since(start)
                    >= Duration::from_secs(self.config.timeout as u64)
                {
                    strike::strike(&mut self.registry, outbox, cursor, StrikeReason::Timeout);
                    self.waiting_for = Some(next_slot(cursor));
                    self.timer = None;
                }
            }
        }
    }

    /// Notify + Battle step (§4.E): broadcast every declared attack, run
    /// the battle resolver, rebroadcast `sstat`, zero the grids, then
    /// either start the next round or drop back to the lobby.
    fn run_battle_step<R: DiceRoller>(&mut self, outbox: &mut Outbox, rng: &mut R) {
        let ids: Vec<SlotId> = self.registry.ids().collect();
        let joined: Vec<SlotId> = self.registry.joined_ids().collect();
        for &a in &ids {
            for &q in &ids {
                if *self.attackgrid.get(a, q) {
                    let a_name = self.registry.get(a).name.clone();
                    let q_name = self.registry.get(q).name.clone();
                    let bytes = codec::schat(
                        "SERVER",
                        &format!("NOTIFY,{},{},{}", self.round_num, a_name, q_name),
                    );
                    for &u in &joined {
                        outbox.send(u, bytes.clone());
                    }
                }
            }
        }

        let eliminated = battle::resolve(&mut self.registry, &self.attackgrid, &mut self.battlegrid, rng);
        for victim in eliminated {
            battle::award_bounty(
                &mut self.registry,
                &self.attackgrid,
                victim,
                self.config.starting_force,
            );
        }

        broadcast::broadcast_sstat(&self.registry, outbox);

        self.offergrid.clear();
        self.attackgrid.clear();
        self.battlegrid.clear();

        let num_players =
            self.registry.ids().filter(|&id| self.registry.get(id).playing == PlayState::Alive).count();
        if num_players >= 2 {
            self.round_num = if self.round_num >= MAX_ROUND { 1 } else { self.round_num + 1 };
            for id in self.registry.joined_ids().collect::<Vec<_>>() {
                let slot = self.registry.get_mut(id);
                if slot.playing == PlayState::NotPlaying {
                    slot.playing = PlayState::Alive;
                    slot.troops = self.config.starting_force;
                }
            }
            self.phase = Phase::Plan;
            self.waiting_for = Some(SlotId(0));
            self.response_to = None;
        } else {
            self.round_num = 1;
            for id in self.registry.joined_ids().collect::<Vec<_>>() {
                let slot = self.registry.get_mut(id);
                slot.playing = PlayState::NotPlaying;
                slot.troops = 0;
            }
            self.phase = Phase::Lobby;
            self.waiting_for = None;
            self.response_to = None;
        }
        self.timer = None;
    }
}
