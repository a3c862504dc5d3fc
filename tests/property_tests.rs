//! Property tests for the testable invariants the spec calls out directly
//! (§8): parser idempotence on arbitrary splits, canonical-name shape, and
//! battle-grid/troop bounds after resolution. Modeled on
//! `examples/huntwj-tinyfugue/tf-rs/tests/property_tests.rs`'s
//! `proptest! { #[test] fn ... }` style, the only property-test usage in
//! the retrieved corpus.

use proptest::prelude::*;

use byzantium::battle::{AttackGrid, BattleGrid};
use byzantium::codec::{parse_one, ParseOutcome};
use byzantium::name::canonicalize;
use byzantium::registry::{ClientRegistry, PlayState, MAX_CLIENTS};
use byzantium::rng::GameRng;

fn drain(residual: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        match parse_one(residual) {
            ParseOutcome::Message { consumed, .. } => {
                out.push(residual[..consumed].to_vec());
                residual.drain(0..consumed);
            }
            _ => break,
        }
    }
    out
}

proptest! {
    /// §8 invariant 5: parse(a) ∘ parse(b) == parse(a ⧺ b) for any split of
    /// a well-formed two-message stream.
    #[test]
    fn parser_is_idempotent_on_concatenation(
        name in "[A-Za-z]{1,8}",
        text in "[A-Za-z ]{0,20}",
        split in 0usize..200,
    ) {
        let whole = format!("(cjoin({name}))(cchat(ALL)({text}))").into_bytes();
        let split = split.min(whole.len());

        let mut fed_in_two_parts = Vec::new();
        fed_in_two_parts.extend_from_slice(&whole[..split]);
        let mut first_half_messages = drain(&mut fed_in_two_parts);
        fed_in_two_parts.extend_from_slice(&whole[split..]);
        first_half_messages.extend(drain(&mut fed_in_two_parts));

        let mut fed_whole = whole.clone();
        let all_at_once = drain(&mut fed_whole);

        prop_assert_eq!(first_half_messages, all_at_once);
        prop_assert!(fed_in_two_parts.is_empty());
    }

    /// §8 invariant 4: every canonicalized name matches the documented
    /// shape, whatever garbage the caller fed in.
    #[test]
    fn canonicalize_always_produces_valid_shape_or_empty(raw in ".{0,40}") {
        let canon = canonicalize(&raw);
        if !canon.is_empty() {
            let (body, suffix) = match canon.split_once('.') {
                Some((b, s)) => (b, Some(s)),
                None => (canon.as_str(), None),
            };
            prop_assert!(body.chars().count() <= 8);
            prop_assert!(body.chars().all(|c| c.is_ascii_alphanumeric()));
            if let Some(suffix) = suffix {
                prop_assert!(!suffix.is_empty());
                prop_assert!(suffix.chars().count() <= 3);
                prop_assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
            }
        }
    }

    /// §8 invariant 3 and §3 invariant 7: every player's post-battle troop
    /// count is bounded, and a player can never finish with more troops
    /// than they started a single-opponent fight with (no bounty is
    /// awarded here, since nobody necessarily dies).
    ///
    /// Driven by the seeded production RNG rather than a short repeating
    /// script: a `ScriptedRng` built from an arbitrary short dice vector can
    /// tie forever (e.g. a length-1 script rolls the same value every time),
    /// which would hang `battle::resolve`'s skirmish loop. A seeded `StdRng`
    /// doesn't degenerate that way, while still making the run reproducible.
    #[test]
    fn battle_resolution_keeps_troops_in_bounds(
        troops_a in 1u32..99_999,
        troops_b in 1u32..99_999,
        seed in any::<u64>(),
    ) {
        let mut reg = ClientRegistry::new();
        let a = reg.allocate().unwrap();
        {
            let slot = reg.get_mut(a);
            slot.joined = true;
            slot.name = "A".into();
            slot.troops = troops_a;
            slot.playing = PlayState::Alive;
        }
        let b = reg.allocate().unwrap();
        {
            let slot = reg.get_mut(b);
            slot.joined = true;
            slot.name = "B".into();
            slot.troops = troops_b;
            slot.playing = PlayState::Alive;
        }
        let mut attack = AttackGrid::new(MAX_CLIENTS);
        attack.set(a, b, true);
        attack.set(b, a, true);
        let mut battle = BattleGrid::new(MAX_CLIENTS);
        let mut rng = GameRng::from_seed(seed);

        byzantium::battle::resolve(&mut reg, &attack, &mut battle, &mut rng);

        prop_assert!(reg.get(a).troops <= troops_a);
        prop_assert!(reg.get(b).troops <= troops_b);
    }
}
