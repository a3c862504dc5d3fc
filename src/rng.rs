//! Injectable randomness: battle dice and the `ANY` recipient pick both go
//! through these traits so tests can script deterministic outcomes while
//! production uses `rand`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A die uniform over `1..=10`, matching the wire protocol's combat dice.
pub trait DiceRoller {
    fn roll_die(&mut self) -> u32;
}

/// Picks one element out of `0..len`, used to resolve `ANY` chat recipients
/// when more than two players are joined.
pub trait AnyPicker {
    fn pick(&mut self, len: usize) -> usize;
}

/// Production RNG: a `StdRng` seeded from OS entropy once at process
/// startup, then advanced deterministically from there for the lifetime
/// of the server — the same engine call sequence on two runs seeded
/// alike reproduces the same battles (§8 property 7).
pub struct GameRng(StdRng);

impl GameRng {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Seeds deterministically instead of from OS entropy — the injection
    /// point §9 Design Notes calls for ("tests seed RNG deterministically")
    /// and §8 property 7 ("battle is deterministic given a fixed seed").
    /// Unlike [`ScriptedRng`], this never degenerates into a short repeating
    /// cycle, so it's safe to drive an unbounded number of dice rolls with.
    pub fn from_seed(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRoller for GameRng {
    fn roll_die(&mut self) -> u32 {
        self.0.gen_range(1..=10)
    }
}

impl AnyPicker for GameRng {
    fn pick(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// Deterministic RNG for tests: dice come from a fixed, cyclically-consumed
/// script; picks come from a separate script.
pub struct ScriptedRng {
    dice: Vec<u32>,
    dice_pos: usize,
    picks: Vec<usize>,
    picks_pos: usize,
}

impl ScriptedRng {
    pub fn new(dice: Vec<u32>, picks: Vec<usize>) -> Self {
        assert!(!dice.is_empty(), "scripted dice sequence must be non-empty");
        Self { dice, dice_pos: 0, picks, picks_pos: 0 }
    }
}

impl DiceRoller for ScriptedRng {
    fn roll_die(&mut self) -> u32 {
        let v = self.dice[self.dice_pos % self.dice.len()];
        self.dice_pos += 1;
        v
    }
}

impl AnyPicker for ScriptedRng {
    fn pick(&mut self, len: usize) -> usize {
        let v = self.picks[self.picks_pos % self.picks.len().max(1)] % len.max(1);
        self.picks_pos += 1;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_dice_cycle() {
        let mut rng = ScriptedRng::new(vec![5, 9], vec![0]);
        assert_eq!(rng.roll_die(), 5);
        assert_eq!(rng.roll_die(), 9);
        assert_eq!(rng.roll_die(), 5);
    }
}
