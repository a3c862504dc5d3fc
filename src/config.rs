//! CLI configuration.
//!
//! Mirrors the original C server's `-m`/`-l`/`-t`/`-f` flags. The port is
//! spec-fixed at 36724; only the bind host is configurable, matching the
//! teacher's own convention of exposing a full `--bind` address.

use clap::{ArgAction, Parser};

/// Default port, fixed by the wire protocol (never configurable).
pub const PROTOCOL_PORT: u16 = 36724;

pub const DEFAULT_MIN_PLAYERS: u32 = 3;
pub const DEFAULT_LOBBY_TIME: u32 = 10;
pub const DEFAULT_TIMEOUT: u32 = 30;
pub const DEFAULT_STARTING_FORCE: u32 = 1000;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "byzantiums",
    version,
    about = "Byzantium — authoritative multiplayer strategy server",
    long_about = "Accepts TCP clients, hosts a lobby with chat, then plays \
                  turn-ordered rounds of alliance offers, attacks, and \
                  dice-resolved battles. Protocol is a parenthesized wire \
                  language; see README for the full grammar."
)]
pub struct Args {
    /// Minimum number of players needed to start a game. Negative ⇒ default.
    #[arg(short = 'm', long = "min-players", allow_hyphen_values = true, default_value_t = DEFAULT_MIN_PLAYERS as i64)]
    pub min_players: i64,

    /// Seconds the lobby counts down once min-players is met. Negative ⇒ default.
    #[arg(short = 'l', long = "lobby-time", allow_hyphen_values = true, default_value_t = DEFAULT_LOBBY_TIME as i64)]
    pub lobby_time: i64,

    /// Seconds a player has to respond to a prompt. Negative ⇒ default.
    #[arg(short = 't', long = "timeout", allow_hyphen_values = true, default_value_t = DEFAULT_TIMEOUT as i64)]
    pub timeout: i64,

    /// Starting troop count (and per-kill bounty). Negative ⇒ default.
    #[arg(short = 'f', long = "starting-force", allow_hyphen_values = true, default_value_t = DEFAULT_STARTING_FORCE as i64)]
    pub starting_force: i64,

    /// Address to listen on (port is always 36724).
    #[arg(short = 'b', long = "bind", default_value = "0.0.0.0")]
    pub bind_host: String,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Validated, defaulted server configuration — the negative-⇒-default
/// normalization the original C server performs right after `getopt`-style
/// parsing (`if (minplayers < 0) minplayers = 3;`, etc.).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub min_players: u32,
    pub lobby_time: u32,
    pub timeout: u32,
    pub starting_force: u32,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            min_players: normalize(args.min_players, DEFAULT_MIN_PLAYERS),
            lobby_time: normalize(args.lobby_time, DEFAULT_LOBBY_TIME),
            timeout: normalize(args.timeout, DEFAULT_TIMEOUT),
            starting_force: normalize(args.starting_force, DEFAULT_STARTING_FORCE),
        }
    }
}

fn normalize(value: i64, default: u32) -> u32 {
    if value < 0 { default } else { value as u32 }
}

impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, PROTOCOL_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_values_collapse_to_defaults() {
        let args = Args {
            min_players: -1,
            lobby_time: -5,
            timeout: -1,
            starting_force: -100,
            bind_host: "0.0.0.0".into(),
            verbose: 0,
        };
        let cfg = Config::from(&args);
        assert_eq!(cfg.min_players, DEFAULT_MIN_PLAYERS);
        assert_eq!(cfg.lobby_time, DEFAULT_LOBBY_TIME);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(cfg.starting_force, DEFAULT_STARTING_FORCE);
    }

    #[test]
    fn nonnegative_values_pass_through() {
        let args = Args {
            min_players: 2,
            lobby_time: 0,
            timeout: 15,
            starting_force: 500,
            bind_host: "127.0.0.1".into(),
            verbose: 0,
        };
        let cfg = Config::from(&args);
        assert_eq!(cfg.min_players, 2);
        assert_eq!(cfg.lobby_time, 0);
        assert_eq!(cfg.timeout, 15);
        assert_eq!(cfg.starting_force, 500);
    }
}
