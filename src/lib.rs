//! Core of the Byzantium game server: a strict wire parser, a turn-ordered
//! phase engine, and a dice-based battle resolver, all transport-agnostic
//! so they can be driven directly in tests without opening a socket.

pub mod battle;
pub mod broadcast;
pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod logger;
pub mod name;
pub mod registry;
pub mod rng;
pub mod strike;
pub mod transport;

pub use config::Args;
pub use engine::Engine;
