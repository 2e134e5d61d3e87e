//! Deterministic, pure logic for the game loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod parser;
pub mod summary;
pub mod types;
pub mod world;
