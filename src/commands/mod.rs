//! CLI subcommand implementations (spec §6): `poll` (the bare
//! `puis <abbs-db> <piss-db>` one-shot cycle plus Anitya sync), and the
//! chore-mode trio `generate`/`run`/`check`.
//!
//! Grounded on the teacher's `commands/*.rs` split: one file per
//! subcommand, each exposing a single async entry point that `main.rs`
//! dispatches into.

pub mod check;
pub mod generate;
pub mod poll;
pub mod run;
