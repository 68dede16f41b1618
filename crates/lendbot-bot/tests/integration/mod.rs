//! Integration tests for lendbot-bot.
//!
//! These tests drive whole cycles against the scripted `MockExchange`:
//! - Ladder placement and reconciliation
//! - Opportunistic capture, dedup and capital freeing
//! - Observation mode and single-flight guards

pub mod common;
