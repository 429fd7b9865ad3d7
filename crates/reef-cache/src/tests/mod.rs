//! Tests for the reef-cache crate.

mod helpers;
