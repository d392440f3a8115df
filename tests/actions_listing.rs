#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for the `actions` command and the canonical order.

use std::collections::HashSet;

use efm_cli::actions::{ActionId, ActionRegistry};
use efm_cli::commands::actions::listing;

// ---------------------------------------------------------------------------
// Snapshot: action listing
// ---------------------------------------------------------------------------

/// Snapshot of the `actions` output.
///
/// Any addition, removal, rename or reorder of an action changes this
/// snapshot and needs a deliberate update.
#[test]
fn action_listing() {
    insta::assert_snapshot!("action_listing", listing(&ActionRegistry::new()));
}

// ---------------------------------------------------------------------------
// Structural invariants
// ---------------------------------------------------------------------------

/// The registry holds every action exactly once, in canonical order.
#[test]
fn registry_matches_canonical_order() {
    let ids: Vec<ActionId> = ActionRegistry::new().iter().map(|a| a.id()).collect();
    assert_eq!(ids, ActionId::CANONICAL_ORDER.to_vec());
}

/// Every identifier and alias parses back to its action.
#[test]
fn ids_and_aliases_round_trip() {
    for id in ActionId::CANONICAL_ORDER {
        assert_eq!(id.as_str().parse::<ActionId>().unwrap(), id);
        for alias in id.aliases() {
            assert_eq!(alias.parse::<ActionId>().unwrap(), id);
        }
    }
}

/// No alias shadows another action's identifier or alias.
#[test]
fn names_are_unique() {
    let mut seen = HashSet::new();
    for id in ActionId::CANONICAL_ORDER {
        for name in std::iter::once(id.as_str()).chain(id.aliases().iter().copied()) {
            assert!(seen.insert(name), "duplicate action name '{name}'");
        }
    }
}

/// Every action has a description.
#[test]
fn descriptions_are_non_empty() {
    for action in ActionRegistry::new().iter() {
        assert!(!action.description().is_empty(), "{:?} has no description", action.id());
    }
}
