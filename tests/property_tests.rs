//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeMap;

use proptest::prelude::*;

use quadvc::core::cache::Cache;
use quadvc::core::file_ref::FileReference;
use quadvc::core::message::{CommitMessage, MessageBuilder};
use quadvc::core::types::{Oid, RefName};
use quadvc::merge::Strategy as MergeStrategy;

/// Strategy for generating statement-like lines.
fn statement_line() -> impl Strategy<Value = String> {
    "[a-e]{1,3}".prop_map(|s| format!("<http://ex.org/{s}> <http://ex.org/p> <http://ex.org/o> ."))
}

/// Strategy for generating valid property keys.
fn property_key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,12}"
}

/// Strategy for property values, biased towards characters that need escaping.
fn property_value() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            prop::char::range('a', 'z'),
            Just(' '),
            Just('"'),
            Just('\\'),
            Just('\n'),
            Just(':'),
            Just('{'),
        ],
        0..40,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

// =============================================================================
// Oid
// =============================================================================

proptest! {
    /// Any 40 hex digits form an id, stored lowercase.
    #[test]
    fn oid_accepts_sha1_hex(hex in "[0-9a-fA-F]{40}") {
        let oid = Oid::new(hex.clone()).unwrap();
        prop_assert_eq!(oid.as_str(), hex.to_ascii_lowercase());
        prop_assert!(oid.as_str().starts_with(oid.short()));
        prop_assert_eq!(oid.short().len(), Oid::SHORT_LEN);
    }

    /// Wrong lengths are rejected.
    #[test]
    fn oid_rejects_other_lengths(hex in "[0-9a-f]{1,80}") {
        prop_assume!(hex.len() != 40 && hex.len() != 64);
        prop_assert!(Oid::new(hex).is_err());
    }

    /// Serialization goes through the validated form.
    #[test]
    fn oid_serde_round_trip(hex in "[0-9a-f]{64}") {
        let oid = Oid::new(hex).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        let back: Oid = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, oid);
    }
}

// =============================================================================
// RefName
// =============================================================================

proptest! {
    /// Simple branch names qualify under refs/heads/ and shorten back.
    #[test]
    fn branch_names_qualify(name in "[a-z][a-z0-9_-]{0,15}(/[a-z][a-z0-9_-]{0,8})?") {
        let refname = RefName::branch(&name).unwrap();
        prop_assert!(refname.is_branch());
        prop_assert_eq!(refname.as_str(), format!("refs/heads/{name}"));
        prop_assert_eq!(refname.short_name(), name.as_str());
    }

    /// Forbidden characters anywhere make the name invalid.
    #[test]
    fn forbidden_characters_rejected(
        prefix in "[a-z]{1,5}",
        bad in prop::sample::select(vec![' ', '~', '^', ':', '?', '*', '[', '\\']),
        suffix in "[a-z]{0,5}",
    ) {
        let name = format!("{prefix}{bad}{suffix}");
        prop_assert!(RefName::branch(&name).is_err());
    }
}

// =============================================================================
// FileReference
// =============================================================================

proptest! {
    /// Lines are always sorted and unique, whatever the input order.
    #[test]
    fn file_lines_sorted_and_unique(lines in prop::collection::vec(statement_line(), 0..30)) {
        let file = FileReference::new("g.nt", &lines.join("\n"));
        let stored: Vec<&str> = file.lines().collect();

        let mut expected: Vec<&str> = lines.iter().map(String::as_str).collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(stored, expected);
    }

    /// Serializing and re-reading a file changes nothing.
    #[test]
    fn file_content_is_stable(lines in prop::collection::vec(statement_line(), 0..30)) {
        let file = FileReference::new("g.nt", &lines.join("\n"));
        let again = FileReference::new("g.nt", &file.content());
        prop_assert_eq!(again.content(), file.content());
        prop_assert_eq!(again, file);
    }

    /// Adding then removing a new line restores the original content.
    #[test]
    fn add_then_remove_is_identity(
        lines in prop::collection::vec(statement_line(), 0..10),
        extra in statement_line(),
    ) {
        let mut file = FileReference::new("g.nt", &lines.join("\n"));
        prop_assume!(!file.contains(&extra));
        let before = file.content();

        prop_assert!(file.add(&extra));
        prop_assert!(!file.add(&extra));
        prop_assert!(file.remove(&extra));
        prop_assert_eq!(file.content(), before);
    }
}

// =============================================================================
// Commit messages
// =============================================================================

proptest! {
    /// Property values survive building and parsing, escapes included.
    #[test]
    fn message_properties_round_trip(
        text in "[a-z]{1,10}( [a-z]{1,10}){0,3}",
        properties in prop::collection::btree_map(property_key(), property_value(), 0..5),
    ) {
        let mut builder = MessageBuilder::new(text.clone());
        for (key, value) in &properties {
            builder = builder.property(key, value.clone());
        }

        let parsed = CommitMessage::parse(&builder.build());
        prop_assert_eq!(parsed.text, text);
        prop_assert_eq!(parsed.properties, properties);
    }

    /// Keys that could not be read back are never written.
    #[test]
    fn invalid_keys_are_dropped(key in "[a-z]{1,5}[ :\"-][a-z]{0,5}", value in "[a-z]{0,10}") {
        let message = MessageBuilder::new("text").property(&key, value).build();
        prop_assert_eq!(message, "text");
    }
}

// =============================================================================
// Cache
// =============================================================================

proptest! {
    /// The cache never grows past its capacity.
    #[test]
    fn cache_respects_capacity(
        capacity in 1usize..20,
        keys in prop::collection::vec(0u32..50, 0..100),
    ) {
        let cache = Cache::new(capacity);
        for key in keys {
            cache.set(key, key * 2);
            prop_assert!(cache.size() <= capacity);
        }
    }

    /// The latest value for a key is what get returns.
    #[test]
    fn cache_returns_last_set(entries in prop::collection::vec((0u32..10, any::<u64>()), 1..50)) {
        let cache = Cache::new(16);
        let mut expected = BTreeMap::new();
        for (key, value) in entries {
            cache.set(key, value);
            expected.insert(key, value);
        }
        for (key, value) in expected {
            prop_assert_eq!(cache.get(&key), Some(value));
        }
    }
}

// =============================================================================
// Merge strategy names
// =============================================================================

proptest! {
    /// Display output parses back regardless of case.
    #[test]
    fn strategy_names_parse_back(context in any::<bool>(), upper in any::<bool>()) {
        let strategy = if context { MergeStrategy::Context } else { MergeStrategy::ThreeWay };
        let name = strategy.to_string();
        let name = if upper { name.to_uppercase() } else { name };
        prop_assert_eq!(name.parse::<MergeStrategy>(), Ok(strategy));
    }
}
