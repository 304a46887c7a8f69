//! Property-based tests for the correlated logger
//!
//! These tests use proptest to verify invariants across many inputs:
//! - Chunking reproduces the original value and numbers chunks consistently
//! - Secondary oversized fields are truncated, never chunked
//! - Metadata merge is idempotent and never erases known leaves
//! - Level parsing round-trips

use proptest::prelude::*;
use rust_correlated_logger::core::chunking::{
    chunk_oversized_fields, chunk_string, truncate_field_value, TRUNCATION_SUFFIX,
};
use rust_correlated_logger::core::{
    merge, project, Agent, Field, LogLevel, MetadataRecord, Platform, Repository, Service, Tool,
};
use std::collections::BTreeMap;

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

/// Unset, set to the empty string, or set to a value
fn leaf() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some(String::new())),
        "[a-z0-9-]{1,12}".prop_map(Some),
    ]
}

fn repository_strategy() -> impl Strategy<Value = Repository> {
    (leaf(), leaf(), leaf()).prop_map(|(name, owner, branch_name)| Repository {
        name,
        owner,
        branch_name,
        ..Repository::default()
    })
}

fn service_strategy() -> impl Strategy<Value = Service> {
    (leaf(), leaf(), leaf()).prop_map(|(name, category, event)| Service {
        name,
        category,
        event,
    })
}

fn tool_strategy() -> impl Strategy<Value = Tool> {
    (leaf(), leaf()).prop_map(|(name, status)| Tool { name, status })
}

fn agent_strategy() -> impl Strategy<Value = Agent> {
    (leaf(), leaf(), leaf()).prop_map(|(name, status, trace_id)| Agent {
        name,
        status,
        trace_id,
    })
}

fn platform_strategy() -> impl Strategy<Value = Platform> {
    (leaf(), leaf()).prop_map(|(name, component)| Platform { name, component })
}

fn metadata_strategy() -> impl Strategy<Value = MetadataRecord> {
    (
        prop::option::of(repository_strategy()),
        prop::option::of(service_strategy()),
        prop::option::of(tool_strategy()),
        prop::option::of(agent_strategy()),
        prop::option::of(platform_strategy()),
    )
        .prop_map(|(repository, service, tool, agent, platform)| MetadataRecord {
            repository,
            service,
            tool,
            agent,
            platform,
        })
}

fn leaf_map(record: &MetadataRecord) -> BTreeMap<&'static str, String> {
    record
        .leaves()
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
}

proptest! {
    #[test]
    fn test_chunks_reassemble(s in "\\PC{0,400}", size in 1usize..64) {
        let chunks = chunk_string(&s, size);
        prop_assert_eq!(chunks.concat(), s.clone());
        for chunk in &chunks {
            // A single wide character may exceed a tiny chunk size
            prop_assert!(chunk.len() <= size || chunk.chars().count() == 1);
        }
    }

    #[test]
    fn test_ascii_chunk_count(len in 1usize..2_000, size in 1usize..300) {
        let s = "a".repeat(len);
        let chunks = chunk_string(&s, size);
        prop_assert_eq!(chunks.len(), len.div_ceil(size));
    }

    #[test]
    fn test_chunk_bookkeeping_consistent(len in 11usize..500, prefix in "[a-z]{0,5}") {
        let fields = vec![
            Field::string("prefix", prefix.clone()),
            Field::string("payload", "p".repeat(len)),
            Field::int("n", 7),
        ];

        let sets = chunk_oversized_fields(&fields, 10).expect("payload is oversized");
        let total = sets.len() as i64;
        prop_assert_eq!(total as usize, len.div_ceil(10));

        let mut rebuilt = String::new();
        for (i, set) in sets.iter().enumerate() {
            let keys: Vec<&str> = set.iter().map(|f| f.key()).collect();
            prop_assert_eq!(keys, vec!["prefix", "n", "payload", "payload_chunk", "payload_total_chunks"]);

            prop_assert_eq!(set[3].value().as_int(), Some(i as i64 + 1));
            prop_assert_eq!(set[4].value().as_int(), Some(total));
            rebuilt.push_str(set[2].value().as_str().unwrap_or_default());
        }
        prop_assert_eq!(rebuilt.len(), len);
    }

    #[test]
    fn test_secondary_fields_truncated(extra in 1usize..100) {
        let second = "s".repeat(10 + extra);
        let fields = vec![
            Field::string("first", "f".repeat(25)),
            Field::string("second", second.clone()),
        ];

        let expected = truncate_field_value(&second, 10);
        prop_assert!(expected.ends_with(TRUNCATION_SUFFIX));

        for set in chunk_oversized_fields(&fields, 10).expect("first is oversized") {
            let value = set.iter().find(|f| f.key() == "second").and_then(|f| f.value().as_str());
            prop_assert_eq!(value, Some(expected.as_str()));
        }
    }

    #[test]
    fn test_merge_idempotent(existing in metadata_strategy(), incoming in metadata_strategy()) {
        let once = merge(&existing, &incoming);
        prop_assert_eq!(merge(&once, &incoming), once);
    }

    #[test]
    fn test_merge_with_self_is_identity(record in metadata_strategy()) {
        prop_assert_eq!(leaf_map(&merge(&record, &record)), leaf_map(&record));
    }

    #[test]
    fn test_merge_keeps_known_leaves(existing in metadata_strategy(), incoming in metadata_strategy()) {
        let merged = leaf_map(&merge(&existing, &incoming));
        let incoming_leaves = leaf_map(&incoming);

        for (key, value) in leaf_map(&existing) {
            let expected = incoming_leaves.get(key).cloned().unwrap_or(value);
            prop_assert_eq!(merged.get(key), Some(&expected));
        }
        for (key, value) in incoming_leaves {
            prop_assert_eq!(merged.get(key), Some(&value));
        }
    }

    #[test]
    fn test_projection_omits_unset_leaves(record in metadata_strategy()) {
        let fields = project(&record);
        prop_assert_eq!(fields.len(), record.leaves().len());
        for field in &fields {
            prop_assert!(!field.value().as_str().unwrap_or_default().is_empty());
        }

        let empty_tool = record
            .tool
            .as_ref()
            .is_some_and(|tool| tool.name.as_deref() == Some(""));
        if empty_tool {
            prop_assert!(fields.iter().all(|f| f.key() != "tool_name"));
        }
    }

    #[test]
    fn test_level_round_trip(level in level_strategy()) {
        prop_assert_eq!(level.to_str().parse::<LogLevel>().ok(), Some(level));
        prop_assert_eq!(level.as_lowercase().parse::<LogLevel>().ok(), Some(level));
    }

    #[test]
    fn test_level_ordering(a in level_strategy(), b in level_strategy()) {
        prop_assert_eq!(a < b, (a as u8) < (b as u8));
    }
}
