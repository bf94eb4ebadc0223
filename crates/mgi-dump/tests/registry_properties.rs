//! Property tests for the item id registry
//!
//! - a natural key defined twice is a duplicate (strict) or the same id
//!   (lenient)
//! - negative keys never collide with each other or with positive keys
//! - an alias chain is followed to its end by every reference

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mgi_dump::registry::{
    DanglingReason, KeyScheme, Registry, RegistryConfig, RegistryError, TypeKey,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn registry(strict: bool, scheme: KeyScheme) -> Registry {
    Registry::new(RegistryConfig {
        strict,
        scheme,
        ..RegistryConfig::default()
    })
}

fn scheme() -> impl Strategy<Value = KeyScheme> {
    prop_oneof![Just(KeyScheme::Sequenced), Just(KeyScheme::Natural)]
}

proptest! {
    #[test]
    fn defining_twice_is_duplicate_when_strict(key in -1_000_000i64..1_000_000, scheme in scheme()) {
        let mut strict = registry(true, scheme);
        let first = strict.define_id(TypeKey::MARKER, Some(key)).unwrap();
        prop_assert_eq!(
            strict.define_id(TypeKey::MARKER, Some(key)),
            Err(RegistryError::DuplicateId { id: first })
        );

        let mut lenient = registry(false, scheme);
        let first = lenient.define_id(TypeKey::MARKER, Some(key)).unwrap();
        prop_assert_eq!(lenient.define_id(TypeKey::MARKER, Some(key)).unwrap(), first);
    }

    #[test]
    fn distinct_keys_get_distinct_ids(
        keys in prop::collection::hash_set(-8_000_000i64..1_000_000, 1..64),
        scheme in scheme(),
    ) {
        let mut registry = registry(true, scheme);
        let mut seen = HashSet::new();
        for key in keys {
            let id = registry.define_id(TypeKey::ALLELE, Some(key)).unwrap();
            prop_assert!(seen.insert(id), "id {} handed out twice", id);
        }
    }

    #[test]
    fn negative_keys_do_not_collide_with_positive(
        negative in -8_000_000i64..0,
        positive in 0i64..1_000_000,
        scheme in scheme(),
    ) {
        let mut registry = registry(true, scheme);
        let a = registry.define_id(TypeKey::PROBE, Some(negative)).unwrap();
        let b = registry.define_id(TypeKey::PROBE, Some(negative - 1)).unwrap();
        let c = registry.define_id(TypeKey::PROBE, Some(positive)).unwrap();
        prop_assert_ne!(a, b);
        prop_assert_ne!(a, c);
        prop_assert_ne!(b, c);
    }

    #[test]
    fn unwritten_ids_dangle(key in 0i64..1_000_000) {
        let mut registry = registry(true, KeyScheme::Sequenced);
        let id = registry.define_id(TypeKey::GENOTYPE, Some(key)).unwrap();
        prop_assert_eq!(
            registry.reference_id(TypeKey::GENOTYPE, key),
            Err(RegistryError::DanglingReference {
                type_key: TypeKey::GENOTYPE,
                key,
                reason: DanglingReason::NeverWritten(id),
            })
        );
    }

    #[test]
    fn alias_chains_resolve_transitively(length in 2usize..8) {
        let mut registry = registry(true, KeyScheme::Sequenced);
        let keys: Vec<i64> = (0..length as i64).collect();
        let ids: Vec<_> = keys
            .iter()
            .map(|k| registry.define_id(TypeKey::STRAIN, Some(*k)).unwrap())
            .collect();
        let last = *ids.last().unwrap();
        registry.record_written(last).unwrap();

        for pair in ids.windows(2) {
            prop_assert!(registry.register_alias(pair[0], pair[1]));
        }

        let direct = registry.reference_id(TypeKey::STRAIN, *keys.last().unwrap()).unwrap();
        for key in &keys {
            prop_assert_eq!(registry.reference_id(TypeKey::STRAIN, *key).unwrap(), direct);
        }
    }
}

#[test]
fn marker_scenario() {
    let mut registry = Registry::new(RegistryConfig::default());
    let id = registry.define_id(TypeKey::MARKER, Some(77)).unwrap();
    assert_eq!(id.to_string(), "2_1001");
    registry.record_written(id).unwrap();
    assert_eq!(registry.reference_id(TypeKey::MARKER, 77).unwrap().to_string(), "2_1001");
    assert!(matches!(
        registry.reference_id(TypeKey::MARKER, 78),
        Err(RegistryError::DanglingReference {
            reason: DanglingReason::NeverDefined,
            ..
        })
    ));
}

#[test]
fn closing_an_alias_cycle_is_refused() {
    let mut registry = Registry::new(RegistryConfig::default());
    let a = registry.define_id(TypeKey::MARKER, Some(1)).unwrap();
    let b = registry.define_id(TypeKey::MARKER, Some(2)).unwrap();
    let c = registry.define_id(TypeKey::MARKER, Some(3)).unwrap();
    assert!(registry.register_alias(a, b));
    assert!(registry.register_alias(b, c));
    assert!(!registry.register_alias(c, a));
    assert_eq!(registry.peek(a), c);
}

#[test]
fn re_pointing_an_alias_is_refused() {
    let mut registry = Registry::new(RegistryConfig::default());
    let a = registry.define_id(TypeKey::MARKER, Some(1)).unwrap();
    let b = registry.define_id(TypeKey::MARKER, Some(2)).unwrap();
    let c = registry.define_id(TypeKey::MARKER, Some(3)).unwrap();
    assert!(registry.register_alias(a, b));
    assert!(registry.register_alias(b, c));

    // b already points at c, and a -> b -> ... would loop back through b
    assert!(!registry.register_alias(b, a));
    assert_eq!(registry.peek(a), c);
    assert_eq!(registry.peek(b), c);

    // registering the same alias again is harmless
    assert!(registry.register_alias(b, c));
    assert_eq!(registry.summary().aliases, 2);

    registry.record_written(c).unwrap();
    assert_eq!(registry.reference_id(TypeKey::MARKER, 1).unwrap(), c);
    assert_eq!(registry.reference_id(TypeKey::MARKER, 2).unwrap(), c);
}
