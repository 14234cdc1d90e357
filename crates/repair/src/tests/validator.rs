use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use strand_merkle::difference;
use strand_primitives::{CfPair, DecoratedKey, Hash, Partitioner, Sha256Partitioner, Token};

use super::*;

fn cf() -> CfPair {
    CfPair::new("ks", "users")
}

fn validator(max_size: u64) -> Validator {
    Validator::new(cf(), Arc::new(Sha256Partitioner), 126, max_size)
}

fn rows(keys: impl IntoIterator<Item = &'static str>) -> Vec<CompactedRow> {
    let mut rows: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let key = Sha256Partitioner.decorate(key.to_owned());
            CompactedRow::new(key, b"header".to_vec(), b"data".to_vec())
        })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    rows
}

const KEYS: [&str; 12] = [
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan", "judy", "mallory",
    "niaj",
];

fn build(mut validator: Validator, samples: &[DecoratedKey], rows: &[CompactedRow]) -> MerkleTree {
    validator.prepare(samples).unwrap();
    for row in rows {
        validator.add(row).unwrap();
    }
    validator.complete().unwrap()
}

#[test]
fn test_add_requires_prepare() {
    let mut validator = validator(16);
    let row = rows(["alice"]).remove(0);

    assert!(matches!(
        validator.add(&row),
        Err(ValidatorError::NotPrepared(_))
    ));
    assert!(matches!(
        validator.complete(),
        Err(ValidatorError::NotPrepared(_))
    ));
}

#[test]
fn test_empty_column_family_yields_valid_tree() {
    let tree = build(validator(16), &[], &[]);

    assert_eq!(tree.size(), 16);
    assert_eq!(tree.invalids(tree.full_range()).count(), 0);
    assert_eq!(tree.root_hash(), Some(EMPTY_ROW));
}

#[test]
fn test_rows_land_in_their_leaves() {
    let rows = rows(KEYS);
    let tree = build(validator(8), &[], &rows);

    for (leaf, hash) in tree.leaves() {
        let expected = rows
            .iter()
            .filter(|row| leaf.contains(row.key.token))
            .fold(EMPTY_ROW, |acc, row| acc ^ row_hash(row));

        assert_eq!(hash, Some(expected), "leaf {leaf}");
    }
}

#[test]
fn test_sampling_shapes_tree() {
    let rows = rows(KEYS);
    let samples: Vec<_> = rows.iter().map(|row| row.key.clone()).collect();

    let mut validator = validator(8);
    validator
        .prepare_with(&samples, &mut StdRng::seed_from_u64(7))
        .unwrap();

    assert_eq!(validator.tree.size(), 8);
}

#[test]
fn test_differently_sampled_trees_agree() {
    let rows = rows(KEYS);
    let samples: Vec<_> = rows.iter().take(3).map(|row| row.key.clone()).collect();

    let sampled = build(validator(32), &samples, &rows);
    let even = build(validator(16), &[], &rows);

    assert!(difference(&sampled, &even).unwrap().is_empty());
}

#[test]
fn test_minimum_token_rows_go_to_last_range() {
    let min_row = CompactedRow::new(
        DecoratedKey::new(Token::MIN, "min".to_owned()),
        Vec::new(),
        b"edge".to_vec(),
    );
    let rows = rows(KEYS);
    let mut with_min = vec![min_row.clone()];
    with_min.extend(rows.iter().cloned());

    let mut builder = validator(4);
    builder.prepare(&[]).unwrap();
    for row in &with_min {
        builder.add(row).unwrap();
    }
    assert_eq!(builder.validated(), with_min.len() as u64);
    let tree = builder.complete().unwrap();

    let plain = build(validator(4), &[], &rows);

    let (last, _) = tree.leaves().last().unwrap();
    assert_eq!(tree.get(Token::MIN).0, last);
    assert_eq!(
        tree.hash(&last.range),
        plain.hash(&last.range).map(|hash| hash ^ row_hash(&min_row))
    );
    assert_eq!(difference(&tree, &plain).unwrap(), vec![last]);
}

#[test]
fn test_only_minimum_token_rows() {
    let min_row = CompactedRow::new(
        DecoratedKey::new(Token::MIN, "min".to_owned()),
        Vec::new(),
        Vec::new(),
    );

    let tree = build(validator(4), &[], &[min_row.clone()]);

    assert_eq!(tree.invalids(tree.full_range()).count(), 0);
    assert_eq!(tree.root_hash(), Some(row_hash(&min_row)));
}

#[test]
fn test_row_hash_covers_key_header_and_data() {
    let row = rows(["alice"]).remove(0);
    let mut other = row.clone();
    other.data = b"changed".to_vec();

    assert_eq!(
        row_hash(&row),
        Hash::of_parts([b"alice".as_slice(), b"header".as_slice(), b"data".as_slice()])
    );
    assert_ne!(row_hash(&row), row_hash(&other));
}
