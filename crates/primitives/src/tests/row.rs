use rand::seq::SliceRandom;
use rand::thread_rng;

use super::{Column, ColumnFamily, Row};

fn cf(columns: &[(&str, &str, i64)]) -> ColumnFamily {
    columns
        .iter()
        .fold(ColumnFamily::new("users"), |cf, (name, value, ts)| {
            cf.with_column(Column::new(*name, *value, *ts))
        })
}

#[test]
fn test_add_keeps_newest_version() {
    let mut family = cf(&[("a", "old", 1)]);
    family.add(Column::new("a", "new", 2));
    family.add(Column::new("a", "older", 0));
    assert_eq!(family.column(b"a").unwrap().value, b"new");
}

#[test]
fn test_tombstone_wins_timestamp_tie() {
    let mut family = cf(&[("a", "v", 5)]);
    family.add(Column::tombstone("a", 5));
    assert!(family.column(b"a").unwrap().deleted);
}

#[test]
fn test_resolve_is_order_independent() {
    let versions = vec![
        cf(&[("a", "1", 1), ("b", "1", 3)]),
        cf(&[("a", "2", 2)]),
        cf(&[("c", "1", 1), ("b", "0", 2)]),
        cf(&[("a", "tie-z", 2)]),
    ];
    let expected = ColumnFamily::resolve_superset(&versions).unwrap();

    let mut rng = thread_rng();
    for _ in 0..20 {
        let mut shuffled = versions.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(
            ColumnFamily::resolve_superset(&shuffled).unwrap(),
            expected,
            "merge must not depend on version order"
        );
    }
}

#[test]
fn test_resolve_is_idempotent() {
    let version = cf(&[("a", "1", 1), ("b", "2", 2)]);
    let mut merged = version.clone();
    merged.resolve(&version);
    assert_eq!(merged, version);
}

#[test]
fn test_diff_contains_only_missing_columns() {
    let stale = cf(&[("a", "1", 1)]);
    let superset = cf(&[("a", "1", 1), ("x", "new", 7)]);

    let diff = stale.diff(&superset).unwrap();
    let columns: Vec<_> = diff.columns().collect();
    assert_eq!(columns, vec![&Column::new("x", "new", 7)]);
}

#[test]
fn test_diff_includes_newer_versions() {
    let stale = cf(&[("a", "1", 1)]);
    let superset = cf(&[("a", "2", 2)]);

    let diff = stale.diff(&superset).unwrap();
    assert_eq!(diff.column(b"a").unwrap().value, b"2");
}

#[test]
fn test_diff_is_none_when_equal() {
    let version = cf(&[("a", "1", 1)]);
    assert!(version.diff(&version).is_none());
}

#[test]
fn test_diff_carries_family_deletion() {
    let stale = cf(&[("a", "1", 1)]);
    let mut superset = stale.clone();
    superset.delete(10);

    let diff = stale.diff(&superset).unwrap();
    assert_eq!(diff.deleted_at, Some(10));
    assert_eq!(diff.len(), 0);
}

#[test]
fn test_digest_tracks_content() {
    let a = Row::new("k".to_owned(), cf(&[("a", "1", 1)]));
    let b = Row::new("k".to_owned(), cf(&[("a", "1", 2)]));
    assert_eq!(a.digest(), a.clone().digest());
    assert_ne!(a.digest(), b.digest());
}

#[test]
fn test_digest_separates_name_from_value() {
    let a = ColumnFamily::new("users").with_column(Column::new("ab", "c", 1));
    let b = ColumnFamily::new("users").with_column(Column::new("a", "bc", 1));
    assert_ne!(a, b);
    assert_ne!(a.digest(), b.digest());

    let split = ColumnFamily::new("users")
        .with_column(Column::new("a", "", 1))
        .with_column(Column::new("b", "", 1));
    let joined = ColumnFamily::new("users").with_column(Column::new("ab", "", 1));
    assert_ne!(split.digest(), joined.digest());
}

#[test]
fn test_digest_covers_family_deletion() {
    let live = ColumnFamily::new("users").with_column(Column::new("a", "1", 1));
    let mut deleted = live.clone();
    deleted.delete(0);
    assert_ne!(live.digest(), deleted.digest());
}
