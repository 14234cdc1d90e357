use super::Range;
use crate::token::Token;

fn range(left: u128, right: u128) -> Range {
    Range::new(Token::new(left), Token::new(right))
}

// -----------------------------------------------------------------------------
// contains
// -----------------------------------------------------------------------------

#[test]
fn test_plain_range_is_left_exclusive_right_inclusive() {
    let r = range(10, 20);
    assert!(!r.contains(Token::new(10)));
    assert!(r.contains(Token::new(11)));
    assert!(r.contains(Token::new(20)));
    assert!(!r.contains(Token::new(21)));
}

#[test]
fn test_wrapping_range_contains_both_ends_of_ring() {
    let r = range(100, 10);
    assert!(r.is_wrap_around());
    assert!(r.contains(Token::new(101)));
    assert!(r.contains(Token::MAX));
    assert!(r.contains(Token::MIN));
    assert!(r.contains(Token::new(10)));
    assert!(!r.contains(Token::new(50)));
}

#[test]
fn test_full_ring_contains_minimum_token() {
    let r = Range::full(Token::MIN);
    assert!(r.is_full());
    assert!(r.contains(Token::MIN));
    assert!(r.contains(Token::new(42)));
}

// -----------------------------------------------------------------------------
// contains_range
// -----------------------------------------------------------------------------

#[test]
fn test_contains_range() {
    assert!(range(10, 50).contains_range(&range(20, 30)));
    assert!(range(10, 50).contains_range(&range(10, 50)));
    assert!(!range(10, 50).contains_range(&range(5, 30)));
    assert!(range(100, 10).contains_range(&range(120, 5)));
    assert!(range(100, 10).contains_range(&range(0, 5)));
    assert!(!range(10, 50).contains_range(&range(40, 5)));
    assert!(Range::full(Token::MIN).contains_range(&range(40, 5)));
}

// -----------------------------------------------------------------------------
// intersects
// -----------------------------------------------------------------------------

#[test]
fn test_plain_ranges_intersect_only_when_overlapping() {
    assert!(range(10, 20).intersects(&range(15, 25)));
    assert!(!range(10, 20).intersects(&range(20, 30)));
    assert!(!range(20, 30).intersects(&range(10, 20)));
}

#[test]
fn test_wrapping_intersections() {
    assert!(range(100, 10).intersects(&range(200, 5)));
    assert!(range(100, 10).intersects(&range(5, 20)));
    assert!(range(5, 20).intersects(&range(100, 10)));
    assert!(!range(100, 10).intersects(&range(20, 90)));
    assert!(Range::full(Token::MIN).intersects(&range(20, 90)));
}
