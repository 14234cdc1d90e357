use super::{Error, Hash};

#[test]
fn test_hash_is_sha256() {
    let hash = Hash::new(b"abc");
    assert_eq!(
        hash.to_hex(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_of_parts_matches_concatenation() {
    let parts: [&[u8]; 3] = [b"a", b"b", b"c"];
    assert_eq!(Hash::of_parts(parts), Hash::new(b"abc"));
}

#[test]
fn test_xor_with_zero_is_identity() {
    let hash = Hash::new(b"row");
    assert_eq!(hash ^ Hash::ZERO, hash);
    assert!((hash ^ hash).is_zero(), "xor with self must cancel");
}

#[test]
fn test_xor_commutes() {
    let a = Hash::new(b"a");
    let b = Hash::new(b"b");
    let c = Hash::new(b"c");
    assert_eq!(a ^ b ^ c, c ^ a ^ b);
}

#[test]
fn test_hex_roundtrip() {
    let hash = Hash::new(b"value");
    let parsed: Hash = hash.to_string().parse().unwrap();
    assert_eq!(parsed, hash);
}

#[test]
fn test_parse_wrong_length_fails() {
    let result = "abcd".parse::<Hash>();
    assert!(matches!(result, Err(Error::InvalidLength)));
}
