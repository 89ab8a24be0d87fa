use super::*;

crate::define_id! {
    pub struct TestId("tst-");
}

#[test]
fn generated_id_has_prefix() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
}

#[test]
fn generated_ids_are_unique() {
    let a = TestId::new();
    let b = TestId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = TestId::from_string("tst-abc123");
    assert_eq!(id.as_str(), "tst-abc123");
    assert_eq!(id.to_string(), "tst-abc123");
}

#[test]
fn id_buf_truncates_long_input_in_short_helper() {
    assert_eq!(short("hello world", 5), "hello");
    assert_eq!(short("hi", 5), "hi");
}

#[test]
fn id_buf_empty_is_empty() {
    assert!(IdBuf::empty().is_empty());
    assert!(!IdBuf::new("x").is_empty());
}

#[test]
fn uuid_id_gen_produces_distinct_values() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
}
