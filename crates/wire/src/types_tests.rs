use super::*;
use yare::parameterized;

#[test]
fn unknown_info_is_new_and_not_in_cache() {
    let info = Info::unknown("file:///a.qgs");
    assert_eq!(info.status, CacheStatus::New);
    assert!(!info.in_cache);
    assert!(!info.pinned);
    assert_eq!(info.hits, 0);
}

#[parameterized(
    checkout = { CacheOp::Checkout { uri: "file:///a.qgs".into(), pull: true } },
    drop_op = { CacheOp::Drop { uri: "file:///a.qgs".into() } },
    list = { CacheOp::List },
    clear = { CacheOp::Clear },
    update = { CacheOp::Update },
    catalog = { CacheOp::Catalog { location: None } },
    info = { CacheOp::Info { uri: "file:///a.qgs".into() } },
)]
fn cache_op_round_trips_through_json(op: CacheOp) {
    let json = serde_json::to_string(&op).expect("serialize");
    let back: CacheOp = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, op);
}

#[test]
fn engine_op_sleep_carries_delay() {
    let op = EngineOp::Sleep { delay_ms: 10_000 };
    let json = serde_json::to_string(&op).unwrap();
    assert!(json.contains("10000"));
}
