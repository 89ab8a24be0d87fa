use super::*;

#[test]
fn fresh_token_is_not_cancelled() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    assert_eq!(token.reason(), None);
}

#[test]
fn cancel_sets_reason() {
    let token = CancelToken::new();
    token.cancel(CancelReason::DeadlineExceeded);
    assert!(token.is_cancelled());
    assert_eq!(token.reason(), Some(CancelReason::DeadlineExceeded));
}

#[test]
fn first_to_fire_wins() {
    let token = CancelToken::new();
    token.cancel(CancelReason::CallerAbort);
    token.cancel(CancelReason::DeadlineExceeded);
    assert_eq!(token.reason(), Some(CancelReason::CallerAbort));
}

#[test]
fn child_cancellation_does_not_propagate_up() {
    let parent = CancelToken::new();
    let child = parent.child();
    child.cancel(CancelReason::AdminDrain);
    assert!(child.is_cancelled());
    assert!(!parent.is_cancelled());
}

#[test]
fn parent_cancellation_propagates_to_child() {
    let parent = CancelToken::new();
    let child = parent.child();
    parent.cancel(CancelReason::AdminDrain);
    assert!(child.is_cancelled());
}

#[tokio::test]
async fn race_returns_none_when_cancelled_first() {
    let token = CancelToken::new();
    token.cancel(CancelReason::CallerAbort);
    let out = token.race(std::future::pending::<()>()).await;
    assert_eq!(out, None);
}

#[tokio::test]
async fn race_returns_some_when_future_wins() {
    let token = CancelToken::new();
    let out = token.race(async { 42 }).await;
    assert_eq!(out, Some(42));
}
