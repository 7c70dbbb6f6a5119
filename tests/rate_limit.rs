use std::sync::Arc;
use std::time::Duration;

use forecourt::clock::ManualClock;
use forecourt::rate_limit::{
    ClientIdentity, Decision, InMemoryWindowStore, RateLimitBucket, RateLimiter,
    SlidingWindowLimiter,
};

const START: u64 = 1_700_000_000_000;

fn limiter(clock: &ManualClock) -> SlidingWindowLimiter<InMemoryWindowStore> {
    SlidingWindowLimiter::new(InMemoryWindowStore::new()).with_clock(Arc::new(clock.clone()))
}

#[tokio::test]
async fn general_bucket_allows_ten_per_hour() {
    let clock = ManualClock::starting_at(START);
    let limiter = limiter(&clock);
    let bucket = RateLimitBucket::general();
    let client = ClientIdentity::new("198.51.100.7");

    for i in 0..10 {
        let d = limiter.check(&bucket, &client, None).await.expect("no error");
        assert!(d.is_allowed(), "call {} should be allowed", i + 1);
        clock.advance(Duration::from_secs(1));
    }

    match limiter.check(&bucket, &client, None).await.expect("no error") {
        Decision::Denied { wait, .. } => {
            // Oldest hit is 10s old, so the slot frees 3590s from now.
            assert_eq!(wait, Duration::from_secs(3_590));
        }
        other => panic!("expected denied, got {other:?}"),
    }

    clock.advance(Duration::from_secs(60 * 60));
    assert!(limiter.check(&bucket, &client, None).await.expect("no error").is_allowed());
}

#[tokio::test]
async fn one_aged_out_entry_frees_exactly_one_slot() {
    let clock = ManualClock::starting_at(START);
    let limiter = limiter(&clock);
    let bucket = RateLimitBucket::general();
    let client = ClientIdentity::new("198.51.100.7");

    // One early hit, then nine more half an hour later.
    limiter.check(&bucket, &client, None).await.expect("no error");
    clock.advance(Duration::from_secs(30 * 60));
    for _ in 0..9 {
        assert!(limiter.check(&bucket, &client, None).await.expect("no error").is_allowed());
    }
    assert!(!limiter.check(&bucket, &client, None).await.expect("no error").is_allowed());

    // Only the first hit has aged out.
    clock.advance(Duration::from_secs(30 * 60));
    assert!(limiter.check(&bucket, &client, None).await.expect("no error").is_allowed());
    assert!(!limiter.check(&bucket, &client, None).await.expect("no error").is_allowed());
}

#[tokio::test]
async fn clients_and_buckets_are_counted_apart() {
    let clock = ManualClock::starting_at(START);
    let limiter = limiter(&clock);
    let contact = RateLimitBucket::contact();
    let newsletter = RateLimitBucket::newsletter();
    let a = ClientIdentity::new("192.0.2.1");
    let b = ClientIdentity::new("192.0.2.2");

    for _ in 0..5 {
        limiter.check(&contact, &a, None).await.expect("no error");
    }
    assert!(!limiter.check(&contact, &a, None).await.expect("no error").is_allowed());
    assert!(limiter.check(&contact, &b, None).await.expect("no error").is_allowed());
    assert!(limiter.check(&newsletter, &a, None).await.expect("no error").is_allowed());
}

#[tokio::test]
async fn missing_identity_shares_the_fallback_key() {
    let clock = ManualClock::starting_at(START);
    let limiter = limiter(&clock);
    let bucket = RateLimitBucket::newsletter();

    for _ in 0..3 {
        let anonymous = ClientIdentity::from_forwarded(None, None);
        limiter.check(&bucket, &anonymous, None).await.expect("no error");
    }
    let garbage = ClientIdentity::from_forwarded(Some("not-an-ip"), None);
    assert!(!limiter.check(&bucket, &garbage, None).await.expect("no error").is_allowed());
}
