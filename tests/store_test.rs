mod common;

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use vplan_adapter::error::AppError;
use vplan_adapter::services::{Lookup, StoreSettings, parse_reference_date};
use vplan_adapter::upstream::StaticPlanSource;

use common::*;

async fn source_with_plan() -> Arc<StaticPlanSource> {
    let source = Arc::new(StaticPlanSource::new());
    source.set(date(2024, 3, 4), base_plan("04.03.2024, 07:00")).await;
    source
}

#[tokio::test]
async fn test_class_request_pulls_unknown_date() {
    let source = source_with_plan().await;
    let store = store_with(source.clone(), settings(TimeDelta::minutes(10), TimeDelta::hours(1)));

    assert!(store.is_empty().await);
    let class = store.class_for(date(2024, 3, 4), "10a").await.found().unwrap();
    assert_eq!(class.name, "10a");
    assert_eq!(class.lessons.len(), 3);
    assert_eq!(source.fetch_count(), 1);
    assert!(store.contains(date(2024, 3, 4)).await);
}

#[tokio::test]
async fn test_teacher_request_on_cached_date() {
    let source = source_with_plan().await;
    let store = store_with(source.clone(), settings(TimeDelta::minutes(10), TimeDelta::hours(1)));
    store.get_or_create(date(2024, 3, 4)).await.unwrap();

    let view = store.teacher_for(date(2024, 3, 4), "XYZ").await.found().unwrap();
    let periods: Vec<u32> = view.sorted_lessons().iter().map(|l| l.key.period).collect();
    assert_eq!(periods, vec![1, 3]);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_lookup_outcomes_are_distinct() {
    let source = source_with_plan().await;
    let store = store_with(source, settings(TimeDelta::minutes(10), TimeDelta::hours(1)));

    assert!(matches!(store.class_for(date(2024, 3, 4), "13x").await, Lookup::NotFound));
    assert!(matches!(store.teacher_for(date(2024, 3, 4), "NOPE").await, Lookup::NotFound));
    assert!(matches!(store.room_for(date(2024, 3, 4), "999").await, Lookup::NotFound));
    assert!(store.class_for(date(2024, 3, 5), "10a").await.is_date_unavailable());
    assert!(store.room_for(date(2024, 3, 4), "101").await.found().is_some());

    let err = store
        .class_for(date(2024, 3, 5), "10a")
        .await
        .into_result(date(2024, 3, 5), || AppError::ClassNotFound("10a".into()))
        .unwrap_err();
    assert!(matches!(err, AppError::PlanNotFound(_)));
}

#[tokio::test]
async fn test_invalid_date_is_rejected_before_any_pull() {
    assert!(matches!(parse_reference_date("2024-02-30"), Err(AppError::InvalidDate(_))));
    assert!(matches!(parse_reference_date("04.03.2024"), Err(AppError::InvalidDate(_))));
    assert_eq!(parse_reference_date("2024-02-29").unwrap(), date(2024, 2, 29));
}

#[tokio::test]
async fn test_failed_first_pull_is_not_retained() {
    let source = Arc::new(StaticPlanSource::new());
    let store = store_with(source.clone(), settings(TimeDelta::minutes(10), TimeDelta::hours(1)));

    assert!(store.get_or_create(date(2024, 3, 4)).await.is_none());
    assert!(store.is_empty().await);
    assert!(store.get_or_create(date(2024, 3, 4)).await.is_none());
    assert_eq!(source.fetch_count(), 2);

    source.set(date(2024, 3, 4), base_plan("04.03.2024, 07:00")).await;
    assert!(store.get_or_create(date(2024, 3, 4)).await.is_some());
    assert_eq!(source.fetch_count(), 3);
}

#[tokio::test]
async fn test_negative_cache_suppresses_retries() {
    let source = Arc::new(StaticPlanSource::new());
    let store = store_with(
        source.clone(),
        StoreSettings {
            freshness: TimeDelta::minutes(10),
            retention: TimeDelta::hours(1),
            negative_ttl: TimeDelta::minutes(1),
        },
    );

    assert!(store.get_or_create(date(2024, 3, 4)).await.is_none());
    source.set(date(2024, 3, 4), base_plan("04.03.2024, 07:00")).await;
    assert!(store.get_or_create(date(2024, 3, 4)).await.is_none());
    assert_eq!(source.fetch_count(), 1);

    // a purge sweep past the negative TTL forgets the failure
    store.purge_expired(Utc::now() + TimeDelta::minutes(2)).await;
    assert!(store.get_or_create(date(2024, 3, 4)).await.is_some());
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_stale_snapshot_is_repulled_not_evicted() {
    let source = source_with_plan().await;
    let store = store_with(source.clone(), settings(TimeDelta::zero(), TimeDelta::hours(1)));

    store.get_or_create(date(2024, 3, 4)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    assert_eq!(store.purge_expired(Utc::now()).await, 0);
    assert!(store.class_for(date(2024, 3, 4), "10a").await.found().is_some());
    assert!(source.fetch_count() >= 2);
    assert!(store.contains(date(2024, 3, 4)).await);
}

#[tokio::test]
async fn test_retention_expiry_evicts_fresh_snapshot() {
    let source = source_with_plan().await;
    let store = store_with(source.clone(), settings(TimeDelta::hours(1), TimeDelta::minutes(30)));

    store.get_or_create(date(2024, 3, 4)).await.unwrap();
    assert_eq!(store.purge_expired(Utc::now() + TimeDelta::minutes(10)).await, 0);
    assert_eq!(store.purge_expired(Utc::now() + TimeDelta::minutes(31)).await, 1);
    assert!(!store.contains(date(2024, 3, 4)).await);

    // the next request starts from scratch
    store.get_or_create(date(2024, 3, 4)).await.unwrap();
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_access_extends_retention() {
    let source = source_with_plan().await;
    source.set(date(2024, 3, 5), base_plan("05.03.2024, 07:00")).await;
    let store = store_with(source, settings(TimeDelta::hours(1), TimeDelta::minutes(30)));

    store.get_or_create(date(2024, 3, 4)).await.unwrap();
    store.get_or_create(date(2024, 3, 5)).await.unwrap();

    let stats = store.stats().await;
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].date, date(2024, 3, 4));
    assert_eq!(stats[0].retention_expires, Some(stats[0].last_access + TimeDelta::minutes(30)));
    assert_eq!(stats[0].data_expires, stats[0].last_updated.map(|t| t + TimeDelta::hours(1)));

    let untouched_expiry = stats[1].retention_expires.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.get_or_create(date(2024, 3, 4)).await.unwrap();

    // only the date that was not touched again falls out
    let evicted = store.purge_expired(untouched_expiry + TimeDelta::milliseconds(1)).await;
    assert_eq!(evicted, 1);
    assert!(store.contains(date(2024, 3, 4)).await);
    assert!(!store.contains(date(2024, 3, 5)).await);
}

#[tokio::test]
async fn test_dates_are_independent() {
    let source = source_with_plan().await;
    source.set(date(2024, 3, 5), base_plan("05.03.2024, 07:00")).await;
    let store = store_with(source.clone(), settings(TimeDelta::hours(1), TimeDelta::hours(1)));

    let (a, b) = tokio::join!(
        store.class_for(date(2024, 3, 4), "10a"),
        store.class_for(date(2024, 3, 5), "10b"),
    );
    assert!(a.found().is_some());
    assert!(b.found().is_some());
    assert_eq!(store.len().await, 2);
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_plan_header_lookup() {
    let source = source_with_plan().await;
    let store = store_with(source, settings(TimeDelta::hours(1), TimeDelta::hours(1)));

    let header = store.header_for(date(2024, 3, 4)).await.found().unwrap();
    assert_eq!(header.timestamp, "04.03.2024, 07:00");
    assert!(store.header_for(date(2024, 3, 9)).await.is_date_unavailable());
}

#[tokio::test]
async fn test_unbounded_ttls_never_expire() {
    let source = source_with_plan().await;
    let forever = TimeDelta::seconds(100_000_000_000_000);
    let store = store_with(source, settings(forever, forever));

    store.get_or_create(date(2024, 3, 4)).await.unwrap();
    assert_eq!(store.purge_expired(Utc::now()).await, 0);
    assert!(store.contains(date(2024, 3, 4)).await);

    let stats = store.stats().await;
    assert_eq!(stats[0].retention_expires, None);
    assert_eq!(stats[0].data_expires, None);
    assert!(stats[0].last_updated.is_some());
}
