mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use common::{d, dates_for, seeded, template, FaultyStore};
use outlay_core::{parse_timezone, Frequency, OutlayError};
use outlay_recurring::{
    DailySchedule, DailyTrigger, DueSetProcessor, OnDemandTrigger, RetryPolicy, TemplateStore,
    PROCESSED_MESSAGE,
};

fn processor_over(store: &outlay_recurring::InMemoryStore) -> DueSetProcessor {
    DueSetProcessor::new(Arc::new(store.clone()), Arc::new(store.clone()))
        .with_retry(RetryPolicy::no_backoff(3))
}

fn processor_over_faulty(store: &Arc<FaultyStore>) -> DueSetProcessor {
    DueSetProcessor::new(store.clone(), store.clone()).with_retry(RetryPolicy::no_backoff(3))
}

#[tokio::test]
async fn monthly_rent_backfills_three_months() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2025, 11, 1));
    let store = seeded(&[rent.clone()]).await;

    let report = processor_over(&store).process_due(d(2026, 1, 15)).await.unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(report.templates_processed, 1);
    assert_eq!(
        dates_for(&store, rent.id),
        vec![d(2025, 11, 1), d(2025, 12, 1), d(2026, 1, 1)]
    );
    assert_eq!(store.template(rent.id).unwrap().next_due_date, d(2026, 2, 1));
    assert!(store.expenses().iter().all(|e| e.amount == 1200.0 && e.title == "Rent"));
}

#[tokio::test]
async fn second_run_with_same_cutoff_is_a_no_op() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2025, 11, 1));
    let gym = template("Gym", 30.0, Frequency::Weekly, d(2026, 1, 1));
    let store = seeded(&[rent, gym]).await;
    let processor = processor_over(&store);

    let first = processor.process_due(d(2026, 1, 15)).await.unwrap();
    let after_first = store.expenses();
    let second = processor.process_due(d(2026, 1, 15)).await.unwrap();

    assert_eq!(first.created, 3 + 3);
    assert_eq!(second.created, 0);
    assert_eq!(second.templates_processed, 0);
    assert_eq!(store.expenses(), after_first);
}

#[tokio::test]
async fn inactive_template_is_never_processed() {
    let mut paused = template("Storage unit", 80.0, Frequency::Monthly, d(2024, 1, 1));
    paused.active = false;
    let store = seeded(&[paused.clone()]).await;

    let report = processor_over(&store).process_due(d(2026, 1, 15)).await.unwrap();

    assert_eq!(report.created, 0);
    assert!(store.expenses().is_empty());
    assert_eq!(store.template(paused.id).unwrap().next_due_date, d(2024, 1, 1));
}

#[tokio::test]
async fn template_not_yet_due_is_untouched() {
    let future = template("Insurance", 95.0, Frequency::Monthly, d(2026, 2, 1));
    let store = seeded(&[future.clone()]).await;

    let report = processor_over(&store).process_due(d(2026, 1, 31)).await.unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(store.template(future.id).unwrap().next_due_date, d(2026, 2, 1));
}

#[tokio::test]
async fn weekly_due_dates_advance_past_cutoff() {
    let gym = template("Gym", 30.0, Frequency::Weekly, d(2026, 1, 1));
    let store = seeded(&[gym.clone()]).await;

    // 30 days: floor(30 / 7) + 1 = 5
    let report = processor_over(&store).process_due(d(2026, 1, 31)).await.unwrap();

    assert_eq!(report.created, 5);
    assert_eq!(store.template(gym.id).unwrap().next_due_date, d(2026, 2, 5));
}

#[tokio::test]
async fn transient_batch_failure_recovers_within_retry_budget() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2026, 1, 1));
    let store = Arc::new(FaultyStore::wrapping(seeded(&[rent.clone()]).await));
    store.transient_batch_failures.store(2, Ordering::SeqCst);

    let report = processor_over_faulty(&store)
        .process_due(d(2026, 1, 15))
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert!(report.failures.is_empty());
    assert_eq!(store.batch_calls.load(Ordering::SeqCst), 3);
    assert_eq!(dates_for(&store.inner, rent.id), vec![d(2026, 1, 1)]);
}

#[tokio::test]
async fn exhausted_retries_restore_due_date() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2026, 1, 1));
    let store = Arc::new(FaultyStore::wrapping(seeded(&[rent.clone()]).await));
    store.transient_batch_failures.store(10, Ordering::SeqCst);

    let report = processor_over_faulty(&store)
        .process_due(d(2026, 1, 15))
        .await
        .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].will_retry);
    assert_eq!(store.inner.template(rent.id).unwrap().next_due_date, d(2026, 1, 1));
    assert!(store.inner.expenses().is_empty());
}

#[tokio::test]
async fn failing_template_does_not_block_others_and_is_picked_up_later() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2025, 12, 1));
    let phone = template("Phone", 45.0, Frequency::Monthly, d(2025, 12, 10));
    let store = Arc::new(FaultyStore::wrapping(
        seeded(&[rent.clone(), phone.clone()]).await,
    ));
    store.break_template(Some(rent.id));
    let processor = processor_over_faulty(&store);

    let first = processor.process_due(d(2026, 1, 15)).await.unwrap();
    assert_eq!(first.created, 2);
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].template_id, rent.id);
    assert!(dates_for(&store.inner, rent.id).is_empty());
    assert_eq!(store.inner.template(rent.id).unwrap().next_due_date, d(2025, 12, 1));
    assert_eq!(
        dates_for(&store.inner, phone.id),
        vec![d(2025, 12, 10), d(2026, 1, 10)]
    );

    store.break_template(None);
    let retry = processor.process_due(d(2026, 1, 15)).await.unwrap();
    assert_eq!(retry.created, 2);
    assert_eq!(
        dates_for(&store.inner, rent.id),
        vec![d(2025, 12, 1), d(2026, 1, 1)]
    );
    assert_eq!(dates_for(&store.inner, phone.id).len(), 2);
}

#[tokio::test]
async fn template_store_outage_aborts_run() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2026, 1, 1));
    let store = Arc::new(FaultyStore::wrapping(seeded(&[rent.clone()]).await));
    store.list_due_down.store(true, Ordering::SeqCst);

    let err = processor_over_faulty(&store)
        .process_due(d(2026, 1, 15))
        .await
        .unwrap_err();

    assert!(matches!(err, OutlayError::StoreUnavailable(_)));
    assert!(store.inner.expenses().is_empty());
    assert_eq!(store.inner.template(rent.id).unwrap().next_due_date, d(2026, 1, 1));
}

#[tokio::test]
async fn preview_materializes_without_writing() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2025, 11, 1));
    let store = seeded(&[rent.clone()]).await;

    let plans = processor_over(&store).preview(d(2026, 1, 15)).await.unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].count(), 3);
    assert_eq!(plans[0].next_due_date, d(2026, 2, 1));
    assert!(store.expenses().is_empty());
    assert_eq!(store.template(rent.id).unwrap().next_due_date, d(2025, 11, 1));
}

#[tokio::test]
async fn on_demand_trigger_reports_created_count() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2025, 11, 1));
    let store = seeded(&[rent]).await;
    let trigger = OnDemandTrigger::new(Arc::new(processor_over(&store)));

    let first = trigger.run(d(2026, 1, 15)).await.unwrap();
    let second = trigger.run(d(2026, 1, 15)).await.unwrap();

    assert_eq!(first.message, PROCESSED_MESSAGE);
    assert_eq!(first.created_expenses, 3);
    assert_eq!(second.created_expenses, 0);
}

#[tokio::test]
async fn daily_trigger_processes_local_today() {
    // Due on the 15th local time; in UTC it is still the 14th.
    let bill = template("Water", 25.0, Frequency::Monthly, d(2026, 1, 15));
    let store = seeded(&[bill.clone()]).await;
    let schedule = DailySchedule {
        timezone: parse_timezone("Asia/Tokyo").unwrap(),
        run_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
    };
    let trigger = DailyTrigger::new(Arc::new(processor_over(&store)), schedule);

    let now = Utc.with_ymd_and_hms(2026, 1, 14, 15, 5, 0).unwrap();
    let report = trigger.run_once(now).await.unwrap();

    assert_eq!(report.cutoff, d(2026, 1, 15));
    assert_eq!(report.created, 1);
    assert_eq!(store.template(bill.id).unwrap().next_due_date, d(2026, 2, 15));
}

#[tokio::test]
async fn daily_trigger_logs_and_survives_store_outage() {
    let store = Arc::new(FaultyStore::default());
    store.list_due_down.store(true, Ordering::SeqCst);
    let schedule = DailySchedule {
        timezone: parse_timezone("UTC").unwrap(),
        run_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
    };
    let trigger = DailyTrigger::new(Arc::new(processor_over_faulty(&store)), schedule);

    let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 5, 0).unwrap();
    assert!(trigger.run_once(now).await.is_none());

    store.list_due_down.store(false, Ordering::SeqCst);
    assert!(trigger.run_once(now).await.is_some());
}

#[tokio::test]
async fn daily_trigger_stops_on_shutdown() {
    let store = seeded(&[]).await;
    let schedule = DailySchedule {
        timezone: parse_timezone("UTC").unwrap(),
        run_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap(),
    };
    let trigger = DailyTrigger::new(Arc::new(processor_over(&store)), schedule);
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = trigger.spawn(rx);
    tx.send(true).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn deleted_template_between_list_and_claim_is_skipped() {
    let rent = template("Rent", 1200.0, Frequency::Monthly, d(2026, 1, 1));
    let gym = template("Gym", 30.0, Frequency::Weekly, d(2026, 1, 1));
    let store = Arc::new(FaultyStore::wrapping(
        seeded(&[rent.clone(), gym.clone()]).await,
    ));
    *store.delete_after_list.lock().unwrap() = Some(rent.id);
    let processor = processor_over_faulty(&store);

    let report = processor.process_due(d(2026, 1, 15)).await.unwrap();
    assert_eq!(report.templates_processed, 1);
    assert_eq!(report.created, 3);
    assert_eq!(report.conflicts, 1);
    assert!(report.failures.is_empty());
    assert!(dates_for(&store.inner, rent.id).is_empty());
    assert_eq!(dates_for(&store.inner, gym.id).len(), 3);
}
