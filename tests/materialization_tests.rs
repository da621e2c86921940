mod common;

use std::sync::Arc;

use chrono::Duration;
use expense_core::{
    core::{
        dueness::is_due,
        scheduler::{SkipReason, TickOutcome},
    },
    domain::{DateWindow, RecurringDefinitionPatch, RecurringInterval},
    storage::{JsonStore, LedgerStore, RecurringStore},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{at, date, definition, harness, harness_with, temp_base, FlakyResolver};

#[tokio::test]
async fn tick_at_watermark_writes_nothing() {
    let h = harness();
    let owner = Uuid::new_v4();
    let now = at(2024, 3, 5, 0, 0, 0);
    for interval in [
        RecurringInterval::Daily,
        RecurringInterval::Weekly,
        RecurringInterval::Monthly,
    ] {
        h.recurring
            .create(owner, definition(interval, 10, None), now)
            .await
            .unwrap();
    }

    let report = h.scheduler.run_tick(now).await.unwrap();
    assert_eq!(report.materialized(), 0);
    assert_eq!(report.skipped(), 3);
    let year = DateWindow::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
    assert!(h.store.query_range(owner, year).await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_tick_after_materializing_is_idempotent() {
    let h = harness();
    let owner = Uuid::new_v4();
    let created = at(2024, 1, 1, 8, 0, 0);
    let def = h
        .recurring
        .create(owner, definition(RecurringInterval::Daily, 10, Some("Bills")), created)
        .await
        .unwrap();

    let now = at(2024, 1, 2, 0, 0, 0);
    assert_eq!(h.scheduler.run_tick(now).await.unwrap().materialized(), 1);
    let again = h.scheduler.run_tick(now).await.unwrap();
    assert_eq!(again.materialized(), 0);
    assert_eq!(
        again.outcome_for(def.id),
        Some(&TickOutcome::Skipped(SkipReason::NotDue))
    );
    assert_eq!(h.expenses.materialized_from(owner, def.id).await.unwrap().len(), 1);
}

#[test]
fn daily_boundary_follows_utc_calendar_date() {
    let watermark = at(2024, 1, 1, 23, 59, 59);
    assert!(is_due(RecurringInterval::Daily, watermark, at(2024, 1, 2, 0, 0, 1)));
    assert!(!is_due(RecurringInterval::Daily, watermark, at(2024, 1, 1, 23, 59, 0)));
}

#[tokio::test]
async fn daily_definition_materializes_just_after_midnight() {
    let h = harness();
    let owner = Uuid::new_v4();
    let def = h
        .recurring
        .create(
            owner,
            definition(RecurringInterval::Daily, 5, None),
            at(2024, 1, 1, 23, 59, 59),
        )
        .await
        .unwrap();

    let late = h.scheduler.run_tick(at(2024, 1, 1, 23, 59, 59)).await.unwrap();
    assert_eq!(late.materialized(), 0);

    let next_day = at(2024, 1, 2, 0, 0, 1);
    let report = h.scheduler.run_tick(next_day).await.unwrap();
    assert!(matches!(
        report.outcome_for(def.id),
        Some(TickOutcome::Materialized { .. })
    ));
    let stored = h.store.definition(def.id).await.unwrap().unwrap();
    assert_eq!(stored.watermark, next_day);
}

#[test]
fn monthly_boundary_compares_year_and_month() {
    let watermark = at(2024, 1, 15, 12, 0, 0);
    assert!(is_due(RecurringInterval::Monthly, watermark, at(2024, 2, 1, 0, 0, 0)));
    assert!(is_due(RecurringInterval::Monthly, watermark, at(2024, 2, 29, 23, 0, 0)));
    assert!(!is_due(RecurringInterval::Monthly, watermark, at(2024, 1, 31, 23, 59, 59)));
}

#[tokio::test]
async fn monthly_definition_waits_for_next_month() {
    let h = harness();
    let owner = Uuid::new_v4();
    let def = h
        .recurring
        .create(
            owner,
            definition(RecurringInterval::Monthly, 1200, Some("Housing")),
            at(2024, 1, 15, 12, 0, 0),
        )
        .await
        .unwrap();

    assert_eq!(
        h.scheduler
            .run_tick(at(2024, 1, 31, 0, 0, 0))
            .await
            .unwrap()
            .materialized(),
        0
    );
    let report = h.scheduler.run_tick(at(2024, 2, 1, 0, 0, 0)).await.unwrap();
    assert_eq!(report.materialized(), 1);

    let entries = h.expenses.materialized_from(owner, def.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, Decimal::new(1200, 0));
    assert_eq!(entries[0].description, "[Recurring] Monthly bill");
}

#[tokio::test]
async fn weekly_definition_needs_a_full_week() {
    let h = harness();
    let owner = Uuid::new_v4();
    let created = at(2024, 1, 1, 9, 0, 0);
    let def = h
        .recurring
        .create(owner, definition(RecurringInterval::Weekly, 20, None), created)
        .await
        .unwrap();

    let almost = created + Duration::days(7) - Duration::seconds(1);
    assert_eq!(h.scheduler.run_tick(almost).await.unwrap().materialized(), 0);
    let week = created + Duration::days(7);
    assert_eq!(h.scheduler.run_tick(week).await.unwrap().materialized(), 1);
    assert_eq!(h.expenses.materialized_from(owner, def.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn inactive_definition_is_never_materialized() {
    let h = harness();
    let owner = Uuid::new_v4();
    let def = h
        .recurring
        .create(
            owner,
            definition(RecurringInterval::Daily, 10, None),
            at(2024, 1, 1, 0, 0, 0),
        )
        .await
        .unwrap();
    h.recurring.set_active(owner, def.id, false).await.unwrap();

    for day in 2..=5 {
        let report = h.scheduler.run_tick(at(2024, 3, day, 0, 0, 0)).await.unwrap();
        assert_eq!(report.materialized(), 0);
    }
    assert!(h.expenses.materialized_from(owner, def.id).await.unwrap().is_empty());
    let stored = h.store.definition(def.id).await.unwrap().unwrap();
    assert_eq!(stored.watermark, at(2024, 1, 1, 0, 0, 0));
}

#[tokio::test]
async fn definition_past_end_date_is_skipped() {
    let h = harness();
    let owner = Uuid::new_v4();
    let mut input = definition(RecurringInterval::Daily, 10, None);
    input.end_date = Some(date(2024, 1, 10));
    let def = h
        .recurring
        .create(owner, input, at(2024, 1, 1, 0, 0, 0))
        .await
        .unwrap();

    let report = h.scheduler.run_tick(at(2024, 1, 11, 0, 0, 0)).await.unwrap();
    assert!(!matches!(
        report.outcome_for(def.id),
        Some(TickOutcome::Materialized { .. })
    ));
    assert!(h.expenses.materialized_from(owner, def.id).await.unwrap().is_empty());

    // The end date itself is inclusive.
    let report = h.scheduler.run_tick(at(2024, 1, 10, 6, 0, 0)).await.unwrap();
    assert_eq!(report.materialized(), 1);
}

#[tokio::test]
async fn definition_before_start_date_is_skipped() {
    let h = harness();
    let owner = Uuid::new_v4();
    let mut input = definition(RecurringInterval::Daily, 10, None);
    input.start_date = date(2024, 6, 1);
    let def = h
        .recurring
        .create(owner, input, at(2024, 1, 1, 0, 0, 0))
        .await
        .unwrap();

    let report = h.scheduler.run_tick(at(2024, 5, 31, 0, 0, 0)).await.unwrap();
    assert_eq!(report.materialized(), 0);
    assert!(h.expenses.materialized_from(owner, def.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failing_category_resolution_is_isolated() {
    let store = Arc::new(JsonStore::in_memory());
    let resolver = Arc::new(FlakyResolver {
        inner: store.clone(),
        failing_name: Some("Broken".into()),
        failing_owner: None,
    });
    let h = harness_with(store.clone(), resolver);
    let owner = Uuid::new_v4();
    let created = at(2024, 1, 1, 0, 0, 0);
    let broken = h
        .recurring
        .create(owner, definition(RecurringInterval::Daily, 10, None), created)
        .await
        .unwrap();
    // Point the stored definition at the failing name behind the service's back.
    let mut stored = store.definition(broken.id).await.unwrap().unwrap();
    stored.category_name = Some("Broken".into());
    store.update_definition(stored).await.unwrap();
    let healthy = h
        .recurring
        .create(owner, definition(RecurringInterval::Daily, 25, Some("Food")), created)
        .await
        .unwrap();

    let now = at(2024, 1, 2, 0, 0, 0);
    let report = h.scheduler.run_tick(now).await.unwrap();
    assert!(matches!(report.outcome_for(broken.id), Some(TickOutcome::Errored(_))));
    assert!(matches!(
        report.outcome_for(healthy.id),
        Some(TickOutcome::Materialized { .. })
    ));

    let broken_after = store.definition(broken.id).await.unwrap().unwrap();
    assert_eq!(broken_after.watermark, created);
    assert!(h.expenses.materialized_from(owner, broken.id).await.unwrap().is_empty());
    let healthy_after = store.definition(healthy.id).await.unwrap().unwrap();
    assert_eq!(healthy_after.watermark, now);
}

#[tokio::test]
async fn missed_periods_materialize_once() {
    let h = harness();
    let owner = Uuid::new_v4();
    let def = h
        .recurring
        .create(
            owner,
            definition(RecurringInterval::Daily, 10, None),
            at(2024, 1, 1, 0, 0, 0),
        )
        .await
        .unwrap();

    let report = h.scheduler.run_tick(at(2024, 1, 11, 0, 0, 0)).await.unwrap();
    assert_eq!(report.materialized(), 1);
    assert_eq!(h.expenses.materialized_from(owner, def.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn owner_edit_between_ticks_keeps_schedule() {
    let h = harness();
    let owner = Uuid::new_v4();
    let def = h
        .recurring
        .create(
            owner,
            definition(RecurringInterval::Daily, 10, None),
            at(2024, 1, 1, 0, 0, 0),
        )
        .await
        .unwrap();
    h.scheduler.run_tick(at(2024, 1, 2, 0, 0, 0)).await.unwrap();

    let patch = RecurringDefinitionPatch {
        amount: Some(Decimal::new(15, 0)),
        ..RecurringDefinitionPatch::default()
    };
    h.recurring.update(owner, def.id, patch).await.unwrap();
    assert_eq!(
        h.scheduler
            .run_tick(at(2024, 1, 2, 12, 0, 0))
            .await
            .unwrap()
            .materialized(),
        0
    );
    h.scheduler.run_tick(at(2024, 1, 3, 0, 0, 0)).await.unwrap();

    let mut amounts: Vec<Decimal> = h
        .expenses
        .materialized_from(owner, def.id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.amount)
        .collect();
    amounts.sort();
    assert_eq!(amounts, vec![Decimal::new(10, 0), Decimal::new(15, 0)]);
}

#[tokio::test]
async fn persisted_watermark_survives_restart() {
    let path = temp_base().join("store.json");
    let owner = Uuid::new_v4();
    let now = at(2024, 1, 2, 0, 0, 0);
    {
        let store = Arc::new(JsonStore::open(&path).await.unwrap());
        let h = harness_with(store.clone(), store);
        h.recurring
            .create(
                owner,
                definition(RecurringInterval::Daily, 10, None),
                at(2024, 1, 1, 0, 0, 0),
            )
            .await
            .unwrap();
        assert_eq!(h.scheduler.run_tick(now).await.unwrap().materialized(), 1);
    }

    let store = Arc::new(JsonStore::open(&path).await.unwrap());
    let h = harness_with(store.clone(), store);
    assert_eq!(h.scheduler.run_tick(now).await.unwrap().materialized(), 0);
    let day = DateWindow::new(date(2024, 1, 2), date(2024, 1, 2)).unwrap();
    assert_eq!(h.store.query_range(owner, day).await.unwrap().len(), 1);
}
