//! Wall-clock triggers for the daily materialization tick and the monthly
//! report run. The jobs themselves are plain async functions that take `now`.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::core::scheduler::MaterializationScheduler;
use crate::core::services::ReportService;
use crate::core::time::Clock;

/// First instant strictly after `after` that falls on `at` (UTC).
pub fn next_daily_fire(after: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let candidate = after.date_naive().and_time(at).and_utc();
    if candidate > after {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// First instant strictly after `after` that falls on `day` of a month at `at` (UTC).
///
/// `day` is clamped to 1..=28 so every month has it.
pub fn next_monthly_fire(after: DateTime<Utc>, day: u32, at: NaiveTime) -> DateTime<Utc> {
    let day = day.clamp(1, 28);
    let (mut year, mut month) = (after.year(), after.month());
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = date.and_time(at).and_utc();
            if candidate > after {
                return candidate;
            }
        }
        if month == 12 {
            month = 1;
            year += 1;
        } else {
            month += 1;
        }
    }
}

/// Spawns the timer loops that drive the pure tick functions.
pub struct Triggers {
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Triggers {
    pub fn new(clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self { clock, cancel }
    }

    pub fn spawn_daily(
        &self,
        scheduler: Arc<MaterializationScheduler>,
        at: NaiveTime,
    ) -> JoinHandle<()> {
        let next = move |after| next_daily_fire(after, at);
        spawn_schedule(
            "materialization",
            self.clock.clone(),
            self.cancel.clone(),
            next,
            move |now| {
                let scheduler = scheduler.clone();
                async move {
                    match scheduler.try_run_tick(now).await {
                        Some(Ok(report)) => info!(
                            materialized = report.materialized(),
                            errored = report.errored(),
                            "daily tick finished"
                        ),
                        Some(Err(err)) => error!(error = %err, "daily tick failed"),
                        None => {}
                    }
                }
            },
        )
    }

    pub fn spawn_monthly(
        &self,
        reports: Arc<ReportService>,
        day: u32,
        at: NaiveTime,
    ) -> JoinHandle<()> {
        let next = move |after| next_monthly_fire(after, day, at);
        spawn_schedule(
            "monthly reports",
            self.clock.clone(),
            self.cancel.clone(),
            next,
            move |now| {
                let reports = reports.clone();
                async move {
                    match reports.run_monthly(now).await {
                        Ok(run) => info!(
                            queued = run.queued(),
                            errored = run.errored(),
                            "monthly report run finished"
                        ),
                        Err(err) => error!(error = %err, "monthly report run failed"),
                    }
                }
            },
        )
    }
}

fn spawn_schedule<N, J, Fut>(
    name: &'static str,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    next: N,
    job: J,
) -> JoinHandle<()>
where
    N: Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static,
    J: Fn(DateTime<Utc>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut fire = next(clock.now());
        info!(trigger = name, next_fire = %fire, "trigger started");
        loop {
            let wait = (fire - clock.now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            let now = clock.now();
            job(now).await;
            fire = next(now.max(fire));
        }
        info!(trigger = name, "trigger stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FixedClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn midnight() -> NaiveTime {
        NaiveTime::from_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn daily_fire_is_next_midnight() {
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 13, 30, 0).unwrap();
        assert_eq!(
            next_daily_fire(after, midnight()),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        let exactly = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            next_daily_fire(exactly, midnight()),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn monthly_fire_rolls_over_year() {
        let after = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next_monthly_fire(after, 1, midnight()),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        let mid_month = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        assert_eq!(
            next_monthly_fire(mid_month, 31, midnight()),
            Utc.with_ymd_and_hms(2024, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn schedule_fires_once_then_stops_on_cancel() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap() + Duration::milliseconds(900),
        ));
        let cancel = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = spawn_schedule(
            "test",
            clock.clone(),
            cancel.clone(),
            |after| next_daily_fire(after, midnight()),
            move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        cancel.cancel();
        handle.await.expect("trigger task joins");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
