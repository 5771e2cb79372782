// src/services/scheduler.rs
use chrono::Utc;
use chrono_tz::America::Argentina::Buenos_Aires;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::models::IndexType;
use crate::services::refresh::{IndexRefresher, RefreshReport};

// Cron expressions run in UTC. Buenos Aires is UTC-3 all year.

/// Hourly 10:00-18:00 Buenos Aires time, Monday to Friday.
pub const DOLLAR_CRON: &str = "0 0 13-21 * * Mon-Fri";
/// 10:00 Buenos Aires time, Monday to Friday.
pub const ICL_CRON: &str = "0 0 13 * * Mon-Fri";
/// 17:00 Buenos Aires time, every day.
pub const IPC_CRON: &str = "0 0 20 * * *";
pub const STARTUP_DELAY: Duration = Duration::from_secs(30);

const DOLLAR_TYPES: [IndexType; 3] = [IndexType::DolarBlue, IndexType::DolarOficial, IndexType::DolarMep];

fn log_report(job: &str, report: &RefreshReport) {
    info!(
        "Scheduled {} refresh done: {} inserted, {} skipped, {} failed fetchers",
        job,
        report.inserted(),
        report.skipped(),
        report.failures()
    );
}

fn typed_refresh_job(
    cron: &str,
    job: &'static str,
    types: &'static [IndexType],
    refresher: Arc<IndexRefresher>,
) -> Result<Job, JobSchedulerError> {
    Job::new_async(cron, move |_uuid, _l| {
        let refresher = refresher.clone();
        Box::pin(async move {
            let report = refresher.refresh_index_types("AR", types).await;
            log_report(job, &report);
        })
    })
}

/// Registers the periodic refresh jobs plus the one-shot startup job and starts the scheduler.
pub async fn start_scheduler(
    refresher: Arc<IndexRefresher>,
    startup_backfill: bool,
) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;

    sched
        .add(typed_refresh_job(DOLLAR_CRON, "dollar", &DOLLAR_TYPES, refresher.clone())?)
        .await?;
    sched
        .add(typed_refresh_job(ICL_CRON, "ICL", &[IndexType::Icl], refresher.clone())?)
        .await?;
    sched
        .add(typed_refresh_job(IPC_CRON, "IPC", &[IndexType::Ipc], refresher.clone())?)
        .await?;

    let startup = refresher.clone();
    let startup_job = Job::new_one_shot_async(STARTUP_DELAY, move |_uuid, _l| {
        let refresher = startup.clone();
        Box::pin(async move {
            let report = if startup_backfill {
                refresher.import_all_historical().await
            } else {
                refresher.refresh_all().await
            };
            log_report("startup", &report);
        })
    })?;
    sched.add(startup_job).await?;

    sched.start().await?;
    info!(
        "Scheduler started at {} Buenos Aires time (UTC crons dollar: {}, ICL: {}, IPC: {}, startup in {:?})",
        Utc::now().with_timezone(&Buenos_Aires).format("%Y-%m-%d %H:%M"),
        DOLLAR_CRON,
        ICL_CRON,
        IPC_CRON,
        STARTUP_DELAY
    );
    Ok(sched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Timelike};

    #[tokio::test]
    async fn cron_expressions_build_jobs() {
        for cron in [DOLLAR_CRON, ICL_CRON, IPC_CRON] {
            let job = Job::new(cron, |_uuid, _l| {});
            assert!(job.is_ok(), "cron {} should parse", cron);
        }
    }

    #[test]
    fn utc_hours_land_on_buenos_aires_local_hours() {
        // winter and summer: Argentina keeps UTC-3 without daylight saving
        for (month, day) in [(1, 15), (7, 15)] {
            let at = |hour: u32| {
                let utc = Utc.from_utc_datetime(
                    &NaiveDate::from_ymd_opt(2024, month, day).unwrap().and_hms_opt(hour, 0, 0).unwrap(),
                );
                utc.with_timezone(&Buenos_Aires).hour()
            };
            assert_eq!(at(13), 10);
            assert_eq!(at(20), 17);
            assert_eq!(at(21), 18);
        }
    }

    #[test]
    fn dollar_job_covers_every_dollar_quote() {
        assert!(DOLLAR_TYPES.iter().all(|t| t.as_str().starts_with("DOLAR_")));
        assert!(!DOLLAR_TYPES.contains(&IndexType::Icl));
    }
}
