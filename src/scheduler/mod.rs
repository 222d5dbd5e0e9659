use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

pub async fn run_daily_scheduler<S, F, Fut>(mut time_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<NaiveTime>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    let mut last_logged = None;

    loop {
        let target = match time_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load digest schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match delay_until(&Local::now(), target) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, time = %target, "failed to compute next digest run");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged != Some(target) {
            info!(seconds = delay.as_secs(), time = %target.format("%H:%M"), "next digest run scheduled");
            last_logged = Some(target);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        match task().await {
            Ok(written) => info!(digests = written, "scheduled digests generated"),
            Err(error) => error!(error = %error, "scheduled digest generation failed"),
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// Time from `now` until the next wall-clock occurrence of `target`. A target
/// that falls into a DST gap today is tried again tomorrow.
pub fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, target: NaiveTime) -> Result<Duration> {
    let timezone = now.timezone();
    let today = now.date_naive();

    let next_run = (0..=2)
        .filter_map(|offset| {
            let day = today + ChronoDuration::days(offset);
            timezone
                .from_local_datetime(&day.and_time(target))
                .earliest()
        })
        .find(|candidate| candidate > now)
        .context("Failed to find the next digest run time")?;

    (next_run - now.clone())
        .to_std()
        .context("Failed to compute next execution delay")
}
