//! Daily counter of billable provider calls.
//!
//! Increment and reset serialize on one mutex, so no increment is lost and
//! the count never goes negative. The state can be persisted to a JSON file
//! so the daily limit holds across restarts.

use super::cache::write_atomic;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Count of billable calls made on `day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub count: u64,
    pub day: NaiveDate,
}

pub struct QuotaCounter {
    state: Mutex<QuotaState>,
    tz: Tz,
    path: Option<PathBuf>,
}

impl QuotaCounter {
    /// A fresh counter that is never written to disk.
    pub fn in_memory(tz: Tz) -> Self {
        Self {
            state: Mutex::new(QuotaState { count: 0, day: today_in(tz) }),
            tz,
            path: None,
        }
    }

    /// Load a persisted counter. A state from an earlier day starts fresh.
    pub fn load_from(path: PathBuf, tz: Tz) -> Self {
        let today = today_in(tz);
        let state = match Self::read_file(&path) {
            Some(s) if s.day == today => s,
            Some(s) => {
                debug!("persisted quota is from {}, starting fresh for {}", s.day, today);
                QuotaState { count: 0, day: today }
            }
            None => QuotaState { count: 0, day: today },
        };
        Self {
            state: Mutex::new(state),
            tz,
            path: Some(path),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".position")
            .join("quota.json")
    }

    fn read_file(path: &Path) -> Option<QuotaState> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("ignoring unreadable quota file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Charge one billable call.
    pub fn consume(&self) {
        let mut state = self.lock();
        self.roll_over(&mut state);
        state.count = state.count.saturating_add(1);
        self.persist(&state);
    }

    /// Charge one billable call unless today's count has already reached
    /// `limit`. Check and increment happen under the same lock.
    pub fn try_consume(&self, limit: u64) -> bool {
        let mut state = self.lock();
        self.roll_over(&mut state);
        if state.count >= limit {
            return false;
        }
        state.count += 1;
        self.persist(&state);
        true
    }

    /// True iff today's count has reached `limit`.
    pub fn reached(&self, limit: u64) -> bool {
        self.snapshot().count >= limit
    }

    /// Zero the counter and move it to today.
    pub fn reset(&self) {
        let today = today_in(self.tz);
        let mut state = self.lock();
        info!("resetting daily quota (count was {} on {})", state.count, state.day);
        *state = QuotaState { count: 0, day: today };
        self.persist(&state);
    }

    /// Today's state. A count left over from an earlier day reads as zero.
    pub fn snapshot(&self) -> QuotaState {
        let today = today_in(self.tz);
        let state = *self.lock();
        if state.day < today {
            QuotaState { count: 0, day: today }
        } else {
            state
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    fn roll_over(&self, state: &mut QuotaState) {
        let today = today_in(self.tz);
        if state.day < today {
            info!("quota day rolled over from {} to {} (count was {})", state.day, today, state.count);
            *state = QuotaState { count: 0, day: today };
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QuotaState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &QuotaState) {
        let Some(path) = &self.path else { return };
        match serde_json::to_string(state) {
            Ok(json) => {
                if let Err(e) = write_atomic(path, json.as_bytes()) {
                    warn!("cannot write quota file {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("cannot serialize quota state: {}", e),
        }
    }
}

fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Time from `now` until the next local midnight in `tz`.
///
/// When midnight falls in a DST gap the first valid instant after it is used.
pub fn until_next_midnight(tz: Tz, now: DateTime<Utc>) -> Duration {
    let today = now.with_timezone(&tz).date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    let naive = tomorrow.and_time(NaiveTime::MIN);

    let next = (0..=3)
        .filter_map(|h| {
            naive
                .checked_add_signed(TimeDelta::hours(h))
                .and_then(|n| n.and_local_timezone(tz).earliest())
        })
        .next();

    next.and_then(|n| (n.with_timezone(&Utc) - now).to_std().ok())
        .unwrap_or(Duration::from_secs(3600))
}

/// Reset `counter` at every local midnight of its timezone. Runs forever.
pub async fn run_daily_reset(counter: Arc<QuotaCounter>) {
    loop {
        let wait = until_next_midnight(counter.timezone(), Utc::now());
        debug!("next quota reset in {}s", wait.as_secs());
        tokio::time::sleep(wait).await;
        counter.reset();
    }
}
