use crate::clock::Clock;
use crate::errors::JournalError;
use crate::models::{ActionKind, ActivityRecord, DailyStat, SubjectId};
use crate::stats::{merge_daily, window_start, DayBucketing};
use crate::storage::{CountQuery, JournalStore};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Records user activity and turns it into per-day chart series.
///
/// Stateless apart from its store and clock; build one at startup and share it.
pub struct JournalService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    bucketing: DayBucketing,
}

impl<S: JournalStore> JournalService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            bucketing: DayBucketing::default(),
        }
    }

    pub fn with_bucketing(mut self, bucketing: DayBucketing) -> Self {
        self.bucketing = bucketing;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn record(
        &self,
        subject: &str,
        action: ActionKind,
    ) -> Result<ActivityRecord, JournalError> {
        let record = ActivityRecord {
            subject: SubjectId::parse(subject)?,
            action,
            occurred_at: self.clock.now(),
        };
        self.store.append(&record).await?;
        Ok(record)
    }

    /// Same as [Self::record] for callers holding the action as text.
    pub async fn record_named(
        &self,
        subject: &str,
        action: &str,
    ) -> Result<ActivityRecord, JournalError> {
        let action = action.parse::<ActionKind>()?;
        self.record(subject, action).await
    }

    /// Records without surfacing failure to the caller; the business action
    /// that triggered it has already happened.
    pub async fn track(&self, subject: &str, action: ActionKind) {
        if let Err(err) = self.record(subject, action).await {
            warn!(subject, %action, "failed to record activity: {err}");
        }
    }

    pub async fn record_login(&self, subject: &str) -> Result<ActivityRecord, JournalError> {
        self.record(subject, ActionKind::Login).await
    }

    pub async fn record_logout(&self, subject: &str) -> Result<ActivityRecord, JournalError> {
        self.record(subject, ActionKind::Logout).await
    }

    pub async fn record_task_created(
        &self,
        subject: &str,
    ) -> Result<ActivityRecord, JournalError> {
        self.record(subject, ActionKind::TaskCreated).await
    }

    pub async fn record_task_done(&self, subject: &str) -> Result<ActivityRecord, JournalError> {
        self.record(subject, ActionKind::TaskDone).await
    }

    /// Dense daily series for the month-long window ending at `as_of`.
    pub async fn daily_stats(
        &self,
        subject: &str,
        action: ActionKind,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<DailyStat>, JournalError> {
        let subject = SubjectId::parse(subject)?;
        let end = as_of.date_naive();
        let start = window_start(end).ok_or(JournalError::InvalidTimestamp(as_of))?;

        let query = CountQuery {
            subject,
            action,
            from: start.and_time(NaiveTime::MIN).and_utc(),
            to: as_of,
        };
        let sparse = self.store.daily_counts(&query).await?;
        debug!(
            subject = %query.subject,
            %action,
            %start,
            %end,
            active_days = sparse.len(),
            "computed daily stats"
        );

        Ok(merge_daily(start, end, &sparse, self.bucketing))
    }

    pub async fn task_done_stats(&self, subject: &str) -> Result<Vec<DailyStat>, JournalError> {
        self.daily_stats(subject, ActionKind::TaskDone, self.clock.now())
            .await
    }

    pub async fn login_stats(&self, subject: &str) -> Result<Vec<DailyStat>, JournalError> {
        self.daily_stats(subject, ActionKind::Login, self.clock.now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::errors::StorageError;
    use crate::stats::days_in_window;
    use crate::storage::MemoryJournal;
    use chrono::{Datelike, Days, NaiveDate, TimeZone};
    use std::collections::BTreeMap;

    const ALICE: &str = "65a1f0c2b3d4e5f60718293a";
    const BOB: &str = "65a1f0c2b3d4e5f60718293b";

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn service_at(now: DateTime<Utc>) -> JournalService<MemoryJournal> {
        JournalService::new(MemoryJournal::new(), Arc::new(FixedClock(now)))
    }

    async fn seed(journal: &MemoryJournal, subject: &str, action: ActionKind, when: DateTime<Utc>) {
        journal
            .append(&ActivityRecord {
                subject: SubjectId::parse(subject).unwrap(),
                action,
                occurred_at: when,
            })
            .await
            .unwrap();
    }

    fn amount(stats: &[DailyStat], month: u32, day: u32) -> u64 {
        stats
            .iter()
            .find(|s| s.month == month && s.day == day)
            .map(|s| s.amount)
            .expect("date missing from series")
    }

    struct BrokenStore;

    impl JournalStore for BrokenStore {
        async fn append(&self, _record: &ActivityRecord) -> Result<(), StorageError> {
            Err(std::io::Error::other("connection reset").into())
        }

        async fn daily_counts(
            &self,
            _query: &CountQuery,
        ) -> Result<BTreeMap<NaiveDate, u64>, StorageError> {
            Err(std::io::Error::other("connection reset").into())
        }
    }

    #[tokio::test]
    async fn record_stamps_with_server_clock() {
        let now = at(2024, 3, 15, 9);
        let service = service_at(now);

        let record = service.record_task_done(ALICE).await.unwrap();
        assert_eq!(record.occurred_at, now);
        assert_eq!(record.action, ActionKind::TaskDone);
        assert_eq!(service.store().records().await, vec![record]);
    }

    #[tokio::test]
    async fn convenience_writers_fix_action_kind() {
        let service = service_at(at(2024, 3, 15, 9));
        service.record_login(ALICE).await.unwrap();
        service.record_logout(ALICE).await.unwrap();
        service.record_task_created(ALICE).await.unwrap();
        service.record_task_done(ALICE).await.unwrap();

        let kinds: Vec<_> = service
            .store()
            .records()
            .await
            .into_iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(kinds, ActionKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn invalid_subject_writes_nothing() {
        let service = service_at(at(2024, 3, 15, 9));
        let err = service.record_login("someone").await.unwrap_err();
        assert!(matches!(err, JournalError::InvalidSubject(_)));
        assert!(service.store().records().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_action_rejected_before_write() {
        let service = service_at(at(2024, 3, 15, 9));
        let err = service.record_named(ALICE, "archived").await.unwrap_err();
        assert!(matches!(err, JournalError::InvalidActionKind(_)));
        assert!(service.store().records().await.is_empty());
    }

    #[tokio::test]
    async fn track_swallows_storage_failure() {
        let service = JournalService::new(BrokenStore, Arc::new(FixedClock(at(2024, 3, 15, 9))));
        service.track(ALICE, ActionKind::Login).await;
        assert!(matches!(
            service.record_login(ALICE).await,
            Err(JournalError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn read_failure_propagates() {
        let service = JournalService::new(BrokenStore, Arc::new(FixedClock(at(2024, 3, 15, 9))));
        let err = service.login_stats(ALICE).await.unwrap_err();
        assert!(matches!(err, JournalError::Storage(_)));
    }

    #[tokio::test]
    async fn series_length_matches_window_for_every_day_of_a_year() {
        let service = service_at(at(2024, 1, 1, 0));
        let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for offset in 0..366 {
            let day = first + Days::new(offset);
            let as_of = day.and_hms_opt(18, 0, 0).unwrap().and_utc();
            let stats = service.daily_stats(ALICE, ActionKind::Login, as_of).await.unwrap();

            let start = window_start(day).unwrap();
            assert_eq!(stats.len(), days_in_window(start, day).count(), "{day}");
            assert!((28..=32).contains(&stats.len()), "{day}: {}", stats.len());
            assert!(stats.iter().all(|s| s.amount == 0));
            let last = stats.last().unwrap();
            assert_eq!((last.month, last.day), (day.month(), day.day()));
        }
    }

    #[tokio::test]
    async fn empty_history_is_all_zero() {
        let service = service_at(at(2024, 3, 15, 9));
        let stats = service.task_done_stats(ALICE).await.unwrap();
        assert_eq!(stats.len(), 30);
        assert!(stats.iter().all(|s| s.amount == 0));
    }

    #[tokio::test]
    async fn end_to_end_counts_per_calendar_date() {
        let as_of = at(2024, 3, 15, 12);
        let service = service_at(as_of);
        let journal = service.store();
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 2, 10, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 2, 20, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 10, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 10, 17)).await;
        // noise: other kind, other subject, outside the window
        seed(journal, ALICE, ActionKind::Login, at(2024, 3, 10, 9)).await;
        seed(journal, BOB, ActionKind::TaskDone, at(2024, 3, 10, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 15, 13)).await;

        let stats = service.task_done_stats(ALICE).await.unwrap();
        assert_eq!(stats.len(), 30);
        assert_eq!(stats.first().map(|s| (s.month, s.day)), Some((2, 15)));
        assert_eq!(stats.last().map(|s| (s.month, s.day)), Some((3, 15)));
        assert_eq!(amount(&stats, 2, 20), 1);
        assert_eq!(amount(&stats, 3, 10), 2);
        assert_eq!(stats.iter().map(|s| s.amount).sum::<u64>(), 3);

        let again = service.daily_stats(ALICE, ActionKind::TaskDone, as_of).await.unwrap();
        assert_eq!(stats, again);
    }

    #[tokio::test]
    async fn day_of_month_bucketing_reproduces_aliasing() {
        let as_of = at(2024, 3, 15, 12);
        let service = service_at(as_of).with_bucketing(DayBucketing::DayOfMonth);
        let journal = service.store();
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 2, 20, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 10, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 10, 17)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 2, 15, 9)).await;
        seed(journal, ALICE, ActionKind::TaskDone, at(2024, 3, 15, 9)).await;

        let stats = service.task_done_stats(ALICE).await.unwrap();
        assert_eq!(amount(&stats, 2, 20), 1);
        assert_eq!(amount(&stats, 3, 10), 2);
        // the 15th appears twice in the window and both share one bucket
        assert_eq!(amount(&stats, 2, 15), 2);
        assert_eq!(amount(&stats, 3, 15), 2);
    }

    #[tokio::test]
    async fn new_record_bumps_exactly_its_date() {
        let now = at(2024, 1, 5, 10);
        let service = service_at(now);
        seed(service.store(), ALICE, ActionKind::Login, at(2023, 12, 31, 22)).await;

        let before = service.login_stats(ALICE).await.unwrap();
        service.record_login(ALICE).await.unwrap();
        let after = service.login_stats(ALICE).await.unwrap();

        assert_eq!(before.len(), after.len());
        assert_eq!(amount(&before, 12, 31), 1);
        for (old, new) in before.iter().zip(&after) {
            let expected = if (new.month, new.day) == (1, 5) { old.amount + 1 } else { old.amount };
            assert_eq!(new.amount, expected, "{}-{}", new.month, new.day);
        }
    }

    #[tokio::test]
    async fn day_of_month_bucketing_bumps_every_date_sharing_the_day() {
        let now = at(2024, 3, 15, 10);
        let service = service_at(now).with_bucketing(DayBucketing::DayOfMonth);
        seed(service.store(), ALICE, ActionKind::Login, at(2024, 2, 20, 9)).await;

        let before = service.login_stats(ALICE).await.unwrap();
        service.record_login(ALICE).await.unwrap();
        let after = service.login_stats(ALICE).await.unwrap();

        assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(&after) {
            let shares_day = new.day == 15;
            let expected = if shares_day { old.amount + 1 } else { old.amount };
            assert_eq!(new.amount, expected, "{}-{}", new.month, new.day);
        }
        assert_eq!(amount(&after, 2, 15), 1);
        assert_eq!(amount(&after, 3, 15), 1);
        assert_eq!(amount(&after, 2, 20), 1);
    }

    #[tokio::test]
    async fn unrepresentable_as_of_is_rejected() {
        let service = service_at(at(2024, 3, 15, 10));
        let err = service
            .daily_stats(ALICE, ActionKind::Login, DateTime::<Utc>::MIN_UTC)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::InvalidTimestamp(_)));
    }

    #[tokio::test]
    async fn records_after_as_of_are_excluded() {
        let service = service_at(at(2024, 3, 15, 23));
        seed(service.store(), ALICE, ActionKind::Login, at(2024, 3, 15, 8)).await;
        seed(service.store(), ALICE, ActionKind::Login, at(2024, 3, 15, 20)).await;

        let stats = service
            .daily_stats(ALICE, ActionKind::Login, at(2024, 3, 15, 12))
            .await
            .unwrap();
        assert_eq!(amount(&stats, 3, 15), 1);
    }
}
