//! Session-scoped dashboard state: the active date range and a TTL cache of API
//! payloads, persisted as one JSON blob after every mutation.
//!
//! The range the user explicitly picked survives navigation for
//! [`StoreSettings::user_selection_ttl`]; a range the dashboard defaulted to
//! "today" is dropped as soon as the calendar day changes.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::range::{to_iso_string, DateRange};
use crate::storage::KeyValueStore;

pub const DASHBOARD_STATE_KEY: &str = "dashboard_state";
const NO_DATE_KEY: &str = "no-date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Lifetime of a cached API payload unless the caller passes its own.
    pub cache_ttl: Duration,
    /// Default window for [`DashboardStateStore::is_state_valid`].
    pub state_max_age: Duration,
    /// How long an explicit user selection outlives its creation.
    pub user_selection_ttl: Duration,
    /// How far past today a range may start.
    pub future_tolerance: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::minutes(30),
            state_max_age: Duration::minutes(30),
            user_selection_ttl: Duration::hours(24),
            future_tolerance: Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("date range is missing an endpoint")]
    MissingEndpoint,
    #[error("date range starts after it ends: {from} > {to}")]
    Reversed { from: NaiveDate, to: NaiveDate },
    #[error("date range starts too far in the future: {from} (today is {today})")]
    TooFarInFuture { from: NaiveDate, today: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<P> {
    pub data: P,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
}

impl<P> CacheEntry<P> {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < self.ttl
    }

    /// `None` when the expiry lies past the representable range, i.e. never.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.checked_add_signed(self.ttl)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState<P> {
    /// Range restored when the user comes back from a drill-down view.
    pub original_date_range: Option<DateRange>,
    /// Range currently on screen; may diverge from the original while navigating.
    pub current_date_range: Option<DateRange>,
    pub api_responses: BTreeMap<String, CacheEntry<P>>,
    pub last_updated: DateTime<Utc>,
    pub is_user_selected: bool,
    pub user_selection_timestamp: Option<DateTime<Utc>>,
}

impl<P> DashboardState<P> {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            original_date_range: None,
            current_date_range: None,
            api_responses: BTreeMap::new(),
            last_updated: now,
            is_user_selected: false,
            user_selection_timestamp: None,
        }
    }
}

/// Key under which a component caches the payload fetched for `range`.
pub fn cache_key(component: &str, range: Option<&DateRange>) -> String {
    match range.map(|range| (range.from, range.to)) {
        Some((Some(from), Some(to))) => {
            format!("{component}-{}-{}", to_iso_string(from), to_iso_string(to))
        }
        _ => format!("{component}-{NO_DATE_KEY}"),
    }
}

pub struct DashboardStateStore<S, C, P = serde_json::Value> {
    storage: S,
    clock: C,
    settings: StoreSettings,
    state: DashboardState<P>,
}

impl<S, C, P> DashboardStateStore<S, C, P>
where
    S: KeyValueStore,
    C: Clock,
    P: Clone + Serialize + DeserializeOwned,
{
    /// Creates the store and hydrates it from `storage`, applying the expiry rules.
    pub fn load(storage: S, clock: C, settings: StoreSettings) -> Self {
        let now = clock.now();
        let mut store = Self {
            storage,
            clock,
            settings,
            state: DashboardState::empty(now),
        };
        store.hydrate();
        store
    }

    pub fn state(&self) -> &DashboardState<P> {
        &self.state
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Range the dashboard should display right now.
    pub fn active_range(&self) -> Option<DateRange> {
        self.state
            .current_date_range
            .or(self.state.original_date_range)
    }

    pub fn set_original_date_range(
        &mut self,
        range: DateRange,
        force_user_selected: bool,
    ) -> Result<(), RangeError> {
        let (from, to) = self.validate(&range)?;
        let now = self.clock.now();
        let today = self.clock.today();
        let user_selected = force_user_selected || !(from == today && to == today);

        self.state.original_date_range = Some(range);
        self.state.current_date_range = Some(range);
        self.state.is_user_selected = user_selected;
        self.state.user_selection_timestamp = user_selected.then_some(now);
        debug!(range = %range, user_selected, "original date range set");
        self.touch_and_persist();
        Ok(())
    }

    pub fn set_current_date_range(&mut self, range: DateRange) -> Result<(), RangeError> {
        self.validate(&range)?;
        self.state.current_date_range = Some(range);
        debug!(range = %range, "current date range set");
        self.touch_and_persist();
        Ok(())
    }

    pub fn restore_original_date_range(&mut self) -> Option<DateRange> {
        let Some(original) = self
            .state
            .original_date_range
            .filter(DateRange::is_complete)
        else {
            warn!("no complete original date range to restore");
            return None;
        };

        self.state.current_date_range = Some(original);
        debug!(range = %original, "original date range restored");
        self.touch_and_persist();
        Some(original)
    }

    /// Sets today as an auto-generated selection when nothing usable is stored.
    pub fn initialize_default_range(&mut self) -> Option<DateRange> {
        let has_original = self
            .state
            .original_date_range
            .is_some_and(|range| range.is_complete());
        if !has_original {
            let today = DateRange::single(self.clock.today());
            if let Err(err) = self.set_original_date_range(today, false) {
                warn!(error = %err, "failed to default the date range to today");
            }
        }
        self.active_range()
    }

    /// Returns the payload cached for `component` and `range` while it is fresh.
    /// An expired entry is evicted by this read.
    pub fn get_cached_api_response(
        &mut self,
        component: &str,
        range: Option<&DateRange>,
    ) -> Option<P> {
        let key = cache_key(component, range);
        let now = self.clock.now();
        let entry = self.state.api_responses.get(&key)?;
        if entry.is_fresh(now) {
            return Some(entry.data.clone());
        }

        self.state.api_responses.remove(&key);
        debug!(key = %key, "evicted expired cache entry");
        self.persist();
        None
    }

    pub fn set_cached_api_response(&mut self, component: &str, range: Option<&DateRange>, data: P) {
        let ttl = self.settings.cache_ttl;
        self.set_cached_api_response_with_ttl(component, range, data, ttl);
    }

    pub fn set_cached_api_response_with_ttl(
        &mut self,
        component: &str,
        range: Option<&DateRange>,
        data: P,
        ttl: Duration,
    ) {
        let key = cache_key(component, range);
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now(),
            ttl,
        };
        debug!(key = %key, ttl_ms = ttl.num_milliseconds(), "cached api response");
        self.state.api_responses.insert(key, entry);
        self.touch_and_persist();
    }

    /// Evicts every entry whose key contains `pattern`, or the whole cache.
    /// Returns how many entries were removed.
    pub fn clear_api_cache(&mut self, pattern: Option<&str>) -> usize {
        let before = self.state.api_responses.len();
        match pattern {
            Some(pattern) => self
                .state
                .api_responses
                .retain(|key, _| !key.contains(pattern)),
            None => self.state.api_responses.clear(),
        }
        let removed = before - self.state.api_responses.len();
        debug!(removed, pattern = pattern.unwrap_or("*"), "cleared api cache");
        self.touch_and_persist();
        removed
    }

    pub fn clear_dashboard_state(&mut self) {
        self.discard_persisted();
        self.state = DashboardState::empty(self.clock.now());
        debug!("dashboard state cleared");
    }

    pub fn is_state_valid(&self) -> bool {
        self.is_state_valid_within(self.settings.state_max_age)
    }

    pub fn is_state_valid_within(&self, max_age: Duration) -> bool {
        self.clock.now() - self.state.last_updated < max_age
    }

    pub fn cache_entries(&self) -> impl Iterator<Item = (&str, &CacheEntry<P>)> {
        self.state
            .api_responses
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    fn validate(&self, range: &DateRange) -> Result<(NaiveDate, NaiveDate), RangeError> {
        let result = match (range.from, range.to) {
            (Some(from), Some(to)) if from > to => Err(RangeError::Reversed { from, to }),
            (Some(from), Some(to)) => {
                let today = self.clock.today();
                let latest = today.checked_add_signed(self.settings.future_tolerance);
                if latest.is_some_and(|latest| from > latest) {
                    Err(RangeError::TooFarInFuture { from, today })
                } else {
                    Ok((from, to))
                }
            }
            _ => Err(RangeError::MissingEndpoint),
        };
        result.inspect_err(|err| warn!(error = %err, range = %range, "rejected date range"))
    }

    fn hydrate(&mut self) {
        let raw = match self.storage.get(DASHBOARD_STATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no persisted dashboard state");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to read persisted dashboard state");
                return;
            }
        };

        let persisted = match serde_json::from_str::<PersistedState<P>>(&raw) {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(error = %err, "discarding corrupt dashboard state");
                self.discard_persisted();
                return;
            }
        };

        let state = persisted.into_state(self.clock.now());
        if let Some(reason) = self.expiry_reason(&state) {
            debug!(reason, "discarding expired dashboard state");
            self.discard_persisted();
            return;
        }

        debug!(
            entries = state.api_responses.len(),
            user_selected = state.is_user_selected,
            "hydrated dashboard state"
        );
        self.state = state;
    }

    fn expiry_reason(&self, state: &DashboardState<P>) -> Option<&'static str> {
        if state.is_user_selected {
            return match state.user_selection_timestamp {
                None => Some("user selection has no timestamp"),
                Some(selected_at) if self.clock.now() - selected_at > self.settings.user_selection_ttl => {
                    Some("user selection is older than its ttl")
                }
                Some(_) => None,
            };
        }

        let anchor = state
            .original_date_range
            .or(state.current_date_range)
            .and_then(|range| range.from);
        match anchor {
            Some(from) if from != self.clock.today() => {
                Some("auto-generated range belongs to another day")
            }
            _ => None,
        }
    }

    fn touch_and_persist(&mut self) {
        self.state.last_updated = self.clock.now();
        self.persist();
    }

    fn persist(&mut self) {
        let encoded = match serde_json::to_string(&PersistedState::from_state(&self.state)) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(error = %err, "failed to encode dashboard state");
                return;
            }
        };
        if let Err(err) = self.storage.set(DASHBOARD_STATE_KEY, &encoded) {
            warn!(error = %err, "failed to persist dashboard state");
        }
    }

    fn discard_persisted(&mut self) {
        if let Err(err) = self.storage.delete(DASHBOARD_STATE_KEY) {
            warn!(error = %err, "failed to delete persisted dashboard state");
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState<D> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_date_range: Option<PersistedRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_date_range: Option<PersistedRange>,
    api_responses: Vec<(String, PersistedEntry<D>)>,
    last_updated: i64,
    is_user_selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_selection_timestamp: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRange {
    from: String,
    to: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry<D> {
    data: D,
    timestamp: i64,
    ttl: i64,
}

impl<'a, P> PersistedState<&'a P> {
    fn from_state(state: &'a DashboardState<P>) -> Self {
        Self {
            original_date_range: state.original_date_range.as_ref().and_then(PersistedRange::encode),
            current_date_range: state.current_date_range.as_ref().and_then(PersistedRange::encode),
            api_responses: state
                .api_responses
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        PersistedEntry {
                            data: &entry.data,
                            timestamp: entry.timestamp.timestamp_millis(),
                            ttl: entry.ttl.num_milliseconds(),
                        },
                    )
                })
                .collect(),
            last_updated: state.last_updated.timestamp_millis(),
            is_user_selected: state.is_user_selected,
            user_selection_timestamp: state
                .user_selection_timestamp
                .map(|timestamp| timestamp.timestamp_millis()),
        }
    }
}

impl<P> PersistedState<P> {
    fn into_state(self, now: DateTime<Utc>) -> DashboardState<P> {
        let mut api_responses = BTreeMap::new();
        for (key, entry) in self.api_responses {
            let Some(timestamp) = DateTime::from_timestamp_millis(entry.timestamp) else {
                warn!(key = %key, "dropping cache entry with an invalid timestamp");
                continue;
            };
            let Some(ttl) = Duration::try_milliseconds(entry.ttl).filter(|ttl| *ttl >= Duration::zero()) else {
                warn!(key = %key, ttl = entry.ttl, "dropping cache entry with an invalid ttl");
                continue;
            };
            api_responses.insert(
                key,
                CacheEntry {
                    data: entry.data,
                    timestamp,
                    ttl,
                },
            );
        }

        DashboardState {
            original_date_range: self.original_date_range.and_then(PersistedRange::decode),
            current_date_range: self.current_date_range.and_then(PersistedRange::decode),
            api_responses,
            last_updated: DateTime::from_timestamp_millis(self.last_updated).unwrap_or(now),
            is_user_selected: self.is_user_selected,
            user_selection_timestamp: self
                .user_selection_timestamp
                .and_then(DateTime::from_timestamp_millis),
        }
    }
}

impl PersistedRange {
    fn encode(range: &DateRange) -> Option<Self> {
        Some(Self {
            from: to_iso_string(range.from?),
            to: to_iso_string(range.to?),
        })
    }

    fn decode(self) -> Option<DateRange> {
        let decoded = DateRange::parse_iso(&self.from, &self.to).filter(DateRange::is_complete);
        if decoded.is_none() {
            warn!(from = %self.from, to = %self.to, "discarding invalid persisted range");
        }
        decoded
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::clock::{Clock, ManualClock};
    use crate::period::{classify, PeriodClassification};
    use crate::range::DateRange;
    use crate::storage::{KeyValueStore, MemoryStorage};

    use super::{
        cache_key, DashboardStateStore, RangeError, StoreSettings, DASHBOARD_STATE_KEY,
    };

    type TestStore = DashboardStateStore<MemoryStorage, ManualClock, Value>;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date should be valid")
    }

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    fn store_at(now: DateTime<Utc>) -> (TestStore, MemoryStorage, ManualClock) {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(now);
        let store = DashboardStateStore::load(storage.clone(), clock.clone(), StoreSettings::default());
        (store, storage, clock)
    }

    fn reload(storage: &MemoryStorage, clock: &ManualClock) -> TestStore {
        DashboardStateStore::load(storage.clone(), clock.clone(), StoreSettings::default())
    }

    #[test]
    fn today_is_auto_generated_unless_forced() {
        let (mut store, _, _) = store_at(at(2025, 9, 15, 10));
        let today = DateRange::single(day(2025, 9, 15));

        store.set_original_date_range(today, false).expect("today is valid");
        assert!(!store.state().is_user_selected);
        assert_eq!(store.state().user_selection_timestamp, None);

        store.set_original_date_range(today, true).expect("today is valid");
        assert!(store.state().is_user_selected);
        assert_eq!(store.state().user_selection_timestamp, Some(at(2025, 9, 15, 10)));

        let week = DateRange::between(day(2025, 9, 8), day(2025, 9, 14));
        store.set_original_date_range(week, false).expect("past week is valid");
        assert!(store.state().is_user_selected);
        assert_eq!(store.state().original_date_range, Some(week));
        assert_eq!(store.state().current_date_range, Some(week));
    }

    #[test]
    fn rejects_invalid_ranges_without_touching_state() {
        let (mut store, storage, _) = store_at(at(2025, 9, 15, 10));

        assert_eq!(
            store.set_original_date_range(DateRange::pending(day(2025, 9, 1)), false),
            Err(RangeError::MissingEndpoint)
        );
        assert_eq!(
            store.set_original_date_range(DateRange::new(Some(day(2025, 9, 10)), Some(day(2025, 9, 1))), false),
            Err(RangeError::Reversed {
                from: day(2025, 9, 10),
                to: day(2025, 9, 1)
            })
        );
        assert!(matches!(
            store.set_current_date_range(DateRange::single(day(2025, 9, 17))),
            Err(RangeError::TooFarInFuture { .. })
        ));
        assert_eq!(store.state().original_date_range, None);
        assert!(storage.is_empty());

        store
            .set_original_date_range(DateRange::single(day(2025, 9, 16)), false)
            .expect("tomorrow is within tolerance");
    }

    #[test]
    fn current_range_diverges_and_restores() {
        let (mut store, _, _) = store_at(at(2025, 9, 15, 10));
        let month = DateRange::between(day(2025, 8, 1), day(2025, 8, 31));
        let drill_down = DateRange::single(day(2025, 8, 12));

        assert_eq!(store.restore_original_date_range(), None);

        store.set_original_date_range(month, false).expect("valid month");
        store.set_current_date_range(drill_down).expect("valid day");
        assert_eq!(store.state().original_date_range, Some(month));
        assert_eq!(store.active_range(), Some(drill_down));

        assert_eq!(store.restore_original_date_range(), Some(month));
        assert_eq!(store.state().current_date_range, Some(month));
    }

    #[test]
    fn builds_cache_keys_from_iso_endpoints() {
        let week = DateRange::between(day(2025, 9, 1), day(2025, 9, 7));
        assert_eq!(
            cache_key("weekly-comparison", Some(&week)),
            "weekly-comparison-2025-09-01T00:00:00.000-2025-09-07T00:00:00.000"
        );
        assert_eq!(cache_key("sales", None), "sales-no-date");
        assert_eq!(
            cache_key("sales", Some(&DateRange::pending(day(2025, 9, 1)))),
            "sales-no-date"
        );
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let (mut store, storage, clock) = store_at(at(2025, 9, 15, 10));
        let range = DateRange::single(day(2025, 9, 15));
        store.set_cached_api_response_with_ttl(
            "daily-comparison",
            Some(&range),
            json!({"total": 1250}),
            Duration::milliseconds(100),
        );

        assert_eq!(
            store.get_cached_api_response("daily-comparison", Some(&range)),
            Some(json!({"total": 1250}))
        );

        clock.advance(Duration::milliseconds(150));
        assert_eq!(store.get_cached_api_response("daily-comparison", Some(&range)), None);
        assert!(store.state().api_responses.is_empty());
        let persisted = storage.raw(DASHBOARD_STATE_KEY).expect("state should be persisted");
        assert!(!persisted.contains("daily-comparison"));
    }

    #[test]
    fn default_ttl_is_thirty_minutes() {
        let (mut store, _, clock) = store_at(at(2025, 9, 15, 10));
        store.set_cached_api_response("sales", None, json!([1, 2, 3]));
        clock.advance(Duration::minutes(29));
        assert!(store.get_cached_api_response("sales", None).is_some());
        clock.advance(Duration::minutes(1));
        assert!(store.get_cached_api_response("sales", None).is_none());
    }

    #[test]
    fn last_write_for_a_key_wins() {
        let (mut store, _, _) = store_at(at(2025, 9, 15, 10));
        store.set_cached_api_response("sales", None, json!(1));
        store.set_cached_api_response("sales", None, json!(2));
        assert_eq!(store.state().api_responses.len(), 1);
        assert_eq!(store.get_cached_api_response("sales", None), Some(json!(2)));
    }

    #[test]
    fn clears_cache_by_pattern_or_entirely() {
        let (mut store, _, _) = store_at(at(2025, 9, 15, 10));
        let range = DateRange::single(day(2025, 9, 15));
        store.set_cached_api_response("daily-comparison", Some(&range), json!(1));
        store.set_cached_api_response("weekly-comparison", Some(&range), json!(2));
        store.set_cached_api_response("branch-detail", None, json!(3));

        assert_eq!(store.clear_api_cache(Some("comparison")), 2);
        assert_eq!(store.state().api_responses.len(), 1);
        assert!(store.state().api_responses.contains_key("branch-detail-no-date"));

        assert_eq!(store.clear_api_cache(None), 1);
        assert!(store.state().api_responses.is_empty());
    }

    #[test]
    fn clear_dashboard_state_wipes_storage() {
        let (mut store, storage, _) = store_at(at(2025, 9, 15, 10));
        store
            .set_original_date_range(DateRange::single(day(2025, 9, 10)), false)
            .expect("valid day");
        assert!(storage.raw(DASHBOARD_STATE_KEY).is_some());

        store.clear_dashboard_state();
        assert!(storage.raw(DASHBOARD_STATE_KEY).is_none());
        assert_eq!(store.state().original_date_range, None);
        assert!(!store.state().is_user_selected);
    }

    #[test]
    fn state_validity_tracks_last_update() {
        let (mut store, _, clock) = store_at(at(2025, 9, 15, 10));
        store.set_cached_api_response("sales", None, json!(1));
        clock.advance(Duration::minutes(10));
        assert!(store.is_state_valid());
        assert!(!store.is_state_valid_within(Duration::minutes(5)));
        clock.advance(Duration::minutes(25));
        assert!(!store.is_state_valid());
    }

    #[test]
    fn persistence_round_trips() {
        let (mut store, storage, clock) = store_at(at(2025, 9, 15, 10));
        let week = DateRange::between(day(2025, 9, 1), day(2025, 9, 7));
        let drill_down = DateRange::single(day(2025, 9, 3));
        store.set_original_date_range(week, false).expect("valid week");
        store.set_current_date_range(drill_down).expect("valid day");
        store.set_cached_api_response("weekly-comparison", Some(&week), json!({"sales": [10, 20]}));
        store.set_cached_api_response("branch-detail", Some(&drill_down), json!("north"));

        let hydrated = reload(&storage, &clock);
        assert_eq!(hydrated.state(), store.state());
        let original = hydrated.state().original_date_range.expect("original survives");
        assert_eq!(classify(&original), PeriodClassification::CompleteWeek);
        let current = hydrated.state().current_date_range.expect("current survives");
        assert_eq!(classify(&current), PeriodClassification::SingleDay);
    }

    #[test]
    fn persisted_blob_follows_the_storage_schema() {
        let (mut store, storage, _) = store_at(at(2025, 9, 15, 10));
        let week = DateRange::between(day(2025, 9, 1), day(2025, 9, 7));
        store.set_original_date_range(week, false).expect("valid week");
        store.set_cached_api_response("sales", Some(&week), json!(5));

        let raw = storage.raw(DASHBOARD_STATE_KEY).expect("state should be persisted");
        let blob: Value = serde_json::from_str(&raw).expect("blob should be json");
        assert_eq!(blob["originalDateRange"]["from"], "2025-09-01T00:00:00.000");
        assert_eq!(blob["currentDateRange"]["to"], "2025-09-07T00:00:00.000");
        assert_eq!(blob["isUserSelected"], true);
        assert_eq!(blob["userSelectionTimestamp"], at(2025, 9, 15, 10).timestamp_millis());
        let entry = &blob["apiResponses"][0];
        assert_eq!(entry[0], cache_key("sales", Some(&week)));
        assert_eq!(entry[1]["data"], 5);
        assert_eq!(entry[1]["ttl"], Duration::minutes(30).num_milliseconds());
    }

    #[test]
    fn user_selection_survives_day_rollover_but_not_its_ttl() {
        let (mut store, storage, clock) = store_at(at(2025, 9, 15, 22));
        let past = DateRange::between(day(2025, 9, 1), day(2025, 9, 10));
        store.set_original_date_range(past, false).expect("valid range");

        clock.advance(Duration::hours(12));
        assert_eq!(reload(&storage, &clock).state().original_date_range, Some(past));

        clock.advance(Duration::hours(13));
        let expired = reload(&storage, &clock);
        assert_eq!(expired.state().original_date_range, None);
        assert!(storage.raw(DASHBOARD_STATE_KEY).is_none());
    }

    #[test]
    fn auto_generated_today_is_dropped_after_midnight() {
        let (mut store, storage, clock) = store_at(at(2025, 9, 15, 8));
        assert_eq!(
            store.initialize_default_range(),
            Some(DateRange::single(day(2025, 9, 15)))
        );
        assert!(!store.state().is_user_selected);

        clock.advance(Duration::hours(4));
        assert!(reload(&storage, &clock).state().original_date_range.is_some());

        clock.set(at(2025, 9, 16, 0) + Duration::minutes(1));
        let mut next_day = reload(&storage, &clock);
        assert_eq!(next_day.state().original_date_range, None);
        assert_eq!(
            next_day.initialize_default_range(),
            Some(DateRange::single(day(2025, 9, 16)))
        );
    }

    #[test]
    fn initialize_keeps_an_existing_selection() {
        let (mut store, _, _) = store_at(at(2025, 9, 15, 8));
        let month = DateRange::between(day(2025, 8, 1), day(2025, 8, 31));
        store.set_original_date_range(month, false).expect("valid month");
        assert_eq!(store.initialize_default_range(), Some(month));
        assert!(store.state().is_user_selected);
    }

    #[test]
    fn corrupt_blob_is_discarded() {
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, "{not json")
            .expect("memory write never fails");
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let store = reload(&storage, &clock);
        assert_eq!(store.state().original_date_range, None);
        assert!(storage.raw(DASHBOARD_STATE_KEY).is_none());
        assert_eq!(store.state().last_updated, clock.now());
    }

    #[test]
    fn cache_entries_with_unusable_ttls_do_not_crash_hydration() {
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let now = clock.now().timestamp_millis();
        let blob = json!({
            "apiResponses": [
                ["negative-no-date", {"data": 1, "timestamp": now, "ttl": -5}],
                ["minimum-no-date", {"data": 2, "timestamp": now, "ttl": i64::MIN}],
                ["forever-no-date", {"data": 3, "timestamp": now, "ttl": i64::MAX}],
                ["sales-no-date", {"data": 4, "timestamp": now, "ttl": 60000}]
            ],
            "lastUpdated": now,
            "isUserSelected": false
        });
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, &blob.to_string())
            .expect("memory write never fails");

        let mut store = reload(&storage, &clock);
        let keys: Vec<&str> = store.cache_entries().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["forever-no-date", "sales-no-date"]);

        let forever = &store.state().api_responses["forever-no-date"];
        assert_eq!(forever.expires_at(), None);
        assert!(forever.is_fresh(clock.now()));
        assert_eq!(store.get_cached_api_response("forever", None), Some(json!(3)));
        assert_eq!(
            store.state().api_responses["sales-no-date"].expires_at(),
            Some(clock.now() + Duration::minutes(1))
        );
    }

    #[test]
    fn reversed_persisted_range_is_discarded() {
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let blob = json!({
            "originalDateRange": {"from": "2025-09-10", "to": "2025-09-01"},
            "currentDateRange": {"from": "2025-09-02", "to": "2025-09-03"},
            "apiResponses": [],
            "lastUpdated": clock.now().timestamp_millis(),
            "isUserSelected": true,
            "userSelectionTimestamp": clock.now().timestamp_millis()
        });
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, &blob.to_string())
            .expect("memory write never fails");

        let mut store = reload(&storage, &clock);
        assert_eq!(store.state().original_date_range, None);
        let current = DateRange::between(day(2025, 9, 2), day(2025, 9, 3));
        assert_eq!(store.active_range(), Some(current));
        assert_eq!(store.restore_original_date_range(), None);
    }

    #[test]
    fn unbounded_future_tolerance_does_not_overflow() {
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let settings = StoreSettings {
            future_tolerance: Duration::days(1_000_000_000),
            ..StoreSettings::default()
        };
        let mut store: TestStore = DashboardStateStore::load(MemoryStorage::new(), clock, settings);
        let far = DateRange::single(day(2030, 1, 1));
        store.set_original_date_range(far, false).expect("tolerance covers every date");
        assert_eq!(store.active_range(), Some(far));
    }

    #[test]
    fn structurally_incomplete_blob_is_discarded() {
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, r#"{"isUserSelected": false}"#)
            .expect("memory write never fails");
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let store = reload(&storage, &clock);
        assert!(store.state().api_responses.is_empty());
        assert!(storage.raw(DASHBOARD_STATE_KEY).is_none());
    }

    #[test]
    fn unparseable_persisted_range_is_dropped_alone() {
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let blob = json!({
            "originalDateRange": {"from": "2025-09-01T00:00:00.000", "to": "2025-09-07T00:00:00.000"},
            "currentDateRange": {"from": "yesterday-ish", "to": "2025-09-07T00:00:00.000"},
            "apiResponses": [["sales-no-date", {"data": 7, "timestamp": clock.now().timestamp_millis(), "ttl": 60000}]],
            "lastUpdated": clock.now().timestamp_millis(),
            "isUserSelected": true,
            "userSelectionTimestamp": clock.now().timestamp_millis()
        });
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, &blob.to_string())
            .expect("memory write never fails");

        let mut store = reload(&storage, &clock);
        assert_eq!(
            store.state().original_date_range,
            Some(DateRange::between(day(2025, 9, 1), day(2025, 9, 7)))
        );
        assert_eq!(store.state().current_date_range, None);
        assert_eq!(store.get_cached_api_response("sales", None), Some(json!(7)));
    }

    #[test]
    fn user_selection_without_timestamp_is_discarded() {
        let clock = ManualClock::new(at(2025, 9, 15, 10));
        let blob = json!({
            "originalDateRange": {"from": "2025-09-01", "to": "2025-09-07"},
            "apiResponses": [],
            "lastUpdated": clock.now().timestamp_millis(),
            "isUserSelected": true
        });
        let mut storage = MemoryStorage::new();
        storage
            .set(DASHBOARD_STATE_KEY, &blob.to_string())
            .expect("memory write never fails");
        assert_eq!(reload(&storage, &clock).state().original_date_range, None);
    }
}
