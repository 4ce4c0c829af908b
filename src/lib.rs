//! Date-range selection and classification for a sales dashboard, plus the
//! session-scoped state store that remembers the selection and caches API
//! payloads per range.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod period;
pub mod range;
pub mod sessions;
pub mod storage;
pub mod store;

pub use calendar::{transition, CalendarController, CalendarEvent, Selection};
pub use clock::{Clock, ManualClock, SystemClock};
pub use period::{classify, ComparisonCard, PeriodClassification, PeriodKey};
pub use range::DateRange;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
pub use store::{cache_key, DashboardState, DashboardStateStore, RangeError, StoreSettings};
