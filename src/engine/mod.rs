//! The consistency engine.
//!
//! [`Hr`] owns the store gateway and the injected collaborators (clock,
//! geofence, attendance calendar). Each component is a cheap borrowed view:
//!
//! ```ignore
//! let hr = Hr::builder(MemoryStore::new()).build();
//! hr.leave().approve(request_id, supervisor_id).await?;
//! ```

pub mod attendance;
pub mod credential;
pub mod directory;
pub mod gateway;
pub mod leave;
pub mod ledger;
pub mod travel;

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::geo::{Geofence, RadiusGeofence};
use crate::store::Store;

pub use attendance::{AttendanceCalendar, AttendanceTracker, WeekendCalendar};
pub use credential::CredentialReset;
pub use directory::Directory;
pub use gateway::{Gateway, LockKey, RetryPolicy, TxScope};
pub use leave::LeaveWorkflow;
pub use ledger::QuotaLedger;
pub use travel::TravelWorkflow;

pub struct Hr<S: Store> {
    gateway: Gateway<S>,
    clock: Arc<dyn Clock>,
    geofence: Arc<dyn Geofence>,
    calendar: Arc<dyn AttendanceCalendar>,
    config: EngineConfig,
}

impl<S: Store> Hr<S> {
    pub fn builder(store: S) -> HrBuilder<S> {
        HrBuilder {
            store,
            clock: None,
            geofence: None,
            calendar: None,
            config: EngineConfig::default(),
        }
    }

    pub fn ledger(&self) -> QuotaLedger<'_, S> {
        QuotaLedger::new(self)
    }

    pub fn attendance(&self) -> AttendanceTracker<'_, S> {
        AttendanceTracker::new(self)
    }

    pub fn leave(&self) -> LeaveWorkflow<'_, S> {
        LeaveWorkflow::new(self)
    }

    pub fn travel(&self) -> TravelWorkflow<'_, S> {
        TravelWorkflow::new(self)
    }

    pub fn credentials(&self) -> CredentialReset<'_, S> {
        CredentialReset::new(self)
    }

    pub fn directory(&self) -> Directory<'_, S> {
        Directory::new(self)
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.gateway.store()
    }

    /// Transaction entry point for callers that combine engine reads with
    /// their own writes, e.g. [`AttendanceTracker::todays_session_for_update`].
    pub fn gateway(&self) -> &Gateway<S> {
        &self.gateway
    }

    pub(crate) fn geofence(&self) -> &dyn Geofence {
        self.geofence.as_ref()
    }

    pub(crate) fn calendar(&self) -> &dyn AttendanceCalendar {
        self.calendar.as_ref()
    }
}

/// Builder for [`Hr`]. Unset collaborators fall back to the system clock, a
/// radius geofence around the configured office and a weekend calendar.
pub struct HrBuilder<S: Store> {
    store: S,
    clock: Option<Arc<dyn Clock>>,
    geofence: Option<Arc<dyn Geofence>>,
    calendar: Option<Arc<dyn AttendanceCalendar>>,
    config: EngineConfig,
}

impl<S: Store> HrBuilder<S> {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn geofence(mut self, geofence: Arc<dyn Geofence>) -> Self {
        self.geofence = Some(geofence);
        self
    }

    pub fn calendar(mut self, calendar: Arc<dyn AttendanceCalendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn build(self) -> Hr<S> {
        let config = self.config;
        let geofence = self.geofence.unwrap_or_else(|| {
            Arc::new(RadiusGeofence::new(
                config.office_location,
                config.geofence_radius_m,
            ))
        });
        Hr {
            gateway: Gateway::new(self.store, RetryPolicy::from_config(&config)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            geofence,
            calendar: self
                .calendar
                .unwrap_or_else(|| Arc::new(WeekendCalendar::default())),
            config,
        }
    }
}
