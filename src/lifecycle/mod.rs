//! Lifecycle services
//!
//! [`Lifecycle`] bundles the shared collaborators (store, clock, notification
//! sink, resolved settings, optional team roster) and hands out the
//! per-concern services:
//!
//! - [`Cases`] - case state machine, closure and reopen
//! - [`Actions`] - remedial actions, checklists and evidence
//! - [`Analyses`] - root-cause analysis with revision history
//! - [`Approvals`] - sequential/parallel sign-off workflows
//! - [`Dashboard`] - read-only health aggregation
//!
//! Every mutation is a read-modify-write with a version compare-and-swap, so
//! services can be shared across threads through a cloned `Lifecycle`.

pub mod actions;
pub mod analysis;
pub mod approvals;
pub mod cases;
pub mod dashboard;

pub use actions::{Actions, NewAction};
pub use analysis::Analyses;
pub use approvals::Approvals;
pub use cases::{ApprovalState, CaseFilter, Cases, Closure, NewCase, Readiness};
pub use dashboard::{CaseOverview, Dashboard, DashboardSummary};

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Settings;
use crate::core::error::CapaResult;
use crate::core::identity::EntityId;
use crate::core::notify::{self, Notification, NotificationSink, NullSink};
use crate::core::rag::Rag;
use crate::core::store::{self, MemoryStore, Store};
use crate::core::team::TeamRoster;
use crate::entities::{AuditEvent, AuditEventType};

/// Entry point to the lifecycle engine
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    settings: Settings,
    roster: Option<TeamRoster>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            notifier: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            settings: Settings::default(),
            roster: None,
        }
    }

    /// Engine over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_roster(mut self, roster: Option<TeamRoster>) -> Self {
        self.roster = roster;
        self
    }

    pub fn cases(&self) -> Cases<'_> {
        Cases::new(self)
    }

    pub fn actions(&self) -> Actions<'_> {
        Actions::new(self)
    }

    pub fn analyses(&self) -> Analyses<'_> {
        Analyses::new(self)
    }

    pub fn approvals(&self) -> Approvals<'_> {
        Approvals::new(self)
    }

    pub fn dashboard(&self) -> Dashboard<'_> {
        Dashboard::new(self)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Case history, oldest first
    pub fn audit_trail(&self, case_id: &EntityId) -> CapaResult<Vec<AuditEvent>> {
        let mut events: Vec<AuditEvent> = store::list(self.store(), Some(case_id))?;
        events.sort_by(|a, b| a.at.cmp(&b.at));
        Ok(events)
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn roster(&self) -> Option<&TeamRoster> {
        self.roster.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today according to the engine's clock
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(crate) fn notify(&self, notification: Notification) {
        notify::dispatch(self.notifier.as_ref(), notification);
    }

    /// Build an audit event stamped with the current time
    pub(crate) fn event(
        &self,
        case_id: &EntityId,
        event_type: AuditEventType,
        description: impl Into<String>,
        actor: &str,
    ) -> AuditEvent {
        AuditEvent::new(case_id, event_type, description, actor, self.now())
    }

    /// Append to the audit trail after a successful primary write.
    /// A failed append is logged; the primary change stands.
    pub(crate) fn audit(
        &self,
        case_id: &EntityId,
        event_type: AuditEventType,
        description: impl Into<String>,
        actor: &str,
    ) {
        let mut event = self.event(case_id, event_type, description, actor);
        if let Err(e) = store::insert(self.store(), &mut event) {
            warn!(case = %case_id, event = %event_type, error = %e, "audit event not recorded");
        }
    }

    /// Run `change`, then notify if the case's health moved into red
    pub(crate) fn tracking_health<T>(
        &self,
        case_id: &EntityId,
        change: impl FnOnce() -> CapaResult<T>,
    ) -> CapaResult<T> {
        let cases = self.cases();
        let before = cases.get(case_id).and_then(|c| cases.health(&c)).ok();

        let result = change()?;

        match cases.get(case_id).and_then(|c| {
            let health = cases.health(&c)?;
            Ok((c, health))
        }) {
            Ok((case, Rag::Red)) if before != Some(Rag::Red) => {
                self.notify(Notification::CaseHealthChanged {
                    case_id: case.id.to_string(),
                    reference: case.reference.clone(),
                    previous: before.unwrap_or(Rag::Green),
                    current: Rag::Red,
                });
            }
            Ok(_) => {}
            Err(e) => warn!(case = %case_id, error = %e, "health not re-evaluated"),
        }
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the service tests

    use std::sync::Mutex;

    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::entity::{Priority, Severity};
    use crate::core::identity::EntityPrefix;
    use crate::core::store::{StoreOp, StoredRecord};
    use crate::entities::{ActionStatus, ActionType, Case, CaseType};

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    pub fn engine() -> Lifecycle {
        configured(Lifecycle::in_memory())
    }

    pub fn engine_on(store: Arc<dyn Store>) -> Lifecycle {
        configured(Lifecycle::new(store))
    }

    fn configured(engine: Lifecycle) -> Lifecycle {
        crate::logging::init_test();
        let settings = Settings {
            org_prefix: "MET".to_string(),
            ..Settings::default()
        };
        engine
            .with_clock(Arc::new(FixedClock::on(today())))
            .with_settings(settings)
    }

    type Hook = Box<dyn FnOnce() + Send>;

    /// Store that runs a one-shot hook just before its next update or
    /// commit, so a second writer can slip in between a service's reads
    /// and its write
    pub struct InterleavingStore {
        inner: Arc<MemoryStore>,
        hook: Mutex<Option<Hook>>,
    }

    impl InterleavingStore {
        pub fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                hook: Mutex::new(None),
            }
        }

        pub fn before_next_write(&self, hook: impl FnOnce() + Send + 'static) {
            *self.hook.lock().unwrap() = Some(Box::new(hook));
        }

        fn fire(&self) {
            let hook = self.hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
        }
    }

    impl Store for InterleavingStore {
        fn insert(&self, record: &StoredRecord) -> CapaResult<()> {
            self.inner.insert(record)
        }

        fn commit(&self, ops: &[StoreOp]) -> CapaResult<Vec<u64>> {
            self.fire();
            self.inner.commit(ops)
        }

        fn fetch(&self, kind: EntityPrefix, id: &str) -> CapaResult<Option<StoredRecord>> {
            self.inner.fetch(kind, id)
        }

        fn update(&self, record: &StoredRecord, expected_version: u64) -> CapaResult<u64> {
            self.fire();
            self.inner.update(record, expected_version)
        }

        fn list(&self, kind: EntityPrefix, case_id: Option<&str>) -> CapaResult<Vec<StoredRecord>> {
            self.inner.list(kind, case_id)
        }
    }

    /// An engine over the hooked store, and a second one writing straight
    /// to the shared records
    pub fn interleaved() -> (Lifecycle, Arc<InterleavingStore>, Lifecycle) {
        let shared = Arc::new(MemoryStore::new());
        let hooked = Arc::new(InterleavingStore::new(shared.clone()));
        (engine_on(hooked.clone()), hooked, engine_on(shared))
    }

    pub fn new_case(title: &str) -> NewCase {
        NewCase {
            case_type: CaseType::Nc,
            title: title.to_string(),
            problem_statement: "Bore diameter out of tolerance".to_string(),
            severity: Severity::High,
            raised_by: "sam".to_string(),
            ..NewCase::default()
        }
    }

    pub fn open(engine: &Lifecycle, title: &str) -> Case {
        engine.cases().open_case(new_case(title)).unwrap()
    }

    pub fn add_action(engine: &Lifecycle, case: &Case, title: &str) -> crate::entities::Action {
        let mut new = NewAction::new(case.id.clone(), ActionType::Corrective, title, "alex");
        new.due_date = Some(today() + chrono::Duration::days(20));
        new.priority = Priority::Medium;
        engine.actions().create_action(new).unwrap()
    }

    pub fn finish(engine: &Lifecycle, action: &crate::entities::Action) {
        engine
            .actions()
            .update_status(&action.id, ActionStatus::Done, Some(today()), None)
            .unwrap();
    }
}
