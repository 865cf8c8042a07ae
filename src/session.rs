//! WizardSession — the session-scoped context that owns all mutable state.
//!
//! One session per visitor: it owns the form, the navigator, the scheduling
//! engine, and the availability cache, and is the only writer to any of
//! them. State changes are published as immutable [`SessionEvent`]s over a
//! broadcast channel; the presentation layer subscribes and renders
//! one-way. No globals, no singletons.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

use crate::availability::{
    AvailabilityCache, AvailabilityProvider, AvailabilityResponse, AvailabilityUpdate, FetchTicket,
};
use crate::config::WizardConfig;
use crate::debounce::Debouncer;
use crate::error::{AvailabilityError, Error, NavigationError};
use crate::form::{FieldValue, FormState};
use crate::nav::{NavTarget, NavigationController, NavigationSnapshot};
use crate::scheduling::{Appointment, CalendarState, SchedulingEngine, SelectionOutcome};
use crate::steps::{StepGraph, StepKind};
use crate::submission::SubmissionPayload;
use crate::validation::FieldValidator;

/// Immutable state-change notification for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        step_id: String,
    },
    StepChanged {
        step_id: String,
        visible_index: usize,
        progress: f64,
    },
    FieldValidated {
        field: String,
        error: Option<String>,
    },
    SelectionChanged {
        appointments: Vec<Appointment>,
    },
    SelectionRejected {
        message: String,
    },
    AvailabilityLoaded {
        company: String,
        days: usize,
    },
    AvailabilityFailed {
        company: String,
        message: String,
    },
    FlowExited,
    Submitted {
        payload: SubmissionPayload,
    },
    Reset,
}

/// One visitor's wizard run.
pub struct WizardSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    config: WizardConfig,
    nav: NavigationController,
    engine: SchedulingEngine,
    availability: AvailabilityCache,
    validator: Arc<FieldValidator>,
    debouncer: Debouncer,
    /// Inline validation errors, keyed by field. Forward navigation is
    /// blocked while the current step's field has one.
    field_errors: HashMap<String, String>,
    events: broadcast::Sender<SessionEvent>,
}

impl WizardSession {
    /// Create a session with an empty form.
    pub fn new(
        config: WizardConfig,
        graph: Arc<StepGraph>,
        provider: Arc<dyn AvailabilityProvider>,
    ) -> Self {
        Self::with_form(config, graph, provider, FormState::new())
    }

    /// Create a session with a pre-seeded form (deep-link entry).
    pub fn with_form(
        config: WizardConfig,
        graph: Arc<StepGraph>,
        provider: Arc<dyn AvailabilityProvider>,
        form: FormState,
    ) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity);
        let engine = SchedulingEngine::new(config.day_disable, config.company_cap);
        let availability = AvailabilityCache::new(provider, config.availability_timeout);
        let debouncer = Debouncer::new(config.debounce_window);
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            nav: NavigationController::new(graph, form),
            engine,
            availability,
            validator: Arc::new(FieldValidator::new()),
            debouncer,
            field_errors: HashMap::new(),
            events,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Subscribe to state-change events. Each renderer calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The event feed as a [`Stream`](futures::Stream), for renderers built
    /// on stream combinators. Lagging subscribers see a recv error item,
    /// never a gap in session state (the next snapshot is authoritative).
    pub fn event_stream(
        &self,
    ) -> impl futures::Stream<Item = Result<SessionEvent, BroadcastStreamRecvError>> + use<> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Begin the flow and land on the first visible step.
    pub fn start(&mut self) -> NavTarget {
        let target = self.nav.start();
        self.emit(SessionEvent::Started {
            session_id: self.id,
            step_id: self.nav.current_step().id.clone(),
        });
        self.emit_step_changed();
        target
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Commit an answer for a step. Text steps with a declared format are
    /// validated immediately; an invalid value is stored, surfaced as an
    /// inline error, and blocks the next [`advance`](Self::advance).
    pub fn commit(&mut self, step_id: &str, value: impl Into<FieldValue>) -> Result<(), Error> {
        let value = value.into();
        self.nav.commit(step_id, value.clone())?;

        let step = match self.nav.graph().index_of(step_id) {
            Some(i) => self.nav.graph().steps()[i].clone(),
            None => return Ok(()),
        };
        if let (StepKind::Text, Some(format)) = (step.kind, step.format) {
            let text = value.as_display();
            let error = self
                .validator
                .validate(format, step_id, &text)
                .err()
                .map(|e| e.to_string());
            match &error {
                Some(message) => {
                    self.field_errors.insert(step_id.to_string(), message.clone());
                }
                None => {
                    self.field_errors.remove(step_id);
                }
            }
            self.emit(SessionEvent::FieldValidated {
                field: step_id.to_string(),
                error,
            });
        }
        Ok(())
    }

    /// Debounced keystroke feedback: validate the in-progress text after a
    /// typing pause and publish the result, without committing anything.
    /// Re-typing within the window supersedes the pending check.
    pub fn touch_text(&mut self, step_id: &str, value: impl Into<String>) {
        let step = match self.nav.graph().index_of(step_id) {
            Some(i) => &self.nav.graph().steps()[i],
            None => return,
        };
        let Some(format) = step.format else { return };

        let field = step_id.to_string();
        let value = value.into();
        let validator = Arc::clone(&self.validator);
        let events = self.events.clone();
        self.debouncer.schedule(step_id, move || async move {
            let error = validator
                .validate(format, &field, &value)
                .err()
                .map(|e| e.to_string());
            let _ = events.send(SessionEvent::FieldValidated { field, error });
        });
    }

    /// Move to the next visible step.
    ///
    /// Blocked while the current step has an inline validation error or its
    /// required-format answer is missing/invalid. Entry into the terminal
    /// summary is rejected with a redirect to the scheduling step while no
    /// appointment is held.
    pub fn advance(&mut self) -> Result<NavTarget, Error> {
        let step = self.nav.current_step().clone();
        if self.field_errors.contains_key(&step.id) {
            return Err(NavigationError::ValidationPending { field: step.id }.into());
        }
        if let (StepKind::Text, Some(format)) = (step.kind, step.format) {
            let text = self
                .nav
                .form()
                .get(&step.id)
                .map(|v| v.as_display())
                .unwrap_or_default();
            self.validator.validate(format, &step.id, &text)?;
        }

        match self.nav.advance() {
            NavTarget::Terminal => self.enter_terminal(),
            target => {
                self.emit_step_changed();
                Ok(target)
            }
        }
    }

    fn enter_terminal(&mut self) -> Result<NavTarget, Error> {
        if self.engine.selection().is_empty() {
            let redirect_to = self
                .nav
                .graph()
                .index_of_kind(StepKind::DateTime)
                .map(|i| self.nav.graph().steps()[i].id.clone())
                .unwrap_or_default();
            if !redirect_to.is_empty() {
                let _ = self.nav.jump(&redirect_to);
                self.emit_step_changed();
            }
            let err = NavigationError::EmptySelection { redirect_to };
            self.emit(SessionEvent::SelectionRejected {
                message: err.to_string(),
            });
            return Err(err.into());
        }

        let summary_id = self
            .nav
            .graph()
            .steps()[self.nav.graph().summary_index()]
            .id
            .clone();
        self.nav.jump(&summary_id)?;
        self.emit_step_changed();
        Ok(NavTarget::Terminal)
    }

    /// Move to the previous visible step, or signal flow exit from the
    /// first one.
    pub fn retreat(&mut self) -> NavTarget {
        match self.nav.retreat() {
            NavTarget::Exit => {
                self.emit(SessionEvent::FlowExited);
                NavTarget::Exit
            }
            target => {
                self.emit_step_changed();
                target
            }
        }
    }

    /// Deep-link direct entry to a visible step.
    pub fn jump(&mut self, step_id: &str) -> Result<NavTarget, Error> {
        let target = self.nav.jump(step_id)?;
        self.emit_step_changed();
        Ok(target)
    }

    /// Discard all answers and picks and return to the first step.
    pub fn reset(&mut self) -> NavTarget {
        let target = self.nav.reset();
        self.engine.reset();
        self.debouncer.cancel_all();
        self.field_errors.clear();
        self.emit(SessionEvent::Reset);
        self.emit_step_changed();
        target
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Select a slot for a company. Capacity violations are published as a
    /// user-visible rejection and returned as an error; the selection is
    /// untouched.
    pub fn select_slot(
        &mut self,
        company_id: &str,
        date: NaiveDate,
        time: &str,
    ) -> Result<SelectionOutcome, Error> {
        match self.engine.select_slot(company_id, date, time) {
            Ok(outcome) => {
                self.emit_selection_changed();
                Ok(outcome)
            }
            Err(e) => {
                self.emit(SessionEvent::SelectionRejected {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Remove an appointment if the exact slot is held.
    pub fn deselect_slot(&mut self, company_id: &str, date: NaiveDate, time: &str) -> bool {
        let removed = self.engine.deselect_slot(company_id, date, time);
        if removed {
            self.emit_selection_changed();
        }
        removed
    }

    /// Calendar display state for a company.
    pub fn calendar(&self, company_id: &str) -> Option<&CalendarState> {
        self.engine.calendar(company_id)
    }

    /// The scheduling engine (read access for render layers).
    pub fn engine(&self) -> &SchedulingEngine {
        &self.engine
    }

    // ── Availability ────────────────────────────────────────────────

    /// Stamp a new availability request, superseding in-flight ones for
    /// these companies.
    pub fn supersede_availability(&mut self, company_ids: &[String]) -> FetchTicket {
        self.availability.begin(company_ids)
    }

    /// Run a stamped fetch under the configured timeout.
    pub async fn fetch_availability(
        &self,
        ticket: &FetchTicket,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilityResponse, AvailabilityError> {
        self.availability.fetch(ticket, from, to).await
    }

    /// Install a completed fetch, publishing per-company load/failure
    /// events. Stale responses are dropped without an event.
    pub fn apply_availability(
        &mut self,
        ticket: &FetchTicket,
        result: Result<AvailabilityResponse, AvailabilityError>,
    ) -> Vec<AvailabilityUpdate> {
        let updates = self.availability.apply(ticket, result, &mut self.engine);
        for update in &updates {
            match update {
                AvailabilityUpdate::Loaded { company, days } => {
                    self.emit(SessionEvent::AvailabilityLoaded {
                        company: company.clone(),
                        days: *days,
                    });
                }
                AvailabilityUpdate::Failed { company, message } => {
                    self.emit(SessionEvent::AvailabilityFailed {
                        company: company.clone(),
                        message: message.clone(),
                    });
                }
                AvailabilityUpdate::Stale { .. } => {}
            }
        }
        updates
    }

    /// Begin, fetch, and apply in one call — the common path when no
    /// request is in flight.
    pub async fn load_availability(
        &mut self,
        company_ids: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<AvailabilityUpdate> {
        let ticket = self.supersede_availability(company_ids);
        let result = self.fetch_availability(&ticket, from, to).await;
        self.apply_availability(&ticket, result)
    }

    // ── Submission ──────────────────────────────────────────────────

    /// Serialize the finished run. Gated on a non-empty selection.
    pub fn submit(&mut self) -> Result<SubmissionPayload, Error> {
        let payload = SubmissionPayload::build(self.nav.form(), self.engine.selection())
            .ok_or_else(|| {
                let redirect_to = self
                    .nav
                    .graph()
                    .index_of_kind(StepKind::DateTime)
                    .map(|i| self.nav.graph().steps()[i].id.clone())
                    .unwrap_or_default();
                Error::Navigation(NavigationError::EmptySelection { redirect_to })
            })?;
        tracing::info!(session = %self.id, appointments = payload.appointments.len(), "Wizard submitted");
        self.emit(SessionEvent::Submitted {
            payload: payload.clone(),
        });
        Ok(payload)
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Snapshot for the URL/history collaborator.
    pub fn snapshot(&mut self) -> NavigationSnapshot {
        self.nav.snapshot()
    }

    /// Progress of the current step, 0–100.
    pub fn progress(&mut self) -> f64 {
        self.nav.current_progress()
    }

    /// The navigator (read access).
    pub fn nav(&self) -> &NavigationController {
        &self.nav
    }

    /// Inline error for a field, if any.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }

    /// Session configuration.
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    fn emit_step_changed(&mut self) {
        let snapshot = self.nav.snapshot();
        let progress = self.nav.current_progress();
        self.emit(SessionEvent::StepChanged {
            step_id: snapshot.current_step_id,
            visible_index: snapshot.visible_index,
            progress,
        });
    }

    fn emit_selection_changed(&mut self) {
        self.emit(SessionEvent::SelectionChanged {
            appointments: self.engine.selection().iter().cloned().collect(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // Ok if no renderer is listening yet.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::InMemoryAvailability;
    use crate::scheduling::{AvailabilityDay, Slot};
    use crate::steps::{ChoiceOption, Dependency, StepDefinition};
    use crate::validation::FieldFormat;
    use std::collections::BTreeMap;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn graph() -> Arc<StepGraph> {
        Arc::new(
            StepGraph::new(vec![
                StepDefinition::choice(
                    "category",
                    "What do you need?",
                    vec![
                        ChoiceOption::new("Roof", "Roof repair"),
                        ChoiceOption::new("Solar", "Solar panels"),
                    ],
                ),
                StepDefinition::text("zip", "Your ZIP code?")
                    .with_dependency(Dependency::KeyPresent {
                        key: "category".into(),
                    })
                    .with_format(FieldFormat::PostalCode),
                StepDefinition::datetime("appointment", "Pick your appointments"),
                StepDefinition::summary("summary", "Review"),
            ])
            .unwrap(),
        )
    }

    fn provider() -> Arc<InMemoryAvailability> {
        let mut provider = InMemoryAvailability::new();
        for company in ["acme", "zenith"] {
            let mut days = BTreeMap::new();
            days.insert(
                date("2025-03-10"),
                AvailabilityDay::new(
                    10,
                    "Monday",
                    vec![Slot::new("10:00", true), Slot::new("14:00", true)],
                ),
            );
            provider = provider.with_company(company, days);
        }
        Arc::new(provider)
    }

    fn session() -> WizardSession {
        WizardSession::new(WizardConfig::default(), graph(), provider())
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn terminal_is_gated_on_selection() {
        let mut session = session();
        session.start();
        session.commit("category", "Roof").unwrap();
        session.advance().unwrap();
        session.commit("zip", "30301").unwrap();
        session.advance().unwrap(); // appointment step

        // No appointment held: summary entry rejected, position redirected
        // back to the scheduling step.
        let err = session.advance().unwrap_err();
        assert!(matches!(
            err,
            Error::Navigation(NavigationError::EmptySelection { .. })
        ));
        assert_eq!(session.nav().current_step().id, "appointment");

        // Pick a slot; summary opens.
        session
            .load_availability(&["acme".into()], date("2025-03-01"), date("2025-03-31"))
            .await;
        session.select_slot("acme", date("2025-03-10"), "10:00").unwrap();
        assert_eq!(session.advance().unwrap(), NavTarget::Terminal);
        assert_eq!(session.nav().current_step().id, "summary");
    }

    #[tokio::test]
    async fn invalid_zip_blocks_advance() {
        let mut session = session();
        session.start();
        session.commit("category", "Roof").unwrap();
        session.advance().unwrap(); // zip step

        session.commit("zip", "not-a-zip").unwrap();
        assert!(session.field_error("zip").is_some());
        let err = session.advance().unwrap_err();
        assert!(matches!(
            err,
            Error::Navigation(NavigationError::ValidationPending { .. })
        ));
        assert_eq!(session.nav().current_step().id, "zip");

        session.commit("zip", "30301").unwrap();
        assert!(session.field_error("zip").is_none());
        assert!(session.advance().is_ok());
    }

    #[tokio::test]
    async fn capacity_rejection_is_published() {
        // Cap of 1 so the second company trips the limit.
        let mut config = WizardConfig::default();
        config.company_cap = 1;
        let mut session = WizardSession::new(config, graph(), provider());
        session.start();
        session
            .load_availability(
                &["acme".into(), "zenith".into()],
                date("2025-03-01"),
                date("2025-03-31"),
            )
            .await;
        let mut rx = session.subscribe();

        session.select_slot("acme", date("2025-03-10"), "10:00").unwrap();
        assert!(session.select_slot("zenith", date("2025-03-10"), "10:00").is_err());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::SelectionChanged { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::SelectionRejected { .. })));
    }

    #[tokio::test]
    async fn deep_link_exit_publishes_event() {
        // Scenario A at the session level.
        let mut form = FormState::new();
        form.commit("category", "Roof");
        let mut session = WizardSession::with_form(
            WizardConfig::default(),
            graph(),
            provider(),
            form,
        );
        let mut rx = session.subscribe();
        session.start();
        assert_eq!(session.nav().current_step().id, "zip");

        assert_eq!(session.retreat(), NavTarget::Exit);
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::FlowExited)));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_text_debounces_validation_events() {
        let mut session = session();
        session.start();
        session.commit("category", "Roof").unwrap();
        session.advance().unwrap(); // zip step
        let mut rx = session.subscribe();

        session.touch_text("zip", "3");
        session.touch_text("zip", "30");
        session.touch_text("zip", "30301");
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        let events: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::FieldValidated { .. }))
            .collect();
        // Only the last keystroke's validation fired, and it passed.
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::FieldValidated { field, error } => {
                assert_eq!(field, "zip");
                assert!(error.is_none());
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn submit_serializes_run() {
        let mut session = session();
        session.start();
        session.commit("category", "Roof").unwrap();
        session.advance().unwrap();
        session.commit("zip", "30301").unwrap();
        session.advance().unwrap();

        assert!(session.submit().is_err(), "submission gated on selection");

        session
            .load_availability(&["acme".into()], date("2025-03-01"), date("2025-03-31"))
            .await;
        session.select_slot("acme", date("2025-03-10"), "14:00").unwrap();

        let payload = session.submit().unwrap();
        assert_eq!(payload.company, "acme");
        assert_eq!(payload.time, "14:00");
        assert_eq!(payload.fields["zip"], FieldValue::Text("30301".into()));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let mut session = session();
        session.start();
        session.commit("category", "Roof").unwrap();
        session.advance().unwrap();
        session.commit("zip", "bad").unwrap();
        session
            .load_availability(&["acme".into()], date("2025-03-01"), date("2025-03-31"))
            .await;
        session.select_slot("acme", date("2025-03-10"), "10:00").unwrap();

        session.reset();
        assert!(session.nav().form().is_empty());
        assert!(session.engine().selection().is_empty());
        assert!(session.field_error("zip").is_none());
        assert_eq!(session.nav().current_step().id, "category");
    }
}
