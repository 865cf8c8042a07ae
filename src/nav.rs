//! NavigationController — turns the static step table into a consistent
//! forward/backward flow.
//!
//! Visibility is recomputed from the form on every move; there is no
//! recorded path. Steps answered out-of-band before navigation starts
//! (deep links) are excluded from the flow entirely, so backing out of the
//! first visible step exits the wizard instead of re-asking a question the
//! link already answered.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::NavigationError;
use crate::form::{FieldValue, FormState};
use crate::steps::{StepDefinition, StepGraph, StepKind};

/// Where a navigation move landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTarget {
    /// A regular step at this graph index.
    Step(usize),
    /// The terminal summary step. Entry is gated by the session.
    Terminal,
    /// No earlier step is part of the flow; the page owner should close it.
    Exit,
}

/// Snapshot handed to the URL/history collaborator after every successful
/// move.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationSnapshot {
    /// Id of the step the user is on.
    pub current_step_id: String,
    /// Position of that step among the currently visible steps.
    pub visible_index: usize,
    /// All committed answers.
    pub form: std::collections::BTreeMap<String, FieldValue>,
}

/// Progress cache, keyed by the form fingerprint that produced it.
#[derive(Debug, Clone)]
struct VisibleCache {
    fingerprint: u64,
    indices: Vec<usize>,
}

/// Computes the next/previous visible step and owns the answer store.
#[derive(Debug, Clone)]
pub struct NavigationController {
    graph: Arc<StepGraph>,
    form: FormState,
    current: usize,
    /// Steps answered before navigation started (deep link); never shown.
    out_of_band: HashSet<String>,
    cache: Option<VisibleCache>,
}

impl NavigationController {
    /// Create a controller over a graph with a (possibly pre-seeded) form.
    ///
    /// Call [`start`](Self::start) before anything else; it records which
    /// steps the pre-seeded form already answered and lands on the first
    /// visible step.
    pub fn new(graph: Arc<StepGraph>, form: FormState) -> Self {
        Self {
            graph,
            form,
            current: 0,
            out_of_band: HashSet::new(),
            cache: None,
        }
    }

    /// Begin navigation. Steps whose field is already answered are treated
    /// as satisfied out-of-band and excluded from the flow, so a deep link
    /// that pre-selects the service category lands on the first step after
    /// it.
    pub fn start(&mut self) -> NavTarget {
        self.out_of_band = self
            .graph
            .steps()
            .iter()
            .filter(|s| s.kind != StepKind::Summary && self.form.contains(&s.id))
            .map(|s| s.id.clone())
            .collect();

        let target = self.scan_forward(0);
        if let NavTarget::Step(index) = target {
            self.current = index;
            tracing::info!(step = %self.step_id(index), deep_link = !self.out_of_band.is_empty(), "Flow started");
        }
        target
    }

    /// Whether the step at `index` is part of the current flow.
    pub fn is_visible(&self, index: usize) -> bool {
        match self.graph.get(index) {
            Some(step) => {
                step.dependency.is_satisfied(&self.form) && !self.out_of_band.contains(&step.id)
            }
            None => false,
        }
    }

    /// First visible step at or after `from`.
    fn scan_forward(&self, from: usize) -> NavTarget {
        for index in from..self.graph.len() {
            if self.is_visible(index) {
                if index == self.graph.summary_index() {
                    return NavTarget::Terminal;
                }
                return NavTarget::Step(index);
            }
        }
        // The summary is always visible, so this is unreachable for a valid
        // graph; report terminal rather than panic.
        NavTarget::Terminal
    }

    /// First visible step at or before `from`.
    fn scan_backward(&self, from: usize) -> NavTarget {
        for index in (0..=from).rev() {
            if self.is_visible(index) {
                return NavTarget::Step(index);
            }
        }
        NavTarget::Exit
    }

    /// Advance from the current step: skip forward over every step whose
    /// dependency is false, land on the first that passes.
    pub fn advance(&mut self) -> NavTarget {
        let target = self.scan_forward(self.current + 1);
        if let NavTarget::Step(index) = target {
            let from = self.current;
            self.current = index;
            tracing::info!(from = %self.step_id(from), to = %self.step_id(index), "Advanced");
        }
        target
    }

    /// Step backward, symmetric to [`advance`](Self::advance). From the
    /// first visible step this signals [`NavTarget::Exit`] rather than
    /// re-entering a deep-link-skipped step.
    pub fn retreat(&mut self) -> NavTarget {
        if self.current == 0 {
            return NavTarget::Exit;
        }
        let target = self.scan_backward(self.current - 1);
        match target {
            NavTarget::Step(index) => {
                let from = self.current;
                self.current = index;
                tracing::info!(from = %self.step_id(from), to = %self.step_id(index), "Retreated");
            }
            NavTarget::Exit => {
                tracing::info!(step = %self.step_id(self.current), "Retreat past first visible step; exiting flow");
            }
            NavTarget::Terminal => {}
        }
        target
    }

    /// Deep-link direct entry to a step by id. The step must be visible.
    pub fn jump(&mut self, step_id: &str) -> Result<NavTarget, NavigationError> {
        let index = self
            .graph
            .index_of(step_id)
            .ok_or_else(|| NavigationError::UnknownStep {
                id: step_id.to_string(),
            })?;
        if !self.is_visible(index) {
            return Err(NavigationError::StepNotVisible {
                id: step_id.to_string(),
            });
        }
        self.current = index;
        tracing::info!(step = %step_id, "Jumped");
        if index == self.graph.summary_index() {
            Ok(NavTarget::Terminal)
        } else {
            Ok(NavTarget::Step(index))
        }
    }

    /// Clear all answers and return to the first step of the full flow.
    pub fn reset(&mut self) -> NavTarget {
        self.form.clear_all();
        self.out_of_band.clear();
        self.cache = None;
        self.current = 0;
        tracing::info!("Flow reset");
        let target = self.scan_forward(0);
        if let NavTarget::Step(index) = target {
            self.current = index;
        }
        target
    }

    /// Commit an answer for a step.
    ///
    /// Changing a branch-selecting answer abandons the old branch: answers
    /// of steps whose dependency no longer holds are cleared (to a
    /// fixpoint), and if the current step itself is no longer visible the
    /// position repairs to the nearest visible predecessor.
    pub fn commit(
        &mut self,
        step_id: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), NavigationError> {
        if self.graph.index_of(step_id).is_none() {
            return Err(NavigationError::UnknownStep {
                id: step_id.to_string(),
            });
        }
        self.form.commit(step_id, value);
        self.invalidate_abandoned_branches();

        if !self.is_visible(self.current) && self.current != self.graph.summary_index() {
            let repaired = self.scan_backward(self.current);
            if let NavTarget::Step(index) = repaired {
                tracing::warn!(
                    from = %self.step_id(self.current),
                    to = %self.step_id(index),
                    "Current step no longer visible after commit; repairing position"
                );
                self.current = index;
            }
        }
        Ok(())
    }

    /// Drop answers of steps whose dependency stopped holding, repeating
    /// until no more fall out (a cleared answer can unsatisfy another
    /// dependency).
    fn invalidate_abandoned_branches(&mut self) {
        for _ in 0..self.graph.len() {
            let stale: Vec<String> = self
                .graph
                .steps()
                .iter()
                .filter(|s| {
                    self.form.contains(&s.id)
                        && !self.out_of_band.contains(&s.id)
                        && !s.dependency.is_satisfied(&self.form)
                })
                .map(|s| s.id.clone())
                .collect();
            if stale.is_empty() {
                break;
            }
            tracing::debug!(fields = ?stale, "Clearing answers of abandoned branch");
            self.form.clear_many(stale.iter().map(String::as_str));
        }
    }

    /// Progress through the flow as a percentage in [0, 100].
    ///
    /// Position of `index` within the visible steps (summary excluded),
    /// over the number of gaps between them. Recomputed only when the form
    /// fingerprint changes.
    pub fn progress(&mut self, index: usize) -> f64 {
        let visible = self.visible_indices();
        let summary = self.graph.summary_index();
        let before_summary: Vec<usize> =
            visible.iter().copied().filter(|&i| i != summary).collect();

        if index >= summary {
            return 100.0;
        }
        let position = match before_summary.iter().position(|&i| i == index) {
            Some(p) => p,
            None => return 0.0,
        };
        let gaps = before_summary.len().saturating_sub(1).max(1);
        let pct = position as f64 / gaps as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }

    /// Progress of the current step.
    pub fn current_progress(&mut self) -> f64 {
        self.progress(self.current)
    }

    /// Indices of all currently visible steps, cached against the form
    /// fingerprint.
    pub fn visible_indices(&mut self) -> Vec<usize> {
        let fingerprint = self.form.fingerprint();
        if let Some(cache) = &self.cache {
            if cache.fingerprint == fingerprint {
                return cache.indices.clone();
            }
        }
        let indices: Vec<usize> = (0..self.graph.len())
            .filter(|&i| self.is_visible(i))
            .collect();
        self.cache = Some(VisibleCache {
            fingerprint,
            indices: indices.clone(),
        });
        indices
    }

    /// Current step index.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Current step definition.
    pub fn current_step(&self) -> &StepDefinition {
        // current is always a valid index.
        &self.graph.steps()[self.current]
    }

    /// The underlying graph.
    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    /// Read access to the answers.
    pub fn form(&self) -> &FormState {
        &self.form
    }

    /// Snapshot for the URL/history collaborator.
    pub fn snapshot(&mut self) -> NavigationSnapshot {
        let current = self.current;
        let visible = self.visible_indices();
        let visible_index = visible.iter().position(|&i| i == current).unwrap_or(0);
        NavigationSnapshot {
            current_step_id: self.step_id(current).to_string(),
            visible_index,
            form: self.form.snapshot(),
        }
    }

    fn step_id(&self, index: usize) -> &str {
        self.graph
            .get(index)
            .map(|s| s.id.as_str())
            .unwrap_or("<none>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{ChoiceOption, Dependency, StepDefinition};

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
                StepDefinition::text("zip", "Your ZIP code?").with_dependency(
                    Dependency::KeyPresent {
                        key: "category".into(),
                    },
                ),
                StepDefinition::choice(
                    "roof_material",
                    "Roof material?",
                    vec![
                        ChoiceOption::new("Tile", "Tile"),
                        ChoiceOption::new("Metal", "Metal"),
                    ],
                )
                .with_dependency(Dependency::KeyEquals {
                    key: "category".into(),
                    value: FieldValue::Text("Roof".into()),
                }),
                StepDefinition::choice(
                    "solar_bill",
                    "Monthly power bill?",
                    vec![ChoiceOption::new("high", "Over $200")],
                )
                .with_dependency(Dependency::KeyEquals {
                    key: "category".into(),
                    value: FieldValue::Text("Solar".into()),
                }),
                StepDefinition::datetime("appointment", "Pick your appointments"),
                StepDefinition::summary("summary", "Review"),
            ])
            .unwrap(),
        )
    }

    fn started(form: FormState) -> NavigationController {
        let mut nav = NavigationController::new(graph(), form);
        nav.start();
        nav
    }

    #[test]
    fn advance_skips_unsatisfied_branches() {
        let mut nav = started(FormState::new());
        assert_eq!(nav.current_index(), 0);

        nav.commit("category", "Roof").unwrap();
        assert_eq!(nav.advance(), NavTarget::Step(1)); // zip
        nav.commit("zip", "30301").unwrap();
        assert_eq!(nav.advance(), NavTarget::Step(2)); // roof_material, solar skipped
        nav.commit("roof_material", "Tile").unwrap();
        assert_eq!(nav.advance(), NavTarget::Step(4)); // appointment
        assert_eq!(nav.advance(), NavTarget::Terminal);
    }

    #[test]
    fn retreat_mirrors_advance() {
        let mut nav = started(FormState::new());
        nav.commit("category", "Solar").unwrap();

        let mut forward = vec![nav.current_index()];
        while let NavTarget::Step(i) = nav.advance() {
            forward.push(i);
        }
        // Walk back down and compare against the reversed forward path.
        let mut backward = vec![nav.current_index()];
        while let NavTarget::Step(i) = nav.retreat() {
            backward.push(i);
        }
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(backward, reversed);
    }

    #[test]
    fn deep_link_skips_answered_category() {
        // Scenario A: flow deep-linked with category=Roof.
        let mut form = FormState::new();
        form.commit("category", "Roof");

        let mut nav = NavigationController::new(graph(), form);
        // Lands on the shared post-category step, not the category choice.
        assert_eq!(nav.start(), NavTarget::Step(1));

        // Backing out exits the flow rather than showing the category step.
        assert_eq!(nav.retreat(), NavTarget::Exit);
    }

    #[test]
    fn retreat_from_first_step_exits() {
        let mut nav = started(FormState::new());
        assert_eq!(nav.current_index(), 0);
        assert_eq!(nav.retreat(), NavTarget::Exit);
        // Position unchanged; exit is a signal, not a move.
        assert_eq!(nav.current_index(), 0);
    }

    #[test]
    fn jump_rejects_hidden_and_unknown_steps() {
        let mut nav = started(FormState::new());
        assert!(matches!(
            nav.jump("roof_material"),
            Err(NavigationError::StepNotVisible { .. })
        ));
        assert!(matches!(
            nav.jump("nope"),
            Err(NavigationError::UnknownStep { .. })
        ));

        nav.commit("category", "Roof").unwrap();
        assert_eq!(nav.jump("roof_material").unwrap(), NavTarget::Step(2));
    }

    #[test]
    fn branch_switch_clears_abandoned_answers() {
        let mut nav = started(FormState::new());
        nav.commit("category", "Roof").unwrap();
        nav.advance();
        nav.commit("zip", "30301").unwrap();
        nav.advance();
        nav.commit("roof_material", "Tile").unwrap();

        // Switching the branch abandons the roof answers.
        nav.commit("category", "Solar").unwrap();
        assert!(!nav.form().contains("roof_material"));
        // Shared step survives: KeyPresent still holds.
        assert!(nav.form().contains("zip"));
    }

    #[test]
    fn commit_repairs_position_when_current_step_hidden() {
        let mut nav = started(FormState::new());
        nav.commit("category", "Roof").unwrap();
        nav.advance(); // zip
        nav.commit("zip", "30301").unwrap();
        nav.advance(); // roof_material
        assert_eq!(nav.current_index(), 2);

        // Abandoning the branch while standing on a branch step repairs the
        // position backward to the nearest visible step.
        nav.commit("category", "Solar").unwrap();
        assert_eq!(nav.current_index(), 1);
    }

    #[test]
    fn progress_is_clamped_and_non_decreasing() {
        let mut nav = started(FormState::new());
        nav.commit("category", "Roof").unwrap();

        let mut last = nav.current_progress();
        assert!(last >= 0.0);
        loop {
            match nav.advance() {
                NavTarget::Step(i) => {
                    let p = nav.progress(i);
                    assert!((0.0..=100.0).contains(&p));
                    assert!(p >= last, "progress regressed: {p} < {last}");
                    last = p;
                }
                _ => break,
            }
        }
        assert_eq!(nav.progress(nav.graph().summary_index()), 100.0);
    }

    #[test]
    fn progress_recomputes_when_form_changes() {
        let mut nav = started(FormState::new());
        // Visible now: category, zip(no: category unset)... only category + appointment.
        let before = nav.visible_indices();
        nav.commit("category", "Roof").unwrap();
        let after = nav.visible_indices();
        assert_ne!(before, after);
        assert!(after.contains(&2), "roof branch became visible");
    }

    #[test]
    fn reset_returns_to_first_step_of_full_flow() {
        let mut form = FormState::new();
        form.commit("category", "Roof");
        let mut nav = NavigationController::new(graph(), form);
        nav.start();
        assert_eq!(nav.current_index(), 1);

        assert_eq!(nav.reset(), NavTarget::Step(0));
        assert!(nav.form().is_empty());
        // After reset the category step is back in the flow.
        assert!(nav.is_visible(0));
    }

    #[test]
    fn snapshot_reflects_current_position() {
        let mut nav = started(FormState::new());
        nav.commit("category", "Roof").unwrap();
        nav.advance();

        let snap = nav.snapshot();
        assert_eq!(snap.current_step_id, "zip");
        assert_eq!(snap.visible_index, 1);
        assert!(snap.form.contains_key("category"));
    }
}
