//! StepGraph — the immutable table of step definitions.
//!
//! Loaded once per session, usually from JSON shipped by the surrounding
//! CMS. No behavior beyond construction-time validation and prompt
//! templating; walking the graph is the navigator's job.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::form::FormState;
use crate::steps::predicate::Dependency;
use crate::validation::FieldFormat;

/// What a step asks of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Pick one option (service category, property type, ...).
    Choice,
    /// Free-text input with format validation (ZIP code, ...).
    Text,
    /// Multi-field contact form.
    Form,
    /// The multi-company appointment picker.
    DateTime,
    /// Terminal recap step; always last, never conditional.
    Summary,
}

/// One selectable option of a choice step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Value committed into the form when picked.
    pub value: String,
    /// Label shown to the user.
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A single wizard step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique id; doubles as the form field this step writes.
    pub id: String,
    pub kind: StepKind,
    /// Visibility condition, evaluated against the form on every move.
    #[serde(default)]
    pub dependency: Dependency,
    /// Prompt text; `{field}` placeholders resolve against the form.
    pub prompt: String,
    /// Options for choice steps; empty otherwise.
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    /// Expected format for text steps; answers are validated against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FieldFormat>,
}

impl StepDefinition {
    pub fn choice(id: impl Into<String>, prompt: impl Into<String>, options: Vec<ChoiceOption>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Choice,
            dependency: Dependency::None,
            prompt: prompt.into(),
            options,
            format: None,
        }
    }

    pub fn text(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Text,
            dependency: Dependency::None,
            prompt: prompt.into(),
            options: Vec::new(),
            format: None,
        }
    }

    pub fn form(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Form,
            dependency: Dependency::None,
            prompt: prompt.into(),
            options: Vec::new(),
            format: None,
        }
    }

    pub fn datetime(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::DateTime,
            dependency: Dependency::None,
            prompt: prompt.into(),
            options: Vec::new(),
            format: None,
        }
    }

    pub fn summary(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: StepKind::Summary,
            dependency: Dependency::None,
            prompt: prompt.into(),
            options: Vec::new(),
            format: None,
        }
    }

    /// Attach a visibility condition.
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependency = dependency;
        self
    }

    /// Require a text format for this step's answer.
    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Render the prompt, substituting `{field}` placeholders with current
    /// answers. Unanswered placeholders are left intact.
    pub fn render_prompt(&self, form: &FormState) -> String {
        let mut out = String::with_capacity(self.prompt.len());
        let mut rest = self.prompt.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let field = &after[..close];
                    match form.get(field) {
                        Some(value) => out.push_str(&value.as_display()),
                        None => {
                            out.push('{');
                            out.push_str(field);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Ordered, immutable step table for one wizard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<StepDefinition>", into = "Vec<StepDefinition>")]
pub struct StepGraph {
    steps: Vec<StepDefinition>,
}

impl StepGraph {
    /// Build a graph, validating the invariants the navigator relies on:
    /// non-empty, unique ids, exactly one summary step and it is last,
    /// summary has no dependency.
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, GraphError> {
        if steps.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(GraphError::DuplicateStepId {
                    id: step.id.clone(),
                });
            }
        }

        let last = &steps[steps.len() - 1];
        if last.kind != StepKind::Summary {
            return Err(GraphError::MissingSummary);
        }
        if last.dependency != Dependency::None {
            return Err(GraphError::SummaryHasDependency {
                id: last.id.clone(),
            });
        }
        for step in &steps[..steps.len() - 1] {
            if step.kind == StepKind::Summary {
                return Err(GraphError::SummaryNotLast {
                    id: step.id.clone(),
                });
            }
        }

        Ok(Self { steps })
    }

    /// Load a graph from its JSON array form.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let steps: Vec<StepDefinition> = serde_json::from_str(json)?;
        Self::new(steps)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Index of a step by id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Index of the terminal summary step (always the last).
    pub fn summary_index(&self) -> usize {
        self.steps.len() - 1
    }

    /// Index of the first step of the given kind.
    pub fn index_of_kind(&self, kind: StepKind) -> Option<usize> {
        self.steps.iter().position(|s| s.kind == kind)
    }
}

impl TryFrom<Vec<StepDefinition>> for StepGraph {
    type Error = GraphError;

    fn try_from(steps: Vec<StepDefinition>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<StepGraph> for Vec<StepDefinition> {
    fn from(graph: StepGraph) -> Self {
        graph.steps
    }
}
