//! Step definitions — the static, declarative table the navigator walks.

pub mod graph;
pub mod predicate;

pub use graph::{ChoiceOption, StepDefinition, StepGraph, StepKind};
pub use predicate::Dependency;
