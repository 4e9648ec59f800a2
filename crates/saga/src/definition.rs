//! Saga definitions and their validating builder.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::DefinitionError;
use crate::step::Step;

/// An ordered, validated list of steps identified by a saga type ID.
///
/// A definition can only be obtained through [`SagaDefinitionBuilder::build`],
/// so every `SagaDefinition` has a non-empty ID, at least one step, and
/// unique non-empty step names. Cloning is cheap; the step list is shared.
pub struct SagaDefinition<P> {
    id: String,
    steps: Arc<[Step<P>]>,
}

impl<P> SagaDefinition<P> {
    /// Starts building a definition with the given saga type ID.
    pub fn builder(id: impl Into<String>) -> SagaDefinitionBuilder<P> {
        SagaDefinitionBuilder {
            id: id.into(),
            steps: Vec::new(),
        }
    }

    /// Returns the saga type ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[Step<P>] {
        &self.steps
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a validated definition.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Looks up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step<P>> {
        self.steps.iter().find(|s| s.name() == name)
    }

    /// Returns the step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }
}

impl<P> Clone for SagaDefinition<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<P> std::fmt::Debug for SagaDefinition<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaDefinition")
            .field("id", &self.id)
            .field("steps", &self.steps)
            .finish()
    }
}

/// Builder for [`SagaDefinition`].
pub struct SagaDefinitionBuilder<P> {
    id: String,
    steps: Vec<Step<P>>,
}

impl<P> SagaDefinitionBuilder<P> {
    /// Appends a step. Order of calls is execution order.
    pub fn step(mut self, step: Step<P>) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends several steps in order.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step<P>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Validates and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the ID is empty, there are no steps,
    /// a step name is empty, or two steps share a name.
    pub fn build(self) -> Result<SagaDefinition<P>, DefinitionError> {
        if self.id.trim().is_empty() {
            return Err(DefinitionError::EmptySagaId);
        }
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps { saga_id: self.id });
        }

        let mut seen = HashSet::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            if step.name().trim().is_empty() {
                return Err(DefinitionError::EmptyStepName {
                    saga_id: self.id,
                    index,
                });
            }
            if !seen.insert(step.name()) {
                return Err(DefinitionError::DuplicateStep {
                    step: step.name().to_string(),
                    saga_id: self.id,
                });
            }
        }

        Ok(SagaDefinition {
            id: self.id,
            steps: self.steps.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Step<u32> {
        Step::from_fn(name, |n: u32| async move { Ok(n) })
    }

    #[test]
    fn test_build_preserves_order() {
        let definition = SagaDefinition::builder("create-order")
            .step(noop("a"))
            .step(noop("b"))
            .steps([noop("c"), noop("d")])
            .build()
            .unwrap();

        assert_eq!(definition.id(), "create-order");
        assert_eq!(definition.len(), 4);
        assert!(!definition.is_empty());
        assert_eq!(definition.step_names(), vec!["a", "b", "c", "d"]);
        assert_eq!(definition.step("c").unwrap().name(), "c");
        assert!(definition.step("z").is_none());
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let err = SagaDefinition::builder("dup")
            .step(noop("a"))
            .step(noop("b"))
            .step(noop("a"))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            DefinitionError::DuplicateStep {
                saga_id: "dup".to_string(),
                step: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_definition_rejected() {
        let err = SagaDefinition::<u32>::builder("empty").build().unwrap_err();
        assert_eq!(
            err,
            DefinitionError::NoSteps {
                saga_id: "empty".to_string()
            }
        );
    }

    #[test]
    fn test_empty_ids_and_names_rejected() {
        let err = SagaDefinition::builder("  ")
            .step(noop("a"))
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::EmptySagaId);

        let err = SagaDefinition::builder("s")
            .step(noop("a"))
            .step(noop(""))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::EmptyStepName {
                saga_id: "s".to_string(),
                index: 1,
            }
        );
    }

    #[test]
    fn test_clone_shares_steps() {
        let definition = SagaDefinition::builder("s")
            .step(noop("a"))
            .build()
            .unwrap();
        let cloned = definition.clone();
        assert_eq!(cloned.id(), "s");
        assert_eq!(cloned.step_names(), vec!["a"]);
    }
}
