//! Selector-fallback chains.

use scraper::ElementRef;
use std::fmt;
use std::sync::Arc;

use crate::dom::CompiledRule;
use crate::error::ConfigResult;
use crate::types::config::FieldRule;

type Step = Arc<dyn Fn(&ElementRef<'_>) -> Option<String> + Send + Sync>;

/// Ordered extraction strategies for one field.
///
/// Each step is a pure function of the fragment; [`extract`](Self::extract)
/// returns the first `Some` and never runs the steps after it.
#[derive(Clone, Default)]
pub struct FieldChain {
    steps: Vec<Step>,
}

impl FieldChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// One step per configured rule, in order.
    pub fn from_rules(field: &str, rules: &[FieldRule]) -> ConfigResult<Self> {
        let mut chain = Self::new();
        for rule in rules {
            let rule = CompiledRule::compile(field, rule)?;
            chain = chain.push_fn(move |el| rule.read(el));
        }
        Ok(chain)
    }

    /// Like [`from_rules`](Self::from_rules), but a step only succeeds with
    /// a value accepted by `accept`. Rejected values let the step keep
    /// scanning later matches of the same selector.
    pub fn from_rules_filtered(
        field: &str,
        rules: &[FieldRule],
        accept: fn(&str) -> bool,
    ) -> ConfigResult<Self> {
        let mut chain = Self::new();
        for rule in rules {
            let rule = CompiledRule::compile(field, rule)?;
            chain = chain.push_fn(move |el| rule.read_where(el, accept));
        }
        Ok(chain)
    }

    /// Append a custom step.
    pub fn push_fn<F>(mut self, step: F) -> Self
    where
        F: Fn(&ElementRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        self.steps.push(Arc::new(step));
        self
    }

    /// Run the steps in order; first non-empty value wins.
    pub fn extract(&self, scope: &ElementRef<'_>) -> Option<String> {
        self.steps.iter().find_map(|step| step(scope))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for FieldChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldChain")
            .field("steps", &self.steps.len())
            .finish()
    }
}
