//! Per-attribute encryption actions.

use std::collections::HashMap;

/// What to do with one attribute on write.
///
/// A `Sign` action is reserved by some deployments but intentionally has
/// no variant here; attributes are either passed through or encrypted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Action {
    /// Store the attribute as-is
    #[default]
    DoNothing,
    /// Encrypt with the randomized AEAD primitive
    EncryptRandomized,
    /// Encrypt with the deterministic AEAD primitive, preserving
    /// equality of identical plaintexts for lookups
    EncryptDeterministic,
}

/// Default action plus per-attribute overrides.
#[derive(Clone, Debug, Default)]
pub struct AttributeActions {
    default_action: Action,
    overrides: HashMap<String, Action>,
}

impl AttributeActions {
    /// Actions with the given default and no overrides.
    pub fn new(default_action: Action) -> Self {
        Self {
            default_action,
            overrides: HashMap::new(),
        }
    }

    /// Change the default action, keeping existing overrides.
    pub fn set_default_action(&mut self, action: Action) {
        self.default_action = action;
    }

    /// Override the action for one attribute.
    pub fn set_attribute_action(&mut self, attribute: impl Into<String>, action: Action) {
        self.overrides.insert(attribute.into(), action);
    }

    /// Builder-style [`set_attribute_action`](Self::set_attribute_action).
    pub fn with_attribute_action(mut self, attribute: impl Into<String>, action: Action) -> Self {
        self.set_attribute_action(attribute, action);
        self
    }

    /// Action for the named attribute.
    pub fn action_for(&self, attribute: &str) -> Action {
        self.overrides
            .get(attribute)
            .copied()
            .unwrap_or(self.default_action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_and_overrides() {
        let actions = AttributeActions::new(Action::EncryptRandomized)
            .with_attribute_action("Email", Action::EncryptDeterministic)
            .with_attribute_action("Public", Action::DoNothing);

        assert_eq!(actions.action_for("Name"), Action::EncryptRandomized);
        assert_eq!(actions.action_for("Email"), Action::EncryptDeterministic);
        assert_eq!(actions.action_for("Public"), Action::DoNothing);
    }
}
