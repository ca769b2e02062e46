//! Encrypted-client configuration.

use crate::action::{Action, AttributeActions};
use std::time::Duration;

/// Configuration for [`EncryptedClient`](crate::EncryptedClient).
///
/// Encryption is configured as a default action plus per-attribute
/// overrides. Compression options are reserved for a future revision.
#[derive(Clone, Debug, Default)]
pub struct ClientConfig {
    pub(crate) actions: AttributeActions,
    pub(crate) operation_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Config with `DoNothing` as the default action and no timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default per-attribute action.
    pub fn with_default_action(mut self, action: Action) -> Self {
        self.actions.set_default_action(action);
        self
    }

    /// Override the action for one attribute.
    pub fn with_attribute_action(mut self, attribute: impl Into<String>, action: Action) -> Self {
        self.actions.set_attribute_action(attribute, action);
        self
    }

    /// Deadline applied to every public operation. An elapsed deadline
    /// surfaces as the `Cancelled` error kind.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// The configured attribute actions.
    pub fn actions(&self) -> &AttributeActions {
        &self.actions
    }
}
