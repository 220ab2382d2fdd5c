// Copyright 2025 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error type shared by the builders, the adapter and the handlers.

use thiserror::Error;

use crate::event::EventKind;

/// Errors that can occur while handling a charm event.
#[derive(Error, Debug)]
pub enum CharmError {
    #[error("invalid value for config option {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("malformed charm configuration: {0}")]
    MalformedConfig(#[source] serde_json::Error),

    #[error("invalid relation data for {key}: {reason}")]
    InvalidRelationData { key: String, reason: String },

    #[error("hook tool {tool} failed: {reason}")]
    HookTool { tool: String, reason: String },

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("no handler registered for event {0}")]
    NoHandler(EventKind),

    #[error("handler for {expected} received a {got} event")]
    UnexpectedEvent { expected: EventKind, got: EventKind },

    #[error("event {0} does not observe workload pods")]
    PodsNotObserved(EventKind),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}

/// Result type for charm operations.
pub type Result<T> = std::result::Result<T, CharmError>;

impl CharmError {
    /// Shorthand for [`CharmError::InvalidConfig`].
    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CharmError::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = CharmError::invalid_config("advertised-port", "must not be zero");
        assert_eq!(
            err.to_string(),
            "invalid value for config option advertised-port: must not be zero"
        );
    }

    #[test]
    fn test_no_handler_message() {
        let err = CharmError::NoHandler(EventKind::Start);
        assert_eq!(err.to_string(), "no handler registered for event start");
    }
}
