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

//! Lifecycle events the charm reacts to.

use std::fmt;

use crate::relation::ServerDetails;

/// The kind of an [`Event`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ConfigChanged,
    Start,
    UpdateStatus,
    DependencyAvailable,
}

impl EventKind {
    /// Returns the canonical event name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ConfigChanged => "config-changed",
            EventKind::Start => "start",
            EventKind::UpdateStatus => "update-status",
            EventKind::DependencyAvailable => "dependency-available",
        }
    }

    /// Returns true if handling this event reads workload pod readiness.
    pub fn observes_pods(self) -> bool {
        matches!(self, EventKind::ConfigChanged | EventKind::UpdateStatus)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `config-changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigChangedEvent;

/// Payload of `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartEvent;

/// Payload of `update-status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStatusEvent;

/// Emitted once the Prometheus server has published its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyAvailableEvent {
    /// Connection details of the server. Read-only to handlers.
    pub server_details: ServerDetails,
}

/// A lifecycle event delivered to the charm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ConfigChanged(ConfigChangedEvent),
    Start(StartEvent),
    UpdateStatus(UpdateStatusEvent),
    DependencyAvailable(DependencyAvailableEvent),
}

impl Event {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConfigChanged(_) => EventKind::ConfigChanged,
            Event::Start(_) => EventKind::Start,
            Event::UpdateStatus(_) => EventKind::UpdateStatus,
            Event::DependencyAvailable(_) => EventKind::DependencyAvailable,
        }
    }

    /// Creates the event for a lifecycle hook.
    ///
    /// Returns `None` for [`EventKind::DependencyAvailable`], which needs
    /// server details.
    pub fn lifecycle(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::ConfigChanged => Some(Event::ConfigChanged(ConfigChangedEvent)),
            EventKind::Start => Some(Event::Start(StartEvent)),
            EventKind::UpdateStatus => Some(Event::UpdateStatus(UpdateStatusEvent)),
            EventKind::DependencyAvailable => None,
        }
    }

    /// Creates a dependency-available event.
    pub fn dependency_available(server_details: ServerDetails) -> Self {
        Event::DependencyAvailable(DependencyAvailableEvent { server_details })
    }
}

/// What a hook name means to this charm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// A hook that maps directly to an event.
    Lifecycle(EventKind),
    /// A change on the dependency relation. Whether the dependency is
    /// available depends on the remote unit's data.
    DependencyRelation,
    /// A hook this charm does not handle.
    Ignored,
}

/// Resolves a hook name against the dependency relation name.
pub fn resolve_hook(hook_name: &str, relation_name: &str) -> Hook {
    match hook_name {
        "config-changed" => Hook::Lifecycle(EventKind::ConfigChanged),
        "start" => Hook::Lifecycle(EventKind::Start),
        "update-status" => Hook::Lifecycle(EventKind::UpdateStatus),
        name => {
            let relation_hook = ["-relation-changed", "-relation-joined"]
                .iter()
                .filter_map(|suffix| name.strip_suffix(suffix))
                .any(|relation| relation == relation_name);
            if relation_hook {
                Hook::DependencyRelation
            } else {
                Hook::Ignored
            }
        }
    }
}
