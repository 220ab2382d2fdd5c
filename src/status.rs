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

//! Unit status and the readiness-to-status mapping.

use std::fmt;

/// The status a unit reports to the model.
///
/// A status is never updated in place; every push replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// The workload is up and serving.
    Active(String),
    /// The charm is doing work the operator does not need to act on.
    Maintenance(String),
    /// The charm needs operator intervention.
    Blocked(String),
    /// The charm is waiting on something outside its control.
    Waiting(String),
}

impl UnitStatus {
    /// Creates an active status.
    pub fn active(message: impl Into<String>) -> Self {
        UnitStatus::Active(message.into())
    }

    /// Creates a maintenance status.
    pub fn maintenance(message: impl Into<String>) -> Self {
        UnitStatus::Maintenance(message.into())
    }

    /// Creates a blocked status.
    pub fn blocked(message: impl Into<String>) -> Self {
        UnitStatus::Blocked(message.into())
    }

    /// Creates a waiting status.
    pub fn waiting(message: impl Into<String>) -> Self {
        UnitStatus::Waiting(message.into())
    }

    /// Returns the status name as understood by `status-set`.
    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Active(_) => "active",
            UnitStatus::Maintenance(_) => "maintenance",
            UnitStatus::Blocked(_) => "blocked",
            UnitStatus::Waiting(_) => "waiting",
        }
    }

    /// Returns the human readable message.
    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Active(m)
            | UnitStatus::Maintenance(m)
            | UnitStatus::Blocked(m)
            | UnitStatus::Waiting(m) => m,
        }
    }

    /// Returns true for [`UnitStatus::Active`].
    pub fn is_active(&self) -> bool {
        matches!(self, UnitStatus::Active(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message().is_empty() {
            f.write_str(self.name())
        } else {
            write!(f, "{}: {}", self.name(), self.message())
        }
    }
}

/// Observed state of the workload pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodStatus {
    /// No pod exists yet for the unit.
    Unknown,
    /// The pod exists but is not running.
    Pending,
    /// The pod is running but has not passed its readiness probe.
    Running,
    /// The pod is running and ready.
    Ready,
}

impl PodStatus {
    /// Returns true when the workload can serve traffic.
    pub fn is_ready(self) -> bool {
        self == PodStatus::Ready
    }
}

/// Maps the current pod readiness to the status the unit should report.
pub fn build_unit_status(pod_status: PodStatus) -> UnitStatus {
    match pod_status {
        PodStatus::Unknown => UnitStatus::maintenance("Waiting for pod to appear"),
        PodStatus::Pending => UnitStatus::maintenance("Pod is starting"),
        PodStatus::Running => UnitStatus::maintenance("Pod is getting ready"),
        PodStatus::Ready => UnitStatus::active(""),
    }
}
