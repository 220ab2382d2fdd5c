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

//! grafana-k8s-charm - A Juju Kubernetes charm for Grafana
//!
//! This library provides the pieces the charm binary wires together:
//! - Unit status and pod spec builders
//! - The framework adapter trait and its hook-tool implementation
//! - Pod readiness from the Kubernetes API
//! - Event handlers and the handler registry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod charm;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod handlers;
pub mod pod_spec;
pub mod pod_status;
pub mod relation;
pub mod status;

// Re-export commonly used types
pub use adapter::{FrameworkAdapter, HookToolAdapter};
pub use charm::{Charm, HandlerRegistry};
pub use config::{CharmConfig, ConfigMap, ImageMeta, ReadinessPolicy, RuntimeConfig};
pub use context::HandlerContext;
pub use error::{CharmError, Result};
pub use event::{Event, EventKind};
pub use pod_spec::{build_juju_pod_spec, PodSpec};
pub use pod_status::{KubePodStatusSource, PodStatusSource};
pub use relation::ServerDetails;
pub use status::{build_unit_status, PodStatus, UnitStatus};

/// Semantic version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
