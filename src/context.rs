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

//! Handler context - the collaborators every handler may use.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::adapter::FrameworkAdapter;
use crate::config::ReadinessPolicy;
use crate::pod_status::PodStatusSource;

/// Shared context passed to every handler.
#[derive(Clone)]
pub struct HandlerContext {
    /// Framework the handlers report to.
    pub adapter: Arc<dyn FrameworkAdapter>,

    /// Where pod readiness is observed.
    pub pods: Arc<dyn PodStatusSource>,

    /// Bounds for the readiness loop.
    pub readiness: ReadinessPolicy,

    /// Cancelled when the hook process is asked to stop.
    pub cancel: CancellationToken,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(
        adapter: Arc<dyn FrameworkAdapter>,
        pods: Arc<dyn PodStatusSource>,
        readiness: ReadinessPolicy,
    ) -> Self {
        Self {
            adapter,
            pods,
            readiness,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` instead of a fresh token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
