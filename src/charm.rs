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

//! The charm - handler registry and event dispatch.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::context::HandlerContext;
use crate::error::{CharmError, Result};
use crate::event::{Event, EventKind};
use crate::handlers;

/// Boxed future returned by handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered event handler.
///
/// Handlers are plain function pointers; the registry maps an event kind to
/// exactly one of them.
pub type Handler = for<'a> fn(&'a Event, &'a HandlerContext) -> BoxFuture<'a, Result<()>>;

/// Registry of event handlers, keyed by event kind.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EventKind, Handler>,
}

impl HandlerRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if a handler for `kind` is already registered.
    pub fn register(&mut self, kind: EventKind, handler: Handler) -> &mut Self {
        if self.handlers.contains_key(&kind) {
            panic!("handler for {:?} is already registered", kind);
        }
        self.handlers.insert(kind, handler);
        self
    }

    /// Returns the handler for `kind`, if any.
    pub fn get(&self, kind: EventKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }

    /// Returns the registered event kinds in order.
    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// The charm.
///
/// Owns the handler context and the registry built at construction time.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = HandlerContext::new(adapter, pods, ReadinessPolicy::default());
/// let charm = Charm::new(ctx);
/// charm.dispatch(&Event::Start(StartEvent)).await?;
/// ```
pub struct Charm {
    ctx: HandlerContext,
    registry: HandlerRegistry,
}

impl Charm {
    /// Creates the charm and registers its handlers.
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            ctx,
            registry: Self::build_registry(),
        }
    }

    fn build_registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry
            .register(EventKind::ConfigChanged, config_changed)
            .register(EventKind::Start, start)
            .register(EventKind::UpdateStatus, update_status)
            .register(EventKind::DependencyAvailable, dependency_available);
        registry
    }

    /// Returns the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns the handler context.
    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Runs the handler registered for `event`.
    pub async fn dispatch(&self, event: &Event) -> Result<()> {
        let kind = event.kind();
        let handler = self.registry.get(kind).ok_or(CharmError::NoHandler(kind))?;

        tracing::info!(event = %kind, "dispatching event");
        handler(event, &self.ctx).await.inspect_err(|e| {
            tracing::error!(event = %kind, error = %e, "handler failed");
        })
    }
}

impl fmt::Debug for Charm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Charm")
            .field("registry", &self.registry)
            .field("readiness", &self.ctx.readiness)
            .finish()
    }
}

fn unexpected(expected: EventKind, event: &Event) -> CharmError {
    CharmError::UnexpectedEvent {
        expected,
        got: event.kind(),
    }
}

fn config_changed<'a>(event: &'a Event, ctx: &'a HandlerContext) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Event::ConfigChanged(e) = event else {
            return Err(unexpected(EventKind::ConfigChanged, event));
        };
        handlers::on_config_changed(
            e,
            ctx.adapter.as_ref(),
            ctx.pods.as_ref(),
            &ctx.readiness,
            &ctx.cancel,
        )
        .await
        .map(drop)
    })
}

fn start<'a>(event: &'a Event, ctx: &'a HandlerContext) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Event::Start(e) = event else {
            return Err(unexpected(EventKind::Start, event));
        };
        handlers::on_start(e, ctx.adapter.as_ref()).await
    })
}

fn update_status<'a>(event: &'a Event, ctx: &'a HandlerContext) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Event::UpdateStatus(e) = event else {
            return Err(unexpected(EventKind::UpdateStatus, event));
        };
        handlers::on_update_status(e, ctx.adapter.as_ref(), ctx.pods.as_ref())
            .await
            .map(drop)
    })
}

fn dependency_available<'a>(
    event: &'a Event,
    ctx: &'a HandlerContext,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let Event::DependencyAvailable(e) = event else {
            return Err(unexpected(EventKind::DependencyAvailable, event));
        };
        handlers::on_dependency_available(e, ctx.adapter.as_ref()).await
    })
}
