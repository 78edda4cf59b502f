//! Interception bookkeeping.
//!
//! Every callback handed to the host is wrapped in the failure boundary first, so a callback
//! error or panic becomes an `[ERR]` line instead of unwinding into the host's own call.

pub mod callbacks;

pub use callbacks::{candidate_pre, dump_args, watched_post, watched_pre};

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::discovery::MethodDescriptor;
use crate::host::{CallSite, Host, HookFn, HookId, HostError, Interceptor};
use crate::kernel::boundary::guard;
use crate::kernel::context::ProbeContext;
use crate::kernel::telemetry::Tag;

/// Probe-side hook callback. Errors are logged, never surfaced to the host.
pub type Callback = Arc<dyn Fn(&CallSite<'_>) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("{label}: {source}")]
    Install {
        label: String,
        #[source]
        source: HostError,
    },
    #[error("{label}: already installed under this label")]
    AlreadyInstalled { label: String },
}

/// One installed interception point.
pub struct HookRecord {
    pub id: HookId,
    pub method: MethodDescriptor,
    pub label: String,
    pub pre: Callback,
    pub post: Option<Callback>,
}

impl fmt::Debug for HookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRecord")
            .field("id", &self.id)
            .field("method", &self.method.qualified_name())
            .field("label", &self.label)
            .field("post", &self.post.is_some())
            .finish()
    }
}

pub struct HookManager {
    host: Arc<dyn Host>,
    ctx: Arc<ProbeContext>,
    records: Vec<HookRecord>,
}

impl HookManager {
    pub fn new(host: Arc<dyn Host>, ctx: Arc<ProbeContext>) -> Self {
        Self {
            host,
            ctx,
            records: Vec::new(),
        }
    }

    fn shield(&self, label: &str, callback: &Callback) -> HookFn {
        let ctx = self.ctx.clone();
        let callback = callback.clone();
        let scope = format!("hook {}", label);
        Arc::new(move |site: &CallSite<'_>| {
            guard(&ctx.sink, &scope, || callback(site));
        })
    }

    /// Installs `pre` (and `post`, if any) around `method`.
    ///
    /// A failure affects this method only; callers log it and move on.
    pub fn install(
        &mut self,
        mut method: MethodDescriptor,
        label: &str,
        pre: Callback,
        post: Option<Callback>,
    ) -> Result<&HookRecord, HookError> {
        if self
            .records
            .iter()
            .any(|r| r.label == label && r.method.info.id == method.info.id)
        {
            return Err(HookError::AlreadyInstalled {
                label: label.to_string(),
            });
        }
        let interceptor = Interceptor {
            pre: self.shield(label, &pre),
            post: post.as_ref().map(|p| self.shield(label, p)),
        };
        let id = self
            .host
            .install_hook(&method.info, interceptor)
            .map_err(|source| HookError::Install {
                label: label.to_string(),
                source,
            })?;
        method.set_installed(true);
        debug!("hook {} installed as {:?}", label, id);
        self.records.push(HookRecord {
            id,
            method,
            label: label.to_string(),
            pre,
            post,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Removes every hook this manager installed. Safe to call repeatedly or with nothing
    /// installed. Returns how many hooks were removed.
    pub fn uninstall_all(&mut self) -> usize {
        let mut removed = 0;
        for record in self.records.drain(..) {
            match self.host.remove_hook(record.id) {
                Ok(()) => removed += 1,
                Err(e) => self.ctx.log(
                    Tag::Patch,
                    format!("UNPATCH FAIL {}: {}", record.label, e),
                ),
            }
        }
        removed
    }

    pub fn records(&self) -> &[HookRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Drop for HookManager {
    fn drop(&mut self) {
        self.uninstall_all();
    }
}
