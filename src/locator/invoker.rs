use std::cell::Cell;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use super::args::synthesize_args;
use super::cache::InstanceCache;
use crate::discovery::{find_method, TargetTypeDescriptor};
use crate::host::{Host, HostError, ObjectHandle, Value, Vec3};
use crate::kernel::boundary::contain;
use crate::kernel::context::ProbeContext;
use crate::kernel::telemetry::Tag;

const STAGE_RESOLVE_TYPE: &str = "resolve-type";
const STAGE_LOCATE: &str = "locate";
const STAGE_NEAREST: &str = "nearest";
const STAGE_RESOLVE_METHOD: &str = "resolve-method";
const STAGE_INVOKE: &str = "invoke";

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("type not found")]
    TypeNotFound { type_name: String },
    #[error("no instances found")]
    NoInstances { type_name: String },
    #[error("no instance has a readable position")]
    NoNearest { type_name: String },
    #[error("method missing: {type_name}.{method}()")]
    MethodMissing { type_name: String, method: String },
    #[error("{source}")]
    Fault {
        type_name: String,
        #[source]
        source: HostError,
    },
    #[error("panicked: {message}")]
    Panicked {
        type_name: String,
        stage: &'static str,
        message: String,
    },
}

impl InvokeError {
    /// Which step of the forced call failed.
    pub fn stage(&self) -> &'static str {
        match self {
            InvokeError::TypeNotFound { .. } => STAGE_RESOLVE_TYPE,
            InvokeError::NoInstances { .. } => STAGE_LOCATE,
            InvokeError::NoNearest { .. } => STAGE_NEAREST,
            InvokeError::MethodMissing { .. } => STAGE_RESOLVE_METHOD,
            InvokeError::Fault { .. } => STAGE_INVOKE,
            InvokeError::Panicked { stage, .. } => *stage,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            InvokeError::TypeNotFound { type_name }
            | InvokeError::NoInstances { type_name }
            | InvokeError::NoNearest { type_name }
            | InvokeError::MethodMissing { type_name, .. }
            | InvokeError::Fault { type_name, .. }
            | InvokeError::Panicked { type_name, .. } => type_name,
        }
    }
}

/// A completed forced call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub object: ObjectHandle,
    pub object_name: String,
    pub position: Vec3,
    pub distance: f32,
    pub type_name: String,
    pub method: String,
    pub args: Vec<Value>,
    pub result: Value,
}

/// Forces a method call on the nearest live target instance.
pub struct Invoker {
    host: Arc<dyn Host>,
    ctx: Arc<ProbeContext>,
}

impl Invoker {
    pub fn new(host: Arc<dyn Host>, ctx: Arc<ProbeContext>) -> Self {
        Self { host, ctx }
    }

    /// Rebuilds the cache (cooldown permitting), picks the instance nearest the host's
    /// reference position, resolves `method_name` on its runtime type, and invokes it with
    /// synthesized arguments.
    ///
    /// Every failure is logged with stage, type and reason and returned. Every host call of
    /// every stage runs inside one panic boundary; a host panic becomes
    /// [`InvokeError::Panicked`] carrying the stage it interrupted.
    pub fn force_invoke(
        &self,
        target: &TargetTypeDescriptor,
        cache: &mut InstanceCache,
        method_name: &str,
        now: f64,
    ) -> Result<Invocation, InvokeError> {
        let stage = Cell::new(STAGE_RESOLVE_TYPE);
        let result = contain(|| self.try_force_invoke(target, cache, method_name, now, &stage))
            .unwrap_or_else(|message| {
                Err(InvokeError::Panicked {
                    type_name: target.name().to_string(),
                    stage: stage.get(),
                    message,
                })
            });
        if let Err(e) = &result {
            warn!("force invoke {} failed at {}: {}", method_name, e.stage(), e);
            self.ctx.log(
                Tag::Err,
                format!(
                    "ForceInvoke({}) stage={} type={}: {}",
                    method_name,
                    e.stage(),
                    e.type_name(),
                    e
                ),
            );
        }
        result
    }

    fn try_force_invoke(
        &self,
        target: &TargetTypeDescriptor,
        cache: &mut InstanceCache,
        method_name: &str,
        now: f64,
        stage: &Cell<&'static str>,
    ) -> Result<Invocation, InvokeError> {
        let host = self.host.as_ref();
        stage.set(STAGE_RESOLVE_TYPE);
        let ty = target
            .resolve(host)
            .ok_or_else(|| InvokeError::TypeNotFound {
                type_name: target.name().to_string(),
            })?;

        stage.set(STAGE_LOCATE);
        cache.rebuild(host, ty, now, false);
        self.ctx.log(
            Tag::Force,
            format!("{} objects={}", ty.name, cache.len()),
        );
        if cache.is_empty() {
            return Err(InvokeError::NoInstances {
                type_name: ty.name.clone(),
            });
        }

        stage.set(STAGE_NEAREST);
        let reference = host.reference_position().unwrap_or(Vec3::ZERO);
        let nearest = cache
            .find_nearest(host, reference)
            .ok_or_else(|| InvokeError::NoNearest {
                type_name: ty.name.clone(),
            })?;
        let object_name = host
            .display_name(&nearest.object)
            .unwrap_or_else(|| "n/a".to_string());
        self.ctx.log(
            Tag::Force,
            format!(
                "Nearest: name={} pos={} dist={:.2}",
                object_name, nearest.position, nearest.distance
            ),
        );

        stage.set(STAGE_RESOLVE_METHOD);
        // Resolve on the instance's own runtime type, which may differ from the cached target.
        let runtime_ty = host.type_of(&nearest.object).unwrap_or_else(|| ty.clone());
        let method = find_method(host, &runtime_ty, method_name).ok_or_else(|| {
            InvokeError::MethodMissing {
                type_name: runtime_ty.full_name.clone(),
                method: method_name.to_string(),
            }
        })?;

        let args = synthesize_args(&method.params);
        self.ctx
            .log(Tag::Force, format!("Invoke: {}{}", method.name, method.signature()));

        stage.set(STAGE_INVOKE);
        let result = host
            .invoke(&nearest.object, &method, args.clone())
            .map_err(|source| InvokeError::Fault {
                type_name: runtime_ty.full_name.clone(),
                source,
            })?;
        self.ctx.log(Tag::Force, "Invoke done.");

        Ok(Invocation {
            object: nearest.object,
            object_name,
            position: nearest.position,
            distance: nearest.distance,
            type_name: runtime_ty.full_name.clone(),
            method: method.name.clone(),
            args,
            result,
        })
    }
}
