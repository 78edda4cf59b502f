use std::sync::Arc;

use super::Callback;
use crate::host::{CallSite, Host, Value};
use crate::kernel::context::ProbeContext;
use crate::kernel::telemetry::Tag;
use crate::locator::{classify, MAX_STACK_LINES};

/// Longest rendering of a single argument before it is cut.
pub const MAX_ARG_CHARS: usize = 120;

/// Pre callback for watched methods.
///
/// On the main thread it reads the instance's name and position and dumps arguments; on any
/// other thread it logs method identity and argument count only, never touching host objects.
pub fn watched_pre(host: Arc<dyn Host>, ctx: Arc<ProbeContext>) -> Callback {
    Arc::new(move |site: &CallSite<'_>| {
        let method = site.method;
        if !ctx.on_main_thread() {
            ctx.log(
                Tag::Ep,
                format!(
                    "PRE {}.{} argsLen={}",
                    method.declaring_type_name,
                    method.name,
                    site.args.len()
                ),
            );
            return Ok(());
        }

        let (go, pos) = match site.instance {
            Some(obj) => (
                host.display_name(obj).unwrap_or_else(|| "nullGO".to_string()),
                host.position(obj)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "nullTf".to_string()),
            ),
            None => ("n/a".to_string(), "n/a".to_string()),
        };
        ctx.log(
            Tag::Ep,
            format!(
                "PRE {}.{} go={} pos={} argsLen={} args={}",
                method.declaring_type_name,
                method.name,
                go,
                pos,
                site.args.len(),
                dump_args(site.args)
            ),
        );

        if ctx.config.general.enable_stacks
            && ctx.config.discovery.stack_methods.contains(&method.name)
        {
            dump_stack(host.as_ref(), &ctx, &method.name);
        }
        Ok(())
    })
}

pub fn watched_post(ctx: Arc<ProbeContext>) -> Callback {
    Arc::new(move |site: &CallSite<'_>| {
        ctx.log(
            Tag::Ep,
            format!(
                "POST {}.{}",
                site.method.declaring_type_name, site.method.name
            ),
        );
        Ok(())
    })
}

/// Pre callback for candidate methods: one `[TR]` line per call while the trace window is
/// open, nothing otherwise.
pub fn candidate_pre(ctx: Arc<ProbeContext>) -> Callback {
    Arc::new(move |site: &CallSite<'_>| {
        if !ctx.gate.is_active() {
            return Ok(());
        }
        ctx.log(
            Tag::Tr,
            format!(
                "{}.{}",
                site.method.declaring_type_full_name, site.method.name
            ),
        );
        Ok(())
    })
}

/// `[a, b, ...]` with each element cut to [`MAX_ARG_CHARS`].
pub fn dump_args(args: &[Value]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|a| {
            let s = a.to_string();
            if s.chars().count() > MAX_ARG_CHARS {
                let cut: String = s.chars().take(MAX_ARG_CHARS).collect();
                format!("{}...", cut)
            } else {
                s
            }
        })
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Logs the call origin and up to [`MAX_STACK_LINES`] frames of the current stack.
pub fn dump_stack(host: &dyn Host, ctx: &ProbeContext, method: &str) {
    let frames = host.capture_stack();
    let origin = classify(&frames, &ctx.config.discovery.reflective_markers);
    ctx.log(Tag::Ep, format!("STACK {} origin={}", method, origin));
    for frame in frames.iter().take(MAX_STACK_LINES) {
        ctx.log(Tag::Ep, format!("      {}", frame));
    }
}
