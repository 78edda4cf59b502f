use chrono::Local;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::boundary::guard;
use super::context::ProbeContext;
use super::event::{Action, Event, ForceTarget};
use super::telemetry::{EventSink, Tag};
use super::time::{Clock, Tick};
use crate::config::ProbeConfig;
use crate::discovery::{find_method, scan_candidates, CandidateFilter, MethodDescriptor, TargetTypeDescriptor};
use crate::hooks::{candidate_pre, watched_post, watched_pre, HookManager};
use crate::host::Host;
use crate::locator::{InstanceCache, Invocation, Invoker};

/// What a tick did, for the driver and for tests.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    WindowClosed,
    Marked,
    TraceToggled { armed: bool },
    WindowOpened { until: f64 },
    Invoked {
        target: ForceTarget,
        result: Result<Invocation, String>,
    },
    CacheRebuilt { instances: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateSummary {
    pub considered: usize,
    pub selected: usize,
    pub patched: usize,
}

/// Orchestrator: discovery and hooking at attach, then one cooperative step per tick.
pub struct Reactor {
    pub receiver: mpsc::Receiver<Event>,
    host: Arc<dyn Host>,
    pub ctx: Arc<ProbeContext>,
    clock: Arc<dyn Clock>,
    pub hooks: HookManager,
    pub target: TargetTypeDescriptor,
    pub cache: InstanceCache,
    invoker: Invoker,
    pub tick: Tick,
    pub candidates: CandidateSummary,
    force_rebuild: bool,
    detached: bool,
}

impl Reactor {
    /// Attaches with the sink described by `config`. A log file that cannot be created
    /// leaves the probe running with a disabled sink.
    pub fn attach(
        host: Arc<dyn Host>,
        config: ProbeConfig,
        clock: Arc<dyn Clock>,
        receiver: mpsc::Receiver<Event>,
    ) -> Self {
        let sink = if config.general.enable_probe_log {
            match EventSink::to_file(&config.sink.directory, config.sink.capacity) {
                Ok(sink) => {
                    info!("probe log: {:?}", sink.path());
                    sink
                }
                Err(e) => {
                    warn!("probe log unavailable, continuing without it: {}", e);
                    EventSink::disabled()
                }
            }
        } else {
            EventSink::disabled()
        };
        Self::attach_with_sink(host, config, sink, clock, receiver)
    }

    /// Attaches on the calling thread, which becomes the main thread for hook callbacks.
    pub fn attach_with_sink(
        host: Arc<dyn Host>,
        config: ProbeConfig,
        sink: EventSink,
        clock: Arc<dyn Clock>,
        receiver: mpsc::Receiver<Event>,
    ) -> Self {
        let target = TargetTypeDescriptor::new(&config.discovery.target_type);
        let cache = InstanceCache::new(config.locator.cooldown_seconds);
        let ctx = Arc::new(ProbeContext::new(config, sink));
        let mut reactor = Self {
            receiver,
            hooks: HookManager::new(host.clone(), ctx.clone()),
            invoker: Invoker::new(host.clone(), ctx.clone()),
            host,
            ctx: ctx.clone(),
            clock,
            target,
            cache,
            tick: Tick::new(),
            candidates: CandidateSummary::default(),
            force_rebuild: false,
            detached: false,
        };

        guard(&ctx.sink, "write header", || {
            reactor.write_header();
            Ok(())
        });
        guard(&ctx.sink, "install watched hooks", || {
            reactor.install_watched();
            Ok(())
        });
        guard(&ctx.sink, "install candidate hooks", || {
            reactor.install_candidates();
            Ok(())
        });
        ctx.log(Tag::Init, "=== Probe ready ===");
        info!(
            "probe attached: {} hooks, {} candidates",
            reactor.hooks.len(),
            reactor.candidates.patched
        );
        reactor
    }

    fn write_header(&self) {
        let cfg = &self.ctx.config;
        let log = |msg: String| self.ctx.log(Tag::Init, msg);
        log(format!(
            "=== {} {} attach ===",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));
        log(format!("Session={}", self.ctx.session));
        log(format!("Runtime={}", self.host.runtime_version()));
        log(format!("Time={}", Local::now().format("%Y-%m-%d %H:%M:%S")));
        log(format!("MainTID={}", self.ctx.main_thread()));
        log(format!(
            "Trace={}",
            serde_json::to_string(&cfg.trace).unwrap_or_default()
        ));
        log(format!(
            "Keys: Mark={} ButtonPress={} OnClick={} TraceToggle={}",
            cfg.keys.mark, cfg.keys.force_button_press, cfg.keys.force_on_click, cfg.keys.trace_toggle
        ));
    }

    fn install_watched(&mut self) {
        let host = self.host.clone();
        let ctx = self.ctx.clone();
        let Some(ty) = self.target.resolve(host.as_ref()).cloned() else {
            ctx.log(Tag::Ref, format!("{} type NOT FOUND.", self.target.name()));
            return;
        };
        let has = |name: &str| find_method(host.as_ref(), &ty, name).is_some();
        ctx.log(
            Tag::Ref,
            format!(
                "{} type={} ButtonPress={} OnClick={}",
                ty.name,
                ty.full_name,
                has("ButtonPress"),
                has("OnClick")
            ),
        );

        for watched in &ctx.config.discovery.watched_methods {
            let Some(info) = find_method(host.as_ref(), &ty, &watched.name) else {
                ctx.log(Tag::Patch, format!("SKIP {} (missing)", watched.label));
                continue;
            };
            let target = format!(
                "{}.{}{}",
                info.declaring_type_name,
                info.name,
                info.signature()
            );
            let installed = self.hooks.install(
                MethodDescriptor::new(info),
                &watched.label,
                watched_pre(host.clone(), ctx.clone()),
                Some(watched_post(ctx.clone())),
            );
            match installed {
                Ok(_) => ctx.log(Tag::Patch, format!("OK {} -> {}", watched.label, target)),
                Err(e) => ctx.log(Tag::Patch, format!("FAIL {}", e)),
            }
        }
    }

    fn install_candidates(&mut self) {
        let ctx = self.ctx.clone();
        let host = self.host.clone();
        let discovery = &ctx.config.discovery;
        let filter = CandidateFilter::from_config(discovery);
        let hooks = &mut self.hooks;
        let scan = scan_candidates(
            host.as_ref(),
            &discovery.candidate_module,
            &filter,
            |candidate| {
                let label = candidate.qualified_name();
                match hooks.install(candidate, &label, candidate_pre(ctx.clone()), None) {
                    Ok(_) => true,
                    Err(e) => {
                        ctx.log(Tag::Patch, format!("FAIL {}", e));
                        false
                    }
                }
            },
        );
        if !scan.module_found {
            ctx.log(Tag::Trace, format!("{} not found.", discovery.candidate_module));
            return;
        }

        self.candidates = CandidateSummary {
            considered: scan.considered,
            selected: scan.selected,
            patched: scan.accepted,
        };
        ctx.log(
            Tag::Trace,
            format!(
                "candidate methods considered={}, selected={}, patched={} (logs only while a trace window is open)",
                scan.considered, scan.selected, scan.accepted
            ),
        );
    }

    /// One cooperative step. Advances the tick, expires the trace window, handles queued
    /// events and refreshes the instance cache when its cooldown allows. Host failures inside
    /// a step are logged as `[ERR]` lines and never unwind out of it.
    ///
    /// MUST NOT await or block.
    pub fn tick_step(&mut self, events: Vec<Event>) -> Vec<TickOutcome> {
        self.tick = self.tick.next();
        let mut outcomes = Vec::new();
        if !self.ctx.config.general.enable_probe_log || self.detached {
            return outcomes;
        }
        let now = self.clock.now();

        if self.ctx.gate.poll(now) {
            self.ctx.log(Tag::Trace, "window ended");
            outcomes.push(TickOutcome::WindowClosed);
        }

        for event in events {
            match event {
                Event::ContextChanged => self.force_rebuild = true,
                Event::Action(action) => self.handle_action(action, now, &mut outcomes),
            }
        }

        let host = self.host.clone();
        let ctx = self.ctx.clone();
        let target = &self.target;
        let cache = &mut self.cache;
        let force_rebuild = &mut self.force_rebuild;
        let rebuilt = guard(&ctx.sink, "refresh instance cache", || {
            let Some(ty) = target.resolve(host.as_ref()) else {
                return Ok(false);
            };
            let force = std::mem::take(force_rebuild);
            Ok(cache.rebuild(host.as_ref(), ty, now, force))
        });
        if rebuilt == Some(true) {
            outcomes.push(TickOutcome::CacheRebuilt {
                instances: self.cache.len(),
            });
        }

        outcomes
    }

    fn handle_action(&mut self, action: Action, now: f64, outcomes: &mut Vec<TickOutcome>) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        match action {
            Action::Mark => {
                self.ctx.log(Tag::Mark, format!("===== MARK {} =====", stamp));
                outcomes.push(TickOutcome::Marked);
            }
            Action::ToggleTrace => {
                let armed = self.ctx.gate.toggle();
                self.ctx.log(Tag::Trace, format!("TraceEnabled={}", armed));
                outcomes.push(TickOutcome::TraceToggled { armed });
            }
            Action::ForceInvoke(target) => {
                let cfg = &self.ctx.config;
                self.ctx.log(
                    Tag::Force,
                    format!(
                        "===== FORCE TEST ({} {}) {} =====",
                        cfg.keys.key_for(&action),
                        target.method_name(),
                        stamp
                    ),
                );

                if target.opens_window() {
                    let seconds = cfg.trace.trace_seconds;
                    if let Some(until) =
                        self.ctx
                            .gate
                            .open_window(now, seconds, cfg.trace.minimum_window)
                    {
                        self.ctx.log(
                            Tag::Trace,
                            format!("window started for {:.2}s", until - now),
                        );
                        outcomes.push(TickOutcome::WindowOpened { until });
                    }
                }

                let result = self
                    .invoker
                    .force_invoke(&self.target, &mut self.cache, target.method_name(), now)
                    .map_err(|e| e.to_string());
                outcomes.push(TickOutcome::Invoked { target, result });
            }
        }
    }

    /// Removes every hook. Later calls and ticks do nothing.
    pub fn detach(&mut self) -> usize {
        if self.detached {
            return 0;
        }
        self.detached = true;
        let removed = self.hooks.uninstall_all();
        self.ctx.log(
            Tag::Init,
            format!("=== Detached: {} hooks removed ===", removed),
        );
        info!("probe detached, {} hooks removed", removed);
        removed
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Async driver loop. Must be awaited on the thread that attached (not spawned), so hook
    /// callbacks keep seeing it as the main thread. Returns after detaching once every event
    /// sender is gone.
    pub async fn run(&mut self) {
        let tick_ms = self.ctx.config.driver.tick_ms.max(1);
        info!("Probe driver started. Tick: {}ms", tick_ms);

        let mut cadence = interval(Duration::from_millis(tick_ms));
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            cadence.tick().await;

            let mut events = Vec::new();
            let mut closed = false;
            loop {
                match self.receiver.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }

            for outcome in self.tick_step(events) {
                debug!("tick {}: {:?}", self.tick.frame, outcome);
            }

            if closed {
                self.detach();
                return;
            }
        }
    }
}
