#![allow(dead_code)]

use active_probe::config::ProbeConfig;
use active_probe::host::sim::{MethodDef, SimHost};
use active_probe::host::{
    Host, HookId, HostError, Interceptor, MethodInfo, ObjectHandle, ParamInfo, TypeHandle, TypeId,
    Value, ValueKind, Vec3,
};
use active_probe::kernel::event::Event;
use active_probe::kernel::telemetry::{EventSink, Tag};
use active_probe::kernel::time::ManualClock;
use active_probe::Reactor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct World {
    pub host: Arc<SimHost>,
    pub ep_type: TypeId,
    pub marker_type: TypeId,
    pub eps: Vec<ObjectHandle>,
    pub marker: ObjectHandle,
}

/// Host with a target type, one keyword-matching helper type and a few distractions.
pub fn world() -> World {
    let host = Arc::new(SimHost::new("2022.3.21f1"));

    let helper = host.add_type("UnityEngine.CoreModule", "UnityEngine", "Transform");
    host.add_method(helper, MethodDef::new("Translate")).unwrap();
    host.add_module("Broken.Plugin");
    host.mark_unloadable("Broken.Plugin");

    let ep = host.add_type("Assembly-CSharp", "", "ExtractionPoint");
    host.add_method(
        ep,
        MethodDef::new("OnClick").body(|host, obj, _| host.call(obj, "ButtonPress", &[])),
    )
    .unwrap();
    host.add_method(ep, MethodDef::new("ButtonPress")).unwrap();
    host.add_method(
        ep,
        MethodDef::new("StateSet")
            .non_public()
            .params(vec![ParamInfo::value("state", "State", ValueKind::Int)]),
    )
    .unwrap();
    host.add_method(
        ep,
        MethodDef::new("Configure").params(vec![
            ParamInfo::reference("owner", "GameObject"),
            ParamInfo::value("goal", "Int32", ValueKind::Int),
        ]),
    )
    .unwrap();
    host.add_method(
        ep,
        MethodDef::new("Faulty").body(|_, _, _| {
            Err(HostError::InvocationFault {
                type_name: "ExtractionPoint".to_string(),
                message: "NullReferenceException".to_string(),
            })
        }),
    )
    .unwrap();
    host.add_method(ep, MethodDef::new("Explode").body(|_, _, _| panic!("host blew up")))
        .unwrap();

    let marker_type = host.add_type("Assembly-CSharp", "", "MapMarker");
    host.add_method(marker_type, MethodDef::new("Ping")).unwrap();
    host.add_method(marker_type, MethodDef::new("get_Color").special_name()).unwrap();

    let player = host.add_type("Assembly-CSharp", "", "PlayerController");
    host.add_method(player, MethodDef::new("Jump")).unwrap();

    let eps = vec![
        host.spawn(ep, "EP far", Vec3::new(5.0, 0.0, 0.0)),
        host.spawn(ep, "EP near", Vec3::new(1.0, 1.0, 0.0)),
    ];
    let marker = host.spawn(marker_type, "marker", Vec3::ZERO);

    World {
        host,
        ep_type: ep,
        marker_type,
        eps,
        marker,
    }
}

pub fn config() -> ProbeConfig {
    let mut cfg = ProbeConfig::default();
    cfg.locator.cooldown_seconds = 1.0;
    cfg
}

pub fn attach(
    world: &World,
    cfg: ProbeConfig,
    clock: Arc<ManualClock>,
) -> (Reactor, mpsc::Sender<Event>) {
    let (tx, rx) = mpsc::channel(16);
    let reactor = Reactor::attach_with_sink(
        world.host.clone(),
        cfg,
        EventSink::in_memory(10_000),
        clock,
        rx,
    );
    (reactor, tx)
}

pub fn count_tag(sink: &EventSink, tag: Tag) -> usize {
    sink.events().iter().filter(|e| e.tag == tag).count()
}

pub fn messages(sink: &EventSink, tag: Tag) -> Vec<String> {
    sink.events()
        .into_iter()
        .filter(|e| e.tag == tag)
        .map(|e| e.message)
        .collect()
}

pub fn has_message(sink: &EventSink, needle: &str) -> bool {
    sink.events().iter().any(|e| e.message.contains(needle))
}

/// Host adapter over a [`SimHost`] whose object reads can be made to panic, like an adapter
/// touching an object the engine tore down mid-read.
pub struct FragileHost {
    pub inner: Arc<SimHost>,
    pub panic_on_position: AtomicBool,
    pub panic_on_enumerate: AtomicBool,
}

impl FragileHost {
    pub fn new(inner: Arc<SimHost>) -> Self {
        Self {
            inner,
            panic_on_position: AtomicBool::new(false),
            panic_on_enumerate: AtomicBool::new(false),
        }
    }
}

impl Host for FragileHost {
    fn runtime_version(&self) -> String {
        self.inner.runtime_version()
    }

    fn module_names(&self) -> Vec<String> {
        self.inner.module_names()
    }

    fn module_types(&self, module: &str) -> Result<Vec<TypeHandle>, HostError> {
        self.inner.module_types(module)
    }

    fn type_methods(&self, ty: &TypeHandle) -> Result<Vec<MethodInfo>, HostError> {
        self.inner.type_methods(ty)
    }

    fn type_of(&self, object: &ObjectHandle) -> Option<TypeHandle> {
        self.inner.type_of(object)
    }

    fn live_instances(&self, ty: &TypeHandle) -> Vec<ObjectHandle> {
        if self.panic_on_enumerate.load(Ordering::SeqCst) {
            panic!("object table locked by loader");
        }
        self.inner.live_instances(ty)
    }

    fn is_alive(&self, object: &ObjectHandle) -> bool {
        self.inner.is_alive(object)
    }

    fn display_name(&self, object: &ObjectHandle) -> Option<String> {
        self.inner.display_name(object)
    }

    fn position(&self, object: &ObjectHandle) -> Option<Vec3> {
        if self.panic_on_position.load(Ordering::SeqCst) {
            panic!("transform destroyed mid-read");
        }
        self.inner.position(object)
    }

    fn reference_position(&self) -> Option<Vec3> {
        self.inner.reference_position()
    }

    fn invoke(
        &self,
        object: &ObjectHandle,
        method: &MethodInfo,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        self.inner.invoke(object, method, args)
    }

    fn install_hook(
        &self,
        method: &MethodInfo,
        interceptor: Interceptor,
    ) -> Result<HookId, HostError> {
        self.inner.install_hook(method, interceptor)
    }

    fn remove_hook(&self, id: HookId) -> Result<(), HostError> {
        self.inner.remove_hook(id)
    }

    fn capture_stack(&self) -> Vec<String> {
        self.inner.capture_stack()
    }
}
