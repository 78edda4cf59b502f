//! In-process simulated host.
//!
//! Stands in for a real process in tests and in the demo binary. Method bodies are Rust
//! closures; interception, reflective invocation and the call stack behave like a managed
//! runtime would: every call path to a method runs its installed interceptors, and reflective
//! calls leave a `RuntimeMethodInfo.Invoke` frame on the stack.

use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{
    Host, HookId, HostError, Interceptor, CallSite, MethodId, MethodInfo, ObjectHandle, ObjectId,
    ParamInfo, TypeHandle, TypeId, Value, Vec3, Visibility,
};

pub type MethodBody =
    Arc<dyn Fn(&SimHost, &ObjectHandle, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Frame pushed by the reflective invoke path.
pub const REFLECTIVE_FRAME: &str = "System.Reflection.RuntimeMethodInfo.Invoke";
/// Frame pushed by the host's own update loop.
pub const NATIVE_FRAME: &str = "Host.Update";

thread_local! {
    static STACK: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

struct Frame;

impl Frame {
    fn push(name: String) -> Self {
        STACK.with(|s| s.borrow_mut().push(name));
        Frame
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Declaration of one simulated method.
pub struct MethodDef {
    name: String,
    params: Vec<ParamInfo>,
    visibility: Visibility,
    is_static: bool,
    special_name: bool,
    hookable: bool,
    body: MethodBody,
}

impl MethodDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            visibility: Visibility::Public,
            is_static: false,
            special_name: false,
            hookable: true,
            body: Arc::new(|_, _, _| Ok(Value::Null)),
        }
    }

    pub fn params(mut self, params: Vec<ParamInfo>) -> Self {
        self.params = params;
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Property accessor style member.
    pub fn special_name(mut self) -> Self {
        self.special_name = true;
        self
    }

    pub fn unhookable(mut self) -> Self {
        self.hookable = false;
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&SimHost, &ObjectHandle, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        self.body = Arc::new(body);
        self
    }
}

struct SimMethod {
    info: MethodInfo,
    hookable: bool,
    body: MethodBody,
}

struct SimType {
    handle: TypeHandle,
    methods: Vec<MethodId>,
}

struct SimModule {
    name: String,
    types: Vec<TypeId>,
    loadable: bool,
}

struct SimObject {
    handle: ObjectHandle,
    name: String,
    position: Vec3,
    alive: bool,
}

#[derive(Default)]
struct World {
    modules: Vec<SimModule>,
    types: HashMap<TypeId, SimType>,
    methods: HashMap<MethodId, SimMethod>,
    objects: Vec<SimObject>,
    camera: Option<Vec3>,
}

pub struct SimHost {
    runtime_version: String,
    world: RwLock<World>,
    hooks: RwLock<Vec<(HookId, MethodId, Interceptor)>>,
    next_id: AtomicU64,
    enumerations: AtomicU64,
}

impl SimHost {
    pub fn new(runtime_version: &str) -> Self {
        Self {
            runtime_version: runtime_version.to_string(),
            world: RwLock::new(World::default()),
            hooks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            enumerations: AtomicU64::new(0),
        }
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add_module(&self, name: &str) {
        let mut world = self.world.write();
        if !world.modules.iter().any(|m| m.name == name) {
            world.modules.push(SimModule {
                name: name.to_string(),
                types: Vec::new(),
                loadable: true,
            });
        }
    }

    /// Makes `module_types` fail for `module`, like a module with unresolvable dependencies.
    pub fn mark_unloadable(&self, module: &str) {
        let mut world = self.world.write();
        if let Some(m) = world.modules.iter_mut().find(|m| m.name == module) {
            m.loadable = false;
        }
    }

    pub fn add_type(&self, module: &str, namespace: &str, name: &str) -> TypeId {
        self.add_module(module);
        let id = TypeId(self.next());
        let full_name = if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", namespace, name)
        };
        let mut world = self.world.write();
        world.types.insert(
            id,
            SimType {
                handle: TypeHandle {
                    id,
                    name: name.to_string(),
                    full_name,
                    module: module.to_string(),
                },
                methods: Vec::new(),
            },
        );
        if let Some(m) = world.modules.iter_mut().find(|m| m.name == module) {
            m.types.push(id);
        }
        id
    }

    pub fn add_method(&self, ty: TypeId, def: MethodDef) -> Result<MethodId, HostError> {
        let id = MethodId(self.next());
        let mut world = self.world.write();
        let (type_name, full_name) = {
            let t = world.types.get(&ty).ok_or(HostError::UnknownType(ty))?;
            (t.handle.name.clone(), t.handle.full_name.clone())
        };
        let info = MethodInfo {
            id,
            declaring_type: ty,
            declaring_type_name: type_name,
            declaring_type_full_name: full_name,
            name: def.name,
            params: def.params,
            visibility: def.visibility,
            is_static: def.is_static,
            special_name: def.special_name,
        };
        world.methods.insert(
            id,
            SimMethod {
                info,
                hookable: def.hookable,
                body: def.body,
            },
        );
        if let Some(t) = world.types.get_mut(&ty) {
            t.methods.push(id);
        }
        Ok(id)
    }

    pub fn spawn(&self, ty: TypeId, name: &str, position: Vec3) -> ObjectHandle {
        let handle = ObjectHandle {
            id: ObjectId(self.next()),
            type_id: ty,
        };
        self.world.write().objects.push(SimObject {
            handle,
            name: name.to_string(),
            position,
            alive: true,
        });
        handle
    }

    pub fn destroy(&self, object: &ObjectHandle) {
        let mut world = self.world.write();
        if let Some(o) = world.objects.iter_mut().find(|o| o.handle.id == object.id) {
            o.alive = false;
        }
    }

    /// Alive objects whose type has the simple name `type_name`.
    pub fn objects_of_type(&self, type_name: &str) -> Vec<ObjectHandle> {
        let world = self.world.read();
        world
            .objects
            .iter()
            .filter(|o| o.alive)
            .filter(|o| {
                world
                    .types
                    .get(&o.handle.type_id)
                    .map_or(false, |t| t.handle.name == type_name)
            })
            .map(|o| o.handle)
            .collect()
    }

    pub fn set_camera(&self, position: Option<Vec3>) {
        self.world.write().camera = position;
    }

    /// How many times `live_instances` has been called.
    pub fn enumeration_count(&self) -> u64 {
        self.enumerations.load(Ordering::Relaxed)
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// The host calling one of its own methods through ordinary control flow.
    pub fn call(
        &self,
        object: &ObjectHandle,
        method_name: &str,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let info = {
            let world = self.world.read();
            let ty = world
                .types
                .get(&object.type_id)
                .ok_or(HostError::UnknownType(object.type_id))?;
            ty.methods
                .iter()
                .filter_map(|id| world.methods.get(id))
                .find(|m| m.info.name == method_name)
                .map(|m| m.info.clone())
                .ok_or_else(|| HostError::InvocationFault {
                    type_name: ty.handle.full_name.clone(),
                    message: format!("no method {}", method_name),
                })?
        };
        let _frame = Frame::push(NATIVE_FRAME.to_string());
        self.dispatch(object, &info, args)
    }

    fn dispatch(
        &self,
        object: &ObjectHandle,
        method: &MethodInfo,
        args: &[Value],
    ) -> Result<Value, HostError> {
        let body = {
            let world = self.world.read();
            let alive = world
                .objects
                .iter()
                .find(|o| o.handle.id == object.id)
                .map(|o| o.alive)
                .unwrap_or(false);
            if !alive {
                return Err(HostError::ObjectDestroyed(object.id));
            }
            world
                .methods
                .get(&method.id)
                .map(|m| m.body.clone())
                .ok_or_else(|| HostError::InvocationFault {
                    type_name: method.declaring_type_full_name.clone(),
                    message: format!("no method {}", method.name),
                })?
        };

        // Interceptors run without any host lock held; they may call back into the host.
        let interceptors: Vec<Interceptor> = self
            .hooks
            .read()
            .iter()
            .filter(|(_, m, _)| *m == method.id)
            .map(|(_, _, i)| i.clone())
            .collect();

        let _frame = Frame::push(format!(
            "{}.{}",
            method.declaring_type_full_name, method.name
        ));
        let site = CallSite {
            method,
            instance: Some(object),
            args,
        };
        for i in &interceptors {
            (i.pre)(&site);
        }
        let result = body(self, object, args);
        for i in &interceptors {
            if let Some(post) = &i.post {
                post(&site);
            }
        }
        result
    }
}

impl Host for SimHost {
    fn runtime_version(&self) -> String {
        self.runtime_version.clone()
    }

    fn module_names(&self) -> Vec<String> {
        self.world.read().modules.iter().map(|m| m.name.clone()).collect()
    }

    fn module_types(&self, module: &str) -> Result<Vec<TypeHandle>, HostError> {
        let world = self.world.read();
        let m = world
            .modules
            .iter()
            .find(|m| m.name == module)
            .ok_or_else(|| HostError::TypeLoad(module.to_string()))?;
        if !m.loadable {
            return Err(HostError::TypeLoad(module.to_string()));
        }
        Ok(m.types
            .iter()
            .filter_map(|id| world.types.get(id))
            .map(|t| t.handle.clone())
            .collect())
    }

    fn type_methods(&self, ty: &TypeHandle) -> Result<Vec<MethodInfo>, HostError> {
        let world = self.world.read();
        let t = world.types.get(&ty.id).ok_or(HostError::UnknownType(ty.id))?;
        Ok(t.methods
            .iter()
            .filter_map(|id| world.methods.get(id))
            .map(|m| m.info.clone())
            .collect())
    }

    fn type_of(&self, object: &ObjectHandle) -> Option<TypeHandle> {
        self.world
            .read()
            .types
            .get(&object.type_id)
            .map(|t| t.handle.clone())
    }

    fn live_instances(&self, ty: &TypeHandle) -> Vec<ObjectHandle> {
        self.enumerations.fetch_add(1, Ordering::Relaxed);
        self.world
            .read()
            .objects
            .iter()
            .filter(|o| o.handle.type_id == ty.id)
            .map(|o| o.handle)
            .collect()
    }

    fn is_alive(&self, object: &ObjectHandle) -> bool {
        self.world
            .read()
            .objects
            .iter()
            .any(|o| o.handle.id == object.id && o.alive)
    }

    fn display_name(&self, object: &ObjectHandle) -> Option<String> {
        self.world
            .read()
            .objects
            .iter()
            .find(|o| o.handle.id == object.id && o.alive)
            .map(|o| o.name.clone())
    }

    fn position(&self, object: &ObjectHandle) -> Option<Vec3> {
        self.world
            .read()
            .objects
            .iter()
            .find(|o| o.handle.id == object.id && o.alive)
            .map(|o| o.position)
    }

    fn reference_position(&self) -> Option<Vec3> {
        self.world.read().camera
    }

    fn invoke(
        &self,
        object: &ObjectHandle,
        method: &MethodInfo,
        args: Vec<Value>,
    ) -> Result<Value, HostError> {
        if args.len() != method.params.len() {
            return Err(HostError::ArgumentCount {
                method: method.name.clone(),
                expected: method.params.len(),
                got: args.len(),
            });
        }
        let _frame = Frame::push(REFLECTIVE_FRAME.to_string());
        self.dispatch(object, method, &args)
    }

    fn install_hook(
        &self,
        method: &MethodInfo,
        interceptor: Interceptor,
    ) -> Result<HookId, HostError> {
        let hookable = self
            .world
            .read()
            .methods
            .get(&method.id)
            .map(|m| m.hookable)
            .unwrap_or(false);
        if !hookable {
            return Err(HostError::NotHookable(format!(
                "{}.{}",
                method.declaring_type_name, method.name
            )));
        }
        let id = HookId(self.next());
        self.hooks.write().push((id, method.id, interceptor));
        Ok(id)
    }

    fn remove_hook(&self, id: HookId) -> Result<(), HostError> {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|(h, _, _)| *h != id);
        if hooks.len() == before {
            return Err(HostError::UnknownHook(id));
        }
        Ok(())
    }

    fn capture_stack(&self) -> Vec<String> {
        STACK.with(|s| s.borrow().iter().rev().cloned().collect())
    }
}

