//! Host capability surface.
//!
//! The probe never links against the instrumented process's types. Everything it needs from the
//! host goes through [`Host`]: listing modules and their types, listing live objects, reading an
//! object's name and position, reflective invocation, installing interception points and
//! capturing the current call stack. A new host is supported by writing a new adapter.

pub mod sim;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

/// Identifier handed back by the host for one installed interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A runtime type as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeHandle {
    pub id: TypeId,
    /// Simple name, e.g. `ExtractionPoint`.
    pub name: String,
    /// Namespace-qualified name.
    pub full_name: String,
    pub module: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// Primitive shapes a value-like parameter can take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Vector3,
    /// Any other by-value type, identified by name.
    Struct(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// Class-like: may hold null.
    Reference,
    Value(ValueKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub type_name: String,
    pub kind: TypeKind,
    /// Declared default, if the method signature carries one.
    pub default: Option<Value>,
}

impl ParamInfo {
    pub fn reference(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: TypeKind::Reference,
            default: None,
        }
    }

    pub fn value(name: &str, type_name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            kind: TypeKind::Value(kind),
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A method as reported by the host's reflection facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub id: MethodId,
    pub declaring_type: TypeId,
    /// Simple name of the declaring type.
    pub declaring_type_name: String,
    pub declaring_type_full_name: String,
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Property accessors, operators and other specially-named members.
    pub special_name: bool,
}

impl MethodInfo {
    /// `(Int32,Boolean)` style signature for diagnostics.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.type_name.as_str()).collect();
        format!("({})", params.join(","))
    }
}

/// A live object owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub id: ObjectId,
    pub type_id: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Vec3(Vec3),
    Object(ObjectHandle),
    /// Default-constructed instance of a by-value type.
    Struct { type_name: String },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Vec3(v) => write!(f, "{}", v),
            Value::Object(o) => write!(f, "object#{}", o.id.0),
            Value::Struct { type_name } => write!(f, "{}{{}}", type_name),
        }
    }
}

/// What a hook callback sees for one intercepted call.
#[derive(Debug)]
pub struct CallSite<'a> {
    pub method: &'a MethodInfo,
    pub instance: Option<&'a ObjectHandle>,
    pub args: &'a [Value],
}

pub type HookFn = Arc<dyn Fn(&CallSite<'_>) + Send + Sync>;

/// Pre/post pair the host runs around an intercepted method.
#[derive(Clone)]
pub struct Interceptor {
    pub pre: HookFn,
    pub post: Option<HookFn>,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("post", &self.post.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    #[error("types of module {0} could not be loaded")]
    TypeLoad(String),
    #[error("no type with id {0:?}")]
    UnknownType(TypeId),
    #[error("method {0} cannot be intercepted")]
    NotHookable(String),
    #[error("no hook with id {0:?}")]
    UnknownHook(HookId),
    #[error("object {0:?} has been destroyed")]
    ObjectDestroyed(ObjectId),
    #[error("{method} expects {expected} arguments, got {got}")]
    ArgumentCount {
        method: String,
        expected: usize,
        got: usize,
    },
    #[error("{type_name}: {message}")]
    InvocationFault { type_name: String, message: String },
}

/// Everything the probe needs from the instrumented process.
///
/// Enumeration methods return owned snapshots; the probe never holds a borrow into host state
/// across a call.
pub trait Host: Send + Sync {
    /// Runtime version string for the log header.
    fn runtime_version(&self) -> String;

    fn module_names(&self) -> Vec<String>;

    /// Types declared in `module`. May fail for modules whose type list cannot be loaded.
    fn module_types(&self, module: &str) -> Result<Vec<TypeHandle>, HostError>;

    /// All methods of `ty` in declaration order: public and non-public, instance and static.
    fn type_methods(&self, ty: &TypeHandle) -> Result<Vec<MethodInfo>, HostError>;

    fn type_of(&self, object: &ObjectHandle) -> Option<TypeHandle>;

    /// Every instance of `ty` the host still tracks. May include destroyed objects.
    fn live_instances(&self, ty: &TypeHandle) -> Vec<ObjectHandle>;

    fn is_alive(&self, object: &ObjectHandle) -> bool;

    fn display_name(&self, object: &ObjectHandle) -> Option<String>;

    fn position(&self, object: &ObjectHandle) -> Option<Vec3>;

    /// Position the operator is looking from (main camera), if any.
    fn reference_position(&self) -> Option<Vec3>;

    /// Reflective call of `method` on `object`.
    fn invoke(
        &self,
        object: &ObjectHandle,
        method: &MethodInfo,
        args: Vec<Value>,
    ) -> Result<Value, HostError>;

    fn install_hook(&self, method: &MethodInfo, interceptor: Interceptor)
        -> Result<HookId, HostError>;

    fn remove_hook(&self, id: HookId) -> Result<(), HostError>;

    /// Current thread's call stack, innermost frame first.
    fn capture_stack(&self) -> Vec<String>;
}
