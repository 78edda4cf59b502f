use crate::host::{ParamInfo, TypeKind, Value, ValueKind, Vec3};

/// Placeholder arguments for a forced call.
///
/// Per parameter, in order: the declared default if there is one, `Null` for reference types,
/// otherwise the zero value of the value type.
///
/// Known limitation: these values only satisfy the signature. They say nothing about what the
/// host expects, and a method that dereferences a null argument will fault (which the invoker
/// logs).
pub fn synthesize_args(params: &[ParamInfo]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match (&p.default, &p.kind) {
            (Some(default), _) => default.clone(),
            (None, TypeKind::Reference) => Value::Null,
            (None, TypeKind::Value(kind)) => zero_value(kind),
        })
        .collect()
}

pub fn zero_value(kind: &ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Int => Value::Int(0),
        ValueKind::Float => Value::Float(0.0),
        ValueKind::Vector3 => Value::Vec3(Vec3::ZERO),
        ValueKind::Struct(name) => Value::Struct {
            type_name: name.clone(),
        },
    }
}
