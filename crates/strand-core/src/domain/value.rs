//! Values exchanged with the host runtime.

use serde::{Deserialize, Serialize};

use super::ids::CallbackRef;

/// Optional payload carried from task creation to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TaskArgument {
    Int(i32),
    Float(f32),
    String(String),
    Vector([f32; 3]),
}

impl TaskArgument {
    /// Interpret a host value as an argument.
    ///
    /// Anything that is not an int, float, string or 3-vector means
    /// "no argument" rather than an error.
    pub fn from_host(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Int(v) => Some(Self::Int(*v)),
            HostValue::Float(v) => Some(Self::Float(*v)),
            HostValue::String(v) => Some(Self::String(v.clone())),
            HostValue::Vector(v) => Some(Self::Vector(*v)),
            _ => None,
        }
    }
}

/// A value on the host's parameter/result stack.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Int(i32),
    Float(f32),
    String(String),
    Vector([f32; 3]),
    Function(CallbackRef),
    Array(Vec<HostValue>),
}

impl HostValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, HostValue::Undefined)
    }
}

impl From<&TaskArgument> for HostValue {
    fn from(argument: &TaskArgument) -> Self {
        match argument {
            TaskArgument::Int(v) => HostValue::Int(*v),
            TaskArgument::Float(v) => HostValue::Float(*v),
            TaskArgument::String(v) => HostValue::String(v.clone()),
            TaskArgument::Vector(v) => HostValue::Vector(*v),
        }
    }
}

impl From<Option<String>> for HostValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(HostValue::Undefined, HostValue::String)
    }
}
