//! 能力描述符与参数 schema
//!
//! 每个工具 / 包内工具 / Agent 在注册时生成一份 CapabilityDescriptor，注册后不可变。
//! 参数校验是「键集合完全相等」：多一个、少一个都算 ArgumentMismatch，迫使模型只给出声明过的参数。

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

/// 能力种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Tool,
    PackageTool,
    Agent,
}

/// 参数类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Integer,
    Number,
    String,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    /// 将模型给出的值转换为声明类型；无法转换时返回错误描述
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        match self {
            ParamType::Any => Ok(value.clone()),
            ParamType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(format!("expected integer, got {value}")),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| format!("expected integer, got {value}")),
                _ => Err(format!("expected integer, got {value}")),
            },
            ParamType::Number => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("expected number, got {value}")),
                _ => Err(format!("expected number, got {value}")),
            },
            ParamType::String => match value {
                Value::String(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(format!("expected string, got {value}")),
            },
            ParamType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(format!("expected boolean, got {value}")),
                },
                _ => Err(format!("expected boolean, got {value}")),
            },
            ParamType::Object if value.is_object() => Ok(value.clone()),
            ParamType::Object => Err(format!("expected object, got {value}")),
            ParamType::Array if value.is_array() => Ok(value.clone()),
            ParamType::Array => Err(format!("expected array, got {value}")),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub description: String,
}

/// 有序参数表（保持声明顺序，用于 prompt 渲染）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArgumentSchema {
    params: Vec<ParamSpec>,
}

impl ArgumentSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加参数（builder 风格）；重名参数以后者为准
    pub fn param(mut self, name: impl Into<String>, ty: ParamType, description: impl Into<String>) -> Self {
        let name = name.into();
        self.params.retain(|p| p.name != name);
        self.params.push(ParamSpec {
            name,
            ty,
            description: description.into(),
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }

    /// 键集合与声明完全相等才算通过
    pub fn matches_keys<'a, I>(&self, provided: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let provided: BTreeSet<&str> = provided.into_iter().collect();
        provided == self.names()
    }

    /// 按声明类型逐个转换；调用前应已通过 matches_keys
    pub fn coerce(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, String> {
        let mut out = Map::with_capacity(args.len());
        for spec in &self.params {
            let raw = args
                .get(&spec.name)
                .ok_or_else(|| format!("missing argument `{}`", spec.name))?;
            let value = spec
                .ty
                .coerce(raw)
                .map_err(|e| format!("argument `{}`: {}", spec.name, e))?;
            out.insert(spec.name.clone(), value);
        }
        Ok(out)
    }
}

/// 能力描述符：名称、种类、描述、参数 schema；由所属注册表持有
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub kind: CapabilityKind,
    pub description: String,
    pub arguments: ArgumentSchema,
}

impl CapabilityDescriptor {
    pub fn new(
        name: impl Into<String>,
        kind: CapabilityKind,
        description: impl Into<String>,
        arguments: ArgumentSchema,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            arguments,
        }
    }
}

/// 提供的键集合是否与描述符声明的参数集合完全一致
pub fn validate_arguments<'a, I>(descriptor: &CapabilityDescriptor, provided: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    descriptor.arguments.matches_keys(provided)
}
