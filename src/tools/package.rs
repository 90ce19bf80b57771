//! 工具包（Package）与包注册表
//!
//! 一个 Package 暴露多个工具，模型以 `"<package>#<tool>"` 寻址；调用契约与普通 Tool 相同，只是作用域在包内。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::tools::{ArgumentSchema, CapabilityDescriptor, CapabilityKind};

/// 包地址分隔符
pub const PACKAGE_SEPARATOR: char = '#';

/// 包内工具声明
#[derive(Debug, Clone)]
pub struct PackageToolSpec {
    pub name: String,
    pub description: String,
    pub arguments: ArgumentSchema,
}

impl PackageToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments: ArgumentSchema::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: ArgumentSchema) -> Self {
        self.arguments = arguments;
        self
    }
}

/// 工具包 trait
#[async_trait]
pub trait Package: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 包内全部工具声明
    fn tools(&self) -> Vec<PackageToolSpec>;

    /// 调用包内工具（tool 为不含包名的短名）
    async fn call(&self, tool: &str, args: Map<String, Value>) -> Result<String, String>;
}

/// 拼出包内工具的完整地址
pub fn qualified_name(package: &str, tool: &str) -> String {
    format!("{package}{PACKAGE_SEPARATOR}{tool}")
}

struct RegisteredPackage {
    package: Arc<dyn Package>,
    description: String,
    tools: BTreeMap<String, CapabilityDescriptor>,
}

/// 包注册表：包名 → 包；包内工具名 → 描述符
#[derive(Default)]
pub struct PackageRegistry {
    packages: HashMap<String, RegisteredPackage>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, package: impl Package + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(package))
    }

    pub fn register_arc(&mut self, package: Arc<dyn Package>) -> Result<(), AgentError> {
        let name = package.name().to_string();
        if self.packages.contains_key(&name) {
            return Err(AgentError::DuplicateName(name));
        }
        let mut tools = BTreeMap::new();
        for spec in package.tools() {
            let full = qualified_name(&name, &spec.name);
            if tools.contains_key(&spec.name) {
                return Err(AgentError::DuplicateName(full));
            }
            tools.insert(
                spec.name.clone(),
                CapabilityDescriptor::new(full, CapabilityKind::PackageTool, spec.description, spec.arguments),
            );
        }
        let description = package.description().to_string();
        self.packages.insert(
            name,
            RegisteredPackage {
                package,
                description,
                tools,
            },
        );
        Ok(())
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    /// 查找包内工具的描述符；包或工具不存在均返回 CapabilityNotFound（带完整地址）
    pub fn lookup(&self, package: &str, tool: &str) -> Result<&CapabilityDescriptor, AgentError> {
        self.packages
            .get(package)
            .and_then(|p| p.tools.get(tool))
            .ok_or_else(|| AgentError::CapabilityNotFound(qualified_name(package, tool)))
    }

    pub fn get(&self, package: &str) -> Option<Arc<dyn Package>> {
        self.packages.get(package).map(|p| p.package.clone())
    }

    /// 包名集合
    pub fn list_names(&self) -> BTreeSet<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// 按工具名或描述做子串搜索，返回 (包名, 工具名, 描述符)
    pub fn search(&self, query: &str) -> Vec<(String, String, CapabilityDescriptor)> {
        let mut hits = Vec::new();
        let mut names: Vec<&String> = self.packages.keys().collect();
        names.sort();
        for pkg in names {
            for (tool, d) in &self.packages[pkg].tools {
                if tool.contains(query) || d.description.contains(query) {
                    hits.push((pkg.clone(), tool.clone(), d.clone()));
                }
            }
        }
        hits
    }

    /// prompt 用的包描述 JSON
    pub fn to_description_json(&self) -> Vec<Value> {
        let mut names: Vec<&String> = self.packages.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let p = &self.packages[name];
                let tools: Vec<Value> = p
                    .tools
                    .values()
                    .map(|d| {
                        serde_json::json!({
                            "action": d.name,
                            "description": d.description,
                            "arguments": d.arguments,
                        })
                    })
                    .collect();
                serde_json::json!({
                    "package_name": name,
                    "package_description": p.description,
                    "tools": tools,
                })
            })
            .collect()
    }
}
