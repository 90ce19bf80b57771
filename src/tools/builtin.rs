//! 内置演示能力：算术工具与 Systools 包
//!
//! 仅用于让二进制端到端跑通，不作为工具库。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::tools::{ArgumentSchema, Package, PackageToolSpec, ParamType, Tool};

fn int_arg(args: &Map<String, Value>, key: &str) -> Result<i64, String> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("argument `{key}` must be an integer"))
}

fn two_digits() -> ArgumentSchema {
    ArgumentSchema::new()
        .param("a", ParamType::Integer, "first digit")
        .param("b", ParamType::Integer, "second digit")
}

/// simple_addition(a, b)
pub struct AdditionTool;

#[async_trait]
impl Tool for AdditionTool {
    fn name(&self) -> &str {
        "simple_addition"
    }

    fn description(&self) -> &str {
        "simple addition"
    }

    fn arguments(&self) -> ArgumentSchema {
        two_digits()
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, String> {
        let (a, b) = (int_arg(&args, "a")?, int_arg(&args, "b")?);
        a.checked_add(b)
            .map(|v| v.to_string())
            .ok_or_else(|| "integer overflow".to_string())
    }
}

/// simple_subtraction(a, b)
pub struct SubtractionTool;

#[async_trait]
impl Tool for SubtractionTool {
    fn name(&self) -> &str {
        "simple_subtraction"
    }

    fn description(&self) -> &str {
        "simple subtraction"
    }

    fn arguments(&self) -> ArgumentSchema {
        two_digits()
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, String> {
        let (a, b) = (int_arg(&args, "a")?, int_arg(&args, "b")?);
        a.checked_sub(b)
            .map(|v| v.to_string())
            .ok_or_else(|| "integer overflow".to_string())
    }
}

/// Systools 包：在沙箱根目录内查看目录结构（路径禁止 ../ 逃逸）
pub struct SysTools {
    root: PathBuf,
}

impl Default for SysTools {
    fn default() -> Self {
        Self::new(".")
    }
}

impl SysTools {
    pub const NAME: &'static str = "Systools";

    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let path = path.trim_start_matches("./");
        if path.is_empty() || path == "." {
            return Ok(self.root.clone());
        }
        let canonical = self
            .root
            .join(path)
            .canonicalize()
            .map_err(|_| format!("Path not found: {path}"))?;
        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(format!("Path escapes sandbox: {path}"))
        }
    }

    async fn list_dir(&self, path: &str) -> Result<String, String> {
        let base = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| format!("List failed: {e}"))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| e.to_string())? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();
        Ok(entries.join("\n"))
    }
}

#[async_trait]
impl Package for SysTools {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "This package is useful for inspecting the sandboxed working directory"
    }

    fn tools(&self) -> Vec<PackageToolSpec> {
        vec![
            PackageToolSpec::new("current_dir", "It gives the sandbox root directory"),
            PackageToolSpec::new("list_dir", "It lists entries of a directory inside the sandbox")
                .with_arguments(ArgumentSchema::new().param(
                    "path",
                    ParamType::String,
                    "directory relative to the sandbox root",
                )),
        ]
    }

    async fn call(&self, tool: &str, args: Map<String, Value>) -> Result<String, String> {
        match tool {
            "current_dir" => Ok(self.root.display().to_string()),
            "list_dir" => {
                let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
                self.list_dir(path).await
            }
            other => Err(format!("Tool {other} not found in package {}", Self::NAME)),
        }
    }
}
