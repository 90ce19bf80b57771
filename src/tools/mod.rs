//! 能力层：工具 / 工具包注册表、能力描述符与参数校验、调用执行器、内置演示能力

pub mod builtin;
pub mod descriptor;
pub mod executor;
pub mod package;
pub mod registry;
pub mod schema;

pub use builtin::{AdditionTool, SubtractionTool, SysTools};
pub use descriptor::{
    validate_arguments, ArgumentSchema, CapabilityDescriptor, CapabilityKind, ParamSpec, ParamType,
};
pub use executor::{CapabilityExecutor, InvokeError};
pub use package::{qualified_name, Package, PackageRegistry, PackageToolSpec, PACKAGE_SEPARATOR};
pub use registry::{Tool, ToolRegistry};
pub use schema::action_schema_json;
