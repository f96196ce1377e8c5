//! Module resolution for the sandbox.
//!
//! The resolver decides which imports the extraction environment can
//! satisfy: a fixed standard-library allowlist plus modules that exist as
//! files next to the script (the scoped equivalent of inserting the
//! script's directory into the import search path for one extraction).
//! Unresolvable imports raise a load error, which is exactly the failure
//! the normalized-source fallback strategy repairs.

use std::path::{Path, PathBuf};

use crate::interp::value::{Builtin, ModuleId, TypeTag, Value};
use crate::raw::StreamKind;

/// Modules the sandbox will always accept. Only `argparse` and `sys` are
/// modeled attribute-by-attribute; the rest bind as opaque foreign modules
/// so scripts that merely import them keep loading.
const KNOWN_MODULES: &[&str] = &[
    "argparse",
    "docopt",
    "six",
    "sys",
    "os",
    "io",
    "re",
    "json",
    "math",
    "time",
    "datetime",
    "string",
    "collections",
    "itertools",
    "functools",
    "textwrap",
    "typing",
    "pathlib",
    "logging",
    "random",
    "shutil",
    "subprocess",
    "glob",
    "csv",
    "gzip",
    "hashlib",
    "copy",
    "platform",
    "signal",
    "stat",
    "struct",
    "tempfile",
    "traceback",
    "types",
    "uuid",
    "warnings",
    "abc",
    "enum",
    "errno",
    "fnmatch",
    "getpass",
    "heapq",
    "inspect",
    "operator",
    "pickle",
    "pprint",
    "urllib",
    "xml",
    "zlib",
];

/// Import resolver scoped to one extraction attempt.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    base_dir: Option<PathBuf>,
}

impl ModuleResolver {
    /// Creates a resolver; `base_dir` is the script's directory, used to
    /// resolve sibling modules.
    pub fn new(base_dir: Option<&Path>) -> Self {
        Self {
            base_dir: base_dir.map(Path::to_path_buf),
        }
    }

    /// Whether an import of `module` would succeed in this environment.
    pub fn is_resolvable(&self, module: &str) -> bool {
        // Relative imports refer to the script's own package.
        if module.starts_with('.') {
            return true;
        }
        let root = module.split('.').next().unwrap_or(module);
        if KNOWN_MODULES.contains(&root) {
            return true;
        }
        self.sibling_exists(root)
    }

    /// Resolves a module to its bound value, or `None` when unresolvable.
    pub fn resolve(&self, module: &str) -> Option<Value> {
        let root = module
            .trim_start_matches('.')
            .split('.')
            .next()
            .unwrap_or(module);
        match root {
            "argparse" => Some(Value::Module(ModuleId::Argparse)),
            "sys" => Some(Value::Module(ModuleId::Sys)),
            _ if self.is_resolvable(module) => Some(Value::ForeignModule(root.to_string())),
            _ => None,
        }
    }

    fn sibling_exists(&self, root: &str) -> bool {
        let Some(dir) = &self.base_dir else {
            return false;
        };
        if root.is_empty() {
            return false;
        }
        dir.join(format!("{root}.py")).is_file() || dir.join(root).is_dir()
    }
}

/// Attribute lookup on the modeled `argparse` module.
pub fn argparse_attr(name: &str) -> Value {
    match name {
        "ArgumentParser" => Value::Builtin(Builtin::ArgumentParser),
        "FileType" => Value::FileType {
            mode: "r".to_string(),
        },
        "SUPPRESS" => Value::Suppress,
        "REMAINDER" => Value::Remainder,
        _ => Value::Opaque,
    }
}

/// Attribute lookup on the modeled `sys` module.
pub fn sys_attr(name: &str) -> Value {
    match name {
        "stdin" => Value::Stream(StreamKind::Stdin),
        "stdout" => Value::Stream(StreamKind::Stdout),
        "stderr" => Value::Stream(StreamKind::Stderr),
        "argv" => Value::List(Vec::new()),
        "path" => Value::List(Vec::new()),
        "exit" => Value::Builtin(Builtin::SysExit),
        "maxsize" => Value::Int(i64::MAX),
        _ => Value::Opaque,
    }
}

/// Names available without any import.
pub fn builtin_name(name: &str) -> Option<Value> {
    match name {
        "str" => Some(Value::Type(TypeTag::Str)),
        "int" => Some(Value::Type(TypeTag::Int)),
        "float" => Some(Value::Type(TypeTag::Float)),
        "bool" => Some(Value::Type(TypeTag::Bool)),
        "len" => Some(Value::Builtin(Builtin::Len)),
        "open" => Some(Value::Builtin(Builtin::Open)),
        "print" => Some(Value::Builtin(Builtin::Print)),
        "range" => Some(Value::Builtin(Builtin::Range)),
        "None" => Some(Value::None),
        "True" => Some(Value::Bool(true)),
        "False" => Some(Value::Bool(false)),
        _ => None,
    }
}
