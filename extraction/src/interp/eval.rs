//! Bounded sandbox evaluator.
//!
//! Executes a lowered script module far enough to observe the parser
//! objects it builds. The evaluator models the declarative subset scripts
//! use for argument parsing; everything else degrades to opaque values or
//! skipped statements rather than failures, with two exceptions:
//! unresolvable imports and explicit exits, which are real load errors.
//!
//! The parse-entry trap is a capability owned by one evaluation run
//! ([`EvalOptions::trap_parse`]). When enabled, invoking the
//! parse-the-arguments operation on a parser raises a typed control signal
//! carrying the receiver; there is no shared state to install or restore.

use tracing::debug;

use crate::error::LoadError;
use crate::interp::ast::{
    BinOpKind, BoolOpKind, CompareOp, Expr, FunctionDef, Module, Stmt,
};
use crate::interp::modules::{ModuleResolver, argparse_attr, builtin_name, sys_attr};
use crate::interp::value::{
    ActionData, ActionKind, Arity, Builtin, GROUP_OPTIONAL, GROUP_POSITIONAL, GroupData, ModuleId,
    MutexData, ParserArena, ParserData, ParserRef, TypeTag, Value, declared_type_of,
};
use crate::raw::DeclaredType;

/// Largest `choices` iterable the evaluator will materialize.
const MAX_RANGE_ITEMS: i64 = 1024;

/// Options for one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Value bound to `__name__` (`"__main__"` triggers main guards).
    pub module_name: String,
    /// Value bound to `__file__`.
    pub file_path: String,
    /// Whether the parse-entry trap is armed.
    pub trap_parse: bool,
    /// Maximum statements executed before the run is abandoned.
    pub statement_budget: usize,
    /// Maximum user-function call depth.
    pub call_depth_limit: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            module_name: "__main__".to_string(),
            file_path: String::new(),
            trap_parse: true,
            statement_budget: 100_000,
            call_depth_limit: 32,
        }
    }
}

/// How an evaluation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The module body ran to completion without hitting the trap.
    Completed,
    /// The trap fired; carries the parser the script was about to use.
    Intercepted(ParserRef),
}

/// Insertion-ordered name bindings.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<(String, Value)>,
}

impl Namespace {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Binds a name, keeping its original insertion position on rebind.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Non-local control flow during evaluation.
enum Flow {
    Load(LoadError),
    Intercept(ParserRef),
    Return(Value),
}

type Exec<T> = std::result::Result<T, Flow>;

/// Which container an `add_argument` call goes through.
#[derive(Debug, Clone, Copy)]
enum ArgContainer {
    Parser,
    Group(usize),
    Mutex(usize),
}

struct Scope {
    locals: Option<Namespace>,
}

/// One evaluation run over a lowered module.
#[derive(Debug)]
pub struct Interpreter {
    arena: ParserArena,
    globals: Namespace,
    warnings: Vec<String>,
    resolver: ModuleResolver,
    options: EvalOptions,
    budget: usize,
    depth: usize,
}

impl Interpreter {
    /// Runs `module` to completion or interception.
    ///
    /// Load failures (unresolvable imports, explicit exits, exhausted
    /// budgets) abort the run and surface as the strategy's failure.
    pub fn execute(
        module: &Module,
        resolver: ModuleResolver,
        options: EvalOptions,
    ) -> std::result::Result<(Self, Outcome), LoadError> {
        let budget = options.statement_budget;
        let mut interp = Self {
            arena: ParserArena::new(),
            globals: Namespace::default(),
            warnings: Vec::new(),
            resolver,
            options,
            budget,
            depth: 0,
        };

        interp
            .globals
            .set("__name__", Value::Str(interp.options.module_name.clone()));
        interp
            .globals
            .set("__file__", Value::Str(interp.options.file_path.clone()));
        let doc = module
            .docstring
            .as_ref()
            .map(|d| Value::Str(d.clone()))
            .unwrap_or(Value::None);
        interp.globals.set("__doc__", doc);

        let mut scope = Scope { locals: None };
        match interp.exec_block(&module.body, &mut scope) {
            Ok(()) => Ok((interp, Outcome::Completed)),
            Err(Flow::Intercept(parser)) => Ok((interp, Outcome::Intercepted(parser))),
            Err(Flow::Return(_)) => Ok((interp, Outcome::Completed)),
            Err(Flow::Load(error)) => Err(error),
        }
    }

    pub fn arena(&self) -> &ParserArena {
        &self.arena
    }

    pub fn globals(&self) -> &Namespace {
        &self.globals
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// First parser object bound in the module namespace, in insertion
    /// order. This is the static-load discovery rule: the entry function's
    /// enclosing scope is the module namespace itself.
    pub fn first_parser(&self) -> Option<ParserRef> {
        self.globals.iter().find_map(|(_, v)| match v {
            Value::Parser(p) => Some(*p),
            _ => None,
        })
    }

    /// The module docstring, when the script carries one.
    pub fn docstring(&self) -> Option<&str> {
        match self.globals.get("__doc__") {
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn tick(&mut self) -> Exec<()> {
        if self.budget == 0 {
            return Err(Flow::Load(LoadError::BudgetExhausted));
        }
        self.budget -= 1;
        Ok(())
    }

    fn lookup(&self, scope: &Scope, name: &str) -> Option<Value> {
        if let Some(locals) = &scope.locals
            && let Some(value) = locals.get(name)
        {
            return Some(value.clone());
        }
        self.globals.get(name).cloned()
    }

    fn bind(&mut self, scope: &mut Scope, name: &str, value: Value) {
        match &mut scope.locals {
            Some(locals) => locals.set(name, value),
            None => self.globals.set(name, value),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], scope: &mut Scope) -> Exec<()> {
        for stmt in stmts {
            self.exec_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &mut Scope) -> Exec<()> {
        self.tick()?;
        match stmt {
            Stmt::Import(names) => {
                for name in names {
                    match self.resolver.resolve(&name.module) {
                        Some(value) => self.bind(scope, &name.binding, value),
                        None => {
                            return Err(Flow::Load(LoadError::UnresolvedImport(
                                name.module.clone(),
                            )));
                        }
                    }
                }
                Ok(())
            }
            Stmt::ImportFrom { module, names } => {
                if !self.resolver.is_resolvable(module) {
                    return Err(Flow::Load(LoadError::UnresolvedImport(module.clone())));
                }
                let root = module
                    .trim_start_matches('.')
                    .split('.')
                    .next()
                    .unwrap_or("")
                    .to_string();
                for name in names {
                    let attr = name.attr.as_deref().unwrap_or(name.binding.as_str());
                    let value = match root.as_str() {
                        "argparse" => argparse_attr(attr),
                        "sys" => sys_attr(attr),
                        _ => Value::Opaque,
                    };
                    self.bind(scope, &name.binding, value);
                }
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let value = self.eval_expr(value, scope)?;
                self.bind(scope, target, value);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(())
            }
            Stmt::FunctionDef(def) => {
                self.bind(scope, &def.name.clone(), Value::Function(def.clone()));
                Ok(())
            }
            Stmt::If { test, body, orelse } => {
                let condition = self.eval_expr(test, scope)?;
                if condition.truthy() {
                    self.exec_block(body, scope)
                } else {
                    self.exec_block(orelse, scope)
                }
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::None,
                };
                Err(Flow::Return(value))
            }
            Stmt::Try(body) => {
                for stmt in body {
                    match self.exec_stmt(stmt, scope) {
                        // The script's handlers are not modeled; assume a
                        // load failure inside `try` is one it handles.
                        Err(Flow::Load(_)) => break,
                        other => other?,
                    }
                }
                Ok(())
            }
            Stmt::Pass => Ok(()),
            Stmt::Unsupported(kind) => {
                debug!(construct = %kind, "skipping unsupported construct");
                self.warnings.push(format!("skipped {kind}"));
                Ok(())
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &mut Scope) -> Exec<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::True => Ok(Value::Bool(true)),
            Expr::False => Ok(Value::Bool(false)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => Ok(self
                .lookup(scope, name)
                .or_else(|| builtin_name(name))
                .unwrap_or(Value::Opaque)),
            Expr::Attribute { object, attr } => {
                let object = self.eval_expr(object, scope)?;
                Ok(self.attr_of(object, attr))
            }
            Expr::Call { func, args, kwargs } => {
                let func = self.eval_expr(func, scope)?;
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    arg_values.push(self.eval_expr(arg, scope)?);
                }
                let mut kwarg_values = Vec::with_capacity(kwargs.len());
                for (name, value) in kwargs {
                    kwarg_values.push((name.clone(), self.eval_expr(value, scope)?));
                }
                self.call_value(func, arg_values, kwarg_values)
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::List(values))
            }
            Expr::Tuple(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::Tuple(values))
            }
            Expr::Compare { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                Ok(self.compare(&left, *op, &right))
            }
            Expr::BinOp { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                Ok(binop(&left, *op, &right))
            }
            Expr::BoolOp { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                match op {
                    BoolOpKind::And if !left.truthy() => Ok(left),
                    BoolOpKind::Or if left.truthy() => Ok(left),
                    _ => self.eval_expr(right, scope),
                }
            }
            Expr::Not(operand) => {
                let value = self.eval_expr(operand, scope)?;
                Ok(Value::Bool(!value.truthy()))
            }
            Expr::Neg(operand) => {
                let value = self.eval_expr(operand, scope)?;
                Ok(match value {
                    Value::Int(i) => Value::Int(-i),
                    Value::Float(f) => Value::Float(-f),
                    _ => Value::Opaque,
                })
            }
            Expr::Opaque => Ok(Value::Opaque),
        }
    }

    fn attr_of(&mut self, object: Value, attr: &str) -> Value {
        match object {
            Value::Module(ModuleId::Argparse) => argparse_attr(attr),
            Value::Module(ModuleId::Sys) => sys_attr(attr),
            Value::Type(tag) => Value::TypeMethod(tag, attr.to_string()),
            receiver @ (Value::Parser(_)
            | Value::Group(_, _)
            | Value::Mutex(_, _)
            | Value::Subparsers(_)
            | Value::Str(_)) => Value::Method {
                receiver: Box::new(receiver),
                name: attr.to_string(),
            },
            _ => Value::Opaque,
        }
    }

    fn compare(&self, left: &Value, op: CompareOp, right: &Value) -> Value {
        match op {
            CompareOp::Eq => Value::Bool(left.eq_value(right)),
            CompareOp::NotEq => Value::Bool(!left.eq_value(right)),
            CompareOp::Is => Value::Bool(left.eq_value(right)),
            CompareOp::IsNot => Value::Bool(!left.eq_value(right)),
            CompareOp::In | CompareOp::NotIn => {
                let contained = match right {
                    Value::List(items) | Value::Tuple(items) => {
                        items.iter().any(|item| item.eq_value(left))
                    }
                    Value::Str(haystack) => match left {
                        Value::Str(needle) => haystack.contains(needle.as_str()),
                        _ => false,
                    },
                    _ => false,
                };
                Value::Bool(if op == CompareOp::In {
                    contained
                } else {
                    !contained
                })
            }
            CompareOp::Other => Value::Opaque,
        }
    }

    fn call_value(
        &mut self,
        func: Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Exec<Value> {
        self.tick()?;
        match func {
            Value::Builtin(Builtin::ArgumentParser) => Ok(self.construct_parser(&kwargs)),
            Value::FileType { .. } => {
                let mode = match (args.first(), kwarg(&kwargs, "mode")) {
                    (Some(Value::Str(m)), _) => m.clone(),
                    (_, Some(Value::Str(m))) => m.clone(),
                    _ => "r".to_string(),
                };
                Ok(Value::FileType { mode })
            }
            Value::Builtin(Builtin::SysExit) => {
                Err(Flow::Load(LoadError::Exit("sys.exit called".to_string())))
            }
            Value::Builtin(Builtin::Len) => Ok(match args.first() {
                Some(Value::List(items)) | Some(Value::Tuple(items)) => {
                    Value::Int(items.len() as i64)
                }
                Some(Value::Str(s)) => Value::Int(s.chars().count() as i64),
                _ => Value::Opaque,
            }),
            Value::Builtin(Builtin::Range) => Ok(eval_range(&args)),
            Value::Builtin(Builtin::Print) => Ok(Value::None),
            Value::Builtin(Builtin::Open) => Ok(Value::Opaque),
            Value::Type(tag) => Ok(convert(tag, args.first())),
            Value::TypeMethod(_, _) => Ok(Value::Opaque),
            Value::Function(def) => self.call_function(&def, args),
            Value::Method { receiver, name } => self.call_method(*receiver, &name, args, kwargs),
            _ => Ok(Value::Opaque),
        }
    }

    fn call_function(&mut self, def: &FunctionDef, args: Vec<Value>) -> Exec<Value> {
        if self.depth >= self.options.call_depth_limit {
            return Err(Flow::Load(LoadError::CallDepthExceeded));
        }
        self.depth += 1;

        let mut locals = Namespace::default();
        for (index, param) in def.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or(Value::None);
            locals.set(param, value);
        }
        let mut scope = Scope {
            locals: Some(locals),
        };
        let result = self.exec_block(&def.body, &mut scope);
        self.depth -= 1;

        match result {
            Ok(()) => Ok(Value::None),
            Err(Flow::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Exec<Value> {
        match receiver {
            Value::Parser(parser) => self.parser_method(parser, name, args, kwargs),
            Value::Group(parser, group) => match name {
                "add_argument" => {
                    self.add_argument(parser, ArgContainer::Group(group), args, kwargs);
                    Ok(Value::Opaque)
                }
                "add_mutually_exclusive_group" => {
                    let index = self.arena.get(parser).mutex_groups.len();
                    self.arena.get_mut(parser).mutex_groups.push(MutexData {
                        title: None,
                        container: group,
                    });
                    Ok(Value::Mutex(parser, index))
                }
                _ => Ok(Value::Opaque),
            },
            Value::Mutex(parser, mutex) => match name {
                "add_argument" => {
                    self.add_argument(parser, ArgContainer::Mutex(mutex), args, kwargs);
                    Ok(Value::Opaque)
                }
                _ => Ok(Value::Opaque),
            },
            Value::Subparsers(parser) => match name {
                "add_parser" => Ok(self.add_subparser(parser, args, kwargs)),
                _ => Ok(Value::Opaque),
            },
            Value::Str(s) => Ok(str_method(&s, name, &args)),
            _ => Ok(Value::Opaque),
        }
    }

    fn parser_method(
        &mut self,
        parser: ParserRef,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Exec<Value> {
        match name {
            "add_argument" => {
                self.add_argument(parser, ArgContainer::Parser, args, kwargs);
                Ok(Value::Opaque)
            }
            "add_argument_group" => {
                let title = match (args.first(), kwarg(&kwargs, "title")) {
                    (Some(Value::Str(t)), _) => t.clone(),
                    (_, Some(Value::Str(t))) => t.clone(),
                    _ => String::new(),
                };
                let index = self.arena.get(parser).groups.len();
                self.arena
                    .get_mut(parser)
                    .groups
                    .push(GroupData { title });
                Ok(Value::Group(parser, index))
            }
            "add_mutually_exclusive_group" => {
                let index = self.arena.get(parser).mutex_groups.len();
                self.arena.get_mut(parser).mutex_groups.push(MutexData {
                    title: None,
                    container: GROUP_OPTIONAL,
                });
                Ok(Value::Mutex(parser, index))
            }
            "add_subparsers" => {
                let help = match kwarg(&kwargs, "help") {
                    Some(Value::Str(h)) => Some(h.clone()),
                    _ => None,
                };
                self.arena.get_mut(parser).actions.push(ActionData {
                    kind: ActionKind::SubParsers,
                    dest: String::new(),
                    option_strings: Vec::new(),
                    declared_type: DeclaredType::NotDeclared,
                    default: Value::None,
                    required: false,
                    help,
                    choices: None,
                    nargs: None,
                    version: None,
                    group: GROUP_POSITIONAL,
                    mutex: None,
                });
                Ok(Value::Subparsers(parser))
            }
            "parse_args" | "parse_known_args" => {
                if self.options.trap_parse {
                    Err(Flow::Intercept(parser))
                } else {
                    Ok(Value::Opaque)
                }
            }
            "set_defaults" => {
                for (key, value) in &kwargs {
                    let data = self.arena.get_mut(parser);
                    if let Some(action) = data.actions.iter_mut().find(|a| &a.dest == key) {
                        action.default = value.clone();
                    }
                }
                Ok(Value::None)
            }
            "exit" => Err(Flow::Load(LoadError::Exit("parser.exit called".to_string()))),
            _ => Ok(Value::Opaque),
        }
    }

    fn construct_parser(&mut self, kwargs: &[(String, Value)]) -> Value {
        let add_help = match kwarg(kwargs, "add_help") {
            Some(value) => value.truthy(),
            None => true,
        };
        let mut data = ParserData::new(add_help);
        if let Some(Value::Str(prog)) = kwarg(kwargs, "prog") {
            data.prog = Some(prog.clone());
        }
        if let Some(Value::Str(description)) = kwarg(kwargs, "description") {
            data.description = Some(description.clone());
        }
        if let Some(Value::Str(version)) = kwarg(kwargs, "version") {
            data.version = Some(version.clone());
        }
        Value::Parser(self.arena.alloc(data))
    }

    fn add_subparser(
        &mut self,
        parent: ParserRef,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Value {
        let Some(Value::Str(name)) = args.first() else {
            return Value::Opaque;
        };
        let add_help = match kwarg(&kwargs, "add_help") {
            Some(value) => value.truthy(),
            None => true,
        };
        let mut data = ParserData::new(add_help);
        data.prog = Some(name.clone());
        match (kwarg(&kwargs, "description"), kwarg(&kwargs, "help")) {
            (Some(Value::Str(d)), _) => data.description = Some(d.clone()),
            (_, Some(Value::Str(h))) => data.description = Some(h.clone()),
            _ => {}
        }
        let child = self.arena.alloc(data);
        self.arena
            .get_mut(parent)
            .subcommands
            .push((name.clone(), child));
        Value::Parser(child)
    }

    fn add_argument(
        &mut self,
        parser: ParserRef,
        container: ArgContainer,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) {
        let flags: Vec<String> = args
            .iter()
            .filter_map(|a| match a {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        let Some(first) = flags.first() else {
            self.warnings
                .push("add_argument call without a name".to_string());
            return;
        };
        let positional = !first.starts_with('-');

        let kind = match kwarg(&kwargs, "action") {
            Some(Value::Str(action)) => match action.as_str() {
                "store_true" => ActionKind::StoreTrue,
                "store_false" => ActionKind::StoreFalse,
                "store_const" => ActionKind::StoreConst,
                "append" => ActionKind::Append,
                "append_const" => ActionKind::AppendConst,
                "count" => ActionKind::Count,
                "help" => ActionKind::Help,
                "version" => ActionKind::Version,
                _ => ActionKind::Store,
            },
            _ => ActionKind::Store,
        };

        let nargs = kwarg(&kwargs, "nargs").and_then(|value| match value {
            Value::Str(marker) => match marker.as_str() {
                "?" => Some(Arity::Optional),
                "*" => Some(Arity::ZeroOrMore),
                "+" => Some(Arity::OneOrMore),
                _ => None,
            },
            Value::Int(n) if *n >= 0 => Some(Arity::Exactly(*n as u32)),
            Value::Remainder => Some(Arity::Remainder),
            _ => None,
        });

        let declared_type = match kwarg(&kwargs, "type") {
            Some(value) => declared_type_of(value),
            None => DeclaredType::NotDeclared,
        };

        let default = match kwarg(&kwargs, "default") {
            Some(value) => value.clone(),
            None => match kind {
                ActionKind::StoreTrue => Value::Bool(false),
                ActionKind::StoreFalse => Value::Bool(true),
                ActionKind::Help | ActionKind::Version => Value::Suppress,
                _ => Value::None,
            },
        };

        let required = if positional {
            !matches!(nargs, Some(Arity::Optional) | Some(Arity::ZeroOrMore))
        } else {
            kwarg(&kwargs, "required").map(Value::truthy).unwrap_or(false)
        };

        let dest = match kwarg(&kwargs, "dest") {
            Some(Value::Str(dest)) => dest.clone(),
            _ if positional => first.clone(),
            _ => {
                let chosen = flags
                    .iter()
                    .find(|f| f.starts_with("--"))
                    .unwrap_or(first);
                chosen.trim_start_matches('-').replace('-', "_")
            }
        };

        let help = match kwarg(&kwargs, "help") {
            Some(Value::Str(h)) => Some(h.clone()),
            _ => None,
        };

        let choices = kwarg(&kwargs, "choices").and_then(expand_iterable);

        let version = match kwarg(&kwargs, "version") {
            Some(Value::Str(v)) => Some(v.clone()),
            _ => None,
        };

        let (group, mutex) = match container {
            ArgContainer::Parser => (
                if positional {
                    GROUP_POSITIONAL
                } else {
                    GROUP_OPTIONAL
                },
                None,
            ),
            ArgContainer::Group(group) => (group, None),
            ArgContainer::Mutex(mutex) => {
                (self.arena.get(parser).mutex_groups[mutex].container, Some(mutex))
            }
        };

        self.arena.get_mut(parser).actions.push(ActionData {
            kind,
            dest,
            option_strings: if positional { Vec::new() } else { flags },
            declared_type,
            default,
            required,
            help,
            choices,
            nargs,
            version,
            group,
            mutex,
        });
    }
}

fn kwarg<'a>(kwargs: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    kwargs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// Expands a choices value into a concrete list, mirroring iterable
/// expansion in the source declaration.
fn expand_iterable(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) | Value::Tuple(items) => Some(items.clone()),
        Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => None,
    }
}

fn eval_range(args: &[Value]) -> Value {
    let as_int = |v: &Value| match v {
        Value::Int(i) => Some(*i),
        _ => None,
    };
    let (start, stop, step) = match args {
        [stop] => (0, as_int(stop).unwrap_or(0), 1),
        [start, stop] => (
            as_int(start).unwrap_or(0),
            as_int(stop).unwrap_or(0),
            1,
        ),
        [start, stop, step] => (
            as_int(start).unwrap_or(0),
            as_int(stop).unwrap_or(0),
            as_int(step).unwrap_or(1),
        ),
        _ => return Value::Opaque,
    };
    if step == 0 {
        return Value::Opaque;
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        if items.len() as i64 >= MAX_RANGE_ITEMS {
            break;
        }
        current += step;
    }
    Value::List(items)
}

fn convert(tag: TypeTag, value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return match tag {
            TypeTag::Str => Value::Str(String::new()),
            TypeTag::Int => Value::Int(0),
            TypeTag::Float => Value::Float(0.0),
            TypeTag::Bool => Value::Bool(false),
        };
    };
    match tag {
        TypeTag::Str => match value {
            Value::Str(s) => Value::Str(s.clone()),
            Value::Int(i) => Value::Str(i.to_string()),
            Value::Float(f) => Value::Str(f.to_string()),
            Value::Bool(b) => Value::Str(if *b { "True" } else { "False" }.to_string()),
            Value::None => Value::Str("None".to_string()),
            _ => Value::Opaque,
        },
        TypeTag::Int => match value {
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Int(*f as i64),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or(Value::Opaque),
            Value::Bool(b) => Value::Int(*b as i64),
            _ => Value::Opaque,
        },
        TypeTag::Float => match value {
            Value::Float(f) => Value::Float(*f),
            Value::Int(i) => Value::Float(*i as f64),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::Opaque),
            _ => Value::Opaque,
        },
        TypeTag::Bool => Value::Bool(value.truthy()),
    }
}

fn binop(left: &Value, op: BinOpKind, right: &Value) -> Value {
    use Value::{Float, Int, List, Str};
    match (left, op, right) {
        (Str(a), BinOpKind::Add, Str(b)) => Str(format!("{a}{b}")),
        (List(a), BinOpKind::Add, List(b)) => {
            let mut merged = a.clone();
            merged.extend(b.clone());
            List(merged)
        }
        (Int(a), BinOpKind::Add, Int(b)) => Int(a + b),
        (Int(a), BinOpKind::Sub, Int(b)) => Int(a - b),
        (Int(a), BinOpKind::Mul, Int(b)) => Int(a * b),
        (Int(a), BinOpKind::Div, Int(b)) if *b != 0 => Int(a / b),
        (Int(a), BinOpKind::Mod, Int(b)) if *b != 0 => Int(a % b),
        (Float(a), BinOpKind::Add, Float(b)) => Float(a + b),
        (Float(a), BinOpKind::Sub, Float(b)) => Float(a - b),
        (Float(a), BinOpKind::Mul, Float(b)) => Float(a * b),
        (Float(a), BinOpKind::Div, Float(b)) if *b != 0.0 => Float(a / b),
        (Int(a), _, Float(_)) => binop(&Float(*a as f64), op, right),
        (Float(_), _, Int(b)) => binop(left, op, &Float(*b as f64)),
        // Percent-formatting keeps the template text.
        (Str(a), BinOpKind::Mod, _) => Str(a.clone()),
        (Str(a), BinOpKind::Mul, Int(n)) if *n >= 0 => Str(a.repeat(*n as usize)),
        _ => Value::Opaque,
    }
}

fn str_method(receiver: &str, name: &str, args: &[Value]) -> Value {
    match name {
        "strip" => Value::Str(receiver.trim().to_string()),
        "lstrip" => Value::Str(receiver.trim_start().to_string()),
        "rstrip" => Value::Str(receiver.trim_end().to_string()),
        "lower" => Value::Str(receiver.to_lowercase()),
        "upper" => Value::Str(receiver.to_uppercase()),
        // Placeholders survive; the template is still the best value.
        "format" => Value::Str(receiver.to_string()),
        "replace" => match (args.first(), args.get(1)) {
            (Some(Value::Str(from)), Some(Value::Str(to))) => {
                Value::Str(receiver.replace(from.as_str(), to))
            }
            _ => Value::Opaque,
        },
        "join" => match args.first() {
            Some(Value::List(items)) | Some(Value::Tuple(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|i| match i {
                        Value::Str(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                Value::Str(parts.join(receiver))
            }
            _ => Value::Opaque,
        },
        "split" => {
            let parts = match args.first() {
                Some(Value::Str(sep)) => receiver
                    .split(sep.as_str())
                    .map(|p| Value::Str(p.to_string()))
                    .collect(),
                _ => receiver
                    .split_whitespace()
                    .map(|p| Value::Str(p.to_string()))
                    .collect(),
            };
            Value::List(parts)
        }
        "startswith" => match args.first() {
            Some(Value::Str(prefix)) => Value::Bool(receiver.starts_with(prefix.as_str())),
            _ => Value::Opaque,
        },
        "endswith" => match args.first() {
            Some(Value::Str(suffix)) => Value::Bool(receiver.ends_with(suffix.as_str())),
            _ => Value::Opaque,
        },
        _ => Value::Opaque,
    }
}
