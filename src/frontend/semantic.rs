//! Semantic Analysis for Vire
//!
//! Performs:
//! - Scope management (a stack of frames)
//! - Struct, union and class registration with layout sizes
//! - Type checking, inference of omitted types and implicit cast insertion
//! - Synthesis of `main` around the top-level statements

use std::collections::{HashMap, HashSet};

use crate::frontend::ast::*;
use crate::types::{Record, RecordKind, Type, TypeRegistry};
use crate::utils::{DiagnosticBuilder, Error, ErrorKind, Result, Span};

// ==================== Scope Stack ====================

/// What the analyzer knows about a defined variable
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub ty: Type,
    pub binding: Binding,
    pub span: Span,
}

pub type Frame = HashMap<String, VarInfo>;

/// Lexical scopes, innermost last
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Drop frames until `depth` remain
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Define in the innermost frame
    pub fn define(&mut self, name: impl Into<String>, info: VarInfo) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), info);
        }
    }

    /// Search innermost to outermost
    pub fn lookup(&self, name: &str) -> Option<&VarInfo> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

// ==================== Signatures ====================

#[derive(Debug, Clone, PartialEq)]
struct Signature {
    params: Vec<Type>,
    ret: Type,
    /// A body has been seen, not just a prototype
    defined: bool,
}

impl Signature {
    fn of(proto: &Prototype, defined: bool) -> Self {
        Self {
            params: proto.params.iter().map(|p| p.declared.clone()).collect(),
            ret: proto.ret.clone(),
            defined,
        }
    }

    fn matches(&self, other: &Signature) -> bool {
        self.ret.is_same(&other.ret)
            && self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.is_same(b))
    }
}

#[derive(Debug, Clone, Default)]
struct ClassInfo {
    parent: Option<String>,
    methods: HashMap<String, Signature>,
    members: Frame,
}

// ==================== Semantic Analyzer ====================

/// Verifies a parsed module and annotates it in place
pub struct SemanticAnalyzer<'a> {
    diags: &'a mut DiagnosticBuilder,
    scopes: ScopeStack,
    registry: TypeRegistry,
    functions: HashMap<String, Signature>,
    classes: HashMap<String, ClassInfo>,
    /// Return type of the function being verified
    return_type: Type,
    current_class: Option<String>,
    /// Frame left behind by the top-level statements; `main` sees it
    prologue: Frame,
    prologue_locals: Vec<(String, Type)>,
    locals: Vec<(String, Type)>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(diags: &'a mut DiagnosticBuilder) -> Self {
        Self {
            diags,
            scopes: ScopeStack::new(),
            registry: TypeRegistry::new(),
            functions: HashMap::new(),
            classes: HashMap::new(),
            return_type: Type::Void,
            current_class: None,
            prologue: Frame::new(),
            prologue_locals: Vec::new(),
            locals: Vec::new(),
        }
    }

    fn report(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.diags.error(err);
        }
    }

    /// Combine two sibling results, reporting the first error if both failed
    fn join(&mut self, first: Result<()>, second: Result<()>) -> Result<()> {
        match (first, second) {
            (Err(a), Err(b)) => {
                self.diags.error(a);
                Err(b)
            }
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Analyze a whole module; returns true when no error was reported
    pub fn analyze(&mut self, module: &mut Module) -> bool {
        let errors_before = self.diags.error_count();

        log::debug!("verifying {} struct/union definition(s)", module.types.len());
        for def in module.types.iter_mut() {
            let result = self.check_type_def(def);
            self.report(result);
        }

        log::debug!("verifying {} class(es)", module.classes.len());
        let skipped = self.declare_classes(&module.classes);
        for (i, class) in module.classes.iter_mut().enumerate() {
            if !skipped.contains(&i) {
                self.check_class_members(class);
            }
        }

        self.collect_signatures(&module.functions);

        let main_ret = module
            .function("main")
            .map(|f| f.proto().ret.clone())
            .unwrap_or(Type::Int);

        log::debug!("verifying {} top-level statement(s)", module.pre_execution.len());
        self.return_type = main_ret;
        self.scopes.push();
        for stmt in module.pre_execution.iter_mut() {
            let result = self.check_expr(stmt);
            self.report(result);
        }
        self.prologue = self.scopes.pop().unwrap_or_default();
        self.prologue_locals = std::mem::take(&mut self.locals);

        for (i, class) in module.classes.iter_mut().enumerate() {
            if !skipped.contains(&i) {
                self.check_class_methods(class);
            }
        }

        for item in module.functions.iter_mut() {
            if let FunctionItem::Function(func) = item {
                let outer = if func.proto.name.name == "main" {
                    Some(self.prologue.clone())
                } else {
                    None
                };
                self.check_function(func, outer);
            }
        }

        self.synthesize_main(module);

        let ok = self.diags.error_count() == errors_before;
        log::debug!("verification {}", if ok { "passed" } else { "failed" });
        ok
    }

    /// Create `main` if needed and splice the top-level statements into its body
    fn synthesize_main(&mut self, module: &mut Module) {
        let prologue = std::mem::take(&mut module.pre_execution);
        let prologue_locals = std::mem::take(&mut self.prologue_locals);

        // A definition wins over a forward declaration of `main`
        let position = module
            .functions
            .iter()
            .position(|f| {
                matches!(f, FunctionItem::Function(func) if func.proto.name.name == "main")
            })
            .or_else(|| module.functions.iter().position(|f| f.name() == "main"));
        let main = match position {
            Some(i) => &mut module.functions[i],
            None => {
                log::debug!("synthesizing main");
                module.functions.push(FunctionItem::Function(Function {
                    proto: Prototype {
                        name: Ident::new("main", Span::dummy()),
                        params: Vec::new(),
                        ret: Type::Int,
                        span: Span::dummy(),
                    },
                    body: Vec::new(),
                    locals: Vec::new(),
                    span: Span::dummy(),
                }));
                let last = module.functions.len() - 1;
                &mut module.functions[last]
            }
        };

        if let FunctionItem::Prototype(proto) | FunctionItem::Extern(proto) = main {
            let proto = proto.clone();
            let span = proto.span;
            *main = FunctionItem::Function(Function {
                proto,
                body: Vec::new(),
                locals: Vec::new(),
                span,
            });
        }

        if let FunctionItem::Function(func) = main {
            let body = std::mem::take(&mut func.body);
            func.body = prologue.into_iter().chain(body).collect();
            let locals = std::mem::take(&mut func.locals);
            func.locals = prologue_locals.into_iter().chain(locals).collect();
        }
    }

    // ==================== Declarations ====================

    /// Custom types named by `ty` must be registered or declared classes,
    /// and the whole layout must fit in memory
    fn check_declared_type(&self, ty: &Type, span: Span) -> Result<()> {
        match ty.bottom() {
            Type::Custom(name)
                if !self.registry.contains(name) && !self.classes.contains_key(name) =>
            {
                Err(Error::UndefinedType {
                    name: name.clone(),
                    span,
                })
            }
            _ if ty.checked_size(&self.registry).is_none() => Err(Error::TypeTooLarge {
                ty: ty.to_string(),
                span,
            }),
            _ => Ok(()),
        }
    }

    /// Struct and class layouts add member sizes; `None` on overflow
    fn sum_sizes(&self, members: &[(String, Type)]) -> Option<usize> {
        members.iter().try_fold(0usize, |total, (_, ty)| {
            total.checked_add(ty.checked_size(&self.registry)?)
        })
    }

    /// Verify a struct or union, then register it (nested definitions first)
    fn check_type_def(&mut self, def: &mut TypeDef) -> Result<()> {
        let owner = def.name.name.clone();
        let mut seen = HashSet::new();
        let mut members = Vec::new();

        for member in def.members.iter_mut() {
            let name = member.name().clone();
            if !seen.insert(name.name.clone()) {
                self.diags.error(Error::DuplicateMember {
                    member: name.name,
                    owner: owner.clone(),
                    span: name.span,
                });
                continue;
            }
            let result = match &mut *member {
                Member::Field { ty, .. } if ty.is_placeholder() => Err(Error::UnresolvedType {
                    name: name.name.clone(),
                    span: name.span,
                }),
                Member::Field { ty, .. } => self.check_declared_type(ty, name.span),
                Member::Nested(nested) => self.check_type_def(nested),
            };
            match result {
                Ok(()) => members.push((name.name, member.ty())),
                Err(err) => self.diags.error(err),
            }
        }

        let size = match def.kind {
            TypeDefKind::Struct => self.sum_sizes(&members),
            TypeDefKind::Union => members
                .iter()
                .map(|(_, ty)| ty.checked_size(&self.registry))
                .try_fold(0usize, |largest, size| Some(largest.max(size?))),
        };
        def.size = match size {
            Some(size) => size,
            None => {
                self.diags.error(Error::TypeTooLarge {
                    ty: owner.clone(),
                    span: def.name.span,
                });
                usize::MAX
            }
        };
        let kind = match def.kind {
            TypeDefKind::Struct => RecordKind::Struct,
            TypeDefKind::Union => RecordKind::Union,
        };
        log::debug!("registering {:?} `{}` ({} bytes)", kind, owner, def.size);

        let record = Record {
            name: owner.clone(),
            kind,
            members,
            size: def.size,
        };
        if self.classes.contains_key(&owner) || !self.registry.register(record) {
            return Err(Error::DuplicateDefinition {
                name: owner,
                span: def.name.span,
            });
        }
        Ok(())
    }

    /// Declare class names and method signatures; returns indices of rejected classes
    fn declare_classes(&mut self, classes: &[ClassDef]) -> HashSet<usize> {
        let mut skipped = HashSet::new();

        for (i, class) in classes.iter().enumerate() {
            let name = &class.name.name;
            if self.classes.contains_key(name) || self.registry.contains(name) {
                self.diags.error(Error::DuplicateDefinition {
                    name: name.clone(),
                    span: class.name.span,
                });
                skipped.insert(i);
                continue;
            }

            let mut info = ClassInfo {
                parent: class.parent.as_ref().map(|p| p.name.clone()),
                ..ClassInfo::default()
            };
            for method in &class.methods {
                let proto = method.proto();
                if let FunctionItem::Extern(_) = method {
                    self.diags.error(Error::ExternInClass {
                        name: proto.name.name.clone(),
                        class: name.clone(),
                        span: proto.name.span,
                    });
                    continue;
                }
                let sig = Signature::of(proto, matches!(method, FunctionItem::Function(_)));
                if info.methods.insert(proto.name.name.clone(), sig).is_some() {
                    self.diags.error(Error::DuplicateMember {
                        member: proto.name.name.clone(),
                        owner: name.clone(),
                        span: proto.name.span,
                    });
                }
            }
            self.classes.insert(name.clone(), info);
        }

        skipped
    }

    /// Check the parent and member definitions, then register the class layout
    fn check_class_members(&mut self, class: &mut ClassDef) {
        let name = class.name.name.clone();

        if let Some(parent) = &class.parent {
            if parent.name == name || !self.classes.contains_key(&parent.name) {
                self.diags.error(Error::UndefinedType {
                    name: parent.name.clone(),
                    span: parent.span,
                });
            }
        }

        let depth = self.scopes.depth();
        self.scopes.push();
        for member in class.members.iter_mut() {
            let span = member.name.span;
            let result = self.check_variable_def(member, span);
            self.report(result);
        }
        let frame = self.scopes.pop().unwrap_or_default();
        self.scopes.truncate(depth);
        self.locals.clear();

        let members: Vec<(String, Type)> = class
            .members
            .iter()
            .filter(|m| frame.contains_key(&m.name.name))
            .map(|m| (m.name.name.clone(), m.ty().clone()))
            .collect();
        let size = match self.sum_sizes(&members) {
            Some(size) => size,
            None => {
                self.diags.error(Error::TypeTooLarge {
                    ty: name.clone(),
                    span: class.name.span,
                });
                usize::MAX
            }
        };
        log::debug!("registering class `{}` ({} bytes)", name, size);

        self.registry.register(Record {
            name: name.clone(),
            kind: RecordKind::Class,
            members,
            size,
        });
        if let Some(info) = self.classes.get_mut(&name) {
            info.members = frame;
        }
    }

    /// Verify method prototypes and bodies with the members in scope
    fn check_class_methods(&mut self, class: &mut ClassDef) {
        let name = class.name.name.clone();
        let frame = self.class_frame(&name);
        self.current_class = Some(name);

        for method in class.methods.iter_mut() {
            match method {
                FunctionItem::Function(func) => {
                    self.check_prototype(&func.proto);
                    self.check_function(func, Some(frame.clone()));
                }
                FunctionItem::Prototype(proto) => self.check_prototype(proto),
                FunctionItem::Extern(_) => {}
            }
        }

        self.current_class = None;
    }

    /// Members of a class and its ancestors; a class's own members shadow inherited ones
    fn class_frame(&self, class: &str) -> Frame {
        let mut frame = Frame::new();
        let mut current = Some(class);
        let mut steps = 0;
        while let Some(name) = current {
            let Some(info) = self.classes.get(name) else { break };
            for (member, var) in &info.members {
                frame.entry(member.clone()).or_insert_with(|| var.clone());
            }
            current = info.parent.as_deref();
            steps += 1;
            if steps > self.classes.len() {
                break;
            }
        }
        frame
    }

    fn find_method(&self, class: &str, method: &str) -> Option<&Signature> {
        let mut current = Some(class);
        let mut steps = 0;
        while let Some(name) = current {
            let info = self.classes.get(name)?;
            if let Some(sig) = info.methods.get(method) {
                return Some(sig);
            }
            current = info.parent.as_deref();
            steps += 1;
            if steps > self.classes.len() {
                break;
            }
        }
        None
    }

    /// Member type of a struct, union or class, searching class ancestors
    fn find_member(&self, record: &str, member: &str) -> Option<Type> {
        let mut current = Some(record);
        let mut steps = 0;
        while let Some(name) = current {
            if let Some(ty) = self.registry.get(name).and_then(|r| r.member(member)) {
                return Some(ty.clone());
            }
            current = self.classes.get(name).and_then(|c| c.parent.as_deref());
            steps += 1;
            if steps > self.classes.len() {
                break;
            }
        }
        None
    }

    /// Check every free function's prototype and record its signature
    fn collect_signatures(&mut self, functions: &[FunctionItem]) {
        for item in functions {
            let proto = item.proto();
            self.check_prototype(proto);

            let name = proto.name.name.clone();
            let defined = matches!(item, FunctionItem::Function(_));
            let sig = Signature::of(proto, defined);

            match self.functions.get_mut(&name) {
                Some(existing) if !(existing.defined && defined) && existing.matches(&sig) => {
                    existing.defined |= defined;
                }
                Some(_) => self.diags.error(Error::DuplicateDefinition {
                    name,
                    span: proto.name.span,
                }),
                None => {
                    self.functions.insert(name, sig);
                }
            }
        }
    }

    /// Parameter and return types must be concrete and known
    fn check_prototype(&mut self, proto: &Prototype) {
        if proto.ret.is_array() && proto.ret.is_placeholder() {
            self.diags.error(Error::UnresolvedType {
                name: proto.name.name.clone(),
                span: proto.name.span,
            });
        } else if let Err(err) = self.check_declared_type(&proto.ret, proto.name.span) {
            self.diags.error(err);
        }

        let mut seen = HashSet::new();
        for param in &proto.params {
            let span = param.name.span;
            if !seen.insert(param.name.name.as_str()) {
                self.diags.error(Error::Redeclaration {
                    name: param.name.name.clone(),
                    span,
                });
            } else if param.declared.is_placeholder() {
                self.diags.error(Error::UnresolvedType {
                    name: param.name.name.clone(),
                    span,
                });
            } else if let Err(err) = self.check_declared_type(&param.declared, span) {
                self.diags.error(err);
            }
        }
    }

    fn params_frame(proto: &Prototype) -> Frame {
        let mut frame = Frame::new();
        for param in &proto.params {
            frame.entry(param.name.name.clone()).or_insert(VarInfo {
                ty: param.declared.clone(),
                binding: param.binding,
                span: param.name.span,
            });
        }
        frame
    }

    /// Verify a body inside `outer` (if any) and the parameter frame
    fn check_function(&mut self, func: &mut Function, outer: Option<Frame>) {
        log::debug!("verifying function `{}`", func.proto.name.name);
        self.return_type = func.proto.ret.clone();
        self.locals.clear();

        let depth = self.scopes.depth();
        if let Some(frame) = outer {
            self.scopes.push_frame(frame);
        }
        self.scopes.push_frame(Self::params_frame(&func.proto));
        self.check_block(&mut func.body);
        self.scopes.truncate(depth);

        func.locals = std::mem::take(&mut self.locals);
    }

    /// Verify statements in a fresh frame, reporting each failure
    fn check_block(&mut self, stmts: &mut [Expr]) {
        self.scopes.push();
        for stmt in stmts.iter_mut() {
            let result = self.check_expr(stmt);
            self.report(result);
        }
        self.scopes.pop();
    }

    /// Verify a definition and bring it into scope
    fn check_variable_def(&mut self, def: &mut VariableDef, span: Span) -> Result<()> {
        let name = def.name.name.clone();
        if self.scopes.is_visible(&name) {
            return Err(Error::Redeclaration {
                name,
                span: def.name.span,
            });
        }
        self.check_declared_type(&def.declared, def.name.span)?;

        match def.value.as_deref_mut() {
            None => {
                if def.declared.is_placeholder() && def.binding != Binding::Var {
                    return Err(Error::TypeRequired {
                        binding: def.binding.to_string(),
                        name,
                        span,
                    });
                }
            }
            Some(value) => {
                self.check_expr(value)?;

                let literal = matches!(value.kind, ExprKind::Array(_) | ExprKind::Str(_));
                if value.ty.is_array() && !literal {
                    return Err(Error::ArrayCopy { name, span: value.span });
                }
                def.declared = fill_unsized(&def.declared, &value.ty);

                if def.declared.is_placeholder() {
                    let compatible = match def.declared {
                        Type::Void => !matches!(value.ty, Type::Void),
                        _ => def.declared.is_same(&value.ty),
                    };
                    if !compatible {
                        return Err(Error::TypeMismatch {
                            expected: def.declared.to_string(),
                            got: value.ty.to_string(),
                            span: value.span,
                        });
                    }
                    // `[]` has no element type to adopt
                    if value.ty.is_placeholder() {
                        return Err(Error::UnresolvedType {
                            name,
                            span: value.span,
                        });
                    }
                    def.uses_value_type = true;
                } else if def.declared.is_same(&value.ty) {
                    if value.ty.is_placeholder() {
                        value.ty = def.declared.clone();
                    }
                } else if def.declared.is_primitive() && value.ty.is_primitive() {
                    self.insert_cast(value, def.declared.clone());
                } else {
                    return Err(Error::TypeMismatch {
                        expected: def.declared.to_string(),
                        got: value.ty.to_string(),
                        span: value.span,
                    });
                }
            }
        }

        let ty = def.ty().clone();
        self.locals.push((name.clone(), ty.clone()));
        self.scopes.define(
            name,
            VarInfo {
                ty,
                binding: def.binding,
                span: def.name.span,
            },
        );
        Ok(())
    }

    // ==================== Expressions ====================

    /// Wrap `slot` in an implicit cast to `to`
    fn insert_cast(&mut self, slot: &mut Expr, to: Type) {
        let from = slot.ty.clone();
        if from == to {
            return;
        }
        let truncates = from.size(&self.registry) > to.size(&self.registry);
        let drops_fraction = from.is_floating_point() && !to.is_floating_point();
        if to.is_numeric() && (truncates || drops_fraction) {
            self.diags.warning(
                ErrorKind::ImplicitCast,
                format!("implicit conversion from {} to {} may lose data", from, to),
                slot.span,
            );
        }
        log::debug!("inserting cast {} -> {} at {}", from, to, slot.span);

        let span = slot.span;
        let value = std::mem::replace(slot, Expr::new(ExprKind::Int(0), span));
        *slot = Expr::cast(value, to);
    }

    fn check_each(&mut self, exprs: &mut [Expr]) -> Result<()> {
        let mut result = Ok(());
        for expr in exprs.iter_mut() {
            let next = self.check_expr(expr);
            result = self.join(result, next);
        }
        result
    }

    /// Verify `expr` and annotate its type
    pub fn check_expr(&mut self, expr: &mut Expr) -> Result<()> {
        let span = expr.span;
        let current = expr.ty.clone();

        let ty = match &mut expr.kind {
            ExprKind::Int(_) => Type::Int,
            ExprKind::Float(_) => Type::Float,
            ExprKind::Double(_) => Type::Double,
            ExprKind::Char(_) => Type::Char,
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Str(s) => Type::array(Type::Char, s.chars().count() + 1),
            ExprKind::Array(elements) => self.check_array_literal(elements, &current)?,

            ExprKind::Variable(name) => match self.scopes.lookup(name) {
                Some(info) => info.ty.clone(),
                None => {
                    return Err(Error::UndefinedVariable {
                        name: name.clone(),
                        span,
                    })
                }
            },
            ExprKind::VariableDef(def) => {
                self.check_variable_def(def, span)?;
                def.ty().clone()
            }
            ExprKind::Assign { target, value } => {
                let checked = self.check_expr(target);
                let value_checked = self.check_expr(value);
                self.join(checked, value_checked)?;
                self.check_not_const(target)?;
                if !target.ty.is_same(&value.ty) {
                    return Err(Error::TypeMismatch {
                        expected: target.ty.to_string(),
                        got: value.ty.to_string(),
                        span: value.span,
                    });
                }
                target.ty.clone()
            }
            ExprKind::ArrayAccess { base, indices } => self.check_array_access(base, indices)?,
            ExprKind::IncrDecr { target, .. } => {
                self.check_expr(target)?;
                self.check_not_const(target)?;
                if !target.ty.is_numeric() {
                    return Err(Error::NotNumeric {
                        got: target.ty.to_string(),
                        span: target.span,
                    });
                }
                target.ty.clone()
            }

            ExprKind::Unary { op, operand } => {
                self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg if operand.ty.is_numeric() => operand.ty.clone(),
                    UnaryOp::Not if operand.ty.is_primitive() => Type::Bool,
                    UnaryOp::Neg => {
                        return Err(Error::NotNumeric {
                            got: operand.ty.to_string(),
                            span: operand.span,
                        })
                    }
                    UnaryOp::Not => {
                        return Err(Error::TypeMismatch {
                            expected: "bool".to_string(),
                            got: operand.ty.to_string(),
                            span: operand.span,
                        })
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs)?,
            ExprKind::Call { callee, args } => {
                let sig = self.resolve_function(callee)?;
                self.check_args(&callee.name, &sig, args, span)?;
                sig.ret
            }

            ExprKind::If { head, ladder } => {
                for arm in std::iter::once(head).chain(ladder.iter_mut()) {
                    if let Some(cond) = arm.condition.as_deref_mut() {
                        let result = self.check_condition(cond, "if");
                        self.report(result);
                    }
                    self.check_block(&mut arm.body);
                }
                Type::Void
            }
            ExprKind::For { init, cond, step, body } => {
                self.check_for(init, cond, step, body);
                Type::Void
            }
            ExprKind::While { cond, body } => {
                let result = if is_condition_shape(cond) {
                    self.check_condition(cond, "while")
                } else {
                    Err(Error::InvalidCondition {
                        construct: "while".to_string(),
                        reason: format!("a {} cannot be a loop condition", cond.describe()),
                        span: cond.span,
                    })
                };
                self.report(result);
                self.check_block(body);
                Type::Void
            }
            ExprKind::Break(value) | ExprKind::Continue(value) => {
                if let Some(value) = value {
                    self.check_expr(value)?;
                }
                Type::Void
            }
            ExprKind::Return(value) => {
                let got = match value {
                    Some(value) => {
                        self.check_expr(value)?;
                        value.ty.clone()
                    }
                    None => Type::Void,
                };
                if !self.return_type.is_same(&got) {
                    return Err(Error::TypeMismatch {
                        expected: self.return_type.to_string(),
                        got: got.to_string(),
                        span,
                    });
                }
                got
            }

            ExprKind::Cast { value, .. } => {
                self.check_expr(value)?;
                current
            }
            ExprKind::Unsafe(body) => {
                self.check_block(body);
                Type::Void
            }
            ExprKind::Reference(inner) => {
                self.check_expr(inner)?;
                inner.ty.clone()
            }

            ExprKind::TypeDef(def) => {
                self.check_type_def(def)?;
                Type::Void
            }
            ExprKind::Access { parent, child } => {
                self.check_expr(parent)?;
                let owner = parent.ty.clone();
                self.check_member(&owner, child)?;
                child.ty.clone()
            }
            ExprKind::New { class, args } => {
                let constructible = matches!(
                    self.registry.get(&class.name).map(|r| r.kind),
                    Some(RecordKind::Class | RecordKind::Struct)
                );
                if !constructible {
                    return Err(Error::UndefinedType {
                        name: class.name.clone(),
                        span: class.span,
                    });
                }
                self.check_each(args)?;
                Type::Custom(class.name.clone())
            }
            ExprKind::Delete(name) => {
                let Some(info) = self.scopes.lookup(&name.name) else {
                    return Err(Error::UndefinedVariable {
                        name: name.name.clone(),
                        span: name.span,
                    });
                };
                if !info.ty.is_custom() {
                    return Err(Error::TypeMismatch {
                        expected: "a class or struct instance".to_string(),
                        got: info.ty.to_string(),
                        span: name.span,
                    });
                }
                Type::Void
            }
        };

        expr.ty = ty;
        Ok(())
    }

    fn check_array_literal(&mut self, elements: &mut [Expr], current: &Type) -> Result<Type> {
        self.check_each(elements)?;

        let element = elements.first().map(|e| e.ty.clone()).unwrap_or(Type::Void);
        if let Some(odd) = elements.iter().find(|e| !e.ty.is_same(&element)) {
            return Err(Error::MixedArrayElements {
                expected: element.to_string(),
                got: odd.ty.to_string(),
                span: odd.span,
            });
        }

        let length = current.array_length().unwrap_or(0).max(elements.len());
        Ok(Type::array(element, length))
    }

    fn check_array_access(&mut self, base: &mut Expr, indices: &mut [Expr]) -> Result<Type> {
        let checked = self.check_expr(base);
        let indices_checked = self.check_each(indices);
        self.join(checked, indices_checked)?;

        if !base.ty.is_array() {
            return Err(Error::NotAnArray {
                name: root_variable(base).unwrap_or(base.describe()).to_string(),
                span: base.span,
            });
        }
        if indices.len() != base.ty.depth() {
            return Err(Error::IndexCountMismatch {
                expected: base.ty.depth(),
                got: indices.len(),
                span: base.span,
            });
        }

        for (level, index) in indices.iter().enumerate() {
            if !matches!(index.ty, Type::Int) {
                return Err(Error::NonIntegerIndex {
                    got: index.ty.to_string(),
                    span: index.span,
                });
            }
            let length = base
                .ty
                .element_after(level)
                .and_then(Type::array_length)
                .unwrap_or(0);
            if let ExprKind::Int(value) = index.kind {
                if length > 0 && (value < 0 || value as usize >= length) {
                    return Err(Error::IndexOutOfBounds {
                        index: value,
                        length,
                        span: index.span,
                    });
                }
            }
        }

        Ok(base.ty.element_after(indices.len()).cloned().unwrap_or(Type::Void))
    }

    fn check_not_const(&self, target: &Expr) -> Result<()> {
        let Some(name) = root_variable(target) else {
            return Ok(());
        };
        match self.scopes.lookup(name) {
            Some(info) if info.binding == Binding::Const => Err(Error::AssignToConst {
                name: name.to_string(),
                span: target.span,
            }),
            _ => Ok(()),
        }
    }

    /// Unify differing primitive operands with a cast, then compute the result type
    fn check_binary(&mut self, op: BinaryOp, lhs: &mut Expr, rhs: &mut Expr) -> Result<Type> {
        let checked = self.check_expr(lhs);
        let rhs_checked = self.check_expr(rhs);
        self.join(checked, rhs_checked)?;

        let (left, right) = (lhs.ty.clone(), rhs.ty.clone());
        if !left.is_primitive() || !right.is_primitive() {
            let odd = if left.is_primitive() { rhs } else { lhs };
            return Err(Error::NotNumeric {
                got: odd.ty.to_string(),
                span: odd.span,
            });
        }

        let unified = if left.is_same(&right) {
            left
        } else {
            let cast_left = if left.is_floating_point() != right.is_floating_point() {
                right.is_floating_point()
            } else {
                left.size(&self.registry) <= right.size(&self.registry)
            };
            if cast_left {
                self.insert_cast(lhs, right.clone());
                right
            } else {
                self.insert_cast(rhs, left.clone());
                left
            }
        };

        Ok(if op.is_comparison() || op.is_logical() {
            Type::Bool
        } else if op == BinaryOp::Div {
            if unified == Type::Double {
                Type::Double
            } else {
                Type::Float
            }
        } else {
            unified
        })
    }

    fn resolve_function(&self, callee: &Ident) -> Result<Signature> {
        if callee.name == "main" {
            return Err(Error::MainCalled { span: callee.span });
        }
        let method = self
            .current_class
            .as_deref()
            .and_then(|class| self.find_method(class, &callee.name));
        method
            .or_else(|| self.functions.get(&callee.name))
            .cloned()
            .ok_or_else(|| Error::UndefinedFunction {
                name: callee.name.clone(),
                span: callee.span,
            })
    }

    /// Arguments must match parameters exactly; they are never cast
    fn check_args(&mut self, name: &str, sig: &Signature, args: &mut [Expr], span: Span) -> Result<()> {
        self.check_each(args)?;
        if args.len() != sig.params.len() {
            return Err(Error::ArgCountMismatch {
                name: name.to_string(),
                expected: sig.params.len(),
                got: args.len(),
                span,
            });
        }
        for (i, (arg, param)) in args.iter().zip(&sig.params).enumerate() {
            if !param.is_same(&arg.ty) {
                return Err(Error::ArgTypeMismatch {
                    name: name.to_string(),
                    index: i + 1,
                    expected: param.to_string(),
                    got: arg.ty.to_string(),
                    span: arg.span,
                });
            }
        }
        Ok(())
    }

    /// Resolve one link of an access chain against `owner`
    fn check_member(&mut self, owner: &Type, child: &mut Expr) -> Result<()> {
        let Type::Custom(record) = owner else {
            return Err(Error::NotARecord {
                got: owner.to_string(),
                span: child.span,
            });
        };
        if !self.registry.contains(record) {
            return Err(Error::UndefinedType {
                name: record.clone(),
                span: child.span,
            });
        }

        let span = child.span;
        let ty = match &mut child.kind {
            ExprKind::Variable(member) => {
                self.find_member(record, member)
                    .ok_or_else(|| Error::UnknownMember {
                        member: member.clone(),
                        owner: record.clone(),
                        span,
                    })?
            }
            ExprKind::Call { callee, args } => {
                let sig = self.find_method(record, &callee.name).cloned().ok_or_else(|| {
                    Error::UnknownMember {
                        member: callee.name.clone(),
                        owner: record.clone(),
                        span: callee.span,
                    }
                })?;
                self.check_args(&callee.name, &sig, args, span)?;
                sig.ret
            }
            ExprKind::Access { parent, child: next } => {
                self.check_member(owner, parent)?;
                let inner = parent.ty.clone();
                self.check_member(&inner, next)?;
                next.ty.clone()
            }
            _ => return Err(Error::InvalidAccess { span }),
        };

        child.ty = ty;
        Ok(())
    }

    /// Non-bool primitive conditions are cast to bool
    fn check_condition(&mut self, cond: &mut Expr, construct: &str) -> Result<()> {
        self.check_expr(cond)?;
        match cond.ty.clone() {
            Type::Bool => Ok(()),
            ty if ty.is_primitive() => {
                self.insert_cast(cond, Type::Bool);
                Ok(())
            }
            ty => Err(Error::InvalidCondition {
                construct: construct.to_string(),
                reason: format!("{} is not a primitive type", ty),
                span: cond.span,
            }),
        }
    }

    fn check_for(&mut self, init: &mut Expr, cond: &mut Expr, step: &mut Expr, body: &mut [Expr]) {
        self.scopes.push();

        let result = if matches!(
            init.kind,
            ExprKind::Variable(_) | ExprKind::Assign { .. } | ExprKind::VariableDef(_)
        ) {
            self.check_expr(init)
        } else {
            Err(Error::InvalidLoopClause {
                clause: "initializer".to_string(),
                expected: "a variable, assignment or definition".to_string(),
                span: init.span,
            })
        };
        self.report(result);

        let result = if is_condition_shape(cond) {
            self.check_condition(cond, "for")
        } else {
            Err(Error::InvalidLoopClause {
                clause: "condition".to_string(),
                expected: "a variable, unary or binary expression".to_string(),
                span: cond.span,
            })
        };
        self.report(result);

        let result = if matches!(
            step.kind,
            ExprKind::Variable(_) | ExprKind::Assign { .. } | ExprKind::IncrDecr { .. }
        ) {
            self.check_expr(step)
        } else {
            Err(Error::InvalidLoopClause {
                clause: "step".to_string(),
                expected: "a variable, assignment or increment".to_string(),
                span: step.span,
            })
        };
        self.report(result);

        self.check_block(body);
        self.scopes.pop();
    }
}

fn is_condition_shape(cond: &Expr) -> bool {
    matches!(
        cond.kind,
        ExprKind::Variable(_) | ExprKind::Unary { .. } | ExprKind::Binary { .. }
    )
}

/// The variable at the root of an lvalue
fn root_variable(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Variable(name) => Some(name),
        ExprKind::ArrayAccess { base, .. } => root_variable(base),
        ExprKind::Access { parent, .. } => root_variable(parent),
        _ => None,
    }
}

/// Give `name[]` dimensions the length of the initializer
fn fill_unsized(declared: &Type, value: &Type) -> Type {
    match (declared, value) {
        (
            Type::Array { element, length },
            Type::Array {
                element: value_element,
                length: value_length,
            },
        ) => {
            let length = if *length == 0 { *value_length } else { *length };
            Type::array(fill_unsized(element, value_element), length)
        }
        _ => declared.clone(),
    }
}

/// Verify a module, returning the verdict and the annotated module
pub fn verify(mut module: Module, diags: &mut DiagnosticBuilder) -> (bool, Module) {
    let ok = SemanticAnalyzer::new(diags).analyze(&mut module);
    (ok, module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use pretty_assertions::assert_eq;

    fn analyze(source: &str) -> (bool, Module, DiagnosticBuilder) {
        let config = Config::new();
        let mut diags = DiagnosticBuilder::new();
        let module = Parser::new(Lexer::new(source), &config, &mut diags).parse_module();
        assert!(!diags.has_errors(), "parse errors: {:?}", diags.diagnostics());
        let (ok, module) = verify(module, &mut diags);
        (ok, module, diags)
    }

    fn error_kinds(diags: &DiagnosticBuilder) -> Vec<ErrorKind> {
        diags.errors().map(|d| d.kind).collect()
    }

    fn main_body(module: &Module) -> &[Expr] {
        &module.main().expect("main exists").body
    }

    fn def_of(expr: &Expr) -> &VariableDef {
        match &expr.kind {
            ExprKind::VariableDef(def) => def,
            other => panic!("not a definition: {:?}", other),
        }
    }

    #[test]
    fn test_scope_stack_lookup_order() {
        let info = |ty| VarInfo { ty, binding: Binding::Var, span: Span::dummy() };
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.define("x", info(Type::Int));
        scopes.push();
        scopes.define("x", info(Type::Double));
        assert_eq!(scopes.lookup("x").map(|i| &i.ty), Some(&Type::Double));
        scopes.pop();
        assert_eq!(scopes.lookup("x").map(|i| &i.ty), Some(&Type::Int));
        assert!(!scopes.is_visible("y"));
    }

    #[test]
    fn test_auto_inference() {
        let (ok, module, _) = analyze("var x = 5;");
        assert!(ok);
        let def = def_of(&main_body(&module)[0]);
        assert!(def.uses_value_type);
        assert_eq!(def.ty(), &Type::Int);
        assert_eq!(main_body(&module)[0].ty, Type::Int);
    }

    #[test]
    fn test_redeclaration_same_block() {
        let (ok, _, diags) = analyze("func f() { var x: int = 5; var x: int = 6; }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::Redeclaration]);
    }

    #[test]
    fn test_sibling_blocks_are_independent() {
        let (ok, _, diags) = analyze(
            "func f() { unsafe { var x: int = 5; } unsafe { var x: int = 6; } }",
        );
        assert!(ok, "{:?}", diags.diagnostics());
    }

    #[test]
    fn test_shadowing_outer_scope_is_redeclaration() {
        let (ok, _, diags) = analyze("func f(x: int) { if (x) { var x = 1; } }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::Redeclaration]);
    }

    #[test]
    fn test_let_requires_type_or_value() {
        let (ok, module, _) = analyze("let y = 3;");
        assert!(ok);
        assert_eq!(def_of(&main_body(&module)[0]).ty(), &Type::Int);

        let (ok, _, diags) = analyze("let z;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeRequired]);
        assert_eq!(
            diags.diagnostics()[0].message,
            "`let z` requires a type or a value"
        );

        let (ok, _, _) = analyze("const c: int;");
        assert!(ok);
    }

    #[test]
    fn test_call_arguments_are_not_cast() {
        let (ok, _, diags) = analyze(
            "func add(a: int, b: int) returns int { return a + b; }\nadd(1, 2.0);",
        );
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::ArgumentMismatch]);
        assert!(diags.diagnostics()[0].message.contains("Argument 2"));

        let (ok, _, diags) = analyze("func add(a: int, b: int) -> int { return a + b; }\nadd(1);");
        assert!(!ok);
        assert!(diags.diagnostics()[0].message.contains("expected 2, got 1"));
    }

    #[test]
    fn test_main_is_synthesized_around_top_level_statements() {
        let (ok, module, _) = analyze("var a = 1;\nfunc f() -> int { return 2; }\nvar b = f();");
        assert!(ok);
        let mains: Vec<_> = module.functions.iter().filter(|f| f.name() == "main").collect();
        assert_eq!(mains.len(), 1);
        let main = module.main().expect("main exists");
        assert!(main.proto.params.is_empty());
        assert_eq!(main.proto.ret, Type::Int);
        let names: Vec<&str> = main.body.iter().map(|s| def_of(s).name.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(module.pre_execution.is_empty());
    }

    #[test]
    fn test_prologue_is_spliced_before_existing_main_body() {
        let (ok, module, diags) = analyze(
            "var g = 1;\nfunc main() -> int { var h = g; return h; }",
        );
        assert!(ok, "{:?}", diags.diagnostics());
        let body = main_body(&module);
        assert_eq!(body.len(), 3);
        assert_eq!(def_of(&body[0]).name.name, "g");
        assert_eq!(def_of(&body[1]).name.name, "h");
        let main = module.main().expect("main exists");
        let locals: Vec<&str> = main.locals.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(locals, vec!["g", "h"]);
    }

    #[test]
    fn test_prologue_is_not_visible_outside_main() {
        let (ok, _, diags) = analyze("var g = 1;\nfunc f() -> int { return g; }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);
    }

    #[test]
    fn test_calling_main_is_rejected() {
        let (ok, _, diags) = analyze("func main() -> int { return 0; }\nfunc f() { main(); }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidCall]);
    }

    #[test]
    fn test_prologue_goes_to_defined_main_after_prototype() {
        let (ok, module, diags) =
            analyze("proto main() -> int;\nfunc main() -> int { return 0; }\nvar g = 1;");
        assert!(ok, "{:?}", diags.diagnostics());
        let definitions = module
            .functions
            .iter()
            .filter(|f| {
                matches!(f, FunctionItem::Function(func) if func.proto.name.name == "main")
            })
            .count();
        assert_eq!(definitions, 1);
        let body = main_body(&module);
        assert_eq!(body.len(), 2);
        assert_eq!(def_of(&body[0]).name.name, "g");
        assert!(matches!(body[1].kind, ExprKind::Return(_)));
    }

    #[test]
    fn test_lone_main_prototype_becomes_definition() {
        let (ok, module, _) = analyze("proto main() -> int;\nvar g = 1;");
        assert!(ok);
        assert_eq!(module.functions.len(), 1);
        assert_eq!(main_body(&module).len(), 1);
    }

    #[test]
    fn test_array_literal_widening_and_bounds() {
        let (ok, module, diags) = analyze("var arr[10]: int = [1, 2, 3];");
        assert!(ok, "{:?}", diags.diagnostics());
        let def = def_of(&main_body(&module)[0]);
        assert_eq!(def.value.as_ref().map(|v| v.ty.clone()), Some(Type::array(Type::Int, 10)));

        let (ok, _, diags) = analyze("var arr[10]: int = [1, 2, 3];\narr[10];");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::IndexOutOfBounds]);

        let (ok, _, _) = analyze("var arr[10]: int = [1, 2, 3];\narr[9] = 4;");
        assert!(ok);
    }

    #[test]
    fn test_array_access_rules() {
        let (ok, module, _) = analyze("var m[2][3]: int;\nvar e = m[1][2];");
        assert!(ok);
        assert_eq!(def_of(&main_body(&module)[1]).ty(), &Type::Int);

        let (_, _, diags) = analyze("var m[2][3]: int;\nm[1];");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidIndex]);

        let (_, _, diags) = analyze("var m[2]: int;\nm[1.5];");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidIndex]);

        let (_, _, diags) = analyze("var n = 1;\nn[0];");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidIndex]);
    }

    #[test]
    fn test_unsized_array_takes_literal_length() {
        let (ok, module, _) = analyze("var a[]: int = [1, 2];");
        assert!(ok);
        assert_eq!(def_of(&main_body(&module)[0]).ty(), &Type::array(Type::Int, 2));
    }

    #[test]
    fn test_empty_array_literal_needs_element_type() {
        let (ok, _, diags) = analyze("var a = [];");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidType]);

        let (ok, module, diags) = analyze("var b[3]: int = [];");
        assert!(ok, "{:?}", diags.diagnostics());
        let def = def_of(&main_body(&module)[0]);
        assert_eq!(def.ty(), &Type::array(Type::Int, 3));
        let value = def.value.as_deref().expect("value");
        assert_eq!(value.ty, Type::array(Type::Int, 3));
    }

    #[test]
    fn test_array_copy_is_rejected() {
        let (ok, _, diags) = analyze("var a[2]: int = [1, 2];\nvar b[2]: int = a;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeMismatch]);
        assert!(diags.diagnostics()[0].message.contains("not an array literal"));
    }

    #[test]
    fn test_mixed_array_elements() {
        let (ok, _, diags) = analyze("var a = [1, 'c'];");
        assert!(!ok);
        assert!(diags.diagnostics()[0].message.contains("Array elements do not match"));
    }

    #[test]
    fn test_definition_inserts_cast_with_warning() {
        let (ok, module, diags) = analyze("var x: int = 2.5;");
        assert!(ok);
        assert_eq!(diags.warning_count(), 1);
        let value = def_of(&main_body(&module)[0]).value.as_deref().expect("value");
        assert!(matches!(value.kind, ExprKind::Cast { from: Type::Float, .. }));
        assert_eq!(value.ty, Type::Int);

        let (_, _, diags) = analyze("var d: double = 1;");
        assert_eq!(diags.warning_count(), 0);
    }

    #[test]
    fn test_binary_operand_unification() {
        let (ok, module, _) = analyze("var x = 1 + 2.5d;");
        assert!(ok);
        let value = def_of(&main_body(&module)[0]).value.as_deref().expect("value");
        assert_eq!(value.ty, Type::Double);
        let ExprKind::Binary { lhs, rhs, .. } = &value.kind else { panic!() };
        assert!(matches!(lhs.kind, ExprKind::Cast { from: Type::Int, .. }));
        assert_eq!(rhs.ty, Type::Double);

        let (_, module, _) = analyze("var c = 'a' + 1;");
        let value = def_of(&main_body(&module)[0]).value.as_deref().expect("value");
        assert_eq!(value.ty, Type::Int);

        let (_, module, _) = analyze("var q = 4 / 2;\nvar b = 1 < 2.0;");
        assert_eq!(def_of(&main_body(&module)[0]).ty(), &Type::Float);
        assert_eq!(def_of(&main_body(&module)[1]).ty(), &Type::Bool);
    }

    #[test]
    fn test_assignment_rules() {
        let (ok, _, diags) = analyze("const c: int = 1;\nc = 2;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::ConstViolation]);

        let (ok, _, diags) = analyze("var x: int = 1;\nx = 2.5;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeMismatch]);

        let (ok, _, _) = analyze("var x: int = 1;\nx += 2;\nx++;");
        assert!(ok);
    }

    #[test]
    fn test_custom_type_mismatch() {
        let (ok, _, diags) = analyze("struct Point { int x; int y; }\nlet s: Point = 3;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeMismatch]);

        let (_, _, diags) = analyze("var p: Missing;");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);
    }

    #[test]
    fn test_return_type_checks() {
        let (ok, _, _) = analyze("func f() { return; }\nfunc g() -> double { return 1.0d; }");
        assert!(ok);

        let (ok, _, diags) = analyze("func f() -> int { return; }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeMismatch]);

        let (ok, _, _) = analyze("return 0;");
        assert!(ok);
    }

    #[test]
    fn test_conditions() {
        let (ok, module, _) = analyze("func f(n: int) { if (n) { } else if (n < 2) { } else { } }");
        assert!(ok);
        let FunctionItem::Function(f) = &module.functions[0] else { panic!() };
        let ExprKind::If { head, .. } = &f.body[0].kind else { panic!() };
        let cond = head.condition.as_deref().expect("condition");
        assert!(matches!(cond.kind, ExprKind::Cast { .. }));
        assert_eq!(cond.ty, Type::Bool);

        let (ok, _, diags) = analyze("struct S { int a; }\nfunc f(s: S) { if (s) { } }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidCondition]);

        let (ok, _, diags) = analyze("func f() { while (1) { } }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidCondition]);
    }

    #[test]
    fn test_for_loop_clauses() {
        let (ok, module, diags) = analyze(
            "func f() { for (var i = 0; i < 10; i++) { var j = i; } for (var i = 0; i < 3; i += 1) { } }",
        );
        assert!(ok, "{:?}", diags.diagnostics());
        let FunctionItem::Function(f) = &module.functions[0] else { panic!() };
        assert_eq!(f.locals.len(), 3);

        let (ok, _, diags) = analyze("func f() { for (1; 2; 3) { } }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags).len(), 3);
    }

    #[test]
    fn test_recursion_and_forward_calls() {
        let (ok, _, diags) = analyze(
            "func fact(n: int) -> int { if (n < 2) { return 1; } return n * fact(n - 1); }\n\
             var r = later();\n\
             func later() -> int { return fact(3); }",
        );
        assert!(ok, "{:?}", diags.diagnostics());
    }

    #[test]
    fn test_prototype_then_definition() {
        let (ok, _, _) = analyze("proto f(a: int) -> int;\nfunc f(a: int) -> int { return a; }");
        assert!(ok);

        let (ok, _, diags) = analyze("func f() { }\nfunc f() { }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::DuplicateDefinition]);
    }

    #[test]
    fn test_undefined_function_short_circuits() {
        let (ok, _, diags) = analyze("var x = nope(1);");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);
    }

    #[test]
    fn test_errors_accumulate_across_statements() {
        let (ok, _, diags) = analyze("func f() { a = 1; b = 2; var c = 'x' + d; }");
        assert!(!ok);
        assert_eq!(diags.error_count(), 3);
    }

    #[test]
    fn test_struct_and_union_layout() {
        let (ok, module, _) = analyze(
            "struct P { int x; char c; double d; }\nunion U { int i; double d; char c; }",
        );
        assert!(ok);
        assert_eq!(module.types[0].size, 13);
        assert_eq!(module.types[1].size, 8);
    }

    #[test]
    fn test_nested_struct_is_registered() {
        let (ok, module, diags) = analyze(
            "struct Line { struct Pt { int x; int y; } int w; }\nvar p: Pt;\nvar l: Line;\nvar n = l.Pt.x;",
        );
        assert!(ok, "{:?}", diags.diagnostics());
        assert_eq!(module.types[0].size, 12);
        assert_eq!(def_of(&main_body(&module)[3]).ty(), &Type::Int);
    }

    #[test]
    fn test_struct_errors() {
        let (ok, _, diags) = analyze("struct P { int x; char x; }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidMember]);

        let (_, _, diags) = analyze("struct P { int x; }\nstruct P { int y; }");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::DuplicateDefinition]);

        let (_, _, diags) = analyze("struct P { Q q; }");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);
    }

    #[test]
    fn test_oversized_layouts_are_rejected() {
        let (ok, _, diags) = analyze("struct S { double[2147483647][2147483647][4] a; }");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidType]);

        let (ok, module, diags) = analyze(
            "struct S { int[2147483647][2147483647] a; int[2147483647][2147483647] b; }",
        );
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidType]);
        assert!(diags.diagnostics()[0].message.contains("S is too large"));
        assert_eq!(module.types[0].size, usize::MAX);

        let (ok, _, diags) = analyze("var a[2147483647][2147483647][4]: double;");
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidType]);
    }

    #[test]
    fn test_member_access() {
        let (ok, module, diags) = analyze(
            "struct P { int x; double y; }\nvar p: P;\nvar y = p.y;\np.x = 3;",
        );
        assert!(ok, "{:?}", diags.diagnostics());
        assert_eq!(def_of(&main_body(&module)[1]).ty(), &Type::Double);

        let (_, _, diags) = analyze("struct P { int x; }\nvar p: P;\np.z;");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidMember]);

        let (_, _, diags) = analyze("var i = 1;\ni.x;");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidMember]);
    }

    #[test]
    fn test_classes() {
        let (ok, module, diags) = analyze(
            "class Base { var id: int; func get() -> int { return id; } }\n\
             class Child extends Base { var scale = 2.0d; func twice() -> int { return get() * 2; } }\n\
             var c = new Child;\n\
             var n = c.get();\n\
             var s = c.scale;\n\
             delete c;",
        );
        assert!(ok, "{:?}", diags.diagnostics());
        let body = main_body(&module);
        assert_eq!(def_of(&body[0]).ty(), &Type::Custom("Child".into()));
        assert_eq!(def_of(&body[1]).ty(), &Type::Int);
        assert_eq!(def_of(&body[2]).ty(), &Type::Double);
    }

    #[test]
    fn test_class_errors() {
        let (_, _, diags) = analyze("class C { extern puts(s: int) -> int; }");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidCall]);

        let (_, _, diags) = analyze("class C(Missing) { }");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);

        let (_, _, diags) = analyze("class C { }\nclass C { }");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::DuplicateDefinition]);

        let (_, _, diags) = analyze("var u = new Nothing;");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::UndefinedSymbol]);

        let (_, _, diags) = analyze("var i = 1;\ndelete i;");
        assert_eq!(error_kinds(&diags), vec![ErrorKind::TypeMismatch]);
    }

    #[test]
    fn test_unresolved_parameter_type() {
        let mut diags = DiagnosticBuilder::new();
        let mut module = Module::default();
        module.functions.push(FunctionItem::Prototype(Prototype {
            name: Ident::new("f", Span::dummy()),
            params: vec![VariableDef::new(
                Ident::new("a", Span::dummy()),
                Binding::Var,
                Type::Void,
                None,
            )],
            ret: Type::Void,
            span: Span::dummy(),
        }));
        let (ok, _) = verify(module, &mut diags);
        assert!(!ok);
        assert_eq!(error_kinds(&diags), vec![ErrorKind::InvalidType]);
    }
}
