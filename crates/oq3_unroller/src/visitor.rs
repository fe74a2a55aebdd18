// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// The tree-walking interpreter. One dispatch arm per statement kind; every
// handler returns the statements it emits into the flattened program. No
// state other than the scope stack, the register table and the depth
// counters survives between statements.

use hashbrown::HashMap;
use log::debug;

use crate::analyzer;
use crate::ast::{
    Alias, Assignment, Barrier, BinaryOp, BoxStmt, Branch, ClassicalDeclaration, Delay, Expr, For,
    ForIterable, GPhase, GateCall, GateDefinition, GateModifier, GateOperand, IODeclaration,
    IndexKind, LValue, Measurement, QuantumDeclaration, Reset, Span, Stmt, SubroutineDefinition,
    Switch, TypeKind, TypeSpec, Variable, While,
};
use crate::depth::DepthTracker;
use crate::error::{Error, Result};
use crate::evaluator::{builtin_constant, Restriction};
use crate::gates;
use crate::registers::{RegisterTable, DEVICE_REGISTER};
use crate::scope::{Context, ScopeManager};
use crate::types::{IsConst, Type};
use crate::value::{self, Value};

pub(crate) const DEFAULT_MAX_LOOP_ITERS: usize = 1_000_000;

/// Knobs accepted by `Module::unroll`.
#[derive(Clone, Debug)]
pub struct UnrollOptions {
    /// Gates that are not expanded; they are validated and re-emitted by
    /// name.
    pub external_gates: Vec<String>,
    /// Split barriers into per-qubit barriers (the default) or keep one
    /// statement with resolved operands.
    pub unroll_barriers: bool,
    /// Bound on loop unrolling.
    pub max_loop_iters: usize,
}

impl Default for UnrollOptions {
    fn default() -> Self {
        UnrollOptions {
            external_gates: Vec::new(),
            unroll_barriers: true,
            max_loop_iters: DEFAULT_MAX_LOOP_ITERS,
        }
    }
}

pub(crate) struct QasmVisitor {
    pub(crate) check_only: bool,
    pub(crate) options: UnrollOptions,
    pub(crate) scopes: ScopeManager,
    pub(crate) registers: RegisterTable,
    pub(crate) depths: DepthTracker,
    pub(crate) custom_gates: HashMap<String, GateDefinition>,
    pub(crate) subroutines: HashMap<String, SubroutineDefinition>,
    // Innermost-last stacks for nested subroutine calls.
    pub(crate) function_qreg_sizes: Vec<HashMap<String, usize>>,
    pub(crate) function_qreg_transforms: Vec<HashMap<(String, usize), (String, usize)>>,
}

impl QasmVisitor {
    pub(crate) fn new(check_only: bool, options: UnrollOptions) -> QasmVisitor {
        QasmVisitor {
            check_only,
            options,
            scopes: ScopeManager::new(),
            registers: RegisterTable::new(),
            depths: DepthTracker::new(),
            custom_gates: HashMap::new(),
            subroutines: HashMap::new(),
            function_qreg_sizes: Vec::new(),
            function_qreg_transforms: Vec::new(),
        }
    }

    fn maybe(&self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        if self.check_only {
            Vec::new()
        } else {
            stmts
        }
    }

    pub(crate) fn visit_program(&mut self, statements: &[Stmt]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for stmt in statements {
            out.extend(self.visit_statement(stmt)?);
        }
        Ok(self.finalize(out))
    }

    /// Consolidate physical qubits: the synthetic device register is
    /// declared ahead of everything else, sized by first-use order.
    fn finalize(&mut self, mut stmts: Vec<Stmt>) -> Vec<Stmt> {
        let num_physical = self.registers.num_physical();
        if num_physical > 0 {
            self.registers.add_qubit_register(DEVICE_REGISTER, num_physical);
            if !self.check_only {
                let decl = QuantumDeclaration::new(
                    DEVICE_REGISTER,
                    Some(Expr::int(num_physical as i64)),
                    None,
                )
                .to_stmt();
                stmts.insert(0, decl);
            }
        }
        stmts
    }

    pub(crate) fn visit_block(&mut self, stmts: &[Stmt]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for stmt in stmts {
            out.extend(self.visit_statement(stmt)?);
        }
        Ok(out)
    }

    pub(crate) fn visit_statement(&mut self, stmt: &Stmt) -> Result<Vec<Stmt>> {
        debug!("visiting statement {stmt:?}");
        match stmt {
            Stmt::Include(include) => Ok(self.maybe(vec![include.clone().to_stmt()])),
            Stmt::QuantumDeclaration(decl) => self.visit_quantum_declaration(decl),
            Stmt::ClassicalDeclaration(decl) => self.visit_classical_declaration(decl),
            Stmt::IODeclaration(decl) => self.visit_io_declaration(decl),
            Stmt::Assignment(assignment) => self.visit_assignment(assignment),
            Stmt::Alias(alias) => self.visit_alias(alias),
            Stmt::GateDefinition(definition) => self.visit_gate_definition(definition),
            Stmt::GateCall(call) => self.visit_gate_call(call),
            Stmt::GPhase(gphase) => self.visit_gphase(gphase),
            Stmt::Measurement(measurement) => self.visit_measurement(measurement),
            Stmt::Reset(reset) => self.visit_reset(reset),
            Stmt::Barrier(barrier) => self.visit_barrier(barrier),
            Stmt::Delay(delay) => self.visit_delay(delay),
            Stmt::Box_(box_stmt) => self.visit_box(box_stmt),
            Stmt::Branch(branch) => self.visit_branch(branch),
            Stmt::While(while_loop) => self.visit_while(while_loop),
            Stmt::For(for_loop) => self.visit_for(for_loop),
            Stmt::Switch(switch) => self.visit_switch(switch),
            Stmt::SubroutineDefinition(definition) => self.visit_subroutine_definition(definition),
            Stmt::Return(ret) => Err(Error::unsupported(
                "return statement outside of a subroutine",
                ret.span,
            )),
            Stmt::ExprStmt(expr_stmt) => self.visit_expr_statement(expr_stmt.expr(), expr_stmt.span),
            Stmt::Break(span) | Stmt::Continue(span) => Err(Error::unsupported(
                "break / continue are not supported during unrolling",
                *span,
            )),
            Stmt::End(span) => Ok(self.maybe(vec![Stmt::End(*span)])),
            Stmt::Pragma(pragma) => Ok(self.maybe(vec![pragma.clone().to_stmt()])),
            Stmt::Annotation(annotation) => Ok(self.maybe(vec![annotation.clone().to_stmt()])),
            Stmt::Cal(block) => Ok(self.maybe(vec![Stmt::Cal(block.clone())])),
            Stmt::DefCal(block) => Ok(self.maybe(vec![Stmt::DefCal(block.clone())])),
            Stmt::DefCalGrammar(block) => Ok(self.maybe(vec![Stmt::DefCalGrammar(block.clone())])),
        }
    }

    //
    // Declarations
    //

    fn check_name_is_free(&self, name: &str, span: Span) -> Result<()> {
        if builtin_constant(name).is_some() {
            return Err(Error::duplicate(
                format!("cannot declare a variable with the builtin constant name '{name}'"),
                span,
            ));
        }
        if self.custom_gates.contains_key(name) || self.subroutines.contains_key(name) {
            return Err(Error::duplicate(
                format!("name '{name}' is already declared as a gate or subroutine"),
                span,
            ));
        }
        Ok(())
    }

    fn visit_quantum_declaration(&mut self, decl: &QuantumDeclaration) -> Result<Vec<Stmt>> {
        let name = decl.name();
        let span = decl.span;
        self.check_name_is_free(name, span)?;
        if !self.scopes.in_global_scope() {
            return Err(Error::unsupported(
                format!("quantum declaration of '{name}' outside the global scope"),
                span,
            ));
        }
        if self.scopes.check_in_scope(name) || self.registers.is_alias(name) {
            return Err(Error::duplicate(
                format!("re-declaration of quantum register with name '{name}'"),
                span,
            ));
        }
        let size = match decl.size() {
            Some(expr) => {
                let size = self.evaluate_const_int(expr, span)?;
                if size <= 0 {
                    return Err(Error::type_error(
                        format!("invalid size {size} for quantum register '{name}'"),
                        span,
                    ));
                }
                size as usize
            }
            None => 1,
        };
        let variable = Variable::new(name, Type::QubitArray(size), span).register().qubit();
        self.scopes.add_var(variable);
        self.registers.add_qubit_register(name, size);
        for index in 0..size {
            self.depths.add_qubit(name, index);
        }
        let emitted = QuantumDeclaration::new(name, Some(Expr::int(size as i64)), span).to_stmt();
        Ok(self.maybe(vec![emitted]))
    }

    /// Evaluate the syntax-level type into a semantic type plus dimensions.
    pub(crate) fn resolve_type_spec(
        &mut self,
        spec: &TypeSpec,
        is_const: bool,
        span: Span,
    ) -> Result<(Type, Vec<usize>)> {
        let isconst = IsConst::from(is_const);
        let width = match spec.width() {
            Some(expr) => {
                let w = self.evaluate_const_int(expr, span)?;
                if w <= 0 {
                    return Err(Error::type_error(format!("invalid type width {w}"), span));
                }
                Some(w as u32)
            }
            None => None,
        };
        let scalar = match spec.kind() {
            TypeKind::Bit => match width {
                Some(w) => Type::BitArray(w as usize, isconst),
                None => Type::Bit(isconst),
            },
            TypeKind::Bool => Type::Bool(isconst),
            TypeKind::Int => Type::Int(width, isconst),
            TypeKind::UInt => Type::UInt(width, isconst),
            TypeKind::Float => Type::Float(width, isconst),
            TypeKind::Angle => Type::Angle(width, isconst),
            TypeKind::Complex => Type::Complex(width, isconst),
            TypeKind::Duration => Type::Duration(isconst),
            TypeKind::Stretch => Type::Stretch(isconst),
            TypeKind::Qubit => match width {
                Some(w) => Type::QubitArray(w as usize),
                None => Type::Qubit,
            },
        };
        if !spec.is_array() {
            return Ok((scalar, Vec::new()));
        }
        if matches!(scalar, Type::Bit(..) | Type::BitArray(..)) {
            return Err(Error::type_error(
                "arrays with base type 'bit' are not allowed",
                span,
            ));
        }
        if spec.dims().len() > 7 {
            return Err(Error::type_error(
                format!(
                    "invalid dimensions {} for array declaration; max allowed is 7",
                    spec.dims().len()
                ),
                span,
            ));
        }
        let mut dims = Vec::new();
        for dim in spec.dims() {
            let value = self.evaluate_const_int(dim, span)?;
            if value <= 0 {
                return Err(Error::type_error(
                    format!("invalid dimension size {value} in array declaration"),
                    span,
                ));
            }
            dims.push(value as usize);
        }
        Ok((Type::Array(Box::new(scalar), dims.clone()), dims))
    }

    fn default_array_value(ty: &Type, dims: &[usize]) -> Value {
        if dims.is_empty() {
            return match ty {
                Type::Bool(..) | Type::Bit(..) => Value::Bool(false),
                Type::Float(..) | Type::Angle(..) => Value::Float(0.0),
                Type::Complex(..) => Value::Complex(num_complex::Complex64::new(0.0, 0.0)),
                _ => Value::Int(0),
            };
        }
        let element = match ty {
            Type::Array(elem, _) => Self::default_array_value(elem, &dims[1..]),
            other => Self::default_array_value(other, &dims[1..]),
        };
        Value::Array(vec![element; dims[0]])
    }

    fn evaluate_array_literal(
        &mut self,
        exprs: &[Expr],
        element: &Type,
        dims: &[usize],
        span: Span,
    ) -> Result<Value> {
        if dims.is_empty() {
            return Err(Error::type_error("unexpected nested array literal", span));
        }
        if exprs.len() != dims[0] {
            return Err(Error::type_error(
                format!(
                    "array literal has {} elements, expected {}",
                    exprs.len(),
                    dims[0]
                ),
                span,
            ));
        }
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::ArrayLiteral(inner) => {
                    out.push(self.evaluate_array_literal(inner, element, &dims[1..], span)?);
                }
                scalar_expr => {
                    if dims.len() != 1 {
                        return Err(Error::type_error(
                            "array literal does not match declared dimensions",
                            span,
                        ));
                    }
                    let (value, _) = self.evaluate_expression(scalar_expr, false, Restriction::None)?;
                    out.push(value::coerce(&value, element, span)?);
                }
            }
        }
        Ok(Value::Array(out))
    }

    fn visit_classical_declaration(&mut self, decl: &ClassicalDeclaration) -> Result<Vec<Stmt>> {
        let name = decl.name();
        let span = decl.span;
        self.check_name_is_free(name, span)?;
        if self.scopes.check_in_scope(name) {
            // A block may shadow a name from its parent scope, once.
            let shadowing =
                self.scopes.in_block_scope() && !self.scopes.declared_in_current_scope(name);
            if !shadowing {
                return Err(Error::duplicate(
                    format!("re-declaration of variable '{name}'"),
                    span,
                ));
            }
        }
        if decl.is_const() && decl.initializer().is_none() {
            return Err(Error::type_error(
                format!("constant declaration of '{name}' requires an initializer"),
                span,
            ));
        }

        let (ty, dims) = self.resolve_type_spec(decl.type_spec(), decl.is_const(), span)?;
        if matches!(ty, Type::Qubit | Type::QubitArray(..)) {
            return Err(Error::type_error(
                format!("classical declaration of '{name}' with a quantum type"),
                span,
            ));
        }
        // A scalar `bit` is a register of size one: it is emitted and can be
        // a measurement target.
        let ty = match ty {
            Type::Bit(isconst) => Type::BitArray(1, isconst),
            other => other,
        };
        if decl.is_const() && !dims.is_empty() {
            return Err(Error::type_error(
                "const arrays are not supported",
                span,
            ));
        }

        let mut statements = Vec::new();
        let is_register = matches!(ty, Type::BitArray(..));

        // `bit[n] c = measure q;` emits the declaration plus the per-bit
        // measurements.
        let mut measurement_init = None;
        let mut init_value = None;
        if let Some(init) = decl.initializer() {
            match init {
                Expr::Measure(measure) => {
                    measurement_init = Some(Measurement::new(
                        measure.operand().clone(),
                        Some(LValue::new(name, Vec::new(), span)),
                        span,
                    ));
                }
                Expr::ArrayLiteral(exprs) => {
                    let element = match &ty {
                        Type::Array(elem, _) => elem.as_ref().clone(),
                        other => other.clone(),
                    };
                    init_value = Some(self.evaluate_array_literal(exprs, &element, &dims, span)?);
                }
                expr => {
                    let (raw, stmts) =
                        self.evaluate_expression(expr, decl.is_const(), Restriction::None)?;
                    statements.extend(stmts);
                    init_value = Some(value::coerce(&raw, &ty, span)?);
                }
            }
        }

        // Registers start zeroed; other uninitialized variables stay unset
        // and reads of them are rejected.
        if init_value.is_none() {
            if let Type::BitArray(size, _) = ty {
                init_value = Some(Value::Bits(vec![false; size]));
            } else if !dims.is_empty() {
                init_value = Some(Self::default_array_value(&ty, &dims));
            }
        }

        let mut variable = Variable::new(name, ty.clone(), span);
        variable.dims = dims;
        variable.is_constant = decl.is_const();
        variable.is_register = is_register;
        variable.value = init_value;
        self.scopes.add_var(variable);

        if is_register {
            let size = match ty {
                Type::BitArray(size, _) => size,
                _ => unreachable!(),
            };
            self.registers.add_classical_register(name, size);
            for index in 0..size {
                self.depths.add_clbit(name, index);
            }
            let emitted = ClassicalDeclaration::new(
                TypeSpec::scalar(TypeKind::Bit, Some(Expr::int(size as i64))),
                name,
                None,
                false,
                span,
            )
            .to_stmt();
            statements.push(emitted);
        }

        if let Some(measurement) = measurement_init {
            statements.extend(self.visit_measurement(&measurement)?);
        }

        Ok(self.maybe(statements))
    }

    fn visit_io_declaration(&mut self, decl: &IODeclaration) -> Result<Vec<Stmt>> {
        let span = decl.span;
        self.check_name_is_free(decl.name(), span)?;
        if self.scopes.check_in_scope(decl.name()) {
            return Err(Error::duplicate(
                format!("re-declaration of variable '{}'", decl.name()),
                span,
            ));
        }
        let (ty, dims) = self.resolve_type_spec(decl.type_spec(), false, span)?;
        let mut variable = Variable::new(decl.name(), ty, span);
        variable.dims = dims;
        self.scopes.add_var(variable);
        // Retained verbatim; the value is externally supplied and never
        // materialized here.
        Ok(self.maybe(vec![decl.clone().to_stmt()]))
    }

    //
    // Assignment
    //

    fn visit_assignment(&mut self, assignment: &Assignment) -> Result<Vec<Stmt>> {
        let span = assignment.span;
        let lvalue = assignment.lvalue();
        let name = lvalue.name();

        let lvar = match self.scopes.get_from_visible_scope(name) {
            Some(var) => var.clone(),
            None => {
                return Err(Error::undefined(
                    format!("undefined variable '{name}' in assignment"),
                    span,
                ))
            }
        };
        if lvar.is_constant {
            return Err(Error::type_error(
                format!("assignment to constant variable '{name}' not allowed"),
                span,
            ));
        }
        if lvar.readonly {
            return Err(Error::type_error(
                format!("assignment to readonly variable '{name}' not allowed"),
                span,
            ));
        }
        if lvar.is_qubit {
            return Err(Error::type_error(
                format!("cannot assign to quantum register '{name}'"),
                span,
            ));
        }

        // Compound assignment desugars to `lhs = lhs op rhs`.
        let rvalue_expr = match assignment.op() {
            Some(op) => {
                let lhs_expr = lvalue_to_expr(lvalue);
                crate::ast::BinaryExpr::new(op, lhs_expr, assignment.rvalue().clone(), span)
                    .to_expr()
            }
            None => assignment.rvalue().clone(),
        };
        let (raw, mut statements) =
            self.evaluate_expression(&rvalue_expr, false, Restriction::None)?;

        let mut lvar = lvar;
        if lvalue.indices().is_empty() {
            lvar.value = Some(value::coerce(&raw, &lvar.ty, span)?);
        } else {
            self.assign_indexed(&mut lvar, lvalue, &raw, span)?;
        }
        let emit = lvar.is_register;
        self.scopes.update_var(lvar);

        // Writes into a classical register surface in the flattened output.
        if emit {
            let folded = raw.to_expr().unwrap_or_else(|| assignment.rvalue().clone());
            let resolved_indices = self.fold_lvalue_indices(lvalue)?;
            statements.push(
                Assignment::new(
                    LValue::new(name, resolved_indices, span),
                    None,
                    folded,
                    span,
                )
                .to_stmt(),
            );
        }
        Ok(self.maybe(statements))
    }

    fn fold_lvalue_indices(&mut self, lvalue: &LValue) -> Result<Vec<IndexKind>> {
        let mut out = Vec::new();
        for index in lvalue.indices() {
            match index {
                IndexKind::Expr(expr) => {
                    let (value, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                    out.push(IndexKind::Expr(Expr::int(value.as_int(lvalue.span)?)));
                }
                other => out.push(other.clone()),
            }
        }
        Ok(out)
    }

    fn assign_indexed(
        &mut self,
        lvar: &mut Variable,
        lvalue: &LValue,
        raw: &Value,
        span: Span,
    ) -> Result<()> {
        let indices = self.evaluate_lvalue_indices(lvalue, span)?;
        match lvar.value.as_mut() {
            Some(Value::Bits(bits)) => {
                if indices.len() != 1 {
                    return Err(Error::range(
                        format!("invalid number of indices for register '{}'", lvar.name),
                        span,
                    ));
                }
                let idx = analyzer::validate_register_index(
                    indices[0] as i64,
                    bits.len(),
                    false,
                    span,
                )?;
                bits[idx] = raw.truthy(span)?;
            }
            Some(array @ Value::Array(..)) => {
                let element_type = match &lvar.ty {
                    Type::Array(elem, _) => elem.as_ref().clone(),
                    other => other.clone(),
                };
                let checked =
                    analyzer::validate_array_indices(
                        &indices.iter().map(|v| *v as i64).collect::<Vec<_>>(),
                        &lvar.dims,
                        span,
                    )?;
                let coerced = value::coerce(raw, &element_type, span)?;
                analyzer::update_array_element(array, &checked, coerced, span)?;
            }
            _ => {
                return Err(Error::type_error(
                    format!("variable '{}' is not indexable", lvar.name),
                    span,
                ))
            }
        }
        Ok(())
    }

    fn evaluate_lvalue_indices(&mut self, lvalue: &LValue, span: Span) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        for index in lvalue.indices() {
            match index {
                IndexKind::Expr(expr) => {
                    let (value, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                    let idx = value.as_int(span)?;
                    if idx < 0 {
                        return Err(Error::range(format!("negative index {idx}"), span));
                    }
                    out.push(idx as usize);
                }
                IndexKind::List(exprs) => {
                    for expr in exprs {
                        let (value, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                        let idx = value.as_int(span)?;
                        if idx < 0 {
                            return Err(Error::range(format!("negative index {idx}"), span));
                        }
                        out.push(idx as usize);
                    }
                }
                _ => {
                    return Err(Error::unsupported(
                        "range and set indices are not supported in assignment targets",
                        span,
                    ))
                }
            }
        }
        Ok(out)
    }

    //
    // Aliases
    //

    fn visit_alias(&mut self, alias: &Alias) -> Result<Vec<Stmt>> {
        let span = alias.span;
        let name = alias.name();
        if self.scopes.check_in_scope(name) || self.registers.is_alias(name) {
            return Err(Error::duplicate(
                format!("re-declaration of variable '{name}'"),
                span,
            ));
        }
        let targets = self.resolve_alias_value(alias.value(), span)?;
        self.registers.add_alias(name, targets);
        Ok(Vec::new())
    }

    // The right-hand side of `let`: a register, an indexed register, an
    // existing alias, or a `++` concatenation of those. Resolution is
    // transitive and bottoms out in (register, index) pairs.
    fn resolve_alias_value(&mut self, value: &Expr, span: Span) -> Result<Vec<(String, usize)>> {
        match value {
            Expr::Identifier(ident) => {
                let name = ident.name();
                if let Some(targets) = self.registers.alias_targets(name) {
                    return Ok(targets.to_vec());
                }
                match self.registers.qubit_register_size(name) {
                    Some(size) => Ok((0..size).map(|i| (name.to_string(), i)).collect()),
                    None => Err(Error::undefined(
                        format!("qubit register '{name}' not found for aliasing"),
                        span,
                    )),
                }
            }
            Expr::Index(index_expr) => {
                let base = self.resolve_alias_value(index_expr.collection(), span)?;
                let size = base.len();
                let positions: Vec<usize> = match index_expr.index() {
                    IndexKind::Expr(expr) => {
                        let idx = {
                            let (v, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                            v.as_int(span)?
                        };
                        vec![analyzer::validate_register_index(idx, size, true, span)?]
                    }
                    IndexKind::Range(range) => {
                        let (start, stop, step) = self.evaluate_range_bounds(range)?;
                        analyzer::slice_indices(start, stop, step, size, true, span)?
                    }
                    IndexKind::Set(exprs) => {
                        let mut out = Vec::new();
                        for expr in exprs {
                            let (v, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                            out.push(analyzer::validate_register_index(
                                v.as_int(span)?,
                                size,
                                true,
                                span,
                            )?);
                        }
                        out
                    }
                    IndexKind::List(_) => {
                        return Err(Error::unsupported(
                            "multi-dimensional indices are not valid on qubit registers",
                            span,
                        ))
                    }
                };
                Ok(positions.into_iter().map(|i| base[i].clone()).collect())
            }
            Expr::Binary(bin) if bin.op() == BinaryOp::Concat => {
                let mut out = self.resolve_alias_value(bin.lhs(), span)?;
                out.extend(self.resolve_alias_value(bin.rhs(), span)?);
                Ok(out)
            }
            _ => Err(Error::unsupported(
                "unsupported alias right-hand side",
                span,
            )),
        }
    }

    pub(crate) fn evaluate_range_bounds(
        &mut self,
        range: &crate::ast::RangeExpr,
    ) -> Result<(Option<i64>, Option<i64>, Option<i64>)> {
        let eval = |visitor: &mut Self, expr: Option<&Expr>| -> Result<Option<i64>> {
            match expr {
                Some(e) => {
                    let (v, _) = visitor.evaluate_expression(e, false, Restriction::Int)?;
                    Ok(Some(v.as_int(e.span())?))
                }
                None => Ok(None),
            }
        };
        let start = eval(self, range.start())?;
        let stop = eval(self, range.stop())?;
        let step = eval(self, range.step())?;
        Ok((start, stop, step))
    }

    //
    // Gate definitions and applications
    //

    fn visit_gate_definition(&mut self, definition: &GateDefinition) -> Result<Vec<Stmt>> {
        let name = definition.name();
        let span = definition.span;
        if builtin_constant(name).is_some() {
            return Err(Error::duplicate(
                format!("cannot declare gate with keyword name '{name}'"),
                span,
            ));
        }
        if !self.scopes.in_global_scope() {
            return Err(Error::unsupported(
                format!("gate definition of '{name}' outside the global scope"),
                span,
            ));
        }
        if self.custom_gates.contains_key(name) {
            return Err(Error::duplicate(
                format!("duplicate gate definition for '{name}'"),
                span,
            ));
        }
        self.custom_gates.insert(name.to_string(), definition.clone());
        Ok(Vec::new())
    }

    fn visit_subroutine_definition(&mut self, definition: &SubroutineDefinition) -> Result<Vec<Stmt>> {
        let name = definition.name();
        let span = definition.span;
        if builtin_constant(name).is_some() {
            return Err(Error::duplicate(
                format!("subroutine name '{name}' is a reserved keyword"),
                span,
            ));
        }
        if self.subroutines.contains_key(name) {
            return Err(Error::duplicate(
                format!("redefinition of subroutine '{name}'"),
                span,
            ));
        }
        if self.scopes.check_in_scope(name) {
            return Err(Error::duplicate(
                format!(
                    "cannot declare subroutine with name '{name}' as it is already declared as a variable"
                ),
                span,
            ));
        }
        self.subroutines.insert(name.to_string(), definition.clone());
        Ok(Vec::new())
    }

    pub(crate) fn get_op_parameters(&mut self, params: &[Expr]) -> Result<(Vec<f64>, Vec<Stmt>)> {
        let mut values = Vec::with_capacity(params.len());
        let mut statements = Vec::new();
        for param in params {
            let (value, stmts) = self.evaluate_expression(param, false, Restriction::None)?;
            statements.extend(stmts);
            values.push(value.as_f64(param.span())?);
        }
        Ok((values, statements))
    }

    /// Fold the modifier list into (exponent, inverse, control specs).
    /// Control specs are ordered outermost first, each `(count, negated)`.
    fn collapse_modifiers(
        &mut self,
        modifiers: &[GateModifier],
        span: Span,
    ) -> Result<(f64, bool, Vec<(usize, bool)>)> {
        let mut power = 1.0f64;
        let mut inverse = false;
        let mut controls = Vec::new();
        for modifier in modifiers {
            match modifier {
                GateModifier::Inv => inverse = !inverse,
                GateModifier::Pow(expr) => {
                    let (value, _) = self.evaluate_expression(expr, false, Restriction::None)?;
                    let exponent = value.as_f64(span)?;
                    if exponent < 0.0 {
                        inverse = !inverse;
                    }
                    power *= exponent.abs();
                }
                GateModifier::Ctrl(count) => {
                    let n = self.modifier_count(count.as_ref(), span)?;
                    controls.push((n, false));
                }
                GateModifier::NegCtrl(count) => {
                    let n = self.modifier_count(count.as_ref(), span)?;
                    controls.push((n, true));
                }
            }
        }
        Ok((power, inverse, controls))
    }

    fn modifier_count(&mut self, count: Option<&Expr>, span: Span) -> Result<usize> {
        match count {
            Some(expr) => {
                let (value, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                let n = value.as_int(span)?;
                if n <= 0 {
                    return Err(Error::type_error(
                        format!("invalid control count {n}"),
                        span,
                    ));
                }
                Ok(n as usize)
            }
            None => Ok(1),
        }
    }

    fn visit_gate_call(&mut self, call: &GateCall) -> Result<Vec<Stmt>> {
        debug!("visiting gate operation {:?}", call.name());
        let span = call.span;
        let raw_name = call.name();
        let canonical = gates::canonical_name(raw_name).to_string();

        let (power, inverse, controls) = self.collapse_modifiers(call.modifiers(), span)?;
        let num_controls: usize = controls.iter().map(|(n, _)| n).sum();

        // Class of the callee decides the base arity.
        let is_external = self.options.external_gates.iter().any(|g| g == raw_name);
        let (base_qubits, num_params) = if let Some(definition) = self.custom_gates.get(raw_name) {
            (definition.qubits().len(), definition.params().len())
        } else if let Some((nq, np)) = gates::signature(&canonical) {
            (nq, np)
        } else {
            return Err(Error::undefined(
                format!("unsupported / undeclared QASM operation: {raw_name}"),
                span,
            ));
        };
        if call.params().len() != num_params {
            return Err(Error::arity(
                format!(
                    "gate '{raw_name}' expects {num_params} parameter(s), got {}",
                    call.params().len()
                ),
                span,
            ));
        }
        let (params, mut out) = self.get_op_parameters(call.params())?;

        // Fractional powers only exist for gates with an intrinsic power
        // rule, where the exponent scales the angle.
        let mut params = params;
        let mut repetitions = power.round() as usize;
        if (power - power.round()).abs() > 1e-12 {
            if !gates::supports_fractional_pow(&canonical) {
                return Err(Error::unsupported(
                    format!("gate '{raw_name}' does not support a non-integer power"),
                    span,
                ));
            }
            params = params.iter().map(|p| p * power).collect();
            repetitions = 1;
        }

        let arity = base_qubits + num_controls;
        let chunks = self.broadcast_operands(call.qubits(), arity, raw_name, span)?;

        for chunk in &chunks {
            if let Some((reg, idx)) = analyzer::extract_duplicate_bit(chunk) {
                return Err(Error::duplicate(
                    format!("duplicate qubit '{reg}[{idx}]' argument in gate '{raw_name}'"),
                    span,
                ));
            }
        }

        for _ in 0..repetitions {
            for chunk in &chunks {
                let (control_ops, targets) = chunk.split_at(num_controls);
                let expansion = if !controls.is_empty() {
                    let base = self.expand_to_basic(raw_name, &params, targets, inverse, span)?;
                    self.apply_controls(base, &controls, control_ops, span)?
                } else if is_external {
                    self.expand_external(raw_name, &params, targets, inverse)
                } else if self.custom_gates.contains_key(raw_name) {
                    // Recursive inlining keeps per-inner-gate depth accounting.
                    let stmts =
                        self.expand_custom_gate(raw_name, call.params(), targets, inverse, span)?;
                    out.extend(stmts);
                    continue;
                } else {
                    gates::expand(&canonical, &params, targets, inverse, span)?
                };
                self.depths.gate(&resolved_bits(chunk));
                out.extend(expansion);
            }
        }
        Ok(self.maybe(out))
    }

    fn expand_external(
        &mut self,
        name: &str,
        params: &[f64],
        targets: &[GateOperand],
        inverse: bool,
    ) -> Vec<Stmt> {
        let modifiers = if inverse {
            vec![GateModifier::Inv]
        } else {
            Vec::new()
        };
        vec![GateCall::new(
            name,
            params.iter().map(|p| Expr::float(*p)).collect(),
            targets.to_vec(),
            modifiers,
            None,
        )
        .to_stmt()]
    }

    // Inline a user-defined gate: bind parameters and qubits by position,
    // substitute into the body and visit the result under a GATE context.
    fn expand_custom_gate(
        &mut self,
        name: &str,
        params: &[Expr],
        targets: &[GateOperand],
        inverse: bool,
        span: Span,
    ) -> Result<Vec<Stmt>> {
        let definition = self.custom_gates.get(name).cloned().unwrap();
        let param_map = self.bind_gate_params(&definition, params)?;
        let qubit_map = bind_gate_qubits(&definition, targets);

        let mut body = definition.body().to_vec();
        if inverse {
            body.reverse();
        }

        self.scopes.push(Context::Gate);
        let mut out = Vec::new();
        for gate_op in &body {
            match gate_op {
                Stmt::GateCall(inner) => {
                    if inner.name() == name {
                        self.scopes.pop();
                        return Err(Error::unsupported(
                            format!("recursive definitions not allowed for gate '{name}'"),
                            span,
                        ));
                    }
                    let mut substituted = inner.clone();
                    crate::transformer::transform_gate_params(&mut substituted, &param_map);
                    crate::transformer::transform_gate_qubits(&mut substituted, &qubit_map, span)?;
                    if inverse {
                        substituted.modifiers.push(GateModifier::Inv);
                    }
                    match self.visit_gate_call(&substituted) {
                        Ok(stmts) => out.extend(stmts),
                        Err(err) => {
                            self.scopes.pop();
                            return Err(err);
                        }
                    }
                }
                Stmt::GPhase(inner) => {
                    let mut substituted = inner.clone();
                    crate::transformer::transform_gphase(&mut substituted, &param_map, &qubit_map)?;
                    if inverse {
                        substituted.modifiers.push(GateModifier::Inv);
                    }
                    match self.visit_gphase(&substituted) {
                        Ok(stmts) => out.extend(stmts),
                        Err(err) => {
                            self.scopes.pop();
                            return Err(err);
                        }
                    }
                }
                other => {
                    self.scopes.pop();
                    return Err(Error::unsupported(
                        format!("unsupported statement in gate definition: {other:?}"),
                        span,
                    ));
                }
            }
        }
        self.scopes.pop();
        Ok(out)
    }

    fn bind_gate_params(
        &mut self,
        definition: &GateDefinition,
        params: &[Expr],
    ) -> Result<HashMap<String, Value>> {
        let mut map = HashMap::new();
        for (formal, actual) in definition.params().iter().zip(params.iter()) {
            let (value, _) = self.evaluate_expression(actual, false, Restriction::None)?;
            map.insert(formal.clone(), value);
        }
        Ok(map)
    }

    /// Expand any gate (custom or basic) to the intrinsic tier without
    /// emitting or counting depth; used below modifiers such as `ctrl`.
    fn expand_to_basic(
        &mut self,
        name: &str,
        params: &[f64],
        targets: &[GateOperand],
        inverse: bool,
        span: Span,
    ) -> Result<Vec<Stmt>> {
        if let Some(definition) = self.custom_gates.get(name).cloned() {
            let mut param_map = HashMap::new();
            for (formal, value) in definition.params().iter().zip(params.iter()) {
                param_map.insert(formal.clone(), Value::Float(*value));
            }
            let qubit_map = bind_gate_qubits(&definition, targets);
            let mut out = Vec::new();
            for gate_op in definition.body() {
                match gate_op {
                    Stmt::GateCall(inner) => {
                        if inner.name() == name {
                            return Err(Error::unsupported(
                                format!("recursive definitions not allowed for gate '{name}'"),
                                span,
                            ));
                        }
                        let mut substituted = inner.clone();
                        crate::transformer::transform_gate_params(&mut substituted, &param_map);
                        crate::transformer::transform_gate_qubits(&mut substituted, &qubit_map, span)?;
                        let (inner_power, inner_inverse, inner_controls) =
                            self.collapse_modifiers(substituted.modifiers(), span)?;
                        let (inner_params, _) = self.get_op_parameters(substituted.params())?;
                        let inner_canonical = gates::canonical_name(substituted.name()).to_string();
                        let num_inner_controls: usize =
                            inner_controls.iter().map(|(n, _)| n).sum();
                        let qubits = substituted.qubits().to_vec();
                        let (control_ops, inner_targets) = qubits.split_at(num_inner_controls);
                        let reps = (inner_power.round() as usize).max(1);
                        for _ in 0..reps {
                            let base = self.expand_to_basic(
                                &inner_canonical,
                                &inner_params,
                                inner_targets,
                                inner_inverse,
                                span,
                            )?;
                            let controlled =
                                self.apply_controls(base, &inner_controls, control_ops, span)?;
                            out.extend(controlled);
                        }
                    }
                    Stmt::GPhase(inner) => {
                        let mut substituted = inner.clone();
                        crate::transformer::transform_gphase(&mut substituted, &param_map, &qubit_map)?;
                        let (theta, _) = self.evaluate_expression(
                            substituted.arg(),
                            false,
                            Restriction::None,
                        )?;
                        out.push(
                            GPhase::new(
                                Expr::float(theta.as_f64(span)?),
                                substituted.qubits().to_vec(),
                                Vec::new(),
                                None,
                            )
                            .to_stmt(),
                        );
                    }
                    other => {
                        return Err(Error::unsupported(
                            format!("unsupported statement in gate definition: {other:?}"),
                            span,
                        ))
                    }
                }
            }
            if inverse {
                // Everything is intrinsic at this point; reverse the order
                // and invert each element.
                return gates::invert_intrinsic_sequence(out, span);
            }
            return Ok(out);
        }
        let canonical = gates::canonical_name(name);
        gates::expand(canonical, params, targets, inverse, span)
    }

    fn apply_controls(
        &mut self,
        mut stmts: Vec<Stmt>,
        controls: &[(usize, bool)],
        control_ops: &[GateOperand],
        span: Span,
    ) -> Result<Vec<Stmt>> {
        if controls.is_empty() {
            return Ok(stmts);
        }
        // Controls are listed outermost-first and consume operands from the
        // front; apply them innermost-first so the outermost control ends up
        // leftmost in the expanded gates.
        let mut levels: Vec<(&GateOperand, bool)> = Vec::new();
        let mut offset = 0;
        for (count, negated) in controls {
            for op in &control_ops[offset..offset + count] {
                levels.push((op, *negated));
            }
            offset += count;
        }
        for (control, negated) in levels.into_iter().rev() {
            let mut controlled = Vec::new();
            if negated {
                controlled.push(GateCall::basic("x", vec![control.clone()]).to_stmt());
            }
            controlled.extend(gates::controlify(stmts, control, span)?);
            if negated {
                controlled.push(GateCall::basic("x", vec![control.clone()]).to_stmt());
            }
            stmts = controlled;
        }
        Ok(stmts)
    }

    fn visit_gphase(&mut self, gphase: &GPhase) -> Result<Vec<Stmt>> {
        let span = gphase.span;
        let (power, inverse, controls) = self.collapse_modifiers(gphase.modifiers(), span)?;
        let (theta_value, mut out) =
            self.evaluate_expression(gphase.arg(), false, Restriction::None)?;
        let mut theta = theta_value.as_f64(span)?;
        theta *= power;
        if inverse {
            theta = -theta;
        }
        let mut resolved = Vec::new();
        for operand in gphase.qubits() {
            resolved.extend(self.resolve_operand(operand, true)?);
        }
        if controls.is_empty() {
            out.push(GPhase::new(Expr::float(theta), resolved, Vec::new(), span).to_stmt());
            return Ok(self.maybe(out));
        }
        let num_controls: usize = controls.iter().map(|(n, _)| n).sum();
        if resolved.len() != num_controls {
            return Err(Error::arity(
                format!(
                    "controlled gphase expects {num_controls} control qubit(s), got {}",
                    resolved.len()
                ),
                span,
            ));
        }
        let base = vec![GPhase::new(Expr::float(theta), Vec::new(), Vec::new(), span).to_stmt()];
        let controlled = self.apply_controls(base, &controls, &resolved, span)?;
        self.depths.gate(&resolved_bits(&resolved));
        out.extend(controlled);
        Ok(self.maybe(out))
    }

    //
    // Operand resolution and broadcast
    //

    /// Resolve each operand to its per-bit list and broadcast to chunks of
    /// `arity` operands, as described in the dispatcher design: positional
    /// zip when the operand count matches the arity, flat chunking when a
    /// multiple of the arity is supplied.
    fn broadcast_operands(
        &mut self,
        operands: &[GateOperand],
        arity: usize,
        gate_name: &str,
        span: Span,
    ) -> Result<Vec<Vec<GateOperand>>> {
        if operands.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        let resolved: Vec<Vec<GateOperand>> = operands
            .iter()
            .map(|op| self.resolve_operand(op, true))
            .collect::<Result<Vec<_>>>()?;

        if operands.len() == arity {
            // Positional broadcast: slice lengths must agree, scalars repeat.
            let max = resolved.iter().map(|r| r.len()).max().unwrap_or(1);
            for r in &resolved {
                if r.len() != 1 && r.len() != max {
                    return Err(Error::arity(
                        format!(
                            "inconsistent register sizes in broadcast of gate '{gate_name}'"
                        ),
                        span,
                    ));
                }
            }
            let mut chunks = Vec::with_capacity(max);
            for i in 0..max {
                let chunk: Vec<GateOperand> = resolved
                    .iter()
                    .map(|r| if r.len() == 1 { r[0].clone() } else { r[i].clone() })
                    .collect();
                chunks.push(chunk);
            }
            return Ok(chunks);
        }

        let flat: Vec<GateOperand> = resolved.into_iter().flatten().collect();
        if arity == 0 || flat.len() % arity != 0 {
            return Err(Error::arity(
                format!(
                    "invalid number of qubits {} for operation '{gate_name}'",
                    flat.len()
                ),
                span,
            ));
        }
        Ok(flat.chunks(arity).map(|c| c.to_vec()).collect())
    }

    /// Resolve one operand into its ordered (register, index) list. Aliases
    /// and physical qubits are rewritten; inside a subroutine body, formal
    /// register names map to the caller's qubits.
    pub(crate) fn resolve_operand(
        &mut self,
        operand: &GateOperand,
        qubits: bool,
    ) -> Result<Vec<GateOperand>> {
        let span = operand.span();
        match operand {
            GateOperand::HardwareQubit(hwq) => {
                let n = hwq.index().ok_or_else(|| {
                    Error::syntax(format!("malformed hardware qubit '{}'", hwq.name()), span)
                })?;
                let position = self.registers.resolve_physical(n);
                self.depths.add_qubit(DEVICE_REGISTER, position);
                Ok(vec![GateOperand::bit(DEVICE_REGISTER, position)])
            }
            GateOperand::Identifier(ident) => {
                let name = ident.name();
                let size = self.operand_register_size(name, qubits, span)?;
                let indices: Vec<usize> = (0..size).collect();
                self.map_operand_indices(name, &indices, qubits, span)
            }
            GateOperand::Indexed(indexed) => {
                let name = indexed.name();
                let size = self.operand_register_size(name, qubits, span)?;
                if indexed.indices().len() != 1 {
                    return Err(Error::range(
                        format!("invalid number of indices for register '{name}'"),
                        span,
                    ));
                }
                let indices: Vec<usize> = match &indexed.indices()[0] {
                    IndexKind::Expr(expr) => {
                        let (v, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                        vec![analyzer::validate_register_index(
                            v.as_int(span)?,
                            size,
                            qubits,
                            span,
                        )?]
                    }
                    IndexKind::Range(range) => {
                        let (start, stop, step) = self.evaluate_range_bounds(range)?;
                        analyzer::slice_indices(start, stop, step, size, qubits, span)?
                    }
                    IndexKind::Set(exprs) => {
                        let mut out = Vec::new();
                        for expr in exprs {
                            let (v, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                            out.push(analyzer::validate_register_index(
                                v.as_int(span)?,
                                size,
                                qubits,
                                span,
                            )?);
                        }
                        out
                    }
                    IndexKind::List(_) => {
                        return Err(Error::unsupported(
                            "multi-dimensional indices are not valid on registers",
                            span,
                        ))
                    }
                };
                self.map_operand_indices(name, &indices, qubits, span)
            }
        }
    }

    // Size of the register `name` in the current resolution context.
    fn operand_register_size(&self, name: &str, qubits: bool, span: Span) -> Result<usize> {
        if qubits {
            if let Some(sizes) = self.function_qreg_sizes.last() {
                if !self.scopes.in_gate_scope() {
                    if let Some(size) = sizes.get(name) {
                        return Ok(*size);
                    }
                }
            }
            if let Some(targets) = self.registers.alias_targets(name) {
                if !self.registers.label_in_scope(name) {
                    return Err(Error::undefined(
                        format!("alias '{name}' not in scope for this operation"),
                        span,
                    ));
                }
                return Ok(targets.len());
            }
            if let Some(size) = self.registers.qubit_register_size(name) {
                if !self.registers.label_in_scope(name) {
                    return Err(Error::undefined(
                        format!("register '{name}' not in scope for this operation"),
                        span,
                    ));
                }
                return Ok(size);
            }
        } else if let Some(size) = self.registers.classical_register_size(name) {
            return Ok(size);
        }
        Err(Error::undefined(
            format!("missing register declaration for '{name}'"),
            span,
        ))
    }

    // Map per-register indices through alias and subroutine-formal tables
    // into final (register, index) operands.
    fn map_operand_indices(
        &mut self,
        name: &str,
        indices: &[usize],
        qubits: bool,
        span: Span,
    ) -> Result<Vec<GateOperand>> {
        if qubits {
            if let Some(sizes) = self.function_qreg_sizes.last() {
                if !self.scopes.in_gate_scope() && sizes.contains_key(name) {
                    let transform = self.function_qreg_transforms.last().unwrap();
                    return indices
                        .iter()
                        .map(|idx| {
                            transform
                                .get(&(name.to_string(), *idx))
                                .map(|(reg, i)| GateOperand::bit(reg, *i))
                                .ok_or_else(|| {
                                    Error::range(
                                        format!("formal qubit '{name}[{idx}]' is out of range"),
                                        span,
                                    )
                                })
                        })
                        .collect();
                }
            }
            if let Some(targets) = self.registers.alias_targets(name) {
                let targets = targets.to_vec();
                return indices
                    .iter()
                    .map(|idx| {
                        targets.get(*idx).map(|(reg, i)| GateOperand::bit(reg, *i)).ok_or_else(
                            || {
                                Error::range(
                                    format!("alias index {idx} out of range for '{name}'"),
                                    span,
                                )
                            },
                        )
                    })
                    .collect();
            }
        }
        Ok(indices.iter().map(|idx| GateOperand::bit(name, *idx)).collect())
    }

    //
    // Quantum statements
    //

    fn visit_measurement(&mut self, measurement: &Measurement) -> Result<Vec<Stmt>> {
        debug!("visiting measurement statement");
        let span = measurement.span;
        let source_ids = self.resolve_operand(measurement.qubit(), true)?;

        let target_ids: Option<Vec<(String, usize)>> = match measurement.target() {
            Some(target) => {
                let name = target.name();
                if self.registers.classical_register_size(name).is_none() {
                    return Err(Error::undefined(
                        format!("missing register declaration for '{name}' in measurement"),
                        span,
                    ));
                }
                let as_operand = lvalue_to_operand(target);
                let resolved = self.resolve_operand(&as_operand, false)?;
                Some(
                    resolved
                        .iter()
                        .map(|op| {
                            let (reg, idx) = op.resolved_bit().unwrap();
                            (reg.to_string(), idx)
                        })
                        .collect(),
                )
            }
            None => None,
        };

        let mut out = Vec::new();
        match target_ids {
            Some(targets) => {
                if source_ids.len() != targets.len() {
                    return Err(Error::range(
                        "register sizes do not match for measurement operation",
                        span,
                    ));
                }
                for (src, (treg, tidx)) in source_ids.iter().zip(targets.iter()) {
                    let (sreg, sidx) = src.resolved_bit().unwrap();
                    self.depths.measure((sreg, sidx), (treg.as_str(), *tidx));
                    out.push(
                        Measurement::new(
                            src.clone(),
                            Some(LValue::bit(treg, *tidx)),
                            span,
                        )
                        .to_stmt(),
                    );
                }
            }
            None => {
                for src in &source_ids {
                    let (sreg, sidx) = src.resolved_bit().unwrap();
                    let node = self.depths.qubits.entry((sreg.to_string(), sidx)).or_default();
                    node.depth += 1;
                    node.num_measurements += 1;
                    out.push(Measurement::new(src.clone(), None, span).to_stmt());
                }
            }
        }
        Ok(self.maybe(out))
    }

    fn visit_reset(&mut self, reset: &Reset) -> Result<Vec<Stmt>> {
        debug!("visiting reset statement");
        let span = reset.span;
        let qubit_ids = self.resolve_operand(reset.target(), true)?;
        let mut out = Vec::new();
        for qubit in qubit_ids {
            let (reg, idx) = qubit.resolved_bit().unwrap();
            self.depths.reset(reg, idx);
            out.push(Reset::new(qubit.clone(), span).to_stmt());
        }
        Ok(self.maybe(out))
    }

    fn visit_barrier(&mut self, barrier: &Barrier) -> Result<Vec<Stmt>> {
        let span = barrier.span;
        // `barrier;` touches every declared qubit.
        let resolved: Vec<GateOperand> = if barrier.qubits().is_empty() {
            let mut all = Vec::new();
            let registers: Vec<(String, usize)> = self
                .registers
                .qubit_registers()
                .map(|(name, size)| (name.to_string(), size))
                .collect();
            for (name, size) in registers {
                for idx in 0..size {
                    all.push(GateOperand::bit(&name, idx));
                }
            }
            all
        } else {
            let mut all = Vec::new();
            for operand in barrier.qubits() {
                all.extend(self.resolve_operand(operand, true)?);
            }
            all
        };

        self.depths.barrier(&resolved_bits(&resolved));

        let out = if self.options.unroll_barriers {
            resolved
                .into_iter()
                .map(|q| Barrier::new(vec![q], span).to_stmt())
                .collect()
        } else {
            vec![Barrier::new(resolved, span).to_stmt()]
        };
        Ok(self.maybe(out))
    }

    fn visit_delay(&mut self, delay: &Delay) -> Result<Vec<Stmt>> {
        let span = delay.span;
        let (duration, _) = self.evaluate_expression(delay.duration(), false, Restriction::None)?;
        let folded = match &duration {
            Value::Duration(..) => duration.to_expr().unwrap(),
            other => {
                return Err(Error::type_error(
                    format!("delay requires a duration value, found '{}'", other.describe()),
                    span,
                ))
            }
        };
        let mut qubits = Vec::new();
        for operand in delay.qubits() {
            qubits.extend(self.resolve_operand(operand, true)?);
        }
        Ok(self.maybe(vec![Delay::new(folded, qubits, span).to_stmt()]))
    }

    fn visit_box(&mut self, box_stmt: &BoxStmt) -> Result<Vec<Stmt>> {
        let span = box_stmt.span;
        let duration = match box_stmt.duration() {
            Some(expr) => {
                let (value, _) = self.evaluate_expression(expr, false, Restriction::None)?;
                Some(value.to_expr().ok_or_else(|| {
                    Error::type_error("invalid box duration", span)
                })?)
            }
            None => None,
        };
        self.scopes.push(Context::Box_);
        let snapshot = self.depths.branch_begin();
        let body = self.visit_block(box_stmt.body());
        self.scopes.pop();
        let body = body?;
        self.depths.branch_end(&snapshot);
        Ok(self.maybe(vec![BoxStmt::new(duration, body, span).to_stmt()]))
    }

    //
    // Control flow
    //

    fn visit_branch(&mut self, branch: &Branch) -> Result<Vec<Stmt>> {
        let span = branch.span;
        if branch.if_block().is_empty() && branch.else_block().is_empty() {
            return Err(Error::syntax("missing if block", span));
        }

        if self.classical_register_in_expr(branch.condition()) {
            // The condition reads measurement results; it stays in the
            // output, reduced to single-bit tests.
            self.scopes.push(Context::Block);
            self.registers.push_label_scope();
            let snapshot = self.depths.branch_begin();
            let result = self.expand_runtime_branch(branch, span);
            self.registers.pop_label_scope();
            self.scopes.pop();
            let result = result?;
            self.depths.branch_end(&snapshot);
            return Ok(self.maybe(result));
        }

        // Compile-time condition: emit the chosen block only.
        let (value, _) = self.evaluate_expression(branch.condition(), false, Restriction::None)?;
        let chosen = if value.truthy(span)? {
            branch.if_block()
        } else {
            branch.else_block()
        };
        self.scopes.push(Context::Block);
        self.registers.push_label_scope();
        let result = self.visit_block(chosen);
        self.registers.pop_label_scope();
        self.scopes.pop();
        Ok(self.maybe(result?))
    }

    fn expand_runtime_branch(&mut self, branch: &Branch, span: Span) -> Result<Vec<Stmt>> {
        let if_block = self.visit_block(branch.if_block())?;
        let else_block = self.visit_block(branch.else_block())?;

        let condition = branch.condition();
        match condition {
            // `if (c)` over a whole register is ambiguous; only comparisons
            // and single-bit forms are supported.
            Expr::Identifier(ident) => Err(Error::unsupported(
                format!(
                    "only simple comparisons are supported on classical register '{}' in branch conditions",
                    ident.name()
                ),
                span,
            )),

            // `if (c[i])`
            Expr::Index(index) => {
                let (reg, idx) = self.branch_bit_ref(index, span)?;
                Ok(single_bit_branch(&reg, idx, true, if_block, else_block, span))
            }

            // `if (!c[i])`
            Expr::Unary(unary) => {
                if unary.op() != crate::ast::UnaryOp::Not {
                    return Err(Error::unsupported(
                        "only '!' is supported on a classical register in branch conditions",
                        span,
                    ));
                }
                match unary.operand() {
                    Expr::Index(index) => {
                        let (reg, idx) = self.branch_bit_ref(index, span)?;
                        Ok(single_bit_branch(&reg, idx, false, if_block, else_block, span))
                    }
                    _ => Err(Error::unsupported(
                        "only single-bit tests can be negated in branch conditions",
                        span,
                    )),
                }
            }

            Expr::Binary(bin) => {
                let op = bin.op();
                if !op.is_comparison() {
                    return Err(Error::unsupported(
                        "only {==, !=, >=, <=, >, <} are supported in branch conditions with a classical register",
                        span,
                    ));
                }
                let (rhs_value, _) =
                    self.evaluate_expression(bin.rhs(), false, Restriction::None)?;
                match bin.lhs() {
                    Expr::Identifier(ident) => {
                        let reg = ident.name().to_string();
                        let width = self
                            .registers
                            .classical_register_size(&reg)
                            .ok_or_else(|| {
                                Error::undefined(
                                    format!("missing register declaration for '{reg}'"),
                                    span,
                                )
                            })?;
                        let rhs = rhs_value.as_int(span)?;
                        analyzer::expand_register_condition(
                            &reg, width, op, rhs, if_block, else_block, span,
                        )
                    }
                    Expr::Index(index) => {
                        let (reg, idx) = self.branch_bit_ref(index, span)?;
                        let rhs = rhs_value.truthy(span)?;
                        expand_single_bit_comparison(
                            &reg, idx, op, rhs, if_block, else_block, span,
                        )
                    }
                    _ => Err(Error::unsupported(
                        "unsupported branch condition on a classical register",
                        span,
                    )),
                }
            }
            _ => Err(Error::unsupported(
                "unsupported branch condition on a classical register",
                span,
            )),
        }
    }

    fn branch_bit_ref(
        &mut self,
        index: &crate::ast::IndexExpression,
        span: Span,
    ) -> Result<(String, usize)> {
        let reg = match index.collection() {
            Expr::Identifier(ident) => ident.name().to_string(),
            _ => {
                return Err(Error::unsupported(
                    "unsupported branch condition on a classical register",
                    span,
                ))
            }
        };
        let size = self.registers.classical_register_size(&reg).ok_or_else(|| {
            Error::undefined(format!("missing register declaration for '{reg}'"), span)
        })?;
        let idx = match index.index() {
            IndexKind::Expr(expr) => {
                let (v, _) = self.evaluate_expression(expr, false, Restriction::Int)?;
                analyzer::validate_register_index(v.as_int(span)?, size, false, span)?
            }
            _ => {
                return Err(Error::unsupported(
                    "ranges and sets are not supported in branch conditions",
                    span,
                ))
            }
        };
        Ok((reg, idx))
    }

    fn visit_for(&mut self, for_loop: &For) -> Result<Vec<Stmt>> {
        let span = for_loop.span;
        let values: Vec<Value> = match for_loop.iterable() {
            ForIterable::Range(range) => {
                let (start, stop, step) = self.evaluate_range_bounds(range)?;
                analyzer::loop_range_values(start, stop, step, self.options.max_loop_iters, span)?
                    .into_iter()
                    .map(Value::Int)
                    .collect()
            }
            ForIterable::Set(exprs) => {
                let mut out = Vec::new();
                for expr in exprs {
                    let (v, _) = self.evaluate_expression(expr, false, Restriction::None)?;
                    out.push(v);
                }
                out
            }
            ForIterable::Expr(expr) => {
                return Err(Error::unsupported(
                    format!("unsupported for-loop iterable: {expr:?}"),
                    span,
                ))
            }
        };
        if values.len() > self.options.max_loop_iters {
            return Err(Error::range(
                format!(
                    "loop iteration limit {} exceeded ({} iterations)",
                    self.options.max_loop_iters,
                    values.len()
                ),
                span,
            ));
        }

        let (iter_ty, _) = self.resolve_type_spec(for_loop.type_spec(), false, span)?;
        let mut out = Vec::new();
        for value in values {
            self.scopes.push(Context::Block);
            let coerced = value::coerce(&value, &iter_ty, span);
            let result = coerced.and_then(|v| {
                let variable = Variable::new(for_loop.ident(), iter_ty.clone(), span)
                    .with_value(v)
                    .readonly();
                self.scopes.add_var(variable);
                self.visit_block(for_loop.body())
            });
            self.scopes.pop();
            out.extend(result?);
            if self.check_only {
                // Compile-time errors surface on the first iteration.
                return Ok(Vec::new());
            }
        }
        Ok(out)
    }

    fn visit_while(&mut self, while_loop: &While) -> Result<Vec<Stmt>> {
        let span = while_loop.span;
        if self.classical_register_in_expr(while_loop.condition()) {
            return Err(Error::unsupported(
                "while conditions reading measurement results cannot be unrolled",
                span,
            ));
        }
        let mut out = Vec::new();
        let mut iterations = 0usize;
        loop {
            let (value, _) =
                self.evaluate_expression(while_loop.condition(), false, Restriction::None)?;
            if !value.truthy(span)? {
                break;
            }
            iterations += 1;
            if iterations > self.options.max_loop_iters {
                return Err(Error::range(
                    format!(
                        "while loop exceeded the iteration limit {}",
                        self.options.max_loop_iters
                    ),
                    span,
                ));
            }
            self.scopes.push(Context::Block);
            let result = self.visit_block(while_loop.body());
            self.scopes.pop();
            out.extend(result?);
        }
        Ok(self.maybe(out))
    }

    fn visit_switch(&mut self, switch: &Switch) -> Result<Vec<Stmt>> {
        let span = switch.span;
        let (target, _) = self.evaluate_expression(switch.target(), false, Restriction::Int)?;
        let target = target.as_int(span)?;
        if switch.cases().is_empty() {
            return Err(Error::syntax(
                "switch statement must have at least one case",
                span,
            ));
        }

        let mut chosen: Option<&[Stmt]> = None;
        for case in switch.cases() {
            let mut seen = std::collections::HashSet::new();
            for label in case.labels() {
                let value = self.evaluate_const_int(label, span)?;
                if !seen.insert(value) {
                    return Err(Error::duplicate(
                        format!("duplicate case value {value} in switch statement"),
                        span,
                    ));
                }
                if value == target && chosen.is_none() {
                    chosen = Some(case.body());
                }
            }
            if chosen.is_some() {
                break;
            }
        }
        let block = match chosen {
            Some(stmts) => stmts,
            None => switch.default(),
        };
        for stmt in block {
            if matches!(
                stmt,
                Stmt::QuantumDeclaration(..)
                    | Stmt::ClassicalDeclaration(..)
                    | Stmt::GateDefinition(..)
                    | Stmt::SubroutineDefinition(..)
            ) {
                return Err(Error::unsupported(
                    "declarations and definitions are not allowed inside a switch case",
                    stmt.span(),
                ));
            }
        }
        self.scopes.push(Context::Block);
        let result = self.visit_block(block);
        self.scopes.pop();
        Ok(self.maybe(result?))
    }

    fn visit_expr_statement(&mut self, expr: &Expr, span: Span) -> Result<Vec<Stmt>> {
        match expr {
            Expr::Call(call) => {
                let (_, stmts) = self.visit_function_call(call)?;
                Ok(self.maybe(stmts))
            }
            other => {
                // Evaluate for validation; a bare classical expression emits
                // nothing.
                let _ = self.evaluate_expression(other, false, Restriction::None)?;
                let _ = span;
                Ok(Vec::new())
            }
        }
    }
}

// Positional binding of a gate definition's formal qubit names to the
// resolved actual operands.
fn bind_gate_qubits(
    definition: &GateDefinition,
    targets: &[GateOperand],
) -> HashMap<String, GateOperand> {
    definition
        .qubits()
        .iter()
        .zip(targets.iter())
        .map(|(formal, actual)| (formal.clone(), actual.clone()))
        .collect()
}

fn resolved_bits(operands: &[GateOperand]) -> Vec<(String, usize)> {
    operands
        .iter()
        .filter_map(|op| op.resolved_bit().map(|(r, i)| (r.to_string(), i)))
        .collect()
}

fn lvalue_to_expr(lvalue: &LValue) -> Expr {
    let mut expr = crate::ast::Ident::new(lvalue.name(), lvalue.span).to_expr();
    for index in lvalue.indices() {
        expr = crate::ast::IndexExpression::new(expr, index.clone(), lvalue.span).to_expr();
    }
    expr
}

fn lvalue_to_operand(lvalue: &LValue) -> GateOperand {
    if lvalue.indices().is_empty() {
        GateOperand::Identifier(crate::ast::Ident::new(lvalue.name(), lvalue.span))
    } else {
        GateOperand::Indexed(crate::ast::IndexedIdent::new(
            lvalue.name(),
            lvalue.indices().to_vec(),
            lvalue.span,
        ))
    }
}

fn single_bit_branch(
    reg: &str,
    index: usize,
    expected: bool,
    if_block: Vec<Stmt>,
    else_block: Vec<Stmt>,
    span: Span,
) -> Vec<Stmt> {
    let condition = crate::ast::BinaryExpr::new(
        BinaryOp::Eq,
        crate::ast::IndexExpression::new(
            crate::ast::Ident::new(reg, span).to_expr(),
            IndexKind::Expr(Expr::int(index as i64)),
            span,
        )
        .to_expr(),
        Expr::bool(expected),
        span,
    )
    .to_expr();
    vec![Branch::new(condition, if_block, else_block, span).to_stmt()]
}

// Single-bit ordered comparison: the register bit is 0 or 1, so every
// comparison either folds or reduces to an equality test.
fn expand_single_bit_comparison(
    reg: &str,
    index: usize,
    op: BinaryOp,
    rhs: bool,
    if_block: Vec<Stmt>,
    else_block: Vec<Stmt>,
    span: Span,
) -> Result<Vec<Stmt>> {
    use BinaryOp::*;
    let outcome = match (op, rhs) {
        (Eq, v) => Some(v),
        (Neq, v) => Some(!v),
        // c[i] >= 1 <=> c[i] == 1; c[i] >= 0 always true
        (Ge, true) => Some(true),
        (Ge, false) => None,
        (Gt, false) => Some(true),
        (Gt, true) => return Ok(else_block),
        (Le, true) => None,
        (Le, false) => Some(false),
        (Lt, true) => Some(false),
        (Lt, false) => return Ok(else_block),
        _ => {
            return Err(Error::unsupported(
                "unsupported comparison in branch condition",
                span,
            ))
        }
    };
    match outcome {
        Some(expected) => Ok(single_bit_branch(reg, index, expected, if_block, else_block, span)),
        // Statically true.
        None => Ok(if_block),
    }
}
