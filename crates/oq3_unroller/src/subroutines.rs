// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Subroutine call processing: positional argument binding (classical
// scalars by value, qubit registers by reference through a formal-to-actual
// transform map), body inlining, and return handling.

use hashbrown::HashMap;

use crate::ast::{
    Expr, FunctionCall, GateOperand, Ident, IndexedIdent, Span, Stmt, SubroutineParam, Variable,
};
use crate::error::{Error, Result};
use crate::evaluator::Restriction;
use crate::scope::Context;
use crate::types::Type;
use crate::value::{self, Value};
use crate::visitor::QasmVisitor;

impl QasmVisitor {
    pub(crate) fn visit_function_call(
        &mut self,
        call: &FunctionCall,
    ) -> Result<(Option<Value>, Vec<Stmt>)> {
        let span = call.span;
        let fn_name = call.name();
        let definition = match self.subroutines.get(fn_name) {
            Some(definition) => definition.clone(),
            None => {
                return Err(Error::undefined(
                    format!("undefined subroutine '{fn_name}' was called"),
                    span,
                ))
            }
        };

        if call.args().len() != definition.params().len() {
            return Err(Error::arity(
                format!(
                    "parameter count mismatch for subroutine '{fn_name}'. Expected {} but got {} in call",
                    definition.params().len(),
                    call.args().len()
                ),
                span,
            ));
        }

        let mut classical_vars: Vec<Variable> = Vec::new();
        let mut quantum_vars: Vec<Variable> = Vec::new();
        let mut formal_qreg_sizes: HashMap<String, usize> = HashMap::new();
        let mut qubit_transform: HashMap<(String, usize), (String, usize)> = HashMap::new();
        // register name -> already-claimed qubit ids, for duplicate checks
        let mut claimed: HashMap<String, std::collections::HashSet<usize>> = HashMap::new();

        for (actual, formal) in call.args().iter().zip(definition.params().iter()) {
            match formal {
                SubroutineParam::Classical { type_spec, name } => {
                    let variable =
                        self.process_classical_arg(type_spec, name, actual, fn_name, span)?;
                    classical_vars.push(variable);
                }
                SubroutineParam::Quantum { name, size } => {
                    let variable = self.process_quantum_arg(
                        name,
                        size.as_ref(),
                        actual,
                        &mut formal_qreg_sizes,
                        &mut qubit_transform,
                        &mut claimed,
                        fn_name,
                        span,
                    )?;
                    quantum_vars.push(variable);
                }
            }
        }

        self.scopes.push(Context::Function);
        self.registers.push_label_scope();
        for variable in quantum_vars {
            self.registers.add_label(&variable.name);
            self.scopes.add_var(variable);
        }
        for variable in classical_vars {
            self.scopes.add_var(variable);
        }
        self.function_qreg_sizes.push(formal_qreg_sizes);
        self.function_qreg_transforms.push(qubit_transform);

        let result = self.run_subroutine_body(&definition, span);

        self.function_qreg_transforms.pop();
        self.function_qreg_sizes.pop();
        self.registers.pop_label_scope();
        self.scopes.pop();

        result
    }

    fn run_subroutine_body(
        &mut self,
        definition: &crate::ast::SubroutineDefinition,
        span: Span,
    ) -> Result<(Option<Value>, Vec<Stmt>)> {
        let mut out = Vec::new();
        let mut return_value: Option<Value> = None;
        let mut returned = false;
        for stmt in definition.body() {
            if let Stmt::Return(ret) = stmt {
                returned = true;
                if let Some(expr) = ret.value() {
                    let (value, stmts) =
                        self.evaluate_expression(expr, false, Restriction::None)?;
                    out.extend(stmts);
                    return_value = Some(value);
                }
                break;
            }
            out.extend(self.visit_statement(stmt)?);
        }

        // Validate the returned value against the signature.
        match definition.return_type() {
            Some(type_spec) => {
                let (ty, _) = self.resolve_type_spec(type_spec, false, span)?;
                match return_value {
                    Some(value) => {
                        let coerced = value::coerce(&value, &ty, span)?;
                        Ok((Some(coerced), out))
                    }
                    None => Err(Error::type_error(
                        format!(
                            "subroutine '{}' expects a return value of type '{ty}'",
                            definition.name()
                        ),
                        span,
                    )),
                }
            }
            None => {
                if returned && return_value.is_some() {
                    return Err(Error::type_error(
                        format!(
                            "subroutine '{}' does not declare a return type",
                            definition.name()
                        ),
                        span,
                    ));
                }
                Ok((None, out))
            }
        }
    }

    fn process_classical_arg(
        &mut self,
        type_spec: &crate::ast::TypeSpec,
        formal_name: &str,
        actual: &Expr,
        fn_name: &str,
        span: Span,
    ) -> Result<Variable> {
        // A qubit register is not acceptable where a classical value is
        // expected.
        if let Expr::Identifier(ident) = actual {
            if self.registers.qubit_register_size(ident.name()).is_some() {
                return Err(Error::type_error(
                    format!(
                        "expecting a classical argument for '{formal_name}'; qubit register '{}' found for function '{fn_name}'",
                        ident.name()
                    ),
                    span,
                ));
            }
        }
        let (value, _) = self.evaluate_expression(actual, false, Restriction::None)?;
        let (ty, dims) = self.resolve_type_spec(type_spec, false, span)?;
        let coerced = value::coerce(&value, &ty, span)?;
        let mut variable = Variable::new(formal_name, ty, span).with_value(coerced);
        variable.dims = dims;
        Ok(variable)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_quantum_arg(
        &mut self,
        formal_name: &str,
        formal_size: Option<&Expr>,
        actual: &Expr,
        formal_qreg_sizes: &mut HashMap<String, usize>,
        qubit_transform: &mut HashMap<(String, usize), (String, usize)>,
        claimed: &mut HashMap<String, std::collections::HashSet<usize>>,
        fn_name: &str,
        span: Span,
    ) -> Result<Variable> {
        let formal_size = match formal_size {
            Some(expr) => {
                let size = self.evaluate_const_int(expr, span)?;
                if size <= 0 {
                    return Err(Error::type_error(
                        format!(
                            "invalid qubit size '{size}' for variable '{formal_name}' in function '{fn_name}'"
                        ),
                        span,
                    ));
                }
                size as usize
            }
            None => 1,
        };

        let operand = expr_to_gate_operand(actual).ok_or_else(|| {
            Error::type_error(
                format!(
                    "expecting a qubit argument for '{formal_name}' in function '{fn_name}'"
                ),
                span,
            )
        })?;
        let resolved = self.resolve_operand(&operand, true)?;
        if resolved.len() != formal_size {
            return Err(Error::arity(
                format!(
                    "qubit register size mismatch for function '{fn_name}'. Expected {formal_size} qubits in variable '{formal_name}' but got {}",
                    resolved.len()
                ),
                span,
            ));
        }

        for (position, target) in resolved.iter().enumerate() {
            let (reg, idx) = target.resolved_bit().unwrap();
            if !claimed.entry(reg.to_string()).or_default().insert(idx) {
                return Err(Error::duplicate(
                    format!(
                        "duplicate qubit argument for register '{reg}' in function call for '{fn_name}'"
                    ),
                    span,
                ));
            }
            qubit_transform.insert(
                (formal_name.to_string(), position),
                (reg.to_string(), idx),
            );
        }
        formal_qreg_sizes.insert(formal_name.to_string(), formal_size);

        Ok(Variable::new(formal_name, Type::QubitArray(formal_size), span).qubit())
    }
}

// Quantum actual arguments arrive as expressions; only identifier and
// indexed-identifier shapes name qubits.
fn expr_to_gate_operand(expr: &Expr) -> Option<GateOperand> {
    match expr {
        Expr::Identifier(ident) => Some(GateOperand::Identifier(Ident::new(
            ident.name(),
            ident.span,
        ))),
        Expr::HardwareQubit(hwq) => Some(GateOperand::HardwareQubit(hwq.clone())),
        Expr::Index(index) => {
            let name = match index.collection() {
                Expr::Identifier(ident) => ident.name().to_string(),
                _ => return None,
            };
            Some(GateOperand::Indexed(IndexedIdent::new(
                name,
                vec![index.index().clone()],
                index.span,
            )))
        }
        _ => None,
    }
}
