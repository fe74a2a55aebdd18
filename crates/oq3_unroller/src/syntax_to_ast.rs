// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Build the statement tree defined in ast.rs from the syntactic CST
// constructed in the crate oq3_syntax. Identifiers stay as names; binding
// happens later, during the unrolling walk.

use std::path::PathBuf;

use oq3_source_file::SourceTrait;
use oq3_syntax::ast as synast; // Syntactic AST
use oq3_syntax::AstNode;

// traits
use synast::{HasArgList, HasName, HasTextName};

use crate::ast;
use crate::ast::{Expr, Span, Stmt};
use crate::error::{Error, Result};

fn span_of<N: AstNode>(node: &N) -> Span {
    Some(node.syntax().text_range())
}

/// Parse preprocessed source text into a `Program`. The version string was
/// already extracted and normalized by the preprocessor.
pub(crate) fn parse_program(source: &str, version: &str) -> Result<ast::Program> {
    let parsed = oq3_source_file::parse_source_string(source, None, None::<&[PathBuf]>);
    if parsed.any_parse_errors() {
        let errors = parsed.syntax_ast().errors();
        let (message, span) = errors
            .first()
            .map(|err| (err.message().to_string(), Some(err.range())))
            .unwrap_or_else(|| ("failed to parse OpenQASM source".to_string(), None));
        return Err(Error::syntax(
            format!("failed to parse OpenQASM string: {message}"),
            span,
        ));
    }
    let mut statements = Vec::new();
    for syn_stmt in parsed.syntax_ast().tree().statements() {
        if let Some(stmt) = from_stmt(syn_stmt)? {
            statements.push(stmt);
        }
    }
    Ok(ast::Program::new(version, statements))
}

fn from_stmt(stmt: synast::Stmt) -> Result<Option<Stmt>> {
    let converted = match stmt {
        synast::Stmt::Include(include) => {
            let file = include
                .file()
                .and_then(|f| f.to_string())
                .ok_or_else(|| Error::include("malformed include statement", span_of(&include)))?;
            Some(ast::Include::new(file, span_of(&include)).to_stmt())
        }

        synast::Stmt::QuantumDeclarationStatement(q_decl) => {
            let span = span_of(&q_decl);
            match q_decl.name() {
                Some(name) => {
                    let size = q_decl
                        .qubit_type()
                        .and_then(|t| t.designator())
                        .and_then(|d| d.expr())
                        .map(from_expr)
                        .transpose()?;
                    Some(ast::QuantumDeclaration::new(name.string(), size, span).to_stmt())
                }
                None => {
                    // `qubit $0;` style declarations are not meaningful: the
                    // physical pool is implicit.
                    return Err(Error::unsupported(
                        "declaring a hardware qubit is not supported",
                        span,
                    ));
                }
            }
        }

        synast::Stmt::ClassicalDeclarationStatement(type_decl) => {
            Some(from_classical_declaration(&type_decl)?)
        }

        synast::Stmt::IODeclarationStatement(io_decl) => {
            let span = span_of(&io_decl);
            let scalar = io_decl.scalar_type().ok_or_else(|| {
                Error::unsupported("array types are not supported in IO declarations", span)
            })?;
            let type_spec = from_scalar_type(&scalar)?;
            let name = io_decl
                .name()
                .ok_or_else(|| Error::syntax("IO declaration without a name", span))?;
            Some(
                ast::IODeclaration::new(io_decl.input_token().is_some(), type_spec, name.string(), span)
                    .to_stmt(),
            )
        }

        synast::Stmt::AssignmentStmt(assignment) => Some(from_assignment_stmt(&assignment)?),

        synast::Stmt::AliasDeclarationStatement(alias) => {
            let span = span_of(&alias);
            let name = alias
                .name()
                .ok_or_else(|| Error::syntax("alias without a name", span))?;
            let rhs = alias
                .expr()
                .ok_or_else(|| Error::syntax("alias without a right-hand side", span))?;
            Some(ast::Alias::new(name.string(), from_expr(rhs)?, span).to_stmt())
        }

        synast::Stmt::Gate(gate) => {
            let span = span_of(&gate);
            let name = gate
                .name()
                .ok_or_else(|| Error::syntax("gate definition without a name", span))?;
            let params = param_names(gate.angle_params());
            let qubits = param_names(gate.qubit_params());
            let body = match gate.body() {
                Some(block) => block_to_stmts(block)?,
                None => Vec::new(),
            };
            Some(ast::GateDefinition::new(name.string(), params, qubits, body, span).to_stmt())
        }

        synast::Stmt::Def(def_stmt) => {
            let span = span_of(&def_stmt);
            let name = def_stmt
                .name()
                .ok_or_else(|| Error::syntax("def without a name", span))?;
            let params = match def_stmt.typed_param_list() {
                Some(param_list) => param_list
                    .typed_params()
                    .map(|param| from_typed_param(&param))
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            let return_type = def_stmt
                .return_signature()
                .and_then(|sig| sig.scalar_type())
                .map(|st| from_scalar_type(&st))
                .transpose()?;
            let body = match def_stmt.body() {
                Some(block) => block_to_stmts(block)?,
                None => Vec::new(),
            };
            Some(
                ast::SubroutineDefinition::new(name.string(), params, return_type, body, span)
                    .to_stmt(),
            )
        }

        synast::Stmt::IfStmt(if_stmt) => {
            let span = span_of(&if_stmt);
            let condition = if_stmt
                .condition()
                .ok_or_else(|| Error::syntax("if statement without a condition", span))?;
            let then_branch = if_stmt
                .then_branch()
                .map(block_to_stmts)
                .transpose()?
                .unwrap_or_default();
            let else_branch = if_stmt
                .else_branch()
                .map(block_to_stmts)
                .transpose()?
                .unwrap_or_default();
            Some(ast::Branch::new(from_expr(condition)?, then_branch, else_branch, span).to_stmt())
        }

        synast::Stmt::WhileStmt(while_stmt) => {
            let span = span_of(&while_stmt);
            let condition = while_stmt
                .condition()
                .ok_or_else(|| Error::syntax("while statement without a condition", span))?;
            let body = while_stmt
                .body()
                .map(block_to_stmts)
                .transpose()?
                .unwrap_or_default();
            Some(ast::While::new(from_expr(condition)?, body, span).to_stmt())
        }

        synast::Stmt::ForStmt(for_stmt) => Some(from_for_stmt(&for_stmt)?),

        synast::Stmt::SwitchCaseStmt(switch_stmt) => Some(from_switch_stmt(&switch_stmt)?),

        synast::Stmt::Barrier(barrier) => {
            let span = span_of(&barrier);
            let qubits = match barrier.qubit_list() {
                Some(qubit_list) => gate_operands(&qubit_list)?,
                None => Vec::new(),
            };
            Some(ast::Barrier::new(qubits, span).to_stmt())
        }

        synast::Stmt::DelayStmt(delay_stmt) => {
            let span = span_of(&delay_stmt);
            let duration = delay_stmt
                .designator()
                .and_then(|d| d.expr())
                .ok_or_else(|| Error::syntax("delay without a duration", span))?;
            let qubits = match delay_stmt.qubit_list() {
                Some(qubit_list) => gate_operands(&qubit_list)?,
                None => Vec::new(),
            };
            Some(ast::Delay::new(from_expr(duration)?, qubits, span).to_stmt())
        }

        synast::Stmt::Reset(reset) => {
            let span = span_of(&reset);
            let operand = reset
                .gate_operand()
                .ok_or_else(|| Error::syntax("reset without an operand", span))?;
            Some(ast::Reset::new(from_gate_operand(operand)?, span).to_stmt())
        }

        synast::Stmt::Measure(measure) => {
            // Bare `measure q;` with no target.
            let span = span_of(&measure);
            let operand = measure
                .qubit()
                .ok_or_else(|| Error::syntax("measure without an operand", span))?;
            Some(ast::Measurement::new(from_expr_gate_operand(operand)?, None, span).to_stmt())
        }

        synast::Stmt::ExprStmt(expr_stmt) => from_expr_stmt(&expr_stmt)?,

        synast::Stmt::BreakStmt(break_stmt) => Some(Stmt::Break(span_of(&break_stmt))),
        synast::Stmt::ContinueStmt(continue_stmt) => Some(Stmt::Continue(span_of(&continue_stmt))),
        synast::Stmt::EndStmt(end_stmt) => Some(Stmt::End(span_of(&end_stmt))),

        synast::Stmt::PragmaStatement(pragma) => {
            Some(ast::Pragma::new(pragma.pragma_text(), span_of(&pragma)).to_stmt())
        }
        synast::Stmt::AnnotationStatement(annotation) => {
            Some(ast::Annotation::new(annotation.annotation_text(), span_of(&annotation)).to_stmt())
        }

        // The version line was already consumed by the preprocessor.
        synast::Stmt::VersionString(_) => None,

        // OpenPulse blocks pass through without semantic analysis.
        synast::Stmt::Cal(ref cal) => Some(Stmt::Cal(verbatim(cal))),
        synast::Stmt::DefCal(ref defcal) => Some(Stmt::DefCal(verbatim(defcal))),
        synast::Stmt::DefCalGrammar(ref defcalgrammar) => {
            Some(Stmt::DefCalGrammar(verbatim(defcalgrammar)))
        }

        other => {
            return Err(Error::unsupported(
                format!("unsupported statement: {}", other.syntax().text()),
                span_of(&other),
            ))
        }
    };
    Ok(converted)
}

fn verbatim<N: AstNode>(node: &N) -> ast::VerbatimBlock {
    ast::VerbatimBlock::new(node.syntax().text().to_string(), span_of(node))
}

fn param_names(param_list: Option<synast::ParamList>) -> Vec<String> {
    param_list
        .map(|list| list.params().map(|p| p.string()).collect())
        .unwrap_or_default()
}

fn from_typed_param(param: &synast::TypedParam) -> Result<ast::SubroutineParam> {
    let span = span_of(param);
    let name = param
        .name()
        .ok_or_else(|| Error::syntax("parameter without a name", span))?
        .string();
    let scalar = param
        .scalar_type()
        .ok_or_else(|| Error::syntax("parameter without a type", span))?;
    if matches!(scalar.kind(), synast::ScalarTypeKind::Qubit) {
        let size = scalar
            .designator()
            .and_then(|d| d.expr())
            .map(from_expr)
            .transpose()?;
        return Ok(ast::SubroutineParam::Quantum { name, size });
    }
    Ok(ast::SubroutineParam::Classical {
        type_spec: from_scalar_type(&scalar)?,
        name,
    })
}

fn from_classical_declaration(type_decl: &synast::ClassicalDeclarationStatement) -> Result<Stmt> {
    let span = span_of(type_decl);
    let name = type_decl
        .name()
        .ok_or_else(|| Error::syntax("declaration without a name", span))?
        .string();
    let initializer = type_decl.expr().map(from_expr).transpose()?;
    let is_const = type_decl.const_token().is_some();

    let type_spec = if let Some(array_type) = type_decl.array_type() {
        let scalar = array_type
            .scalar_type()
            .ok_or_else(|| Error::syntax("array type without an element type", span))?;
        let mut spec = from_scalar_type(&scalar)?;
        let dims = array_type
            .expression_list()
            .map(|list| list.exprs().map(from_expr).collect::<Result<Vec<_>>>())
            .transpose()?
            .unwrap_or_default();
        spec.dims = dims;
        spec
    } else {
        let scalar = type_decl
            .scalar_type()
            .ok_or_else(|| Error::syntax("declaration without a type", span))?;
        from_scalar_type(&scalar)?
    };

    // `qubit` parses as a scalar type kind; route it to the quantum
    // declaration handler instead.
    if type_spec.kind() == ast::TypeKind::Qubit {
        let width = type_spec.width;
        return Ok(ast::QuantumDeclaration::new(name, width, span).to_stmt());
    }

    Ok(ast::ClassicalDeclaration::new(type_spec, name, initializer, is_const, span).to_stmt())
}

fn from_scalar_type(scalar_type: &synast::ScalarType) -> Result<ast::TypeSpec> {
    use synast::ScalarTypeKind;
    let span = span_of(scalar_type);
    // For `complex[float[64]]` the inner float carries the designator.
    let designator = if let Some(float_type) = scalar_type.scalar_type() {
        float_type.designator()
    } else {
        scalar_type.designator()
    };
    let width = designator.and_then(|d| d.expr()).map(from_expr).transpose()?;
    let kind = match scalar_type.kind() {
        ScalarTypeKind::Bit => ast::TypeKind::Bit,
        ScalarTypeKind::Bool => ast::TypeKind::Bool,
        ScalarTypeKind::Int => ast::TypeKind::Int,
        ScalarTypeKind::UInt => ast::TypeKind::UInt,
        ScalarTypeKind::Float => ast::TypeKind::Float,
        ScalarTypeKind::Angle => ast::TypeKind::Angle,
        ScalarTypeKind::Complex => ast::TypeKind::Complex,
        ScalarTypeKind::Duration => ast::TypeKind::Duration,
        ScalarTypeKind::Stretch => ast::TypeKind::Stretch,
        ScalarTypeKind::Qubit => ast::TypeKind::Qubit,
        ScalarTypeKind::None => {
            return Err(Error::syntax("malformed type", span));
        }
    };
    Ok(ast::TypeSpec::new(kind, width, Vec::new(), span))
}

fn from_for_stmt(for_stmt: &synast::ForStmt) -> Result<Stmt> {
    let span = span_of(for_stmt);
    let loop_var = for_stmt
        .loop_var()
        .ok_or_else(|| Error::syntax("for loop without an iteration variable", span))?;
    let scalar = for_stmt
        .scalar_type()
        .ok_or_else(|| Error::syntax("for loop without an iteration type", span))?;
    let type_spec = from_scalar_type(&scalar)?;
    let iterable_ast = for_stmt
        .for_iterable()
        .ok_or_else(|| Error::syntax("for loop without an iterable", span))?;
    let iterable = if let Some(set_expression) = iterable_ast.set_expression() {
        ast::ForIterable::Set(expression_list(set_expression.expression_list())?)
    } else if let Some(range_expr) = iterable_ast.range_expr() {
        ast::ForIterable::Range(from_range_expr(&range_expr)?)
    } else if let Some(expr) = iterable_ast.for_iterable_expr() {
        ast::ForIterable::Expr(from_expr(expr)?)
    } else {
        return Err(Error::syntax("malformed for-loop iterable", span));
    };
    let body = {
        use oq3_syntax::ast::HasLoopBody;
        for_stmt
            .loop_body()
            .map(block_to_stmts)
            .transpose()?
            .unwrap_or_default()
    };
    Ok(ast::For::new(type_spec, loop_var.string(), iterable, body, span).to_stmt())
}

fn from_switch_stmt(switch_stmt: &synast::SwitchCaseStmt) -> Result<Stmt> {
    let span = span_of(switch_stmt);
    let control = switch_stmt
        .control()
        .ok_or_else(|| Error::syntax("switch without a control expression", span))?;
    let mut cases = Vec::new();
    for case_expr in switch_stmt.case_exprs() {
        let labels = expression_list(case_expr.expression_list())?;
        let body = match case_expr.block_expr() {
            Some(block) => block_to_stmts(block)?,
            None => Vec::new(),
        };
        cases.push(ast::SwitchCase::new(labels, body));
    }
    let default = switch_stmt
        .default_block()
        .map(block_to_stmts)
        .transpose()?
        .unwrap_or_default();
    Ok(ast::Switch::new(from_expr(control)?, cases, default, span).to_stmt())
}

fn from_assignment_stmt(assignment: &synast::AssignmentStmt) -> Result<Stmt> {
    let span = span_of(assignment);
    let rhs = assignment
        .rhs()
        .ok_or_else(|| Error::syntax("assignment without a right-hand side", span))?;
    let lvalue = if let Some(name) = assignment.identifier() {
        ast::LValue::new(name.string(), Vec::new(), span_of(&name))
    } else {
        let indexed = assignment
            .indexed_identifier()
            .ok_or_else(|| Error::syntax("malformed assignment target", span))?;
        let (name, indices) = from_indexed_identifier(&indexed)?;
        ast::LValue::new(name, indices, span_of(&indexed))
    };
    // `c = measure q;` arrives as an assignment whose rhs is a measure.
    if let synast::Expr::MeasureExpression(measure) = &rhs {
        let operand = measure
            .gate_operand()
            .ok_or_else(|| Error::syntax("measure without an operand", span))?;
        return Ok(ast::Measurement::new(from_gate_operand(operand)?, Some(lvalue), span).to_stmt());
    }
    Ok(ast::Assignment::new(lvalue, None, from_expr(rhs)?, span).to_stmt())
}

// Gate calls, gphase, subroutine calls, compound assignments and bare
// measure/return expressions all arrive wrapped in `ExprStmt`.
fn from_expr_stmt(expr_stmt: &synast::ExprStmt) -> Result<Option<Stmt>> {
    let span = span_of(expr_stmt);
    let expr = match expr_stmt.expr() {
        Some(expr) => expr,
        None => return Ok(None),
    };
    match expr {
        synast::Expr::GateCallExpr(gate_call) => {
            Ok(Some(from_gate_call(&gate_call, Vec::new(), span)?))
        }

        synast::Expr::ModifiedGateCallExpr(mod_gate_call) => {
            let modifiers = mod_gate_call
                .modifiers()
                .map(|modifier| from_modifier(modifier))
                .collect::<Result<Vec<_>>>()?;
            if let Some(gate_call) = mod_gate_call.gate_call_expr() {
                Ok(Some(from_gate_call(&gate_call, modifiers, span)?))
            } else {
                let gphase = mod_gate_call.g_phase_call_expr().ok_or_else(|| {
                    Error::syntax("modifier applied to a non-gate expression", span)
                })?;
                let arg = gphase
                    .arg()
                    .ok_or_else(|| Error::syntax("gphase without an argument", span))?;
                Ok(Some(
                    ast::GPhase::new(from_expr(arg)?, Vec::new(), modifiers, span).to_stmt(),
                ))
            }
        }

        synast::Expr::GPhaseCallExpr(gphase) => {
            let arg = gphase
                .arg()
                .ok_or_else(|| Error::syntax("gphase without an argument", span))?;
            Ok(Some(
                ast::GPhase::new(from_expr(arg)?, Vec::new(), Vec::new(), span).to_stmt(),
            ))
        }

        synast::Expr::MeasureExpression(measure) => {
            let operand = measure
                .gate_operand()
                .ok_or_else(|| Error::syntax("measure without an operand", span))?;
            Ok(Some(
                ast::Measurement::new(from_gate_operand(operand)?, None, span).to_stmt(),
            ))
        }

        synast::Expr::ReturnExpr(return_expr) => {
            let value = return_expr.expr().map(from_expr).transpose()?;
            Ok(Some(ast::Return::new(value, span).to_stmt()))
        }

        synast::Expr::BoxExpr(box_expr) => {
            let body = match box_expr.expr() {
                Some(synast::Expr::BlockExpr(block)) => block_to_stmts(block)?,
                Some(other) => {
                    vec![from_stmt_from_expr(other, span)?]
                }
                None => Vec::new(),
            };
            Ok(Some(ast::BoxStmt::new(None, body, span).to_stmt()))
        }

        // Compound assignment (`a += b`) parses as a binary expression with
        // an assignment operator.
        synast::Expr::BinExpr(bin_expr)
            if matches!(
                bin_expr.op_kind(),
                Some(synast::BinaryOp::Assignment { .. })
            ) =>
        {
            let op = match bin_expr.op_kind() {
                Some(synast::BinaryOp::Assignment { op: Some(arith) }) => {
                    Some(from_arith_op(arith, span)?)
                }
                _ => None,
            };
            let lhs = bin_expr
                .lhs()
                .ok_or_else(|| Error::syntax("assignment without a target", span))?;
            let lvalue = match lhs {
                synast::Expr::Identifier(name) => {
                    ast::LValue::new(name.string(), Vec::new(), span_of(&name))
                }
                synast::Expr::IndexedIdentifier(indexed) => {
                    let (name, indices) = from_indexed_identifier(&indexed)?;
                    ast::LValue::new(name, indices, span_of(&indexed))
                }
                other => {
                    return Err(Error::syntax(
                        format!("invalid assignment target: {}", other.syntax().text()),
                        span,
                    ))
                }
            };
            let rhs = bin_expr
                .rhs()
                .ok_or_else(|| Error::syntax("assignment without a right-hand side", span))?;
            Ok(Some(
                ast::Assignment::new(lvalue, op, from_expr(rhs)?, span).to_stmt(),
            ))
        }

        other => Ok(Some(
            ast::ExprStmt::new(from_expr(other)?, span).to_stmt(),
        )),
    }
}

// A statement-shaped expression in a position where a statement list is
// expected (e.g. an unbraced box body).
fn from_stmt_from_expr(expr: synast::Expr, span: Span) -> Result<Stmt> {
    match expr {
        synast::Expr::GateCallExpr(gate_call) => from_gate_call(&gate_call, Vec::new(), span),
        other => Ok(ast::ExprStmt::new(from_expr(other)?, span).to_stmt()),
    }
}

fn from_modifier(modifier: synast::Modifier) -> Result<ast::GateModifier> {
    match modifier {
        synast::Modifier::InvModifier(_) => Ok(ast::GateModifier::Inv),
        synast::Modifier::PowModifier(pow_mod) => {
            let span = span_of(&pow_mod);
            let exponent = pow_mod
                .paren_expr()
                .and_then(|p| p.expr())
                .ok_or_else(|| Error::syntax("pow modifier without an exponent", span))?;
            Ok(ast::GateModifier::Pow(from_expr(exponent)?))
        }
        synast::Modifier::CtrlModifier(ctrl_mod) => {
            let count = ctrl_mod
                .paren_expr()
                .and_then(|p| p.expr())
                .map(from_expr)
                .transpose()?;
            Ok(ast::GateModifier::Ctrl(count))
        }
        synast::Modifier::NegCtrlModifier(neg_ctrl_mod) => {
            let count = neg_ctrl_mod
                .paren_expr()
                .and_then(|p| p.expr())
                .map(from_expr)
                .transpose()?;
            Ok(ast::GateModifier::NegCtrl(count))
        }
    }
}

fn from_gate_call(
    gate_call: &synast::GateCallExpr,
    modifiers: Vec<ast::GateModifier>,
    span: Span,
) -> Result<Stmt> {
    let name = gate_call
        .identifier()
        .ok_or_else(|| Error::syntax("gate call without a name", span))?
        .string();
    let params = match gate_call.arg_list() {
        Some(arg_list) => expression_list(arg_list.expression_list())?,
        None => Vec::new(),
    };
    let qubits = match gate_call.qubit_list() {
        Some(qubit_list) => gate_operands(&qubit_list)?,
        None => Vec::new(),
    };
    Ok(ast::GateCall::new(name, params, qubits, modifiers, span).to_stmt())
}

fn gate_operands(qubit_list: &synast::QubitList) -> Result<Vec<ast::GateOperand>> {
    qubit_list
        .gate_operands()
        .map(from_gate_operand)
        .collect::<Result<Vec<_>>>()
}

fn from_gate_operand(operand: synast::GateOperand) -> Result<ast::GateOperand> {
    match operand {
        synast::GateOperand::Identifier(ref identifier) => Ok(ast::GateOperand::Identifier(
            ast::Ident::new(identifier.string(), span_of(identifier)),
        )),
        synast::GateOperand::HardwareQubit(ref hwq) => Ok(ast::GateOperand::HardwareQubit(
            ast::HardwareQubit::new(hwq.string(), span_of(hwq)),
        )),
        synast::GateOperand::IndexedIdentifier(ref indexed) => {
            let span = span_of(indexed);
            let (name, indices) = from_indexed_identifier(indexed)?;
            Ok(ast::GateOperand::Indexed(ast::IndexedIdent::new(
                name, indices, span,
            )))
        }
    }
}

fn from_expr_gate_operand(expr: synast::Expr) -> Result<ast::GateOperand> {
    let span = span_of(&expr);
    match expr {
        synast::Expr::Identifier(ref identifier) => Ok(ast::GateOperand::Identifier(
            ast::Ident::new(identifier.string(), span_of(identifier)),
        )),
        synast::Expr::HardwareQubit(ref hwq) => Ok(ast::GateOperand::HardwareQubit(
            ast::HardwareQubit::new(hwq.string(), span_of(hwq)),
        )),
        synast::Expr::IndexedIdentifier(ref indexed) => {
            let span = span_of(indexed);
            let (name, indices) = from_indexed_identifier(indexed)?;
            Ok(ast::GateOperand::Indexed(ast::IndexedIdent::new(
                name, indices, span,
            )))
        }
        _ => Err(Error::syntax("malformed measure operand", span)),
    }
}

fn from_indexed_identifier(
    indexed: &synast::IndexedIdentifier,
) -> Result<(String, Vec<ast::IndexKind>)> {
    let span = span_of(indexed);
    let name = indexed
        .identifier()
        .ok_or_else(|| Error::syntax("indexed identifier without a name", span))?
        .string();
    let indices = indexed
        .index_operators()
        .map(|op| from_index_operator(op))
        .collect::<Result<Vec<_>>>()?;
    Ok((name, indices))
}

fn from_index_operator(index_op: synast::IndexOperator) -> Result<ast::IndexKind> {
    let span = span_of(&index_op);
    match index_op.index_kind() {
        Some(synast::IndexKind::SetExpression(set_expression)) => Ok(ast::IndexKind::Set(
            expression_list(set_expression.expression_list())?,
        )),
        Some(synast::IndexKind::ExpressionList(expression_list_syn)) => {
            let mut exprs = expression_list_syn
                .exprs()
                .map(from_expr)
                .collect::<Result<Vec<_>>>()?;
            if exprs.len() == 1 {
                match exprs.pop().unwrap() {
                    Expr::Range(range) => Ok(ast::IndexKind::Range(*range)),
                    single => Ok(ast::IndexKind::Expr(single)),
                }
            } else {
                // Multi-dimensional index `a[i, j]`.
                Ok(ast::IndexKind::List(exprs))
            }
        }
        None => Err(Error::syntax("malformed index operator", span)),
    }
}

fn expression_list(list: Option<synast::ExpressionList>) -> Result<Vec<Expr>> {
    match list {
        Some(list) => list.exprs().map(from_expr).collect(),
        None => Ok(Vec::new()),
    }
}

fn block_to_stmts(block: synast::BlockExpr) -> Result<Vec<Stmt>> {
    let mut out = Vec::new();
    for stmt in block.statements() {
        if let Some(converted) = from_stmt(stmt)? {
            out.push(converted);
        }
    }
    Ok(out)
}

fn from_range_expr(range_expr: &synast::RangeExpr) -> Result<ast::RangeExpr> {
    let span = span_of(range_expr);
    let (start, step, stop) = range_expr.start_step_stop();
    Ok(ast::RangeExpr::new(
        start.map(from_expr).transpose()?,
        step.map(from_expr).transpose()?,
        stop.map(from_expr).transpose()?,
        span,
    ))
}

fn from_arith_op(op: synast::ArithOp, _span: Span) -> Result<ast::BinaryOp> {
    use synast::ArithOp::*;
    Ok(match op {
        Add => ast::BinaryOp::Add,
        Sub => ast::BinaryOp::Sub,
        Mul => ast::BinaryOp::Mul,
        Div => ast::BinaryOp::Div,
        Rem => ast::BinaryOp::Mod,
        Shl => ast::BinaryOp::Shl,
        Shr => ast::BinaryOp::Shr,
        BitAnd => ast::BinaryOp::BitAnd,
        BitOr => ast::BinaryOp::BitOr,
        // `^` is XOR; the power operator arrives as `BinaryOp::PowerOp`.
        BitXor => ast::BinaryOp::BitXor,
    })
}

fn from_binary_op(op: synast::BinaryOp, span: Span) -> Result<ast::BinaryOp> {
    use synast::{CmpOp, LogicOp, Ordering};
    match op {
        synast::BinaryOp::ArithOp(arith) => from_arith_op(arith, span),
        synast::BinaryOp::CmpOp(cmp) => Ok(match cmp {
            CmpOp::Eq { negated: false } => ast::BinaryOp::Eq,
            CmpOp::Eq { negated: true } => ast::BinaryOp::Neq,
            CmpOp::Ord {
                ordering: Ordering::Less,
                strict: true,
            } => ast::BinaryOp::Lt,
            CmpOp::Ord {
                ordering: Ordering::Less,
                strict: false,
            } => ast::BinaryOp::Le,
            CmpOp::Ord {
                ordering: Ordering::Greater,
                strict: true,
            } => ast::BinaryOp::Gt,
            CmpOp::Ord {
                ordering: Ordering::Greater,
                strict: false,
            } => ast::BinaryOp::Ge,
        }),
        synast::BinaryOp::LogicOp(LogicOp::And) => Ok(ast::BinaryOp::AndAnd),
        synast::BinaryOp::LogicOp(LogicOp::Or) => Ok(ast::BinaryOp::OrOr),
        synast::BinaryOp::ConcatenationOp => Ok(ast::BinaryOp::Concat),
        synast::BinaryOp::Assignment { .. } => Err(Error::syntax(
            "assignment found where an expression was expected",
            span,
        )),
    }
}

fn from_time_unit(unit: synast::TimeUnit) -> ast::TimeUnit {
    match unit {
        synast::TimeUnit::Second => ast::TimeUnit::Second,
        synast::TimeUnit::MilliSecond => ast::TimeUnit::MilliSecond,
        synast::TimeUnit::MicroSecond => ast::TimeUnit::MicroSecond,
        synast::TimeUnit::NanoSecond => ast::TimeUnit::NanoSecond,
        synast::TimeUnit::Cycle => ast::TimeUnit::Dt,
        // handled by the timing-literal conversion
        synast::TimeUnit::Imaginary => unreachable!(),
    }
}

fn from_literal(literal: &synast::Literal) -> Result<Expr> {
    let span = span_of(literal);
    let expr = match literal.kind() {
        synast::LiteralKind::Bool(value) => ast::BoolLiteral::new(value, span).to_expr(),
        synast::LiteralKind::IntNumber(int_num) => {
            let value = int_num
                .value_u128()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| Error::syntax("integer literal out of range", span))?;
            ast::IntLiteral::new(value, span).to_expr()
        }
        synast::LiteralKind::FloatNumber(float_num) => {
            let value = float_num
                .value()
                .ok_or_else(|| Error::syntax("malformed float literal", span))?;
            ast::FloatLiteral::new(value, span).to_expr()
        }
        synast::LiteralKind::BitString(bit_string) => {
            let text = bit_string
                .str()
                .ok_or_else(|| Error::syntax("malformed bit-string literal", span))?;
            let bits: Vec<bool> = text
                .chars()
                .filter(|c| *c == '0' || *c == '1')
                .map(|c| c == '1')
                .collect();
            ast::BitStringLiteral::new(bits, span).to_expr()
        }
        _ => {
            return Err(Error::unsupported(
                format!("unsupported literal: {}", literal.syntax().text()),
                span,
            ))
        }
    };
    Ok(expr)
}

fn from_timing_literal(timing: &synast::TimingLiteral) -> Result<Expr> {
    let span = span_of(timing);
    let unit = timing
        .time_unit()
        .ok_or_else(|| Error::syntax("malformed timing literal", span))?;
    let literal = timing
        .literal()
        .ok_or_else(|| Error::syntax("malformed timing literal", span))?;
    let value = match literal.kind() {
        synast::LiteralKind::IntNumber(int_num) => int_num
            .value_u128()
            .map(|v| v as f64)
            .ok_or_else(|| Error::syntax("malformed timing literal", span))?,
        synast::LiteralKind::FloatNumber(float_num) => float_num
            .value()
            .ok_or_else(|| Error::syntax("malformed timing literal", span))?,
        _ => return Err(Error::syntax("malformed timing literal", span)),
    };
    if matches!(unit, synast::TimeUnit::Imaginary) {
        return Ok(Expr::ImaginaryLiteral(ast::FloatLiteral::new(value, span)));
    }
    Ok(ast::DurationLiteral::new(value, from_time_unit(unit), span).to_expr())
}

pub(crate) fn from_expr(expr: synast::Expr) -> Result<Expr> {
    match expr {
        synast::Expr::Literal(ref literal) => from_literal(literal),
        synast::Expr::TimingLiteral(ref timing) => from_timing_literal(timing),

        synast::Expr::Identifier(identifier) => Ok(Expr::Identifier(ast::Ident::new(
            identifier.string(),
            span_of(&identifier),
        ))),

        synast::Expr::HardwareQubit(hwq) => Ok(Expr::HardwareQubit(ast::HardwareQubit::new(
            hwq.string(),
            span_of(&hwq),
        ))),

        synast::Expr::ParenExpr(paren) => {
            let span = span_of(&paren);
            let inner = paren
                .expr()
                .ok_or_else(|| Error::syntax("empty parenthesized expression", span))?;
            from_expr(inner)
        }

        synast::Expr::PrefixExpr(prefix) => {
            let span = span_of(&prefix);
            let op = match prefix.op_kind() {
                Some(synast::UnaryOp::Neg) => ast::UnaryOp::Minus,
                Some(synast::UnaryOp::LogicNot) => ast::UnaryOp::Not,
                Some(synast::UnaryOp::Not) => ast::UnaryOp::BitNot,
                None => return Err(Error::syntax("malformed unary expression", span)),
            };
            let operand = prefix
                .expr()
                .ok_or_else(|| Error::syntax("unary operator without an operand", span))?;
            Ok(ast::UnaryExpr::new(op, from_expr(operand)?, span).to_expr())
        }

        synast::Expr::BinExpr(bin_expr) => {
            let span = span_of(&bin_expr);
            let op = bin_expr
                .op_kind()
                .ok_or_else(|| Error::syntax("malformed binary expression", span))?;
            let op = from_binary_op(op, span)?;
            let lhs = bin_expr
                .lhs()
                .ok_or_else(|| Error::syntax("binary operator without a left operand", span))?;
            let rhs = bin_expr
                .rhs()
                .ok_or_else(|| Error::syntax("binary operator without a right operand", span))?;
            Ok(ast::BinaryExpr::new(op, from_expr(lhs)?, from_expr(rhs)?, span).to_expr())
        }

        synast::Expr::RangeExpr(range_expr) => {
            let converted = from_range_expr(&range_expr)?;
            Ok(Expr::Range(Box::new(converted)))
        }

        synast::Expr::IndexExpr(index_expr) => {
            let span = span_of(&index_expr);
            let collection = index_expr
                .expr()
                .ok_or_else(|| Error::syntax("index without a collection", span))?;
            let index_op = index_expr
                .index_operator()
                .ok_or_else(|| Error::syntax("index without an operator", span))?;
            Ok(ast::IndexExpression::new(
                from_expr(collection)?,
                from_index_operator(index_op)?,
                span,
            )
            .to_expr())
        }

        synast::Expr::IndexedIdentifier(indexed) => {
            let span = span_of(&indexed);
            let (name, mut indices) = from_indexed_identifier(&indexed)?;
            let mut out = ast::Ident::new(name, span).to_expr();
            for index in indices.drain(..) {
                out = ast::IndexExpression::new(out, index, span).to_expr();
            }
            Ok(out)
        }

        synast::Expr::MeasureExpression(ref measure) => {
            let span = span_of(measure);
            let operand = measure
                .gate_operand()
                .ok_or_else(|| Error::syntax("measure without an operand", span))?;
            Ok(ast::MeasureExpr::new(from_gate_operand(operand)?, span).to_expr())
        }

        synast::Expr::CastExpression(cast) => {
            let span = span_of(&cast);
            let scalar = cast
                .scalar_type()
                .ok_or_else(|| Error::syntax("cast without a target type", span))?;
            let operand = cast
                .expr()
                .ok_or_else(|| Error::syntax("cast without an operand", span))?;
            Ok(ast::CastExpr::new(from_scalar_type(&scalar)?, from_expr(operand)?, span).to_expr())
        }

        synast::Expr::CallExpr(call) => {
            let span = span_of(&call);
            let name = match call.expr() {
                Some(synast::Expr::Identifier(identifier)) => identifier.string(),
                _ => return Err(Error::syntax("call without a callee name", span)),
            };
            let args = match call.arg_list() {
                Some(arg_list) => expression_list(arg_list.expression_list())?,
                None => Vec::new(),
            };
            Ok(ast::FunctionCall::new(name, args, span).to_expr())
        }

        synast::Expr::ArrayLiteral(ref array_literal) => {
            let exprs = expression_list(array_literal.expression_list())?;
            Ok(Expr::ArrayLiteral(exprs))
        }

        other => Err(Error::unsupported(
            format!("unsupported expression: {}", other.syntax().text()),
            Some(other.syntax().text_range()),
        )),
    }
}
