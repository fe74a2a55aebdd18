// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Serialization of the statement tree back to OpenQASM text. The QASM2
// flavor prints old-style register declarations and arrow measurements so a
// converted program round-trips in its own dialect.

use std::fmt::Write;

use crate::ast::{
    Barrier, BoxStmt, Branch, ClassicalDeclaration, Delay, Expr, For, ForIterable, GPhase,
    GateCall, GateDefinition, GateModifier, GateOperand, IODeclaration, IndexKind, LValue,
    Measurement, QuantumDeclaration, Reset, Stmt, SubroutineDefinition, SubroutineParam, Switch,
    TypeKind, TypeSpec, While,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    Qasm2,
    Qasm3,
}

pub fn program_to_string(version: &str, statements: &[Stmt], flavor: Flavor) -> String {
    let mut printer = Printer::new(flavor);
    let _ = writeln!(printer.out, "OPENQASM {version};");
    for stmt in statements {
        printer.print_stmt(stmt);
    }
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
    flavor: Flavor,
}

impl Printer {
    fn new(flavor: Flavor) -> Printer {
        Printer {
            out: String::new(),
            indent: 0,
            flavor,
        }
    }

    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn line(&mut self, text: String) {
        self.pad();
        self.out.push_str(&text);
        self.out.push('\n');
    }

    fn print_block(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        for stmt in stmts {
            self.print_stmt(stmt);
        }
        self.indent -= 1;
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Include(include) => {
                self.line(format!("include \"{}\";", include.file_path()));
            }
            Stmt::QuantumDeclaration(decl) => self.print_quantum_declaration(decl),
            Stmt::ClassicalDeclaration(decl) => self.print_classical_declaration(decl),
            Stmt::IODeclaration(decl) => self.print_io_declaration(decl),
            Stmt::Assignment(assignment) => {
                let op = match assignment.op() {
                    Some(op) => format!("{}=", op.as_str()),
                    None => "=".to_string(),
                };
                self.line(format!(
                    "{} {} {};",
                    lvalue(assignment.lvalue()),
                    op,
                    expr(assignment.rvalue())
                ));
            }
            Stmt::Alias(alias) => {
                self.line(format!("let {} = {};", alias.name(), expr(alias.value())));
            }
            Stmt::GateDefinition(definition) => self.print_gate_definition(definition),
            Stmt::GateCall(call) => self.print_gate_call(call),
            Stmt::GPhase(gphase) => self.print_gphase(gphase),
            Stmt::Measurement(measurement) => self.print_measurement(measurement),
            Stmt::Reset(reset) => self.print_reset(reset),
            Stmt::Barrier(barrier) => self.print_barrier(barrier),
            Stmt::Delay(delay) => self.print_delay(delay),
            Stmt::Box_(box_stmt) => self.print_box(box_stmt),
            Stmt::Branch(branch) => self.print_branch(branch),
            Stmt::While(while_loop) => self.print_while(while_loop),
            Stmt::For(for_loop) => self.print_for(for_loop),
            Stmt::Switch(switch) => self.print_switch(switch),
            Stmt::SubroutineDefinition(definition) => self.print_subroutine(definition),
            Stmt::Return(ret) => match ret.value() {
                Some(value) => self.line(format!("return {};", expr(value))),
                None => self.line("return;".to_string()),
            },
            Stmt::ExprStmt(expr_stmt) => self.line(format!("{};", expr(expr_stmt.expr()))),
            Stmt::Break(_) => self.line("break;".to_string()),
            Stmt::Continue(_) => self.line("continue;".to_string()),
            Stmt::End(_) => self.line("end;".to_string()),
            Stmt::Pragma(pragma) => self.line(format!("pragma {};", pragma.text())),
            Stmt::Annotation(annotation) => self.line(annotation.text().to_string()),
            Stmt::Cal(block) | Stmt::DefCal(block) | Stmt::DefCalGrammar(block) => {
                self.line(block.text().to_string());
            }
        }
    }

    fn print_quantum_declaration(&mut self, decl: &QuantumDeclaration) {
        match (self.flavor, decl.size()) {
            (Flavor::Qasm2, Some(size)) => {
                self.line(format!("qreg {}[{}];", decl.name(), expr(size)));
            }
            (Flavor::Qasm2, None) => self.line(format!("qreg {}[1];", decl.name())),
            (Flavor::Qasm3, Some(size)) => {
                self.line(format!("qubit[{}] {};", expr(size), decl.name()));
            }
            (Flavor::Qasm3, None) => self.line(format!("qubit {};", decl.name())),
        }
    }

    fn print_classical_declaration(&mut self, decl: &ClassicalDeclaration) {
        if self.flavor == Flavor::Qasm2 && decl.type_spec().kind() == TypeKind::Bit {
            let width = decl
                .type_spec()
                .width()
                .map(expr)
                .unwrap_or_else(|| "1".to_string());
            self.line(format!("creg {}[{width}];", decl.name()));
            return;
        }
        let mut text = String::new();
        if decl.is_const() {
            text.push_str("const ");
        }
        text.push_str(&type_spec(decl.type_spec()));
        let _ = write!(text, " {}", decl.name());
        if let Some(init) = decl.initializer() {
            let _ = write!(text, " = {}", expr(init));
        }
        text.push(';');
        self.line(text);
    }

    fn print_io_declaration(&mut self, decl: &IODeclaration) {
        let direction = if decl.is_input() { "input" } else { "output" };
        self.line(format!(
            "{direction} {} {};",
            type_spec(decl.type_spec()),
            decl.name()
        ));
    }

    fn print_gate_definition(&mut self, definition: &GateDefinition) {
        let mut header = format!("gate {}", definition.name());
        if !definition.params().is_empty() {
            let _ = write!(header, "({})", definition.params().join(", "));
        }
        let _ = write!(header, " {} {{", definition.qubits().join(", "));
        self.line(header);
        self.print_block(definition.body());
        self.line("}".to_string());
    }

    fn print_gate_call(&mut self, call: &GateCall) {
        let mut text = modifiers_prefix(call.modifiers());
        text.push_str(call.name());
        if !call.params().is_empty() {
            let params: Vec<String> = call.params().iter().map(expr).collect();
            let _ = write!(text, "({})", params.join(", "));
        }
        let qubits: Vec<String> = call.qubits().iter().map(operand).collect();
        if !qubits.is_empty() {
            let _ = write!(text, " {}", qubits.join(", "));
        }
        text.push(';');
        self.line(text);
    }

    fn print_gphase(&mut self, gphase: &GPhase) {
        let mut text = modifiers_prefix(gphase.modifiers());
        let _ = write!(text, "gphase({})", expr(gphase.arg()));
        let qubits: Vec<String> = gphase.qubits().iter().map(operand).collect();
        if !qubits.is_empty() {
            let _ = write!(text, " {}", qubits.join(", "));
        }
        text.push(';');
        self.line(text);
    }

    fn print_measurement(&mut self, measurement: &Measurement) {
        match measurement.target() {
            Some(target) => {
                if self.flavor == Flavor::Qasm2 {
                    self.line(format!(
                        "measure {} -> {};",
                        operand(measurement.qubit()),
                        lvalue(target)
                    ));
                } else {
                    self.line(format!(
                        "{} = measure {};",
                        lvalue(target),
                        operand(measurement.qubit())
                    ));
                }
            }
            None => self.line(format!("measure {};", operand(measurement.qubit()))),
        }
    }

    fn print_reset(&mut self, reset: &Reset) {
        self.line(format!("reset {};", operand(reset.target())));
    }

    fn print_barrier(&mut self, barrier: &Barrier) {
        if barrier.qubits().is_empty() {
            self.line("barrier;".to_string());
        } else {
            let qubits: Vec<String> = barrier.qubits().iter().map(operand).collect();
            self.line(format!("barrier {};", qubits.join(", ")));
        }
    }

    fn print_delay(&mut self, delay: &Delay) {
        let qubits: Vec<String> = delay.qubits().iter().map(operand).collect();
        if qubits.is_empty() {
            self.line(format!("delay[{}];", expr(delay.duration())));
        } else {
            self.line(format!(
                "delay[{}] {};",
                expr(delay.duration()),
                qubits.join(", ")
            ));
        }
    }

    fn print_box(&mut self, box_stmt: &BoxStmt) {
        match box_stmt.duration() {
            Some(duration) => self.line(format!("box[{}] {{", expr(duration))),
            None => self.line("box {".to_string()),
        }
        self.print_block(box_stmt.body());
        self.line("}".to_string());
    }

    fn print_branch(&mut self, branch: &Branch) {
        self.line(format!("if ({}) {{", expr(branch.condition())));
        self.print_block(branch.if_block());
        if branch.else_block().is_empty() {
            self.line("}".to_string());
        } else {
            self.line("} else {".to_string());
            self.print_block(branch.else_block());
            self.line("}".to_string());
        }
    }

    fn print_while(&mut self, while_loop: &While) {
        self.line(format!("while ({}) {{", expr(while_loop.condition())));
        self.print_block(while_loop.body());
        self.line("}".to_string());
    }

    fn print_for(&mut self, for_loop: &For) {
        let iterable = match for_loop.iterable() {
            ForIterable::Range(range) => range_text(range),
            ForIterable::Set(exprs) => {
                let values: Vec<String> = exprs.iter().map(expr).collect();
                format!("{{{}}}", values.join(", "))
            }
            ForIterable::Expr(e) => expr(e),
        };
        self.line(format!(
            "for {} {} in {} {{",
            type_spec(for_loop.type_spec()),
            for_loop.ident(),
            iterable
        ));
        self.print_block(for_loop.body());
        self.line("}".to_string());
    }

    fn print_switch(&mut self, switch: &Switch) {
        self.line(format!("switch ({}) {{", expr(switch.target())));
        self.indent += 1;
        for case in switch.cases() {
            let labels: Vec<String> = case.labels().iter().map(expr).collect();
            self.line(format!("case {} {{", labels.join(", ")));
            self.print_block(case.body());
            self.line("}".to_string());
        }
        if !switch.default().is_empty() {
            self.line("default {".to_string());
            self.print_block(switch.default());
            self.line("}".to_string());
        }
        self.indent -= 1;
        self.line("}".to_string());
    }

    fn print_subroutine(&mut self, definition: &SubroutineDefinition) {
        let params: Vec<String> = definition
            .params()
            .iter()
            .map(|param| match param {
                SubroutineParam::Classical { type_spec: spec, name } => {
                    format!("{} {}", type_spec(spec), name)
                }
                SubroutineParam::Quantum { name, size } => match size {
                    Some(size) => format!("qubit[{}] {}", expr(size), name),
                    None => format!("qubit {}", name),
                },
            })
            .collect();
        let mut header = format!("def {}({})", definition.name(), params.join(", "));
        if let Some(return_type) = definition.return_type() {
            let _ = write!(header, " -> {}", type_spec(return_type));
        }
        header.push_str(" {");
        self.line(header);
        self.print_block(definition.body());
        self.line("}".to_string());
    }
}

fn modifiers_prefix(modifiers: &[GateModifier]) -> String {
    let mut out = String::new();
    for modifier in modifiers {
        match modifier {
            GateModifier::Inv => out.push_str("inv @ "),
            GateModifier::Pow(e) => {
                let _ = write!(out, "pow({}) @ ", expr(e));
            }
            GateModifier::Ctrl(count) => match count {
                Some(e) => {
                    let _ = write!(out, "ctrl({}) @ ", expr(e));
                }
                None => out.push_str("ctrl @ "),
            },
            GateModifier::NegCtrl(count) => match count {
                Some(e) => {
                    let _ = write!(out, "negctrl({}) @ ", expr(e));
                }
                None => out.push_str("negctrl @ "),
            },
        }
    }
    out
}

fn type_spec(spec: &TypeSpec) -> String {
    let base = match spec.kind() {
        TypeKind::Bit => "bit",
        TypeKind::Bool => "bool",
        TypeKind::Int => "int",
        TypeKind::UInt => "uint",
        TypeKind::Float => "float",
        TypeKind::Angle => "angle",
        TypeKind::Complex => "complex",
        TypeKind::Duration => "duration",
        TypeKind::Stretch => "stretch",
        TypeKind::Qubit => "qubit",
    };
    let scalar = match (spec.kind(), spec.width()) {
        (TypeKind::Complex, Some(width)) => format!("complex[float[{}]]", expr(width)),
        (_, Some(width)) => format!("{base}[{}]", expr(width)),
        (_, None) => base.to_string(),
    };
    if spec.is_array() {
        let dims: Vec<String> = spec.dims().iter().map(expr).collect();
        format!("array[{scalar}, {}]", dims.join(", "))
    } else {
        scalar
    }
}

fn lvalue(lv: &LValue) -> String {
    let mut out = lv.name().to_string();
    for index in lv.indices() {
        out.push_str(&index_kind(index));
    }
    out
}

fn operand(op: &GateOperand) -> String {
    match op {
        GateOperand::Identifier(ident) => ident.name().to_string(),
        GateOperand::HardwareQubit(hwq) => hwq.name().to_string(),
        GateOperand::Indexed(indexed) => {
            let mut out = indexed.name().to_string();
            for index in indexed.indices() {
                out.push_str(&index_kind(index));
            }
            out
        }
    }
}

fn index_kind(index: &IndexKind) -> String {
    match index {
        IndexKind::Expr(e) => format!("[{}]", expr(e)),
        IndexKind::Range(range) => format!("[{}]", range_inner(range)),
        IndexKind::Set(exprs) => {
            let values: Vec<String> = exprs.iter().map(expr).collect();
            format!("[{{{}}}]", values.join(", "))
        }
        IndexKind::List(exprs) => {
            let values: Vec<String> = exprs.iter().map(expr).collect();
            format!("[{}]", values.join(", "))
        }
    }
}

fn range_inner(range: &crate::ast::RangeExpr) -> String {
    let start = range.start().map(expr).unwrap_or_default();
    let stop = range.stop().map(expr).unwrap_or_default();
    match range.step() {
        Some(step) => format!("{start}:{}:{stop}", expr(step)),
        None => format!("{start}:{stop}"),
    }
}

fn range_text(range: &crate::ast::RangeExpr) -> String {
    format!("[{}]", range_inner(range))
}

fn float_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

pub fn expr(e: &Expr) -> String {
    match e {
        Expr::IntLiteral(lit) => lit.value().to_string(),
        Expr::FloatLiteral(lit) => float_text(lit.value()),
        Expr::BoolLiteral(lit) => lit.value().to_string(),
        Expr::BitStringLiteral(lit) => {
            let bits: String = lit
                .bits()
                .iter()
                .map(|b| if *b { '1' } else { '0' })
                .collect();
            format!("\"{bits}\"")
        }
        Expr::DurationLiteral(lit) => format!("{}{}", float_text(lit.value()), lit.unit().suffix()),
        Expr::ImaginaryLiteral(lit) => format!("{}im", float_text(lit.value())),
        Expr::Identifier(ident) => ident.name().to_string(),
        Expr::HardwareQubit(hwq) => hwq.name().to_string(),
        Expr::Index(index) => format!(
            "{}{}",
            expr(index.collection()),
            index_kind(index.index())
        ),
        Expr::Range(range) => range_inner(range),
        Expr::Unary(unary) => {
            let inner = expr(unary.operand());
            match unary.operand() {
                Expr::Binary(_) => format!("{}({inner})", unary.op().as_str()),
                _ => format!("{}{inner}", unary.op().as_str()),
            }
        }
        Expr::Binary(binary) => {
            let lhs = wrap_if_binary(binary.lhs());
            let rhs = wrap_if_binary(binary.rhs());
            format!("{lhs} {} {rhs}", binary.op().as_str())
        }
        Expr::Cast(cast) => format!("{}({})", type_spec(cast.target()), expr(cast.operand())),
        Expr::Call(call) => {
            let args: Vec<String> = call.args().iter().map(expr).collect();
            format!("{}({})", call.name(), args.join(", "))
        }
        Expr::Measure(measure) => format!("measure {}", operand(measure.operand())),
        Expr::ArrayLiteral(exprs) => {
            let values: Vec<String> = exprs.iter().map(expr).collect();
            format!("{{{}}}", values.join(", "))
        }
    }
}

fn wrap_if_binary(e: &Expr) -> String {
    match e {
        Expr::Binary(_) => format!("({})", expr(e)),
        _ => expr(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_statements() {
        let stmts = vec![
            crate::ast::Include::new("stdgates.inc", None).to_stmt(),
            QuantumDeclaration::new("q", Some(Expr::int(2)), None).to_stmt(),
            GateCall::basic("h", vec![GateOperand::bit("q", 0)]).to_stmt(),
            GateCall::with_params("rz", vec![0.5], vec![GateOperand::bit("q", 1)]).to_stmt(),
            Measurement::new(
                GateOperand::bit("q", 0),
                Some(LValue::bit("c", 0)),
                None,
            )
            .to_stmt(),
        ];
        let text = program_to_string("3.0", &stmts, Flavor::Qasm3);
        let expected = "OPENQASM 3.0;\n\
                        include \"stdgates.inc\";\n\
                        qubit[2] q;\n\
                        h q[0];\n\
                        rz(0.5) q[1];\n\
                        c[0] = measure q[0];\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_qasm2_declarations() {
        let stmts = vec![
            QuantumDeclaration::new("q", Some(Expr::int(2)), None).to_stmt(),
            Measurement::new(
                GateOperand::bit("q", 0),
                Some(LValue::bit("c", 0)),
                None,
            )
            .to_stmt(),
        ];
        let text = program_to_string("2.0", &stmts, Flavor::Qasm2);
        assert!(text.contains("qreg q[2];"));
        assert!(text.contains("measure q[0] -> c[0];"));
    }

    #[test]
    fn test_nested_branch() {
        let inner = crate::ast::Branch::new(
            crate::ast::BinaryExpr::new(
                crate::ast::BinaryOp::Eq,
                Expr::ident("c"),
                Expr::int(1),
                None,
            )
            .to_expr(),
            vec![GateCall::basic("x", vec![GateOperand::bit("q", 0)]).to_stmt()],
            Vec::new(),
            None,
        )
        .to_stmt();
        let text = program_to_string("3.0", &[inner], Flavor::Qasm3);
        assert!(text.contains("if (c == 1) {"));
        assert!(text.contains("  x q[0];"));
    }
}
