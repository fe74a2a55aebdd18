// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// The module façade: holds the parsed program and exposes validation,
// unrolling and the post-unroll transforms. A flavor tag distinguishes
// OpenQASM 2 modules from OpenQASM 3 modules.

use hashbrown::HashMap;

use crate::ast::{Expr, GPhase, GateCall, GateOperand, Measurement, Stmt};
use crate::decomposer::{self, BasisSet};
use crate::depth::DepthTracker;
use crate::error::{Error, Result};
use crate::printer::{self, Flavor};
use crate::registers::RegisterTable;
use crate::visitor::{QasmVisitor, UnrollOptions};

/// An OpenQASM program together with its analysis state.
#[derive(Clone, Debug)]
pub struct QasmModule {
    name: String,
    flavor: Flavor,
    version: String,
    statements: Vec<Stmt>,
    unrolled: Vec<Stmt>,
    registers: RegisterTable,
    depths: DepthTracker,
    num_qubits: Option<usize>,
    num_clbits: Option<usize>,
    has_measurements: Option<bool>,
    has_barriers: Option<bool>,
    validated: bool,
}

/// Outcome of `QasmModule::compare`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompareReport {
    pub is_equivalent: bool,
    pub differences: Vec<String>,
}

impl QasmModule {
    pub(crate) fn new<T: ToString>(
        name: T,
        flavor: Flavor,
        version: String,
        statements: Vec<Stmt>,
    ) -> QasmModule {
        QasmModule {
            name: name.to_string(),
            flavor,
            version,
            statements,
            unrolled: Vec::new(),
            registers: RegisterTable::new(),
            depths: DepthTracker::new(),
            num_qubits: None,
            num_clbits: None,
            has_measurements: None,
            has_barriers: None,
            validated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn unrolled_statements(&self) -> &[Stmt] {
        &self.unrolled
    }

    fn invalidate_caches(&mut self) {
        self.has_measurements = None;
        self.has_barriers = None;
    }

    fn adopt_visitor_state(&mut self, visitor: QasmVisitor) {
        self.num_qubits = Some(visitor.registers.num_qubits());
        self.num_clbits = Some(visitor.registers.num_clbits());
        self.registers = visitor.registers;
        self.depths = visitor.depths;
    }

    /// Walk the program without emitting anything. The first error is
    /// returned; success marks the module validated.
    pub fn validate(&mut self) -> Result<()> {
        if self.validated {
            return Ok(());
        }
        let mut visitor = QasmVisitor::new(true, UnrollOptions::default());
        match visitor.visit_program(&self.statements) {
            Ok(_) => {
                self.adopt_visitor_state(visitor);
                self.validated = true;
                Ok(())
            }
            Err(err) => {
                self.num_qubits = None;
                self.num_clbits = None;
                Err(err)
            }
        }
    }

    pub fn unroll(&mut self) -> Result<()> {
        self.unroll_with(UnrollOptions::default())
    }

    /// Unroll the program into declarations and basic operations; the
    /// flattened list replaces any previous unroll result.
    pub fn unroll_with(&mut self, options: UnrollOptions) -> Result<()> {
        let mut visitor = QasmVisitor::new(false, options);
        match visitor.visit_program(&self.statements) {
            Ok(stmts) => {
                self.unrolled = stmts;
                self.adopt_visitor_state(visitor);
                self.validated = true;
                self.invalidate_caches();
                Ok(())
            }
            Err(err) => {
                self.unrolled = Vec::new();
                self.num_qubits = None;
                self.num_clbits = None;
                Err(err)
            }
        }
    }

    pub fn num_qubits(&mut self) -> Result<usize> {
        if self.num_qubits.is_none() {
            self.validate()?;
        }
        Ok(self.num_qubits.unwrap_or(0))
    }

    pub fn num_clbits(&mut self) -> Result<usize> {
        if self.num_clbits.is_none() {
            self.validate()?;
        }
        Ok(self.num_clbits.unwrap_or(0))
    }

    /// Depth of the unrolled program. The module itself is left untouched.
    pub fn depth(&mut self) -> Result<usize> {
        let mut probe = self.clone();
        probe.unroll()?;
        Ok(probe.depths.max_depth())
    }

    fn active_statements(&self) -> &[Stmt] {
        if self.unrolled.is_empty() {
            &self.statements
        } else {
            &self.unrolled
        }
    }

    pub fn has_measurements(&mut self) -> bool {
        if self.has_measurements.is_none() {
            let found = contains_kind(self.active_statements(), &|s| {
                matches!(s, Stmt::Measurement(..))
            });
            self.has_measurements = Some(found);
        }
        self.has_measurements.unwrap()
    }

    pub fn has_barriers(&mut self) -> bool {
        if self.has_barriers.is_none() {
            let found =
                contains_kind(self.active_statements(), &|s| matches!(s, Stmt::Barrier(..)));
            self.has_barriers = Some(found);
        }
        self.has_barriers.unwrap()
    }

    pub fn remove_measurements(&mut self) {
        self.statements = filter_kind(&self.statements, &|s| !matches!(s, Stmt::Measurement(..)));
        self.unrolled = filter_kind(&self.unrolled, &|s| !matches!(s, Stmt::Measurement(..)));
        for node in self.depths.qubits.values_mut() {
            node.num_measurements = 0;
        }
        for node in self.depths.clbits.values_mut() {
            node.num_measurements = 0;
        }
        self.has_measurements = Some(false);
    }

    pub fn remove_barriers(&mut self) {
        self.statements = filter_kind(&self.statements, &|s| !matches!(s, Stmt::Barrier(..)));
        self.unrolled = filter_kind(&self.unrolled, &|s| !matches!(s, Stmt::Barrier(..)));
        for node in self.depths.qubits.values_mut() {
            node.num_barriers = 0;
        }
        self.has_barriers = Some(false);
    }

    pub fn remove_includes(&mut self) {
        self.statements = filter_kind(&self.statements, &|s| !matches!(s, Stmt::Include(..)));
        self.unrolled = filter_kind(&self.unrolled, &|s| !matches!(s, Stmt::Include(..)));
    }

    /// Rewrite the unrolled program onto a target basis set.
    pub fn rebase(&mut self, basis: BasisSet) -> Result<()> {
        if self.unrolled.is_empty() {
            self.unroll()?;
        }
        let rebased = decomposer::rebase_statements(&self.unrolled, basis)?;
        self.unrolled = rebased;
        self.statements = self.unrolled.clone();
        Ok(())
    }

    /// Insert an explicit `id` on every idle qubit. The module is validated
    /// but not unrolled.
    pub fn populate_idle_qubits(&mut self) -> Result<()> {
        self.validate()?;
        let idle = self.depths.idle_qubit_indices();
        let mut reg_names: Vec<&String> = idle.keys().collect();
        reg_names.sort();
        for reg in reg_names {
            for idx in &idle[reg] {
                self.depths
                    .qubits
                    .get_mut(&(reg.clone(), *idx))
                    .unwrap()
                    .depth += 1;
                self.statements
                    .push(GateCall::basic("id", vec![GateOperand::bit(reg, *idx)]).to_stmt());
            }
        }
        self.invalidate_caches();
        Ok(())
    }

    /// Drop idle qubits: fully idle registers disappear, partially idle
    /// registers shrink with stable renumbering of the surviving indices.
    pub fn remove_idle_qubits(&mut self) -> Result<()> {
        self.unroll()?;
        let idle = self.depths.idle_qubit_indices();
        let mut removed_total = 0usize;

        for (reg, idle_indices) in idle {
            let size = match self.registers.qubit_register_size(&reg) {
                Some(size) => size,
                None => continue,
            };
            for idx in &idle_indices {
                self.depths.qubits.remove(&(reg.clone(), *idx));
            }
            removed_total += idle_indices.len();

            if idle_indices.len() == size {
                // the whole register is unused; delete its declaration
                self.unrolled.retain(|stmt| match stmt {
                    Stmt::QuantumDeclaration(decl) => decl.name() != reg,
                    _ => true,
                });
                self.registers.remove_qubit_register(&reg);
            } else {
                self.remap_qubits(&reg, size, &idle_indices);
                self.registers
                    .resize_qubit_register(&reg, size - idle_indices.len());
            }
        }

        if let Some(n) = self.num_qubits {
            self.num_qubits = Some(n - removed_total);
        }
        self.statements = self.unrolled.clone();
        Ok(())
    }

    fn remap_qubits(&mut self, reg: &str, size: usize, idle_indices: &[usize]) {
        let used: Vec<usize> = (0..size).filter(|i| !idle_indices.contains(i)).collect();
        let new_size = used.len();
        let index_map: HashMap<usize, usize> =
            used.iter().enumerate().map(|(new, old)| (*old, new)).collect();

        // shrink the declaration
        for stmt in self.unrolled.iter_mut() {
            if let Stmt::QuantumDeclaration(decl) = stmt {
                if decl.name() == reg {
                    *stmt = crate::ast::QuantumDeclaration::new(
                        reg,
                        Some(Expr::int(new_size as i64)),
                        None,
                    )
                    .to_stmt();
                    break;
                }
            }
        }

        // renumber the depth nodes
        for old in &used {
            if let Some(node) = self.depths.qubits.remove(&(reg.to_string(), *old)) {
                self.depths.qubits.insert((reg.to_string(), index_map[old]), node);
            }
        }

        // renumber every operand that mentions the register
        let maps: HashMap<String, HashMap<usize, usize>> =
            std::iter::once((reg.to_string(), index_map)).collect();
        for stmt in self.unrolled.iter_mut() {
            remap_statement_qubits(stmt, &maps);
        }
    }

    /// Reverse the qubit order of every register in the unrolled program.
    pub fn reverse_qubit_order(&mut self) -> Result<()> {
        self.unroll()?;
        let mut maps: HashMap<String, HashMap<usize, usize>> = HashMap::new();
        let registers: Vec<(String, usize)> = self
            .registers
            .qubit_registers()
            .map(|(name, size)| (name.to_string(), size))
            .collect();
        for (name, size) in registers {
            let map: HashMap<usize, usize> =
                (0..size).map(|old| (old, size - old - 1)).collect();
            maps.insert(name, map);
        }
        for stmt in self.unrolled.iter_mut() {
            remap_statement_qubits(stmt, &maps);
        }
        self.statements = self.unrolled.clone();
        Ok(())
    }

    /// Structural comparison of two modules after unrolling both.
    pub fn compare(&mut self, other: &mut QasmModule) -> Result<CompareReport> {
        self.unroll()?;
        other.unroll()?;
        let mut differences = Vec::new();

        if self.num_qubits()? != other.num_qubits()? {
            differences.push(format!(
                "qubit counts differ: {} vs {}",
                self.num_qubits()?,
                other.num_qubits()?
            ));
        }
        if self.num_clbits()? != other.num_clbits()? {
            differences.push(format!(
                "classical bit counts differ: {} vs {}",
                self.num_clbits()?,
                other.num_clbits()?
            ));
        }
        let own_depth = self.depths.max_depth();
        let other_depth = other.depths.max_depth();
        if own_depth != other_depth {
            differences.push(format!("depths differ: {own_depth} vs {other_depth}"));
        }

        let own_counts = statement_kind_counts(&self.unrolled);
        let other_counts = statement_kind_counts(&other.unrolled);
        let mut kinds: Vec<&str> = own_counts
            .keys()
            .chain(other_counts.keys())
            .map(|s| s.as_str())
            .collect();
        kinds.sort_unstable();
        kinds.dedup();
        for kind in kinds {
            let a = own_counts.get(kind).copied().unwrap_or(0);
            let b = other_counts.get(kind).copied().unwrap_or(0);
            if a != b {
                differences.push(format!("operation counts differ for '{kind}': {a} vs {b}"));
            }
        }

        Ok(CompareReport {
            is_equivalent: differences.is_empty(),
            differences,
        })
    }

    /// Convert an OpenQASM 2 module to the 3.0 dialect. Statements were
    /// already normalized at load time; only the flavor changes.
    pub fn to_qasm3(&self) -> Result<QasmModule> {
        if self.flavor != Flavor::Qasm2 {
            return Err(Error::unsupported(
                "to_qasm3 is only applicable to OpenQASM 2 modules",
                None,
            ));
        }
        let mut converted = self.clone();
        converted.flavor = Flavor::Qasm3;
        converted.version = "3.0".to_string();
        Ok(converted)
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Serialize the module: the unrolled program when available, the
    /// original statements otherwise.
    pub fn to_qasm_string(&self) -> String {
        printer::program_to_string(&self.version, self.active_statements(), self.flavor)
    }
}

impl std::fmt::Display for QasmModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_qasm_string())
    }
}

fn contains_kind(stmts: &[Stmt], predicate: &dyn Fn(&Stmt) -> bool) -> bool {
    stmts.iter().any(|stmt| {
        if predicate(stmt) {
            return true;
        }
        match stmt {
            Stmt::Branch(branch) => {
                contains_kind(branch.if_block(), predicate)
                    || contains_kind(branch.else_block(), predicate)
            }
            Stmt::Box_(box_stmt) => contains_kind(box_stmt.body(), predicate),
            _ => false,
        }
    })
}

fn filter_kind(stmts: &[Stmt], keep: &dyn Fn(&Stmt) -> bool) -> Vec<Stmt> {
    stmts
        .iter()
        .filter(|stmt| keep(stmt))
        .map(|stmt| match stmt {
            Stmt::Branch(branch) => crate::ast::Branch::new(
                branch.condition().clone(),
                filter_kind(branch.if_block(), keep),
                filter_kind(branch.else_block(), keep),
                branch.span,
            )
            .to_stmt(),
            Stmt::Box_(box_stmt) => crate::ast::BoxStmt::new(
                box_stmt.duration().cloned(),
                filter_kind(box_stmt.body(), keep),
                box_stmt.span,
            )
            .to_stmt(),
            other => other.clone(),
        })
        .collect()
}

fn statement_kind_counts(stmts: &[Stmt]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for stmt in stmts {
        let key = match stmt {
            Stmt::GateCall(call) => format!("gate:{}", call.name()),
            Stmt::GPhase(..) => "gphase".to_string(),
            Stmt::Measurement(..) => "measurement".to_string(),
            Stmt::Reset(..) => "reset".to_string(),
            Stmt::Barrier(..) => "barrier".to_string(),
            Stmt::QuantumDeclaration(..) => "qubit-declaration".to_string(),
            Stmt::ClassicalDeclaration(..) => "bit-declaration".to_string(),
            Stmt::Branch(branch) => {
                let mut inner = statement_kind_counts(branch.if_block());
                for (k, v) in statement_kind_counts(branch.else_block()) {
                    *inner.entry(k).or_default() += v;
                }
                for (k, v) in inner {
                    *counts.entry(k).or_default() += v;
                }
                "branch".to_string()
            }
            _ => continue,
        };
        *counts.entry(key).or_default() += 1;
    }
    counts
}

// Rewrite qubit indices of quantum operations, recursing into branches and
// boxes. Only registers present in `maps` are touched.
fn remap_statement_qubits(stmt: &mut Stmt, maps: &HashMap<String, HashMap<usize, usize>>) {
    let remap_operand = |operand: &mut GateOperand| {
        if let Some((reg, idx)) = operand.resolved_bit() {
            if let Some(map) = maps.get(reg) {
                if let Some(new_idx) = map.get(&idx) {
                    *operand = GateOperand::bit(reg, *new_idx);
                }
            }
        }
    };
    match stmt {
        Stmt::GateCall(GateCall { qubits, .. }) | Stmt::GPhase(GPhase { qubits, .. }) => {
            for qubit in qubits.iter_mut() {
                remap_operand(qubit);
            }
        }
        Stmt::Barrier(barrier) => {
            for qubit in barrier.qubits.iter_mut() {
                remap_operand(qubit);
            }
        }
        Stmt::Delay(delay) => {
            for qubit in delay.qubits.iter_mut() {
                remap_operand(qubit);
            }
        }
        Stmt::Reset(reset) => remap_operand(&mut reset.target),
        Stmt::Measurement(Measurement { qubit, .. }) => remap_operand(qubit),
        Stmt::Branch(branch) => {
            for inner in branch.if_block.iter_mut() {
                remap_statement_qubits(inner, maps);
            }
            for inner in branch.else_block.iter_mut() {
                remap_statement_qubits(inner, maps);
            }
        }
        Stmt::Box_(box_stmt) => {
            for inner in box_stmt.body.iter_mut() {
                remap_statement_qubits(inner, maps);
            }
        }
        _ => {}
    }
}
