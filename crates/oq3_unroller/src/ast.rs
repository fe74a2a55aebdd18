// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// The statement and expression tree that the visitor consumes and emits.
// Identifiers are carried as names plus source spans; resolution against the
// scope happens during the unrolling walk, not at construction time.
//
// Variants have the form XXX(XXX): the outer name is the variant, the inner
// name is the struct carrying the structure of the statement or expression.

pub use oq3_syntax::TextRange;

/// Byte range of a construct in the original source, when known. Statements
/// synthesized during unrolling carry `None`.
pub type Span = Option<TextRange>;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    version: String,
    statements: Vec<Stmt>,
}

impl Program {
    pub fn new<T: ToString>(version: T, statements: Vec<Stmt>) -> Program {
        Program {
            version: version.to_string(),
            statements,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn statements_mut(&mut self) -> &mut Vec<Stmt> {
        &mut self.statements
    }

    pub fn into_statements(self) -> Vec<Stmt> {
        self.statements
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Include(Include),
    QuantumDeclaration(QuantumDeclaration),
    ClassicalDeclaration(Box<ClassicalDeclaration>),
    IODeclaration(Box<IODeclaration>),
    Assignment(Box<Assignment>),
    Alias(Box<Alias>),
    GateDefinition(GateDefinition),
    GateCall(GateCall),
    GPhase(GPhase),
    Measurement(Measurement),
    Reset(Reset),
    Barrier(Barrier),
    Delay(Delay),
    Box_(BoxStmt),
    Branch(Box<Branch>),
    While(Box<While>),
    For(Box<For>),
    Switch(Box<Switch>),
    SubroutineDefinition(SubroutineDefinition),
    Return(Box<Return>),
    ExprStmt(ExprStmt),
    Break(Span),
    Continue(Span),
    End(Span),
    Pragma(Pragma),
    Annotation(Annotation),
    Cal(VerbatimBlock),
    DefCal(VerbatimBlock),
    DefCalGrammar(VerbatimBlock),
}

impl Stmt {
    pub fn span(&self) -> Span {
        use Stmt::*;
        match self {
            Include(s) => s.span,
            QuantumDeclaration(s) => s.span,
            ClassicalDeclaration(s) => s.span,
            IODeclaration(s) => s.span,
            Assignment(s) => s.span,
            Alias(s) => s.span,
            GateDefinition(s) => s.span,
            GateCall(s) => s.span,
            GPhase(s) => s.span,
            Measurement(s) => s.span,
            Reset(s) => s.span,
            Barrier(s) => s.span,
            Delay(s) => s.span,
            Box_(s) => s.span,
            Branch(s) => s.span,
            While(s) => s.span,
            For(s) => s.span,
            Switch(s) => s.span,
            SubroutineDefinition(s) => s.span,
            Return(s) => s.span,
            ExprStmt(s) => s.span,
            Break(span) | Continue(span) | End(span) => *span,
            Pragma(s) => s.span,
            Annotation(s) => s.span,
            Cal(s) | DefCal(s) | DefCalGrammar(s) => s.span,
        }
    }

    /// `true` for the quantum operations that mention resolved bits in the
    /// flattened output.
    pub fn is_quantum_op(&self) -> bool {
        matches!(
            self,
            Stmt::GateCall(..)
                | Stmt::GPhase(..)
                | Stmt::Measurement(..)
                | Stmt::Reset(..)
                | Stmt::Barrier(..)
                | Stmt::Delay(..)
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Include {
    pub(crate) file_path: String,
    pub(crate) span: Span,
}

impl Include {
    pub fn new<T: ToString>(file_path: T, span: Span) -> Include {
        Include {
            file_path: file_path.to_string(),
            span,
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Include(self)
    }
}

/// `qubit[n] name;` or `qubit name;`. Hardware qubits never appear here;
/// they live in the synthetic device register after consolidation.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantumDeclaration {
    pub(crate) name: String,
    pub(crate) size: Option<Expr>,
    pub(crate) span: Span,
}

impl QuantumDeclaration {
    pub fn new<T: ToString>(name: T, size: Option<Expr>, span: Span) -> QuantumDeclaration {
        QuantumDeclaration {
            name: name.to_string(),
            size,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Option<&Expr> {
        self.size.as_ref()
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::QuantumDeclaration(self)
    }
}

/// Syntax-level classical type: the kind plus unevaluated width/dimension
/// expressions. Widths become part of the semantic `Type` when evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpec {
    pub(crate) kind: TypeKind,
    pub(crate) width: Option<Expr>,
    pub(crate) dims: Vec<Expr>,
    pub(crate) span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Bit,
    Bool,
    Int,
    UInt,
    Float,
    Angle,
    Complex,
    Duration,
    Stretch,
    Qubit,
}

impl TypeSpec {
    pub fn new(kind: TypeKind, width: Option<Expr>, dims: Vec<Expr>, span: Span) -> TypeSpec {
        TypeSpec {
            kind,
            width,
            dims,
            span,
        }
    }

    pub fn scalar(kind: TypeKind, width: Option<Expr>) -> TypeSpec {
        TypeSpec {
            kind,
            width,
            dims: Vec::new(),
            span: None,
        }
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn width(&self) -> Option<&Expr> {
        self.width.as_ref()
    }

    pub fn dims(&self) -> &[Expr] {
        &self.dims
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassicalDeclaration {
    pub(crate) type_spec: TypeSpec,
    pub(crate) name: String,
    pub(crate) initializer: Option<Expr>,
    pub(crate) is_const: bool,
    pub(crate) span: Span,
}

impl ClassicalDeclaration {
    pub fn new<T: ToString>(
        type_spec: TypeSpec,
        name: T,
        initializer: Option<Expr>,
        is_const: bool,
        span: Span,
    ) -> ClassicalDeclaration {
        ClassicalDeclaration {
            type_spec,
            name: name.to_string(),
            initializer,
            is_const,
            span,
        }
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initializer(&self) -> Option<&Expr> {
        self.initializer.as_ref()
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::ClassicalDeclaration(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IODeclaration {
    pub(crate) is_input: bool,
    pub(crate) type_spec: TypeSpec,
    pub(crate) name: String,
    pub(crate) span: Span,
}

impl IODeclaration {
    pub fn new<T: ToString>(
        is_input: bool,
        type_spec: TypeSpec,
        name: T,
        span: Span,
    ) -> IODeclaration {
        IODeclaration {
            is_input,
            type_spec,
            name: name.to_string(),
            span,
        }
    }

    pub fn is_input(&self) -> bool {
        self.is_input
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::IODeclaration(Box::new(self))
    }
}

/// Left-hand side of an assignment: a name with optional index operators.
#[derive(Clone, Debug, PartialEq)]
pub struct LValue {
    pub(crate) name: String,
    pub(crate) indices: Vec<IndexKind>,
    pub(crate) span: Span,
}

impl LValue {
    pub fn new<T: ToString>(name: T, indices: Vec<IndexKind>, span: Span) -> LValue {
        LValue {
            name: name.to_string(),
            indices,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[IndexKind] {
        &self.indices
    }

    /// A resolved single-bit reference, used for emitted measurements.
    pub fn bit<T: ToString>(name: T, index: usize) -> LValue {
        LValue {
            name: name.to_string(),
            indices: vec![IndexKind::Expr(Expr::int(index as i64))],
            span: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub(crate) lvalue: LValue,
    // `Some(op)` for compound assignments such as `+=`.
    pub(crate) op: Option<BinaryOp>,
    pub(crate) rvalue: Expr,
    pub(crate) span: Span,
}

impl Assignment {
    pub fn new(lvalue: LValue, op: Option<BinaryOp>, rvalue: Expr, span: Span) -> Assignment {
        Assignment {
            lvalue,
            op,
            rvalue,
            span,
        }
    }

    pub fn lvalue(&self) -> &LValue {
        &self.lvalue
    }

    pub fn op(&self) -> Option<BinaryOp> {
        self.op
    }

    pub fn rvalue(&self) -> &Expr {
        &self.rvalue
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Assignment(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Alias {
    pub(crate) name: String,
    pub(crate) value: Expr,
    pub(crate) span: Span,
}

impl Alias {
    pub fn new<T: ToString>(name: T, value: Expr, span: Span) -> Alias {
        Alias {
            name: name.to_string(),
            value,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Expr {
        &self.value
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Alias(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateDefinition {
    pub(crate) name: String,
    pub(crate) params: Vec<String>,
    pub(crate) qubits: Vec<String>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) span: Span,
}

impl GateDefinition {
    pub fn new<T: ToString>(
        name: T,
        params: Vec<String>,
        qubits: Vec<String>,
        body: Vec<Stmt>,
        span: Span,
    ) -> GateDefinition {
        GateDefinition {
            name: name.to_string(),
            params,
            qubits,
            body,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn qubits(&self) -> &[String] {
        &self.qubits
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::GateDefinition(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GateModifier {
    Inv,
    Pow(Expr),
    Ctrl(Option<Expr>),
    NegCtrl(Option<Expr>),
}

/// A qubit-position operand of a gate, reset, barrier, delay or measurement.
#[derive(Clone, Debug, PartialEq)]
pub enum GateOperand {
    Identifier(Ident),
    HardwareQubit(HardwareQubit),
    Indexed(IndexedIdent),
}

impl GateOperand {
    pub fn span(&self) -> Span {
        match self {
            GateOperand::Identifier(id) => id.span,
            GateOperand::HardwareQubit(hwq) => hwq.span,
            GateOperand::Indexed(idx) => idx.span,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GateOperand::Identifier(id) => &id.name,
            GateOperand::HardwareQubit(hwq) => &hwq.name,
            GateOperand::Indexed(idx) => &idx.name,
        }
    }

    /// A fully resolved `(register, index)` reference.
    pub fn bit<T: ToString>(name: T, index: usize) -> GateOperand {
        GateOperand::Indexed(IndexedIdent {
            name: name.to_string(),
            indices: vec![IndexKind::Expr(Expr::int(index as i64))],
            span: None,
        })
    }

    /// The `(register, index)` pair of a resolved operand. Returns `None`
    /// for anything that is not a single constant index.
    pub fn resolved_bit(&self) -> Option<(&str, usize)> {
        match self {
            GateOperand::Indexed(idx) if idx.indices.len() == 1 => match &idx.indices[0] {
                IndexKind::Expr(Expr::IntLiteral(lit)) if lit.value >= 0 => {
                    Some((idx.name.as_str(), lit.value as usize))
                }
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub(crate) name: String,
    pub(crate) span: Span,
}

impl Ident {
    pub fn new<T: ToString>(name: T, span: Span) -> Ident {
        Ident {
            name: name.to_string(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_expr(self) -> Expr {
        Expr::Identifier(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HardwareQubit {
    // Name including the `$` prefix, e.g. `$2`.
    pub(crate) name: String,
    pub(crate) span: Span,
}

impl HardwareQubit {
    pub fn new<T: ToString>(name: T, span: Span) -> HardwareQubit {
        HardwareQubit {
            name: name.to_string(),
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The integer after the `$`.
    pub fn index(&self) -> Option<usize> {
        self.name.strip_prefix('$')?.parse().ok()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexedIdent {
    pub(crate) name: String,
    pub(crate) indices: Vec<IndexKind>,
    pub(crate) span: Span,
}

impl IndexedIdent {
    pub fn new<T: ToString>(name: T, indices: Vec<IndexKind>, span: Span) -> IndexedIdent {
        IndexedIdent {
            name: name.to_string(),
            indices,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[IndexKind] {
        &self.indices
    }
}

/// One index operator: `[expr]`, `[a:b:c]`, `[{a, b, c}]` or the
/// multi-dimensional `[i, j]`.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexKind {
    Expr(Expr),
    Range(RangeExpr),
    Set(Vec<Expr>),
    List(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GateCall {
    pub(crate) name: String,
    pub(crate) params: Vec<Expr>,
    pub(crate) qubits: Vec<GateOperand>,
    pub(crate) modifiers: Vec<GateModifier>,
    pub(crate) span: Span,
}

impl GateCall {
    pub fn new<T: ToString>(
        name: T,
        params: Vec<Expr>,
        qubits: Vec<GateOperand>,
        modifiers: Vec<GateModifier>,
        span: Span,
    ) -> GateCall {
        GateCall {
            name: name.to_string(),
            params,
            qubits,
            modifiers,
            span,
        }
    }

    /// Emitted basic gate with no parameters and resolved operands.
    pub fn basic<T: ToString>(name: T, qubits: Vec<GateOperand>) -> GateCall {
        GateCall::new(name, Vec::new(), qubits, Vec::new(), None)
    }

    /// Emitted rotation-style gate with float parameters.
    pub fn with_params<T: ToString>(name: T, params: Vec<f64>, qubits: Vec<GateOperand>) -> GateCall {
        GateCall::new(
            name,
            params.into_iter().map(Expr::float).collect(),
            qubits,
            Vec::new(),
            None,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Expr] {
        &self.params
    }

    pub fn qubits(&self) -> &[GateOperand] {
        &self.qubits
    }

    pub fn modifiers(&self) -> &[GateModifier] {
        &self.modifiers
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::GateCall(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GPhase {
    pub(crate) arg: Expr,
    pub(crate) qubits: Vec<GateOperand>,
    pub(crate) modifiers: Vec<GateModifier>,
    pub(crate) span: Span,
}

impl GPhase {
    pub fn new(arg: Expr, qubits: Vec<GateOperand>, modifiers: Vec<GateModifier>, span: Span) -> GPhase {
        GPhase {
            arg,
            qubits,
            modifiers,
            span,
        }
    }

    pub fn arg(&self) -> &Expr {
        &self.arg
    }

    pub fn qubits(&self) -> &[GateOperand] {
        &self.qubits
    }

    pub fn modifiers(&self) -> &[GateModifier] {
        &self.modifiers
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::GPhase(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub(crate) qubit: GateOperand,
    pub(crate) target: Option<LValue>,
    pub(crate) span: Span,
}

impl Measurement {
    pub fn new(qubit: GateOperand, target: Option<LValue>, span: Span) -> Measurement {
        Measurement {
            qubit,
            target,
            span,
        }
    }

    pub fn qubit(&self) -> &GateOperand {
        &self.qubit
    }

    pub fn target(&self) -> Option<&LValue> {
        self.target.as_ref()
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Measurement(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reset {
    pub(crate) target: GateOperand,
    pub(crate) span: Span,
}

impl Reset {
    pub fn new(target: GateOperand, span: Span) -> Reset {
        Reset { target, span }
    }

    pub fn target(&self) -> &GateOperand {
        &self.target
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Reset(self)
    }
}

// An empty qubit list means `barrier;`, which applies to every qubit
// declared so far.
#[derive(Clone, Debug, PartialEq)]
pub struct Barrier {
    pub(crate) qubits: Vec<GateOperand>,
    pub(crate) span: Span,
}

impl Barrier {
    pub fn new(qubits: Vec<GateOperand>, span: Span) -> Barrier {
        Barrier { qubits, span }
    }

    pub fn qubits(&self) -> &[GateOperand] {
        &self.qubits
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Barrier(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delay {
    pub(crate) duration: Expr,
    pub(crate) qubits: Vec<GateOperand>,
    pub(crate) span: Span,
}

impl Delay {
    pub fn new(duration: Expr, qubits: Vec<GateOperand>, span: Span) -> Delay {
        Delay {
            duration,
            qubits,
            span,
        }
    }

    pub fn duration(&self) -> &Expr {
        &self.duration
    }

    pub fn qubits(&self) -> &[GateOperand] {
        &self.qubits
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Delay(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxStmt {
    pub(crate) duration: Option<Expr>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) span: Span,
}

impl BoxStmt {
    pub fn new(duration: Option<Expr>, body: Vec<Stmt>, span: Span) -> BoxStmt {
        BoxStmt {
            duration,
            body,
            span,
        }
    }

    pub fn duration(&self) -> Option<&Expr> {
        self.duration.as_ref()
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Box_(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub(crate) condition: Expr,
    pub(crate) if_block: Vec<Stmt>,
    pub(crate) else_block: Vec<Stmt>,
    pub(crate) span: Span,
}

impl Branch {
    pub fn new(condition: Expr, if_block: Vec<Stmt>, else_block: Vec<Stmt>, span: Span) -> Branch {
        Branch {
            condition,
            if_block,
            else_block,
            span,
        }
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    pub fn if_block(&self) -> &[Stmt] {
        &self.if_block
    }

    pub fn else_block(&self) -> &[Stmt] {
        &self.else_block
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Branch(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct While {
    pub(crate) condition: Expr,
    pub(crate) body: Vec<Stmt>,
    pub(crate) span: Span,
}

impl While {
    pub fn new(condition: Expr, body: Vec<Stmt>, span: Span) -> While {
        While {
            condition,
            body,
            span,
        }
    }

    pub fn condition(&self) -> &Expr {
        &self.condition
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::While(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForIterable {
    Range(RangeExpr),
    Set(Vec<Expr>),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct For {
    pub(crate) type_spec: TypeSpec,
    pub(crate) ident: String,
    pub(crate) iterable: ForIterable,
    pub(crate) body: Vec<Stmt>,
    pub(crate) span: Span,
}

impl For {
    pub fn new<T: ToString>(
        type_spec: TypeSpec,
        ident: T,
        iterable: ForIterable,
        body: Vec<Stmt>,
        span: Span,
    ) -> For {
        For {
            type_spec,
            ident: ident.to_string(),
            iterable,
            body,
            span,
        }
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn iterable(&self) -> &ForIterable {
        &self.iterable
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::For(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCase {
    pub(crate) labels: Vec<Expr>,
    pub(crate) body: Vec<Stmt>,
}

impl SwitchCase {
    pub fn new(labels: Vec<Expr>, body: Vec<Stmt>) -> SwitchCase {
        SwitchCase { labels, body }
    }

    pub fn labels(&self) -> &[Expr] {
        &self.labels
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Switch {
    pub(crate) target: Expr,
    pub(crate) cases: Vec<SwitchCase>,
    pub(crate) default: Vec<Stmt>,
    pub(crate) span: Span,
}

impl Switch {
    pub fn new(target: Expr, cases: Vec<SwitchCase>, default: Vec<Stmt>, span: Span) -> Switch {
        Switch {
            target,
            cases,
            default,
            span,
        }
    }

    pub fn target(&self) -> &Expr {
        &self.target
    }

    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    pub fn default(&self) -> &[Stmt] {
        &self.default
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Switch(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubroutineParam {
    Classical { type_spec: TypeSpec, name: String },
    Quantum { name: String, size: Option<Expr> },
}

impl SubroutineParam {
    pub fn name(&self) -> &str {
        match self {
            SubroutineParam::Classical { name, .. } => name,
            SubroutineParam::Quantum { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubroutineDefinition {
    pub(crate) name: String,
    pub(crate) params: Vec<SubroutineParam>,
    pub(crate) return_type: Option<TypeSpec>,
    pub(crate) body: Vec<Stmt>,
    pub(crate) span: Span,
}

impl SubroutineDefinition {
    pub fn new<T: ToString>(
        name: T,
        params: Vec<SubroutineParam>,
        return_type: Option<TypeSpec>,
        body: Vec<Stmt>,
        span: Span,
    ) -> SubroutineDefinition {
        SubroutineDefinition {
            name: name.to_string(),
            params,
            return_type,
            body,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[SubroutineParam] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&TypeSpec> {
        self.return_type.as_ref()
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::SubroutineDefinition(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Return {
    pub(crate) value: Option<Expr>,
    pub(crate) span: Span,
}

impl Return {
    pub fn new(value: Option<Expr>, span: Span) -> Return {
        Return { value, span }
    }

    pub fn value(&self) -> Option<&Expr> {
        self.value.as_ref()
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Return(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub(crate) expr: Expr,
    pub(crate) span: Span,
}

impl ExprStmt {
    pub fn new(expr: Expr, span: Span) -> ExprStmt {
        ExprStmt { expr, span }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::ExprStmt(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pragma {
    pub(crate) text: String,
    pub(crate) span: Span,
}

impl Pragma {
    pub fn new<T: ToString>(text: T, span: Span) -> Pragma {
        Pragma {
            text: text.to_string(),
            span,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Pragma(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub(crate) text: String,
    pub(crate) span: Span,
}

impl Annotation {
    pub fn new<T: ToString>(text: T, span: Span) -> Annotation {
        Annotation {
            text: text.to_string(),
            span,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_stmt(self) -> Stmt {
        Stmt::Annotation(self)
    }
}

/// A statement kept verbatim without semantic analysis (`cal`, `defcal`,
/// `defcalgrammar`).
#[derive(Clone, Debug, PartialEq)]
pub struct VerbatimBlock {
    pub(crate) text: String,
    pub(crate) span: Span,
}

impl VerbatimBlock {
    pub fn new<T: ToString>(text: T, span: Span) -> VerbatimBlock {
        VerbatimBlock {
            text: text.to_string(),
            span,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

//
// Expressions
//

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    IntLiteral(IntLiteral),
    FloatLiteral(FloatLiteral),
    BoolLiteral(BoolLiteral),
    BitStringLiteral(BitStringLiteral),
    DurationLiteral(DurationLiteral),
    ImaginaryLiteral(FloatLiteral),
    Identifier(Ident),
    HardwareQubit(HardwareQubit),
    Index(Box<IndexExpression>),
    Range(Box<RangeExpr>),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Cast(Box<CastExpr>),
    Call(Box<FunctionCall>),
    Measure(Box<MeasureExpr>),
    ArrayLiteral(Vec<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Expr {
        Expr::IntLiteral(IntLiteral { value, span: None })
    }

    pub fn float(value: f64) -> Expr {
        Expr::FloatLiteral(FloatLiteral { value, span: None })
    }

    pub fn bool(value: bool) -> Expr {
        Expr::BoolLiteral(BoolLiteral { value, span: None })
    }

    pub fn ident<T: ToString>(name: T) -> Expr {
        Expr::Identifier(Ident::new(name, None))
    }

    pub fn span(&self) -> Span {
        use Expr::*;
        match self {
            IntLiteral(lit) => lit.span,
            FloatLiteral(lit) | ImaginaryLiteral(lit) => lit.span,
            BoolLiteral(lit) => lit.span,
            BitStringLiteral(lit) => lit.span,
            DurationLiteral(lit) => lit.span,
            Identifier(id) => id.span,
            HardwareQubit(hwq) => hwq.span,
            Index(ie) => ie.span,
            Range(r) => r.span,
            Unary(u) => u.span,
            Binary(b) => b.span,
            Cast(c) => c.span,
            Call(c) => c.span,
            Measure(m) => m.span,
            ArrayLiteral(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntLiteral {
    pub(crate) value: i64,
    pub(crate) span: Span,
}

impl IntLiteral {
    pub fn new(value: i64, span: Span) -> IntLiteral {
        IntLiteral { value, span }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn to_expr(self) -> Expr {
        Expr::IntLiteral(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloatLiteral {
    pub(crate) value: f64,
    pub(crate) span: Span,
}

impl FloatLiteral {
    pub fn new(value: f64, span: Span) -> FloatLiteral {
        FloatLiteral { value, span }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn to_expr(self) -> Expr {
        Expr::FloatLiteral(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoolLiteral {
    pub(crate) value: bool,
    pub(crate) span: Span,
}

impl BoolLiteral {
    pub fn new(value: bool, span: Span) -> BoolLiteral {
        BoolLiteral { value, span }
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn to_expr(self) -> Expr {
        Expr::BoolLiteral(self)
    }
}

/// `"0101"`. Bits are stored MSB-first: `bits[0]` corresponds to `c[0]`,
/// the most significant bit.
#[derive(Clone, Debug, PartialEq)]
pub struct BitStringLiteral {
    pub(crate) bits: Vec<bool>,
    pub(crate) span: Span,
}

impl BitStringLiteral {
    pub fn new(bits: Vec<bool>, span: Span) -> BitStringLiteral {
        BitStringLiteral { bits, span }
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn to_expr(self) -> Expr {
        Expr::BitStringLiteral(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    NanoSecond,
    MicroSecond,
    MilliSecond,
    Second,
    // Device ticks; carried symbolically.
    Dt,
}

impl TimeUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::NanoSecond => "ns",
            TimeUnit::MicroSecond => "us",
            TimeUnit::MilliSecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Dt => "dt",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DurationLiteral {
    pub(crate) value: f64,
    pub(crate) unit: TimeUnit,
    pub(crate) span: Span,
}

impl DurationLiteral {
    pub fn new(value: f64, unit: TimeUnit, span: Span) -> DurationLiteral {
        DurationLiteral { value, unit, span }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn to_expr(self) -> Expr {
        Expr::DurationLiteral(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexExpression {
    pub(crate) collection: Expr,
    pub(crate) index: IndexKind,
    pub(crate) span: Span,
}

impl IndexExpression {
    pub fn new(collection: Expr, index: IndexKind, span: Span) -> IndexExpression {
        IndexExpression {
            collection,
            index,
            span,
        }
    }

    pub fn collection(&self) -> &Expr {
        &self.collection
    }

    pub fn index(&self) -> &IndexKind {
        &self.index
    }

    pub fn to_expr(self) -> Expr {
        Expr::Index(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RangeExpr {
    pub(crate) start: Option<Expr>,
    pub(crate) step: Option<Expr>,
    pub(crate) stop: Option<Expr>,
    pub(crate) span: Span,
}

impl RangeExpr {
    pub fn new(start: Option<Expr>, step: Option<Expr>, stop: Option<Expr>, span: Span) -> RangeExpr {
        RangeExpr {
            start,
            step,
            stop,
            span,
        }
    }

    pub fn start(&self) -> Option<&Expr> {
        self.start.as_ref()
    }

    pub fn step(&self) -> Option<&Expr> {
        self.step.as_ref()
    }

    pub fn stop(&self) -> Option<&Expr> {
        self.stop.as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Minus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnaryExpr {
    pub(crate) op: UnaryOp,
    pub(crate) operand: Expr,
    pub(crate) span: Span,
}

impl UnaryExpr {
    pub fn new(op: UnaryOp, operand: Expr, span: Span) -> UnaryExpr {
        UnaryExpr { op, operand, span }
    }

    pub fn op(&self) -> UnaryOp {
        self.op
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn to_expr(self) -> Expr {
        Expr::Unary(Box::new(self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    AndAnd,
    OrOr,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Pow => "**",
            Shl => "<<",
            Shr => ">>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            AndAnd => "&&",
            OrOr => "||",
            Eq => "==",
            Neq => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Concat => "++",
        }
    }

    pub fn is_comparison(&self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Neq | Lt | Le | Gt | Ge)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryExpr {
    pub(crate) op: BinaryOp,
    pub(crate) lhs: Expr,
    pub(crate) rhs: Expr,
    pub(crate) span: Span,
}

impl BinaryExpr {
    pub fn new(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> BinaryExpr {
        BinaryExpr { op, lhs, rhs, span }
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn lhs(&self) -> &Expr {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    pub fn to_expr(self) -> Expr {
        Expr::Binary(Box::new(self))
    }
}

/// Explicit cast `T(e)`. Desugared by the visitor into the implicit
/// coercion pipeline used by declaration-initialization.
#[derive(Clone, Debug, PartialEq)]
pub struct CastExpr {
    pub(crate) target: TypeSpec,
    pub(crate) operand: Expr,
    pub(crate) span: Span,
}

impl CastExpr {
    pub fn new(target: TypeSpec, operand: Expr, span: Span) -> CastExpr {
        CastExpr {
            target,
            operand,
            span,
        }
    }

    pub fn target(&self) -> &TypeSpec {
        &self.target
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn to_expr(self) -> Expr {
        Expr::Cast(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub(crate) name: String,
    pub(crate) args: Vec<Expr>,
    pub(crate) span: Span,
}

impl FunctionCall {
    pub fn new<T: ToString>(name: T, args: Vec<Expr>, span: Span) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
            span,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    pub fn to_expr(self) -> Expr {
        Expr::Call(Box::new(self))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasureExpr {
    pub(crate) operand: GateOperand,
    pub(crate) span: Span,
}

impl MeasureExpr {
    pub fn new(operand: GateOperand, span: Span) -> MeasureExpr {
        MeasureExpr { operand, span }
    }

    pub fn operand(&self) -> &GateOperand {
        &self.operand
    }

    pub fn to_expr(self) -> Expr {
        Expr::Measure(Box::new(self))
    }
}

/// A variable as tracked by the scope manager: the resolved semantic type,
/// materialized value and the flags that gate assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: crate::types::Type,
    pub dims: Vec<usize>,
    pub value: Option<crate::value::Value>,
    pub is_constant: bool,
    pub is_register: bool,
    pub is_qubit: bool,
    pub readonly: bool,
    pub span: Span,
}

impl Variable {
    pub fn new<T: ToString>(name: T, ty: crate::types::Type, span: Span) -> Variable {
        Variable {
            name: name.to_string(),
            ty,
            dims: Vec::new(),
            value: None,
            is_constant: false,
            is_register: false,
            is_qubit: false,
            readonly: false,
            span,
        }
    }

    pub fn with_value(mut self, value: crate::value::Value) -> Variable {
        self.value = Some(value);
        self
    }

    pub fn constant(mut self) -> Variable {
        self.is_constant = true;
        self
    }

    pub fn register(mut self) -> Variable {
        self.is_register = true;
        self
    }

    pub fn qubit(mut self) -> Variable {
        self.is_qubit = true;
        self
    }

    pub fn readonly(mut self) -> Variable {
        self.readonly = true;
        self
    }
}

