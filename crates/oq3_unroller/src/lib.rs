// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

//! Semantic analysis and unrolling of OpenQASM 3 programs.
//!
//! A program is loaded into a [`QasmModule`], validated, and flattened into
//! an equivalent program made only of declarations and basic gate
//! applications, barriers, resets and measurements. Custom gates,
//! subroutines, loops, branches, aliases, classical expressions and gate
//! modifiers are fully resolved in the process. Parsing is delegated to the
//! `oq3_syntax` crate; this crate consumes and produces statement trees.
//!
//! ```no_run
//! let mut module = oq3_unroller::loads(
//!     r#"
//!     OPENQASM 3.0;
//!     include "stdgates.inc";
//!     qubit[2] q;
//!     h q[0];
//!     cx q[0], q[1];
//!     "#,
//! )
//! .unwrap();
//! module.unroll().unwrap();
//! println!("{}", oq3_unroller::dumps(&module));
//! ```

pub mod analyzer;
pub mod ast;
pub mod decomposer;
pub mod depth;
pub mod error;
mod evaluator;
pub mod gates;
pub mod module;
pub mod preprocess;
pub mod printer;
pub mod registers;
pub mod scope;
mod subroutines;
mod syntax_to_ast;
mod transformer;
pub mod types;
pub mod value;
mod visitor;

use std::path::Path;

pub use decomposer::BasisSet;
pub use error::{Error, ErrorKind, Result};
pub use module::{CompareReport, QasmModule};
pub use printer::Flavor;
pub use visitor::UnrollOptions;

/// Load an OpenQASM program from source text into a [`QasmModule`].
pub fn loads(program: &str) -> Result<QasmModule> {
    loads_with_path(program, None)
}

/// Load an OpenQASM program from a file. Includes are resolved relative to
/// the file's directory.
pub fn load<P: AsRef<Path>>(path: P) -> Result<QasmModule> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|err| {
        Error::syntax(
            format!("failed to read OpenQASM file '{}': {err}", path.display()),
            None,
        )
    })?;
    loads_with_path(&source, Some(path))
}

fn loads_with_path(program: &str, path: Option<&Path>) -> Result<QasmModule> {
    preprocess::check_line_endings(program)?;
    let version = preprocess::extract_version(program)?;
    let flavor = if version.starts_with('2') {
        Flavor::Qasm2
    } else {
        Flavor::Qasm3
    };
    let converted;
    let source = if flavor == Flavor::Qasm2 {
        converted = preprocess::convert_qasm2(program)?;
        converted.as_str()
    } else {
        program
    };
    let processed = preprocess::process_includes(source, path)?;
    let parsed = syntax_to_ast::parse_program(&processed, &version)?;
    Ok(QasmModule::new(
        "main",
        flavor,
        version,
        parsed.into_statements(),
    ))
}

/// Serialize a module: the unrolled program when available, the original
/// program otherwise.
pub fn dumps(module: &QasmModule) -> String {
    module.to_qasm_string()
}

/// Write the serialized module to `path`.
pub fn dump<P: AsRef<Path>>(module: &QasmModule, path: P) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, dumps(module)).map_err(|err| {
        Error::syntax(
            format!("failed to write OpenQASM file '{}': {err}", path.display()),
            None,
        )
    })
}
