// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Lexical scope chain for the visitor. Every block gets a fresh map so a
// block may shadow a name from its parent; lookups walk outward until a
// FUNCTION / GATE / GLOBAL boundary context.

use hashbrown::HashMap;

use crate::ast::Variable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    /// Top level.
    Global,
    /// Body of if/else/for/while/switch-case.
    Block,
    /// Body of a subroutine call.
    Function,
    /// Body of a gate expansion.
    Gate,
    /// Body of a box.
    Box_,
}

#[derive(Clone, Debug)]
pub struct ScopeManager {
    scopes: Vec<HashMap<String, Variable>>,
    contexts: Vec<Context>,
}

impl ScopeManager {
    pub fn new() -> ScopeManager {
        ScopeManager {
            scopes: vec![HashMap::new()],
            contexts: vec![Context::Global],
        }
    }

    pub fn push(&mut self, context: Context) {
        self.scopes.push(HashMap::new());
        self.contexts.push(context);
    }

    pub fn pop(&mut self) {
        // The global scope is never popped.
        if self.scopes.len() > 1 {
            self.scopes.pop();
            self.contexts.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current_context(&self) -> Context {
        *self.contexts.last().unwrap()
    }

    pub fn in_global_scope(&self) -> bool {
        self.scopes.len() == 1 && self.current_context() == Context::Global
    }

    pub fn in_function_scope(&self) -> bool {
        self.scopes.len() > 1 && self.current_context() == Context::Function
    }

    pub fn in_gate_scope(&self) -> bool {
        self.current_context() == Context::Gate
    }

    pub fn in_block_scope(&self) -> bool {
        self.scopes.len() > 1 && self.current_context() == Context::Block
    }

    pub fn in_box_scope(&self) -> bool {
        self.scopes.len() > 1 && self.current_context() == Context::Box_
    }

    fn global_scope(&self) -> &HashMap<String, Variable> {
        &self.scopes[0]
    }

    fn current_scope(&self) -> &HashMap<String, Variable> {
        self.scopes.last().unwrap()
    }

    fn current_scope_mut(&mut self) -> &mut HashMap<String, Variable> {
        self.scopes.last_mut().unwrap()
    }

    pub fn declared_in_current_scope(&self, name: &str) -> bool {
        self.current_scope().contains_key(name)
    }

    /// Is `name` visible from the current position? Block scopes see their
    /// ancestors up to the enclosing function/gate/global boundary; function
    /// and gate scopes additionally see global constants and qubits.
    pub fn check_in_scope(&self, name: &str) -> bool {
        if self.in_global_scope() {
            return self.global_scope().contains_key(name);
        }
        if self.in_function_scope() || self.in_gate_scope() || self.in_box_scope() {
            if self.current_scope().contains_key(name) {
                return true;
            }
            return self
                .global_scope()
                .get(name)
                .is_some_and(|var| var.is_constant || var.is_qubit);
        }
        if self.in_block_scope() {
            for (scope, context) in self.scopes.iter().rev().zip(self.contexts.iter().rev()) {
                if *context != Context::Block {
                    return scope.contains_key(name);
                }
                if scope.contains_key(name) {
                    return true;
                }
            }
        }
        false
    }

    pub fn get_from_visible_scope(&self, name: &str) -> Option<&Variable> {
        if self.in_global_scope() {
            return self.global_scope().get(name);
        }
        if self.in_function_scope() || self.in_gate_scope() || self.in_box_scope() {
            if let Some(var) = self.current_scope().get(name) {
                return Some(var);
            }
            return self
                .global_scope()
                .get(name)
                .filter(|var| var.is_constant || var.is_qubit);
        }
        if self.in_block_scope() {
            for (scope, context) in self.scopes.iter().rev().zip(self.contexts.iter().rev()) {
                if *context != Context::Block {
                    return scope.get(name).or_else(|| self.global_scope().get(name));
                }
                if let Some(var) = scope.get(name) {
                    return Some(var);
                }
            }
        }
        None
    }

    pub fn get_from_global_scope(&self, name: &str) -> Option<&Variable> {
        self.global_scope().get(name)
    }

    /// Declare in the current scope. The caller checks for redeclaration
    /// first; a collision here is a programming error.
    pub fn add_var(&mut self, variable: Variable) {
        let name = variable.name.clone();
        self.current_scope_mut().insert(name, variable);
    }

    /// Write back a (possibly re-valued) variable into the scope that owns
    /// it, honoring block shadowing.
    pub fn update_var(&mut self, variable: Variable) {
        if self.in_global_scope() {
            self.scopes[0].insert(variable.name.clone(), variable);
            return;
        }
        if self.in_function_scope() || self.in_gate_scope() || self.in_box_scope() {
            self.current_scope_mut()
                .insert(variable.name.clone(), variable);
            return;
        }
        if self.in_block_scope() {
            let positions: Vec<usize> = (0..self.scopes.len()).rev().collect();
            for pos in positions {
                if self.contexts[pos] != Context::Block {
                    self.scopes[pos].insert(variable.name.clone(), variable);
                    return;
                }
                if self.scopes[pos].contains_key(&variable.name) {
                    self.scopes[pos].insert(variable.name.clone(), variable);
                    return;
                }
            }
        }
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IsConst, Type};

    fn int_var(name: &str, value: i64) -> Variable {
        Variable::new(name, Type::Int(Some(32), IsConst::False), None)
            .with_value(crate::value::Value::Int(value))
    }

    #[test]
    fn test_block_scope_sees_parent() {
        let mut scopes = ScopeManager::new();
        scopes.add_var(int_var("a", 1));
        scopes.push(Context::Block);
        assert!(scopes.check_in_scope("a"));
        scopes.add_var(int_var("a", 2));
        assert_eq!(
            scopes.get_from_visible_scope("a").unwrap().value,
            Some(crate::value::Value::Int(2))
        );
        scopes.pop();
        assert_eq!(
            scopes.get_from_visible_scope("a").unwrap().value,
            Some(crate::value::Value::Int(1))
        );
    }

    #[test]
    fn test_function_scope_sees_only_constants() {
        let mut scopes = ScopeManager::new();
        scopes.add_var(int_var("a", 1));
        scopes.add_var(int_var("c", 2).constant());
        scopes.push(Context::Function);
        assert!(!scopes.check_in_scope("a"));
        assert!(scopes.check_in_scope("c"));
        scopes.pop();
    }

    #[test]
    fn test_update_through_block() {
        let mut scopes = ScopeManager::new();
        scopes.add_var(int_var("i", 0));
        scopes.push(Context::Block);
        let mut var = scopes.get_from_visible_scope("i").unwrap().clone();
        var.value = Some(crate::value::Value::Int(5));
        scopes.update_var(var);
        scopes.pop();
        assert_eq!(
            scopes.get_from_visible_scope("i").unwrap().value,
            Some(crate::value::Value::Int(5))
        );
    }
}
