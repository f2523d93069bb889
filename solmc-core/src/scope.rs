#![forbid(unsafe_code)]

use std::collections::HashMap;

use solmc_backend_c::CExpr;

use crate::names;

/// How an identifier occurrence is spelled in the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopedName {
    Local(String),
    /// `this`
    Receiver,
    /// `msg`, `block`, `tx`
    CallState,
    /// A member of the current receiver.
    Member(String),
}

impl ScopedName {
    pub fn to_expr(&self) -> CExpr {
        match self {
            ScopedName::Local(name) => CExpr::id(name.as_str()),
            ScopedName::Receiver => CExpr::id("self"),
            ScopedName::CallState => CExpr::id("state"),
            ScopedName::Member(name) => CExpr::id("self").arrow(names::field(name)),
        }
    }
}

/// Lexical scopes of one function body. Frames are pushed and popped in
/// strict LIFO order mirroring block nesting. Each frame maps a source name
/// to the target name it is declared under.
#[derive(Debug, Default)]
pub struct ScopeResolver {
    frames: Vec<HashMap<String, String>>,
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn exit(&mut self) {
        debug_assert!(!self.frames.is_empty(), "scope exit without enter");
        self.frames.pop();
    }

    /// Declares `name` in the innermost frame.
    pub fn record(&mut self, name: &str) {
        self.record_as(name, name);
    }

    /// Declares `name` in the innermost frame, spelled `target` in the output.
    pub fn record_as(&mut self, name: &str, target: &str) {
        if self.frames.is_empty() {
            self.enter();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), target.to_string());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.contains_key(name))
    }

    pub fn resolve(&self, name: &str) -> ScopedName {
        if let Some(target) = self.frames.iter().rev().find_map(|f| f.get(name)) {
            return ScopedName::Local(target.clone());
        }
        match name {
            "this" => ScopedName::Receiver,
            "block" | "msg" | "tx" => ScopedName::CallState,
            _ => ScopedName::Member(name.to_string()),
        }
    }
}
