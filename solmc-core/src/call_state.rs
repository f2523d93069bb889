#![forbid(unsafe_code)]

//! The implicit per-call context threaded through every modelled call.

use solmc_ast::{Expr, MagicKind, SourceType};
use solmc_backend_c::{CExpr, CStruct, CVarDecl};

use crate::scalar::Scalar;

pub const CALL_STATE_STRUCT: &str = "CallState";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallStateField {
    Sender,
    Value,
    Block,
    Timestamp,
    Paid,
    Origin,
    ReqFail,
}

impl CallStateField {
    pub const ALL: [CallStateField; 7] = [
        CallStateField::Sender,
        CallStateField::Value,
        CallStateField::Block,
        CallStateField::Timestamp,
        CallStateField::Paid,
        CallStateField::Origin,
        CallStateField::ReqFail,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CallStateField::Sender => "sender",
            CallStateField::Value => "value",
            CallStateField::Block => "blocknum",
            CallStateField::Timestamp => "timestamp",
            CallStateField::Paid => "paid",
            CallStateField::Origin => "origin",
            CallStateField::ReqFail => "reqfail",
        }
    }

    pub fn scalar(self) -> Scalar {
        match self {
            CallStateField::Sender | CallStateField::Origin => Scalar::Address,
            CallStateField::Value | CallStateField::Block | CallStateField::Timestamp => {
                Scalar::UINT256
            }
            CallStateField::Paid | CallStateField::ReqFail => Scalar::Bool,
        }
    }

    /// Libraries receive no ether.
    pub fn is_contract_only(self) -> bool {
        matches!(self, CallStateField::Value | CallStateField::Paid)
    }

    pub fn from_magic(kind: MagicKind, member: &str) -> Option<CallStateField> {
        match (kind, member) {
            (MagicKind::Message, "sender") => Some(CallStateField::Sender),
            (MagicKind::Message, "value") => Some(CallStateField::Value),
            (MagicKind::Block, "number") => Some(CallStateField::Block),
            (MagicKind::Block, "timestamp") => Some(CallStateField::Timestamp),
            (MagicKind::Transaction, "origin") => Some(CallStateField::Origin),
            _ => None,
        }
    }

    /// `state->field`, as seen from inside a modelled function.
    pub fn access(self) -> CExpr {
        CExpr::id("state").arrow(self.name())
    }

    pub fn struct_def() -> CStruct {
        CStruct {
            name: CALL_STATE_STRUCT.to_string(),
            fields: Self::ALL
                .iter()
                .map(|f| CVarDecl::new(f.scalar().ctype(), f.name()))
                .collect(),
        }
    }
}

/// The magic global an expression names, if any.
pub fn magic_kind(expr: &Expr) -> Option<MagicKind> {
    if let SourceType::Magic(kind) = expr.ty {
        return Some(kind);
    }
    match expr.builtin_name()? {
        "msg" => Some(MagicKind::Message),
        "block" => Some(MagicKind::Block),
        "tx" => Some(MagicKind::Transaction),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_members_map_to_fields() {
        assert_eq!(
            CallStateField::from_magic(MagicKind::Message, "sender"),
            Some(CallStateField::Sender)
        );
        assert_eq!(
            CallStateField::from_magic(MagicKind::Block, "number").map(CallStateField::name),
            Some("blocknum")
        );
        assert_eq!(CallStateField::from_magic(MagicKind::Message, "data"), None);
    }

    #[test]
    fn only_value_and_paid_are_contract_only() {
        let only: Vec<_> = CallStateField::ALL
            .iter()
            .filter(|f| f.is_contract_only())
            .map(|f| f.name())
            .collect();
        assert_eq!(only, vec!["value", "paid"]);
    }

    #[test]
    fn struct_has_one_field_per_kind() {
        let s = CallStateField::struct_def();
        assert_eq!(s.type_name(), "struct CallState");
        assert_eq!(s.fields.len(), CallStateField::ALL.len());
        assert_eq!(s.fields[0].ty, "sol_address_t");
    }
}
