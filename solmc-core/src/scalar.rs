#![forbid(unsafe_code)]

//! Scalar target types and the constructors for their initial and
//! nondeterministic values.

use solmc_ast::ElementaryType;
use solmc_backend_c::CExpr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Address,
    Int { signed: bool, bits: u16 },
    Fixed { signed: bool, bits: u16, fractional: u8 },
}

impl Scalar {
    pub const UINT8: Scalar = Scalar::Int {
        signed: false,
        bits: 8,
    };
    pub const UINT256: Scalar = Scalar::Int {
        signed: false,
        bits: 256,
    };

    /// Strings have no faithful model; they are approximated by an
    /// unsigned 256-bit value.
    pub fn from_elementary(ty: ElementaryType) -> Scalar {
        match ty {
            ElementaryType::Bool => Scalar::Bool,
            ElementaryType::Address { .. } => Scalar::Address,
            ElementaryType::Int { signed, bits } => Scalar::Int { signed, bits },
            ElementaryType::Fixed {
                signed,
                bits,
                fractional,
            } => Scalar::Fixed {
                signed,
                bits,
                fractional,
            },
            ElementaryType::String => Scalar::UINT256,
        }
    }

    pub fn ctype(&self) -> String {
        match self {
            Scalar::Bool => "sol_bool_t".to_string(),
            Scalar::Address => "sol_address_t".to_string(),
            Scalar::Int { signed, bits } => {
                format!("sol_{}int{bits}_t", if *signed { "" } else { "u" })
            }
            Scalar::Fixed {
                signed,
                bits,
                fractional,
            } => format!(
                "sol_{}fixed{bits}X{fractional}_t",
                if *signed { "" } else { "u" }
            ),
        }
    }

    /// `Init_<T>(v)`
    pub fn wrap(&self, value: CExpr) -> CExpr {
        CExpr::call(format!("Init_{}", self.ctype()), vec![value])
    }

    pub fn zero(&self) -> CExpr {
        self.wrap(CExpr::Int(0))
    }

    pub fn nondet(&self, address_count: u64, msg: &str) -> CExpr {
        let raw = match self {
            Scalar::Bool => range(0, 2, msg),
            Scalar::Address => range(0, address_count, msg),
            Scalar::Int { signed, bits } | Scalar::Fixed { signed, bits, .. } => {
                let prefix = if *signed { "" } else { "u" };
                CExpr::call(format!("nd_{prefix}int{bits}_t"), vec![CExpr::str(msg)])
            }
        };
        self.wrap(raw)
    }
}

/// A value in `[lo, hi)`. A range holding a single value is that value.
pub fn range(lo: u64, hi: u64, msg: &str) -> CExpr {
    if lo.checked_add(1) == Some(hi) {
        return CExpr::Int(lo);
    }
    CExpr::call(
        "nd_range",
        vec![CExpr::Int(lo), CExpr::Int(hi), CExpr::str(msg)],
    )
}
