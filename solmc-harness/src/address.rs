#![forbid(unsafe_code)]

//! The bounded address space of the model.
//!
//! Addresses below `min_addr` are taken by constants written in the source
//! (`address(0)` is always one of them); actors receive the remaining values
//! in increasing order.

use std::collections::BTreeSet;

use solmc_backend_c::{CExpr, CStmt, CVarDecl};
use solmc_core::names;
use solmc_core::{Result, Scalar, TranslateError};

#[derive(Clone, Debug)]
pub struct AddressAllocator {
    /// Source literals; the position of a literal is its model address.
    constants: Vec<u64>,
    next: u64,
    /// Exclusive upper bound.
    end: u64,
}

impl AddressAllocator {
    pub fn new(literals: &[u64], address_count: u64) -> Self {
        let mut constants: BTreeSet<u64> = literals.iter().copied().collect();
        constants.insert(0);
        let constants: Vec<u64> = constants.into_iter().collect();
        Self {
            next: constants.len() as u64,
            constants,
            end: address_count,
        }
    }

    pub fn min_addr(&self) -> u64 {
        self.constants.len() as u64
    }

    /// Addresses still available to actors.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.next)
    }

    /// Fails when the source constants alone do not fit the address space.
    pub fn check_constants(&self) -> Result<()> {
        if self.min_addr() > self.end {
            return Err(TranslateError::AddressExhausted { count: self.end });
        }
        Ok(())
    }

    pub fn reserve(&mut self) -> Result<u64> {
        if self.next >= self.end {
            return Err(TranslateError::AddressExhausted { count: self.end });
        }
        let addr = self.next;
        self.next += 1;
        Ok(addr)
    }

    /// File-scope declarations of the constant addresses.
    pub fn globals(&self) -> Vec<CVarDecl> {
        self.constants
            .iter()
            .map(|lit| CVarDecl::new(Scalar::Address.ctype(), names::global_address(*lit)))
            .collect()
    }

    /// Binds every constant to its reserved model address.
    pub fn map_constants(&self) -> Vec<CStmt> {
        self.constants
            .iter()
            .zip(0u64..)
            .map(|(lit, addr)| {
                CExpr::assign(
                    CExpr::id(names::global_address(*lit)),
                    Scalar::Address.wrap(CExpr::Int(addr)),
                )
                .stmt()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_sit_below_actor_addresses() {
        let mut alloc = AddressAllocator::new(&[7, 3, 7], 6);
        assert_eq!(alloc.min_addr(), 3);
        assert_eq!(alloc.reserve().unwrap(), 3);

        let mapped: Vec<String> = alloc.map_constants().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            mapped,
            vec![
                "(global_address_0)=(Init_sol_address_t(0));\n",
                "(global_address_3)=(Init_sol_address_t(1));\n",
                "(global_address_7)=(Init_sol_address_t(2));\n",
            ]
        );
    }

    #[test]
    fn constants_beyond_the_address_count_are_rejected() {
        let alloc = AddressAllocator::new(&[1, 2, 3], 4);
        assert!(alloc.check_constants().is_ok());

        let alloc = AddressAllocator::new(&[1, 2, 3, 4], 4);
        let err = alloc.check_constants().unwrap_err();
        assert!(matches!(err, TranslateError::AddressExhausted { count: 4 }));
    }

    #[test]
    fn exhaustion_reports_the_address_count() {
        let mut alloc = AddressAllocator::new(&[], 2);
        assert_eq!(alloc.reserve().unwrap(), 1);
        assert_eq!(alloc.remaining(), 0);
        let err = alloc.reserve().unwrap_err();
        assert!(matches!(err, TranslateError::AddressExhausted { count: 2 }));
    }
}
