#![forbid(unsafe_code)]

//! Closes the translated contracts into a runnable model: the actor set, the
//! address space and the `main` that drives them.

pub mod actor;
pub mod address;
pub mod harness;
mod program;

pub use actor::{Actor, ActorBuilder, ActorFunction, ParamSlot, TicketSystem};
pub use address::AddressAllocator;
pub use harness::HarnessSynthesizer;
pub use program::{Collaborators, DefaultCollaborators, translate};
