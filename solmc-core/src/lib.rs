#![forbid(unsafe_code)]

//! Translation core: type resolution, scoping and lowering of contract
//! bodies into C, plus the collaborators the lowering consults.

pub mod call_state;
mod config;
mod error;
pub mod graph;
pub mod lower;
pub mod names;
pub mod scalar;
mod scope;
pub mod summary;
pub mod types;

pub use call_state::{CALL_STATE_STRUCT, CallStateField};
pub use config::{DEFAULT_ADDRESS_COUNT, TranslationConfig};
pub use error::{Result, TranslateError};
pub use graph::{AllReachable, Child, InstantiationGraph, NewCallGraph, Reachability};
pub use lower::{LoweringContext, lower_contract};
pub use scalar::Scalar;
pub use scope::{ScopeResolver, ScopedName};
pub use summary::{FlatMappingSummary, MapRecord, MappingSummary, RecordDefs};
pub use types::{RecordKind, TypeBinding, TypeTable};
