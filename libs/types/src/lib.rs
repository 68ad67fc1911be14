//! Types library for the upgradeable custody vault
//!
//! Identity and amount types shared by the contract layer. These types are
//! part of the persisted layout, so their encoding is frozen.
//!
//! # Modules
//! - `ids`: Identities (Address, AssetId, OperationId)
//! - `numeric`: Amount and timestamp aliases
//! - `errors`: Parse errors for identities

pub mod ids;
pub mod numeric;
pub mod errors;

pub use ids::{Address, AssetId, OperationId};
pub use numeric::{Amount, Timestamp};

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
}
