//! Fungible asset creation
//!
//! Definitions and supply changes for new assets, bundled in one complete
//! aggregate signed by the owner.

pub mod issuer;

pub use issuer::{AssetError, AssetIssuer, AssetPlan, IssueOutcome};
