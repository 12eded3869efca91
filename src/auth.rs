//! Identifiers, scopes, tokens, and credential records.

pub mod id;
pub mod record;
pub mod scope;
pub mod token;

pub use id::*;
pub use record::*;
pub use scope::*;
pub use token::{secret::*, *};
