//! Credential types held by the coordinator and the user view derived from them.

pub mod claims;
pub mod token;

pub use claims::*;
pub use token::*;
