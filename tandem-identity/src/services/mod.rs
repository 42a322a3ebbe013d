pub mod credentials;
pub mod federation;
pub mod identity;
pub mod normalize;
pub mod patch;
pub mod reset;
pub mod revocation;
pub mod tokens;

pub use identity::{Collaborators, IdentityService};
