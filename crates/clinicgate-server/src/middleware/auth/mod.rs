//! Session boundary: turns a bearer token into an [`AuthUser`] extension.
//!
//! Authentication itself belongs to the identity provider; this module only
//! verifies the session token it issued and exposes caller identity and role
//! to the layers behind it.

pub mod extractor;
pub mod jwt;
pub mod layer;
pub mod types;

pub use extractor::MaybeAuth;
pub use jwt::{decode_token, encode_token};
pub use layer::{SessionLayer, SessionMiddleware};
pub use types::{AuthUser, Claims};
