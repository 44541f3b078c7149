//! Central identity management: principals, the token codec, authentication
//! and session lifecycle. Keep the public surface thin and split
//! implementation across sub-modules.

mod authenticator;
mod codec;
mod principal;
mod session;

pub use authenticator::Authenticator;
pub use codec::{Claims, InvalidSignature, TokenCodec, AUTH_PURPOSE};
pub use principal::{Principal, PublicPrincipal, TokenEntry};
pub use session::SessionManager;
