pub mod cookie;
mod extractors;
mod model;
mod store;

pub use extractors::SessionUser;
pub use model::{random_token, SessionIdentity, SessionRecord};
pub use store::{MemorySessionStore, PgSessionStore, SessionStore};
