pub mod factory;
pub mod provider;
pub mod resolver;
pub mod session;

pub use factory::{ProviderServices, build_provider_services};
pub use provider::{ForwardError, ProviderForwarder};
pub use resolver::{HttpSessionResolver, ResolveError, SessionLookup, SessionResolver};
pub use session::{SessionRecord, SessionUser};
