//! Authentication core: who is calling, may they proceed, and how many times
//! have they failed.

pub mod capability;
pub mod cookies;
pub mod rate_limit;
pub mod resolver;
pub mod session;
pub mod validation;

pub use capability::{Capability, Decision, Panel, decide, landing_panel, redirect_target};
pub use cookies::CookiePolicy;
pub use rate_limit::{AttemptOutcome, RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use resolver::{Credentials, Identity, TokenResolver, TokenSource};
pub use session::{BridgeOutcome, SessionBridge};
