//! Inbound (admission, rate limit) and outbound (throttle, retry) pipelines.

pub mod admission;
pub mod inbound;
pub mod outbound;
pub mod rate_limit;

pub use admission::AdmissionFilter;
pub use inbound::{Disposition, InboundPipeline, InboundStage, StageOutcome};
pub use outbound::OutboundConfig;
pub use rate_limit::{RateLimitConfig, RateLimitKey, RateLimitStage, WindowRateLimiter};
