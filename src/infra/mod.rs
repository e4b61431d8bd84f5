pub mod http_client;
pub mod rate_limiter;

pub use http_client::ReqwestPosterFetcher;
pub use rate_limiter::{RequestRateLimiter, Unlimited};
