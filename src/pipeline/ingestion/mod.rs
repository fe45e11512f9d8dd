pub mod paginator;
pub mod rate_limiter;
