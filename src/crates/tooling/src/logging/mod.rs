//! Logging utilities
//!
//! Provides helper functions and macros for structured logging with tracing.

use std::time::Instant;
use tracing::debug;

/// Log execution time of a function
///
/// # Example
///
/// ```rust,ignore
/// use tooling::logging::timed;
///
/// async fn slow_operation() {
///     tokio::time::sleep(Duration::from_millis(100)).await;
/// }
///
/// timed("slow_operation", slow_operation()).await;
/// ```
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    debug!("Starting: {}", name);

    let result = future.await;

    let elapsed = start.elapsed();
    debug!("Completed: {} in {:?}", name, elapsed);

    result
}
