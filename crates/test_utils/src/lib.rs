#![deny(missing_docs)]
//! Test utilities to help with testing hashvend.

pub mod content;
pub mod id;

/// Enable tracing with the RUST_LOG environment variable.
///
/// This is intended to be used in tests, so it defaults to DEBUG level.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .try_init();
}

/// Generate `len` random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::Rng;
    let mut out = vec![0; len];
    rand::thread_rng().fill(&mut out[..]);
    out
}

/// Repeatedly run a code block until it breaks or returns, sleeping
/// between attempts. Panics if `timeout_ms` elapses first.
///
/// ```ignore
/// let peer = iter_check!(1000, 10, {
///     if let Some(peer) = find_peer() {
///         return peer;
///     }
/// });
/// ```
#[macro_export]
macro_rules! iter_check {
    ($timeout_ms:expr, $sleep_ms:expr, $code:block) => {
        tokio::time::timeout(
            std::time::Duration::from_millis($timeout_ms),
            async {
                loop {
                    $code
                    tokio::time::sleep(std::time::Duration::from_millis(
                        $sleep_ms,
                    ))
                    .await;
                }
            },
        )
        .await
        .expect("iter_check timed out")
    };
    ($timeout_ms:expr, $code:block) => {
        $crate::iter_check!($timeout_ms, 10, $code)
    };
}
