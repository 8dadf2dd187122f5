//! Runtime-agnostic sleep used by the poll loop.
//!
//! `smol` takes precedence when both runtime features are enabled.

use std::time::Duration;

/// Sleep for the specified duration using the selected runtime
pub async fn sleep(duration: Duration) {
    #[cfg(feature = "smol")]
    {
        smol::Timer::after(duration).await;
    }

    #[cfg(all(feature = "tokio", not(feature = "smol")))]
    {
        tokio::time::sleep(duration).await;
    }

    #[cfg(not(any(feature = "smol", feature = "tokio")))]
    {
        compile_error!("One of the runtime features must be enabled: smol or tokio");
    }
}
