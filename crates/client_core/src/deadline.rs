//! Task-with-deadline wrapper for in-flight requests.

use std::{future::Future, time::Duration};

use thiserror::Error;

/// Why a guarded future stopped before producing its own output.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Interrupted {
    #[error("deadline of {after:?} elapsed")]
    DeadlineElapsed { after: Duration },
}

/// Runs `future` until it completes or `deadline` elapses.
///
/// On expiry the future is dropped, which aborts any request it owns.
pub async fn with_deadline<F>(deadline: Duration, future: F) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| Interrupted::DeadlineElapsed { after: deadline })
}
