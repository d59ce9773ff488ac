//! Timeout and cancellation handling for collaborator calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CallResult, CollaboratorError, Step};

/// Issue a collaborator call unless the caller has cancelled.
///
/// Cancellation is only checked before the call is issued; a call already
/// in flight runs until it answers or the timeout expires. An expired
/// timeout is reported as `Unavailable`.
pub(crate) async fn guarded<T, F>(
    step: Step,
    target: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    call: F,
) -> CallResult<T>
where
    F: Future<Output = CallResult<T>>,
{
    if cancel.is_cancelled() {
        debug!(step = %step, subject = target, "Skipping call, cancelled");
        return Err(CollaboratorError::Cancelled { step });
    }

    debug!(step = %step, subject = target, "Calling collaborator");
    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::unavailable(
            step,
            format!("timed out after {}", format_duration(timeout)),
        )),
    };

    if let Err(error) = &result {
        warn!(step = %step, subject = target, kind = error.kind(), "{}", error);
    }
    result
}

pub(crate) fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unavailable() {
        let cancel = CancellationToken::new();
        let result: CallResult<()> = guarded(
            Step::Validate,
            "12",
            Duration::from_secs(30),
            &cancel,
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "CollaboratorUnavailable");
        assert_eq!(
            err.to_string(),
            "validate collaborator unavailable: timed out after 30s"
        );
    }

    #[tokio::test]
    async fn test_cancelled_call_is_never_issued() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut issued = false;
        let result: CallResult<()> = guarded(Step::Import, "5", Duration::from_secs(1), &cancel, async {
            issued = true;
            Ok(())
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(!issued);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
    }
}
