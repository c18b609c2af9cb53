//! Exit code logic for the bibarchive process.
//!
//! Single responsibility: map the outcome of a run to the process exit code.

use bibarchive_core::ArchiveError;

use crate::ProcessExit;

/// Determines the process exit outcome for a failed run.
///
/// Records that could not be archived never reach here; a run that
/// completes is a success regardless of how many were archived.
pub(crate) fn exit_for_error(error: &anyhow::Error) -> ProcessExit {
    let interrupted = error
        .chain()
        .any(|cause| cause.downcast_ref::<ArchiveError>().is_some_and(ArchiveError::is_cancelled));
    if interrupted {
        ProcessExit::Interrupted
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_cancelled_run_is_interrupted() {
        let error = anyhow::Error::new(ArchiveError::Cancelled);
        assert_eq!(exit_for_error(&error), ProcessExit::Interrupted);
    }

    #[test]
    fn test_cancelled_cause_behind_context_is_interrupted() {
        let error = Err::<(), _>(ArchiveError::Cancelled)
            .context("Archive run failed")
            .unwrap_err();
        assert_eq!(exit_for_error(&error), ProcessExit::Interrupted);
    }

    #[test]
    fn test_other_errors_fail() {
        let error = anyhow::Error::new(ArchiveError::config("bad"));
        assert_eq!(exit_for_error(&error), ProcessExit::Failure);
        assert_eq!(exit_for_error(&anyhow::anyhow!("boom")), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Interrupted.code(), 130);
    }
}
