use engine::EngineError;

/// Process exit codes of the `adbsync` binary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful completion.
    Ok = 0,
    /// Bad arguments, unreadable exclude file, unusable local setup.
    Config = 1,
    /// adb missing, no usable device, or the device-side scan failed.
    Transport = 2,
    /// The run finished but one or more file actions failed after retries.
    Partial = 3,
    /// The run was interrupted.
    Cancelled = 130,
}

impl ExitCode {
    /// Numeric value handed to the operating system.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Short human description used in diagnostics.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            ExitCode::Ok => "success",
            ExitCode::Config => "configuration error",
            ExitCode::Transport => "transport error",
            ExitCode::Partial => "some files failed",
            ExitCode::Cancelled => "cancelled",
        }
    }
}

impl From<&EngineError> for ExitCode {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::Config(_) => ExitCode::Config,
            EngineError::Scan(_) | EngineError::Transport(_) => ExitCode::Transport,
            // The local side could not be read or written; the target
            // argument is unusable, which is closest to a setup problem.
            EngineError::Walk(_) | EngineError::Filesystem { .. } => ExitCode::Config,
            EngineError::Cancelled => ExitCode::Cancelled,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Exit codes fit in the portable u8 range by construction.
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_documented_contract() {
        assert_eq!(ExitCode::Ok.as_i32(), 0);
        assert_eq!(ExitCode::Config.as_i32(), 1);
        assert_eq!(ExitCode::Transport.as_i32(), 2);
        assert_eq!(ExitCode::Partial.as_i32(), 3);
        assert_eq!(ExitCode::Cancelled.as_i32(), 130);
    }

    #[test]
    fn engine_errors_map_to_codes() {
        assert_eq!(
            ExitCode::from(&EngineError::Config("bad".into())),
            ExitCode::Config
        );
        assert_eq!(ExitCode::from(&EngineError::Cancelled), ExitCode::Cancelled);
    }
}
