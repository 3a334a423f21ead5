use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a launch before the external tool has produced an
/// exit status of its own.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Working directory {} does not exist or is not a directory", .0.display())]
    MissingWorkDir(PathBuf),

    #[error("Cannot build {var}: {source}")]
    InvalidPath {
        var: &'static str,
        #[source]
        source: std::env::JoinPathsError,
    },

    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Exit status the wrapper reports for this failure, following the usual
    /// shell conventions for commands that could not be run.
    pub fn exit_code(&self) -> u8 {
        match self {
            LaunchError::MissingWorkDir(_) | LaunchError::InvalidPath { .. } => 1,
            LaunchError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => 127,
            LaunchError::Spawn { .. } => 126,
            LaunchError::Wait { .. } => 1,
        }
    }

    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            LaunchError::MissingWorkDir(_) | LaunchError::InvalidPath { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_exits_with_127() {
        let err = LaunchError::Spawn {
            program: "datacube-stats".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.exit_code(), 127);
        assert!(!err.is_environment());
    }

    #[test]
    fn permission_denied_exits_with_126() {
        let err = LaunchError::Spawn {
            program: "./build_mosaic.py".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.exit_code(), 126);
    }

    #[test]
    fn environment_errors_exit_with_1() {
        let err = LaunchError::MissingWorkDir(PathBuf::from("/no/such/dir"));
        assert_eq!(err.exit_code(), 1);
        assert!(err.is_environment());
        assert!(err.to_string().contains("/no/such/dir"));
    }
}
