use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, instrument};

use super::{MailMessage, MailSource, mbox};
use crate::error::MailError;

/// Queries a notmuch database by running the `notmuch` binary.
///
/// The command line is `<binary> <args...> <terms...>`; `args` must make
/// notmuch print an mbox (`show --format=mbox` by default).
#[derive(Debug, Clone)]
pub struct NotmuchMailSource {
    binary: PathBuf,
    args: Vec<String>,
}

impl NotmuchMailSource {
    pub fn new(binary: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }
}

impl MailSource for NotmuchMailSource {
    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    fn query(&self, terms: &[String]) -> Result<Vec<MailMessage>, MailError> {
        let output = Command::new(&self.binary)
            .args(&self.args)
            .args(terms)
            .output()
            .map_err(|source| MailError::Spawn {
                program: self.program(),
                source,
            })?;

        if !output.status.success() {
            return Err(MailError::Command {
                program: self.program(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let messages = mbox::split(&output.stdout)?;
        debug!(count = messages.len(), bytes = output.stdout.len(), "Mail query finished");
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_spawn_error() {
        let source = NotmuchMailSource::new("/nonexistent/notmuch", vec!["show".into()]);
        let err = source.query(&["id:x".to_string()]).unwrap_err();
        assert!(matches!(err, MailError::Spawn { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_binary_is_command_error() {
        let source = NotmuchMailSource::new("false", vec![]);
        let err = source.query(&[]).unwrap_err();
        assert!(matches!(err, MailError::Command { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn stdout_is_read_as_mbox() {
        // `printf` stands in for notmuch and prints its format string as the mbox.
        let source = NotmuchMailSource::new(
            "printf",
            vec!["From a@example.com Mon Jan  2 15:04:05 2023\\nSubject: [PATCH] x\\n\\nbody\\n".into()],
        );
        let messages = source.query(&[]).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject(), "[PATCH] x");
    }
}
