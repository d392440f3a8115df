//! Decryption collaborator.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ActionError;
use crate::exec::Executor;
use crate::formats::{BookFormat, Encryption, detect_encryption};

/// One piece of key material to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCandidate {
    /// Key file (Adobe `.der`, B&N `.b64`, eReader social key).
    File(PathBuf),
    /// Password (PDF user password).
    Password(String),
    /// Kindle PID.
    KindlePid(String),
    /// Kindle device serial number.
    KindleSerial(String),
    /// Kindle for PC/Mac key database.
    KindleDatabase(PathBuf),
    /// Kindle for Android backup.
    KindleAndroid(PathBuf),
}

impl KeyCandidate {
    /// Key type understood by the decryption tool.
    #[must_use]
    pub const fn key_type(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Password(_) => "password",
            Self::KindlePid(_) => "pid",
            Self::KindleSerial(_) => "serial",
            Self::KindleDatabase(_) => "k4i",
            Self::KindleAndroid(_) => "android",
        }
    }

    /// Value passed as `--key`.
    #[must_use]
    pub fn value(&self) -> OsString {
        match self {
            Self::File(p) | Self::KindleDatabase(p) | Self::KindleAndroid(p) => {
                p.clone().into_os_string()
            }
            Self::Password(s) | Self::KindlePid(s) | Self::KindleSerial(s) => OsString::from(s),
        }
    }
}

/// Everything a decryption attempt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    /// File to decrypt.
    pub input: PathBuf,
    /// Directory the output is written to.
    pub output_dir: PathBuf,
    /// Detected scheme.
    pub encryption: Encryption,
    /// Candidates, tried in order until one succeeds.
    pub keys: Vec<KeyCandidate>,
    /// Program configured as `dedrm_command`.
    pub command: Option<String>,
}

/// Result of a successful decryption call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// DRM removed; the decrypted file.
    Decrypted(PathBuf),
    /// The content was not encrypted after all.
    NotEncrypted,
    /// The scheme cannot be handled.
    Unsupported(String),
}

/// Detects and removes DRM.
#[cfg_attr(test, mockall::automock)]
pub trait Decryptor: Send + Sync {
    /// Detect the encryption scheme of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::UnsupportedFormat`] for containers without a
    /// DRM notion and other errors if the file cannot be read.
    fn detect(&self, path: &Path, format: BookFormat) -> Result<Encryption, ActionError>;

    /// Decrypt `request.input`, trying each key in order.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Decryption`] when no key works.
    fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptOutcome, ActionError>;
}

/// Runs the configured `dedrm_command` once per key candidate.
///
/// Invocation: `<cmd> --scheme S --key-type T --key K --output OUT IN`.
#[derive(Debug, Clone)]
pub struct DedrmTool {
    executor: Arc<dyn Executor>,
}

impl DedrmTool {
    /// Create an adapter that runs through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }
}

impl Decryptor for DedrmTool {
    fn detect(&self, path: &Path, format: BookFormat) -> Result<Encryption, ActionError> {
        detect_encryption(path, format)
    }

    fn decrypt(&self, request: &DecryptRequest) -> Result<DecryptOutcome, ActionError> {
        if request.encryption == Encryption::Unencrypted {
            return Ok(DecryptOutcome::NotEncrypted);
        }
        if !request.encryption.is_supported() {
            return Ok(DecryptOutcome::Unsupported(request.encryption.to_string()));
        }
        let command = request.command.as_deref().ok_or_else(|| {
            ActionError::Decryption(
                "no decryption tool configured - set dedrm_command in your config file".to_string(),
            )
        })?;
        let ext = request
            .input
            .extension()
            .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));

        let mut failures = Vec::new();
        for (n, key) in request.keys.iter().enumerate() {
            let output = request.output_dir.join(format!("post_drm_{n}{ext}"));
            let key_value = key.value();
            let args: [&OsStr; 9] = [
                OsStr::new("--scheme"),
                OsStr::new(request.encryption.scheme_id()),
                OsStr::new("--key-type"),
                OsStr::new(key.key_type()),
                OsStr::new("--key"),
                &key_value,
                OsStr::new("--output"),
                output.as_os_str(),
                request.input.as_os_str(),
            ];
            let result = self
                .executor
                .run_unchecked(command, &args)
                .map_err(|e| ActionError::Decryption(format!("{e:#}")))?;
            if result.success && output.exists() {
                return Ok(DecryptOutcome::Decrypted(output));
            }
            tracing::debug!(
                "{command} rejected {} key #{n}: {}",
                key.key_type(),
                result.stderr.trim()
            );
            failures.push(result.stderr.trim().to_string());
        }
        Err(ActionError::Decryption(format!(
            "{} of {} keys failed{}",
            failures.len(),
            request.keys.len(),
            failures
                .last()
                .filter(|s| !s.is_empty())
                .map_or_else(String::new, |s| format!(": {s}"))
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::MockExecutor;

    fn request(dir: &Path, encryption: Encryption, keys: Vec<KeyCandidate>) -> DecryptRequest {
        DecryptRequest {
            input: dir.join("novel.azw3"),
            output_dir: dir.to_path_buf(),
            encryption,
            keys,
            command: Some("dedrm".to_string()),
        }
    }

    #[test]
    fn unsupported_scheme_is_reported_not_run() {
        let exec = Arc::new(MockExecutor::with_responses(vec![]));
        let tool = DedrmTool::new(exec.clone());
        let dir = tempfile::tempdir().unwrap();
        let outcome = tool
            .decrypt(&request(dir.path(), Encryption::ReadiumLcp, vec![]))
            .unwrap();
        assert_eq!(outcome, DecryptOutcome::Unsupported("Readium LCP".to_string()));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn tries_keys_in_order_until_success() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();
        let exec = Arc::new(
            MockExecutor::with_responses(vec![(false, "bad pid"), (true, "")]).on_call(
                move |args| {
                    if args.iter().any(|a| a == "SERIAL1") {
                        std::fs::write(out_dir.join("post_drm_1.azw3"), b"clear").unwrap();
                    }
                },
            ),
        );
        let tool = DedrmTool::new(exec.clone());
        let keys = vec![
            KeyCandidate::KindlePid("PID1".to_string()),
            KeyCandidate::KindleSerial("SERIAL1".to_string()),
        ];
        let outcome = tool
            .decrypt(&request(dir.path(), Encryption::Kindle, keys))
            .unwrap();
        assert_eq!(
            outcome,
            DecryptOutcome::Decrypted(dir.path().join("post_drm_1.azw3"))
        );
        let calls = exec.calls();
        assert_eq!(calls.len(), 2);
        let (program, args) = calls.first().unwrap();
        assert_eq!(program, "dedrm");
        assert_eq!(&args[..6], ["--scheme", "kindle", "--key-type", "pid", "--key", "PID1"]);
    }

    #[test]
    fn all_keys_failing_is_a_decryption_error() {
        let dir = tempfile::tempdir().unwrap();
        let exec = Arc::new(MockExecutor::with_responses(vec![(false, "wrong key")]));
        let tool = DedrmTool::new(exec);
        let err = tool
            .decrypt(&request(
                dir.path(),
                Encryption::AdobeAdept,
                vec![KeyCandidate::File(dir.path().join("k.der"))],
            ))
            .unwrap_err();
        assert!(matches!(err, ActionError::Decryption(ref m) if m.contains("wrong key")));
    }

    #[test]
    fn missing_command_is_a_decryption_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DedrmTool::new(Arc::new(MockExecutor::with_responses(vec![])));
        let mut req = request(dir.path(), Encryption::Kindle, vec![]);
        req.command = None;
        let err = tool.decrypt(&req).unwrap_err();
        assert!(err.to_string().contains("dedrm_command"));
    }
}
