use std::path::PathBuf;

use super::{Action, ActionContext, ActionId};
use crate::collaborators::{DecryptOutcome, DecryptRequest, KeyCandidate};
use crate::config::Config;
use crate::error::ActionError;
use crate::formats::{BookFormat, Encryption};
use crate::logging::Log;

/// Removes DRM using the key material in the configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveDrm;

impl Action for RemoveDrm {
    fn id(&self) -> ActionId {
        ActionId::Drm
    }

    fn description(&self) -> &'static str {
        "Remove DRM (Adobe, Barnes & Noble, Kindle, eReader, password-protected PDF)"
    }

    fn perform(&self, ctx: &mut ActionContext<'_>) -> Result<PathBuf, ActionError> {
        let format = BookFormat::from_path(ctx.path);
        let encryption = ctx.services.decryptor.detect(ctx.path, format)?;
        ctx.log.debug(&format!(
            "Encryption of {}: {encryption}",
            ctx.path.display()
        ));
        if encryption == Encryption::Unencrypted {
            ctx.log.debug(&format!(
                "Skipping {} because it's already unencrypted.",
                ctx.path.display()
            ));
            return Ok(ctx.path.to_path_buf());
        }
        if !encryption.is_supported() {
            return Err(ActionError::UnsupportedEncryption(encryption.to_string()));
        }

        let keys = key_candidates(&encryption, ctx.config, ctx.log)?;
        let command = ctx.config.and_then(|c| c.dedrm_command.clone());
        let request = DecryptRequest {
            input: ctx.path.to_path_buf(),
            output_dir: ctx.staging_dir()?.to_path_buf(),
            encryption,
            keys,
            command,
        };
        match ctx.services.decryptor.decrypt(&request)? {
            DecryptOutcome::Decrypted(output) => {
                ctx.log.info(&format!(
                    "Decrypted {} ({})",
                    ctx.path.display(),
                    request.encryption
                ));
                Ok(output)
            }
            DecryptOutcome::NotEncrypted => {
                ctx.log.debug(&format!(
                    "Skipping {} because the decryption tool found no DRM.",
                    ctx.path.display()
                ));
                Ok(ctx.path.to_path_buf())
            }
            DecryptOutcome::Unsupported(scheme) => Err(ActionError::UnsupportedEncryption(scheme)),
        }
    }
}

/// Key files from `paths` that exist, or a missing-key error naming the
/// first one that does not.
fn existing_files(
    encryption: &Encryption,
    paths: &[PathBuf],
    log: &dyn Log,
) -> Result<Vec<PathBuf>, ActionError> {
    let (found, missing): (Vec<&PathBuf>, Vec<&PathBuf>) = paths.iter().partition(|p| p.exists());
    for path in &missing {
        log.warn(&format!("Key file {} not found", path.display()));
    }
    if found.is_empty() {
        return Err(ActionError::MissingKeyMaterial {
            scheme: encryption.to_string(),
            detail: missing
                .first()
                .map(|p| format!("Key file {} not found", p.display())),
        });
    }
    Ok(found.into_iter().cloned().collect())
}

/// Key candidates the configuration offers for `encryption`, in the order
/// they are tried.
///
/// # Errors
///
/// Returns [`ActionError::MissingKeyMaterial`] when the configuration has no
/// usable key for the scheme.
pub fn key_candidates(
    encryption: &Encryption,
    config: Option<&Config>,
    log: &dyn Log,
) -> Result<Vec<KeyCandidate>, ActionError> {
    let default = Config::default();
    let config = config.unwrap_or(&default);
    let files = |paths: &[PathBuf]| existing_files(encryption, paths, log);
    let as_files = |paths: Vec<PathBuf>| -> Vec<KeyCandidate> {
        paths.into_iter().map(KeyCandidate::File).collect()
    };

    let keys: Vec<KeyCandidate> = match encryption {
        Encryption::AdobeAdept | Encryption::AdobeAdeptPdf => {
            as_files(files(&config.adobe_key_files)?)
        }
        Encryption::BarnesNoble => as_files(files(&config.b_and_n_key_files)?),
        Encryption::PdfPassword(_) => std::iter::once(String::new())
            .chain(config.pdf_passwords.iter().cloned())
            .map(KeyCandidate::Password)
            .collect(),
        Encryption::Ereader => {
            let file: Vec<PathBuf> = config.ereader_social_drm_file.iter().cloned().collect();
            as_files(files(&file)?)
        }
        Encryption::Kindle => kindle_candidates(config, log),
        Encryption::Unencrypted => Vec::new(),
        Encryption::ReadiumLcp
        | Encryption::Apple
        | Encryption::Kobo
        | Encryption::FileOpen
        | Encryption::Unknown(_) => {
            return Err(ActionError::UnsupportedEncryption(encryption.to_string()));
        }
    };
    if keys.is_empty() && *encryption != Encryption::Unencrypted {
        return Err(ActionError::MissingKeyMaterial {
            scheme: encryption.to_string(),
            detail: None,
        });
    }
    Ok(keys)
}

fn kindle_candidates(config: &Config, log: &dyn Log) -> Vec<KeyCandidate> {
    let present = |p: &&PathBuf| {
        let exists = p.exists();
        if !exists {
            log.warn(&format!("Key file {} not found", p.display()));
        }
        exists
    };
    config
        .kindle_pidnums
        .iter()
        .cloned()
        .map(KeyCandidate::KindlePid)
        .chain(
            config
                .kindle_serialnums
                .iter()
                .cloned()
                .map(KeyCandidate::KindleSerial),
        )
        .chain(
            config
                .kindle_database_files
                .iter()
                .filter(present)
                .cloned()
                .map(KeyCandidate::KindleDatabase),
        )
        .chain(
            config
                .kindle_android_files
                .iter()
                .filter(present)
                .cloned()
                .map(KeyCandidate::KindleAndroid),
        )
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::actions::test_helpers::{Harness, mock_services};
    use crate::collaborators::decrypt::MockDecryptor;
    use crate::logging::RecordingLog;

    fn detecting(encryption: Encryption) -> MockDecryptor {
        let mut decryptor = MockDecryptor::new();
        decryptor
            .expect_detect()
            .times(1)
            .returning(move |_, _| Ok(encryption.clone()));
        decryptor
    }

    fn harness(decryptor: MockDecryptor, config: Option<Config>) -> Harness {
        let mut services = mock_services();
        services.decryptor = Arc::new(decryptor);
        let mut h = Harness::new(services);
        h.config = config;
        h
    }

    #[test]
    fn unencrypted_is_a_no_op() {
        let mut h = harness(detecting(Encryption::Unencrypted), None);
        let out = h.run(&RemoveDrm, Path::new("/b/book.epub")).unwrap();
        assert_eq!(out, Path::new("/b/book.epub"));
        assert!(h.staging.path().is_none());
    }

    #[test]
    fn kindle_without_keys_names_scheme() {
        let mut h = harness(detecting(Encryption::Kindle), None);
        let err = h.run(&RemoveDrm, Path::new("/b/novel.azw3")).unwrap_err();
        assert_eq!(err.kind(), "MissingKeyMaterialError");
        assert!(err.to_string().contains("Kindle"));
    }

    #[test]
    fn unsupported_scheme_fails() {
        let mut h = harness(detecting(Encryption::ReadiumLcp), None);
        let err = h.run(&RemoveDrm, Path::new("/b/lcp.epub")).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedEncryptionError");
    }

    #[test]
    fn unknown_container_is_unsupported_format() {
        let mut decryptor = MockDecryptor::new();
        decryptor
            .expect_detect()
            .returning(|_, _| Err(ActionError::UnsupportedFormat(".txt".to_string())));
        let mut h = harness(decryptor, None);
        let err = h.run(&RemoveDrm, Path::new("/b/notes.txt")).unwrap_err();
        assert_eq!(err.kind(), "UnsupportedFormatError");
    }

    #[test]
    fn decrypted_output_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("adobe.der");
        std::fs::write(&key, b"key").unwrap();
        let mut decryptor = detecting(Encryption::AdobeAdept);
        let expected_key = key.clone();
        decryptor
            .expect_decrypt()
            .withf(move |req| req.keys == [KeyCandidate::File(expected_key.clone())])
            .times(1)
            .returning(|req| Ok(DecryptOutcome::Decrypted(req.output_dir.join("post_drm_0.epub"))));
        let config = Config {
            adobe_key_files: vec![key],
            dedrm_command: Some("dedrm".to_string()),
            ..Config::default()
        };
        let mut h = harness(decryptor, Some(config));
        let out = h.run(&RemoveDrm, Path::new("/b/book.epub")).unwrap();
        assert!(out.ends_with("post_drm_0.epub"));
    }

    #[test]
    fn missing_key_file_is_named() {
        let log = RecordingLog::default();
        let config = Config {
            adobe_key_files: vec![PathBuf::from("/nonexistent/adobe.der")],
            ..Config::default()
        };
        let err = key_candidates(&Encryption::AdobeAdept, Some(&config), &log).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required key for Adobe, add to your config file - Key file /nonexistent/adobe.der not found"
        );
    }

    #[test]
    fn pdf_password_always_tries_empty_first() {
        let log = RecordingLog::default();
        let config = Config {
            pdf_passwords: vec!["hunter2".to_string()],
            ..Config::default()
        };
        let keys = key_candidates(
            &Encryption::PdfPassword("Standard".to_string()),
            Some(&config),
            &log,
        )
        .unwrap();
        assert_eq!(
            keys,
            vec![
                KeyCandidate::Password(String::new()),
                KeyCandidate::Password("hunter2".to_string())
            ]
        );
        assert!(
            key_candidates(&Encryption::PdfPassword("Standard".to_string()), None, &log).is_ok()
        );
    }

    #[test]
    fn kindle_keys_follow_config_order() {
        let log = RecordingLog::default();
        let config = Config {
            kindle_pidnums: vec!["PID".to_string()],
            kindle_serialnums: vec!["B0".to_string()],
            kindle_database_files: vec![PathBuf::from("/nonexistent/k4i")],
            ..Config::default()
        };
        let keys = key_candidates(&Encryption::Kindle, Some(&config), &log).unwrap();
        assert_eq!(
            keys,
            vec![
                KeyCandidate::KindlePid("PID".to_string()),
                KeyCandidate::KindleSerial("B0".to_string())
            ]
        );
        assert_eq!(log.at("warn").len(), 1);
    }
}
