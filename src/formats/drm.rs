//! DRM scheme detection per container type.
use std::fmt;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use super::BookFormat;
use super::palmdb::{EREADER_TYPE_CREATOR, PalmDb, parse_mobi};
use crate::error::ActionError;

/// Encryption scheme detected on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    /// No DRM.
    Unencrypted,
    /// Adobe ADEPT on an EPUB.
    AdobeAdept,
    /// Barnes & Noble EPUB.
    BarnesNoble,
    /// Readium LCP.
    ReadiumLcp,
    /// Apple `FairPlay`.
    Apple,
    /// Kobo (encrypted EPUB without Adobe rights).
    Kobo,
    /// Adobe ADEPT on a PDF (`EBX_HANDLER`).
    AdobeAdeptPdf,
    /// Password-protected PDF; carries the security handler name.
    PdfPassword(String),
    /// `FileOpen` PDF DRM.
    FileOpen,
    /// Kindle (Mobipocket/AZW/KFX).
    Kindle,
    /// eReader social DRM.
    Ereader,
    /// Encrypted with something unrecognised.
    Unknown(String),
}

impl Encryption {
    /// Whether a decryption collaborator can handle this scheme at all.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::AdobeAdept
                | Self::BarnesNoble
                | Self::AdobeAdeptPdf
                | Self::PdfPassword(_)
                | Self::Kindle
                | Self::Ereader
        )
    }

    /// Stable identifier passed to the decryption tool.
    #[must_use]
    pub const fn scheme_id(&self) -> &'static str {
        match self {
            Self::Unencrypted => "none",
            Self::AdobeAdept => "adobe-epub",
            Self::BarnesNoble => "bn-epub",
            Self::ReadiumLcp => "lcp",
            Self::Apple => "apple",
            Self::Kobo => "kobo",
            Self::AdobeAdeptPdf => "adobe-pdf",
            Self::PdfPassword(_) => "pdf-password",
            Self::FileOpen => "fileopen",
            Self::Kindle => "kindle",
            Self::Ereader => "ereader",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unencrypted => f.write_str("Unencrypted"),
            Self::AdobeAdept => f.write_str("Adobe"),
            Self::BarnesNoble => f.write_str("B&N"),
            Self::ReadiumLcp => f.write_str("Readium LCP"),
            Self::Apple => f.write_str("Apple"),
            Self::Kobo => f.write_str("Kobo"),
            Self::AdobeAdeptPdf => f.write_str("Adobe PDF"),
            Self::PdfPassword(handler) => write!(f, "PDF password ({handler})"),
            Self::FileOpen => f.write_str("FileOpen"),
            Self::Kindle => f.write_str("Kindle"),
            Self::Ereader => f.write_str("eReader"),
            Self::Unknown(what) => write!(f, "Unknown ({what})"),
        }
    }
}

// Constant patterns; `None` only if a pattern fails to compile.
static ENCRYPTED_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?encryptedKey[^>]*>\s*([^<\s]+)\s*</").ok());
static ENCRYPTION_ALGORITHM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"Algorithm\s*=\s*["']([^"']+)["']"#).ok());
static PDF_ENCRYPT: LazyLock<Option<BytesRegex>> =
    LazyLock::new(|| BytesRegex::new(r"(?-u)/Encrypt[\s/<\d\[]").ok());
static PDF_FILTER: LazyLock<Option<BytesRegex>> =
    LazyLock::new(|| BytesRegex::new(r"(?-u)/Filter\s*/([A-Za-z0-9_.]+)").ok());

/// Font obfuscation algorithms that are not DRM.
const FONT_OBFUSCATION: [&str; 2] = [
    "http://www.idpf.org/2008/embedding",
    "http://ns.adobe.com/pdf/enc#RC",
];

const KFX_DRMION: &[u8] = b"\xeaDRMION\xee";
const KFX_CONTAINER: &[u8] = b"CONT";

/// Detect the encryption scheme of `path`.
///
/// # Errors
///
/// Returns [`ActionError::UnsupportedFormat`] for containers that carry no
/// DRM notion (ACSM licenses, unknown extensions) and [`ActionError::Io`]
/// if the file cannot be read.
pub fn detect_encryption(path: &Path, format: BookFormat) -> Result<Encryption, ActionError> {
    let read_err = |e| ActionError::io(format!("reading {}", path.display()), e);
    match format {
        BookFormat::Epub => detect_epub(path),
        BookFormat::Pdf => Ok(detect_pdf(&std::fs::read(path).map_err(read_err)?)),
        BookFormat::Mobi => {
            let data = std::fs::read(path).map_err(read_err)?;
            let header = parse_mobi(&data).ok_or_else(|| {
                ActionError::UnsupportedFormat(format!("{} is not a Mobipocket book", path.display()))
            })?;
            Ok(if header.encryption == 0 {
                Encryption::Unencrypted
            } else {
                Encryption::Kindle
            })
        }
        BookFormat::Kfx => detect_kfx(path),
        BookFormat::Ereader => {
            let data = std::fs::read(path).map_err(read_err)?;
            Ok(match PalmDb::parse(&data) {
                Some(db) if db.type_creator() == EREADER_TYPE_CREATOR => Encryption::Ereader,
                _ => Encryption::Unknown("unrecognised PDB".to_string()),
            })
        }
        BookFormat::Acsm | BookFormat::Other => Err(ActionError::UnsupportedFormat(
            path.extension()
                .map_or_else(|| format.name().to_string(), |e| format!(".{}", e.to_string_lossy())),
        )),
    }
}

/// Read a UTF-8 entry of a zip archive, `None` if absent or unreadable.
pub(crate) fn zip_entry_to_string<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut out = String::new();
    entry.read_to_string(&mut out).ok()?;
    Some(out)
}

fn detect_epub(path: &Path) -> Result<Encryption, ActionError> {
    let file = File::open(path).map_err(|e| ActionError::io(format!("opening {}", path.display()), e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ActionError::Decryption(format!("couldn't detect encryption - {e}")))?;
    let has = |archive: &zip::ZipArchive<File>, name: &str| archive.file_names().any(|n| n == name);

    if has(&archive, "META-INF/license.lcpl") {
        return Ok(Encryption::ReadiumLcp);
    }
    if has(&archive, "META-INF/sinf.xml") {
        return Ok(Encryption::Apple);
    }
    if let Some(rights) = zip_entry_to_string(&mut archive, "META-INF/rights.xml") {
        let key_len = ENCRYPTED_KEY
            .as_ref()
            .and_then(|re| re.captures(&rights))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().len());
        return Ok(match key_len {
            Some(172) => Encryption::AdobeAdept,
            Some(64) => Encryption::BarnesNoble,
            _ => Encryption::Unknown("rights.xml".to_string()),
        });
    }
    if let Some(enc) = zip_entry_to_string(&mut archive, "META-INF/encryption.xml") {
        let drm = ENCRYPTION_ALGORITHM.as_ref().is_some_and(|re| {
            re.captures_iter(&enc)
                .filter_map(|c| c.get(1))
                .any(|alg| {
                    !FONT_OBFUSCATION.contains(&alg.as_str()) && !alg.as_str().contains("xmldsig")
                })
        });
        if drm {
            return Ok(Encryption::Kobo);
        }
    }
    Ok(Encryption::Unencrypted)
}

/// Detect PDF encryption from raw bytes by locating the `/Encrypt`
/// trailer entry and the security handler's `/Filter` name.
#[must_use]
pub fn detect_pdf(data: &[u8]) -> Encryption {
    let (Some(encrypt), Some(filter)) = (PDF_ENCRYPT.as_ref(), PDF_FILTER.as_ref()) else {
        return Encryption::Unknown("pattern unavailable".to_string());
    };
    if !encrypt.is_match(data) {
        return Encryption::Unencrypted;
    }
    for caps in filter.captures_iter(data) {
        let Some(name) = caps.get(1) else { continue };
        let name = String::from_utf8_lossy(name.as_bytes());
        match name.as_ref() {
            "EBX_HANDLER" => return Encryption::AdobeAdeptPdf,
            "Standard" | "Adobe.APS" => return Encryption::PdfPassword(name.into_owned()),
            n if n.starts_with("FOPN_") => return Encryption::FileOpen,
            _ => {}
        }
    }
    Encryption::Unknown("unrecognised PDF security handler".to_string())
}

fn detect_kfx(path: &Path) -> Result<Encryption, ActionError> {
    let read_err = |e| ActionError::io(format!("reading {}", path.display()), e);
    let data = std::fs::read(path).map_err(read_err)?;
    if data.starts_with(KFX_DRMION) {
        return Ok(Encryption::Kindle);
    }
    if data.starts_with(KFX_CONTAINER) {
        return Ok(Encryption::Unencrypted);
    }
    if data.starts_with(b"PK") {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data))
            .map_err(|e| ActionError::Decryption(format!("couldn't read KFX-ZIP - {e}")))?;
        for i in 0..archive.len() {
            let Ok(mut entry) = archive.by_index(i) else { continue };
            let mut magic = [0u8; 8];
            if entry.read_exact(&mut magic).is_ok() && magic.as_slice() == KFX_DRMION {
                return Ok(Encryption::Kindle);
            }
        }
        return Ok(Encryption::Unencrypted);
    }
    Ok(Encryption::Unknown("unrecognised KFX container".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_epub(dir: &Path, name: &str, extra: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let opts = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("mimetype", opts).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        for (entry, body) in extra {
            zip.start_file(*entry, opts).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn plain_epub_is_unencrypted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_epub(dir.path(), "a.epub", &[]);
        assert_eq!(
            detect_encryption(&path, BookFormat::Epub).unwrap(),
            Encryption::Unencrypted
        );
    }

    #[test]
    fn adobe_and_bn_by_key_length() {
        let dir = tempfile::tempdir().unwrap();
        let adobe_key = "A".repeat(172);
        let rights = format!("<rights><encryptedKey>{adobe_key}</encryptedKey></rights>");
        let path = write_epub(dir.path(), "a.epub", &[("META-INF/rights.xml", &rights)]);
        assert_eq!(detect_epub(&path).unwrap(), Encryption::AdobeAdept);

        let bn_key = "B".repeat(64);
        let rights = format!("<rights><adept:encryptedKey>{bn_key}</adept:encryptedKey></rights>");
        let path = write_epub(dir.path(), "b.epub", &[("META-INF/rights.xml", &rights)]);
        assert_eq!(detect_epub(&path).unwrap(), Encryption::BarnesNoble);
    }

    #[test]
    fn lcp_apple_and_kobo() {
        let dir = tempfile::tempdir().unwrap();
        let lcp = write_epub(dir.path(), "l.epub", &[("META-INF/license.lcpl", "{}")]);
        assert_eq!(detect_epub(&lcp).unwrap(), Encryption::ReadiumLcp);
        let apple = write_epub(dir.path(), "a.epub", &[("META-INF/sinf.xml", "<x/>")]);
        assert_eq!(detect_epub(&apple).unwrap(), Encryption::Apple);
        let kobo = write_epub(
            dir.path(),
            "k.epub",
            &[(
                "META-INF/encryption.xml",
                r#"<EncryptionMethod Algorithm="http://www.w3.org/2001/04/xmlenc#aes128-cbc"/>"#,
            )],
        );
        assert_eq!(detect_epub(&kobo).unwrap(), Encryption::Kobo);
    }

    #[test]
    fn font_obfuscation_is_not_drm() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_epub(
            dir.path(),
            "f.epub",
            &[(
                "META-INF/encryption.xml",
                r#"<EncryptionMethod Algorithm="http://www.idpf.org/2008/embedding"/>"#,
            )],
        );
        assert_eq!(detect_epub(&path).unwrap(), Encryption::Unencrypted);
    }

    #[test]
    fn pdf_handlers() {
        assert_eq!(detect_pdf(b"%PDF-1.4\n1 0 obj<<>>endobj"), Encryption::Unencrypted);
        assert_eq!(
            detect_pdf(b"%PDF-1.6 trailer<</Encrypt 5 0 R>> 5 0 obj<</Filter/EBX_HANDLER>>"),
            Encryption::AdobeAdeptPdf
        );
        assert_eq!(
            detect_pdf(b"trailer<</Encrypt 5 0 R>> 5 0 obj<</Filter /FlateDecode>> <</Filter /Standard /V 2>>"),
            Encryption::PdfPassword("Standard".to_string())
        );
        assert_eq!(
            detect_pdf(b"<</Encrypt 9 0 R>> <</Filter/FOPN_foweb>>"),
            Encryption::FileOpen
        );
        assert!(matches!(
            detect_pdf(b"<</Encrypt 9 0 R>> <</Filter/Mystery>>"),
            Encryption::Unknown(_)
        ));
    }

    #[test]
    fn encrypt_metadata_key_alone_is_not_encryption() {
        assert_eq!(
            detect_pdf(b"<</EncryptMetadata false>>"),
            Encryption::Unencrypted
        );
    }

    #[test]
    fn kindle_mobi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("novel.azw3");
        std::fs::write(&path, crate::formats::palmdb::build_mobi(2, "Novel", &[])).unwrap();
        assert_eq!(
            detect_encryption(&path, BookFormat::Mobi).unwrap(),
            Encryption::Kindle
        );
    }

    #[test]
    fn kfx_magic() {
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("a.kfx");
        std::fs::write(&locked, b"\xeaDRMION\xee\x00\x00").unwrap();
        assert_eq!(detect_kfx(&locked).unwrap(), Encryption::Kindle);
        let open = dir.path().join("b.kfx");
        std::fs::write(&open, b"CONT\x02\x00").unwrap();
        assert_eq!(detect_kfx(&open).unwrap(), Encryption::Unencrypted);
    }

    #[test]
    fn acsm_has_no_drm_notion() {
        let err = detect_encryption(Path::new("/x/doc.acsm"), BookFormat::Acsm).unwrap_err();
        assert!(matches!(err, ActionError::UnsupportedFormat(_)));
    }

    #[test]
    fn supported_schemes() {
        assert!(Encryption::Kindle.is_supported());
        assert!(!Encryption::ReadiumLcp.is_supported());
        assert!(!Encryption::Unencrypted.is_supported());
        assert_eq!(Encryption::BarnesNoble.to_string(), "B&N");
    }
}
