// Shared helpers for integration tests.
//
// Builds small ebook fixtures in a temporary library folder and wires a
// `Pipeline` with real metadata readers and filesystem operations, so each
// integration test can run whole transactions without external tools.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use efm_cli::actions::{ActionId, ActionRegistry};
use efm_cli::collaborators::{Reformatter, Services};
use efm_cli::config::ConfigResolver;
use efm_cli::error::ActionError;
use efm_cli::exec::{Executor, SystemExecutor};
use efm_cli::logging::{FileStatus, Log};
use efm_cli::shutdown::Shutdown;
use efm_cli::transaction::{Pipeline, RunOptions};

/// A [`Log`] that keeps every line in memory.
#[derive(Debug, Default)]
pub struct CaptureLog {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl CaptureLog {
    fn push(&self, level: &'static str, msg: &str) {
        self.lines
            .lock()
            .expect("capture lock")
            .push((level, msg.to_string()));
    }

    /// Messages logged at `level` (`print` for report text).
    pub fn at(&self, level: &str) -> Vec<String> {
        self.lines
            .lock()
            .expect("capture lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Everything written as report text, joined.
    pub fn printed(&self) -> String {
        self.at("print").join("\n")
    }
}

impl Log for CaptureLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn print(&self, text: &str) {
        self.push("print", text);
    }
    fn record_file(&self, name: &str, status: FileStatus, _message: Option<&str>) {
        self.push("record", &format!("{name}: {status:?}"));
    }
}

/// Reformatter standing in for k2pdfopt: copies the input unchanged.
#[derive(Debug, Default)]
pub struct CopyReformatter {
    pub calls: Mutex<usize>,
}

impl Reformatter for CopyReformatter {
    fn reformat(&self, input: &Path, output: &Path) -> Result<(), ActionError> {
        *self.calls.lock().expect("calls lock") += 1;
        std::fs::copy(input, output)
            .map(|_| ())
            .map_err(|e| ActionError::Reformat(e.to_string()))
    }
}

/// Default services; external tools are never reached by these tests.
pub fn services() -> Services {
    let executor: Arc<dyn Executor> = Arc::new(SystemExecutor::new(Shutdown::new()));
    Services::system(&executor)
}

/// A pipeline over `services` running `actions`.
pub fn pipeline(services: Services, actions: &[ActionId], dry_run: bool) -> Pipeline {
    Pipeline::new(
        ActionRegistry::new(),
        ConfigResolver::default(),
        services,
        RunOptions {
            actions: actions.to_vec(),
            dry_run,
            keep_staging: false,
        },
    )
}

/// Names of the entries directly inside `dir`.
pub fn listing(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| {
            e.expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

/// Write an unencrypted EPUB with a title and author.
pub fn write_epub(dir: &Path, name: &str, title: &str, author: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).expect("create epub");
    let mut zip = zip::ZipWriter::new(file);
    let opts =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let entries = [
        ("mimetype", "application/epub+zip".to_string()),
        (
            "META-INF/container.xml",
            r#"<?xml version="1.0"?><container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#
                .to_string(),
        ),
        (
            "OEBPS/content.opf",
            format!(
                "<package><metadata><dc:title>{title}</dc:title><dc:creator>{author}</dc:creator></metadata></package>"
            ),
        ),
    ];
    for (entry, body) in entries {
        zip.start_file(entry, opts).expect("start entry");
        zip.write_all(body.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish epub");
    path
}

/// Write a Mobipocket file whose record 0 carries `encryption`.
pub fn write_mobi(dir: &Path, name: &str, encryption: u16) -> PathBuf {
    let mut rec0 = vec![0u8; 16 + 232];
    rec0[12..14].copy_from_slice(&encryption.to_be_bytes());
    rec0[16..20].copy_from_slice(b"MOBI");
    rec0[20..24].copy_from_slice(&232u32.to_be_bytes());
    rec0[36..40].copy_from_slice(&8u32.to_be_bytes());

    let mut data = vec![0u8; 78 + 8 + 2];
    data[0..5].copy_from_slice(b"novel");
    data[60..68].copy_from_slice(b"BOOKMOBI");
    data[76..78].copy_from_slice(&1u16.to_be_bytes());
    let offset = u32::try_from(data.len()).expect("offset fits");
    data[78..82].copy_from_slice(&offset.to_be_bytes());
    data.extend_from_slice(&rec0);

    let path = dir.join(name);
    std::fs::write(&path, data).expect("write mobi");
    path
}

/// Write a one-page PDF with a title.
pub fn write_pdf(dir: &Path, name: &str, title: &str) -> PathBuf {
    use lopdf::{Dictionary, Document, Object, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut info = Dictionary::new();
    info.set("Title", Object::string_literal(title));
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    let path = dir.join(name);
    doc.save(&path).expect("save pdf");
    path
}
