//! Test utilities for building archives and slide decks in memory.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::fmt::Write as _;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PML_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const P14_NS: &str = "http://schemas.microsoft.com/office/powerpoint/2010/main";
const PKG_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CT_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

fn stored_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644)
}

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use deckprep_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(&[("file.txt", "hello"), ("dir/nested.txt", "world")]);
/// ```
#[must_use]
pub fn create_test_zip<D: AsRef<[u8]>>(entries: &[(&str, D)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, data) in entries {
        zip.start_file(*path, stored_options()).unwrap();
        zip.write_all(data.as_ref()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Builder for ZIP test archives with explicit directory entries.
///
/// # Examples
///
/// ```
/// use deckprep_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .add_directory("dir/")
///     .add_file("dir/file.txt", b"content")
///     .build();
/// ```
pub struct ZipTestBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        self.zip.start_file(path, stored_options()).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let options = SimpleFileOptions::default().unix_permissions(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a symbolic link pointing at `target`.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let options = SimpleFileOptions::default().unix_permissions(0o777);
        self.zip.add_symlink(path, target, options).unwrap();
        self
    }

    /// Finishes the archive and returns its bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates an in-memory RAR5 archive with stored (uncompressed) files.
///
/// # Examples
///
/// ```
/// use deckprep_core::test_utils::create_test_rar;
///
/// let rar_data = create_test_rar(&[("file.txt", "hello"), ("dir/nested.txt", "world")]);
/// assert!(rar_data.starts_with(b"Rar!"));
/// ```
#[must_use]
pub fn create_test_rar<D: AsRef<[u8]>>(entries: &[(&str, D)]) -> Vec<u8> {
    entries
        .iter()
        .fold(RarTestBuilder::new(), |builder, (path, data)| {
            builder.add_file(path, data.as_ref())
        })
        .build()
}

/// Builder for RAR5 test archives.
///
/// Writes a main header, one file header per entry and an end header, each
/// with a valid header CRC. Entry names are stored verbatim, so hostile names
/// such as `../x` can be produced.
#[derive(Debug, Default)]
pub struct RarTestBuilder {
    blocks: Vec<u8>,
    method: u64,
}

impl RarTestBuilder {
    const HOST_UNIX: u64 = 1;

    /// Creates an empty RAR5 builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compression method recorded for files added afterwards (0 = stored).
    ///
    /// Only the header field changes; the data stays uncompressed.
    #[must_use]
    pub const fn compression_method(mut self, method: u64) -> Self {
        self.method = method;
        self
    }

    /// Adds a file record followed by its data.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        let mut body = Vec::new();
        push_vint(&mut body, 2); // file header
        push_vint(&mut body, 0x02); // data area present
        push_vint(&mut body, data.len() as u64);
        push_vint(&mut body, 0x04); // data CRC present
        push_vint(&mut body, data.len() as u64);
        push_vint(&mut body, 0x20); // archive attribute
        body.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        push_vint(&mut body, self.method << 7);
        push_vint(&mut body, Self::HOST_UNIX);
        push_vint(&mut body, path.len() as u64);
        body.extend_from_slice(path.as_bytes());

        push_rar_block(&mut self.blocks, &body);
        self.blocks.extend_from_slice(data);
        self
    }

    /// Adds a directory record.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let mut body = Vec::new();
        push_vint(&mut body, 2);
        push_vint(&mut body, 0);
        push_vint(&mut body, 0x01); // directory
        push_vint(&mut body, 0);
        push_vint(&mut body, 0x10);
        push_vint(&mut body, 0);
        push_vint(&mut body, Self::HOST_UNIX);
        push_vint(&mut body, path.len() as u64);
        body.extend_from_slice(path.as_bytes());
        push_rar_block(&mut self.blocks, &body);
        self
    }

    /// Adds a Unix symlink record pointing at `target`.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let mut redirection = Vec::new();
        push_vint(&mut redirection, 0x05); // file system redirection
        push_vint(&mut redirection, 0x01); // unix symlink
        push_vint(&mut redirection, 0);
        push_vint(&mut redirection, target.len() as u64);
        redirection.extend_from_slice(target.as_bytes());
        let mut extra = Vec::new();
        push_vint(&mut extra, redirection.len() as u64);
        extra.extend_from_slice(&redirection);

        let mut body = Vec::new();
        push_vint(&mut body, 2);
        push_vint(&mut body, 0x01); // extra area present
        push_vint(&mut body, extra.len() as u64);
        push_vint(&mut body, 0);
        push_vint(&mut body, 0);
        push_vint(&mut body, 0x20);
        push_vint(&mut body, 0);
        push_vint(&mut body, Self::HOST_UNIX);
        push_vint(&mut body, path.len() as u64);
        body.extend_from_slice(path.as_bytes());
        body.extend_from_slice(&extra);
        push_rar_block(&mut self.blocks, &body);
        self
    }

    /// Finishes the archive and returns its bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut out = b"Rar!\x1a\x07\x01\x00".to_vec();
        // main header: type 1, no flags, no archive flags
        push_rar_block(&mut out, &[0x01, 0x00, 0x00]);
        out.extend_from_slice(&self.blocks);
        // end header: type 5, no flags, last volume
        push_rar_block(&mut out, &[0x05, 0x00, 0x00]);
        out
    }
}

fn push_vint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends `CRC32 | size | body` for one header.
fn push_rar_block(out: &mut Vec<u8>, body: &[u8]) {
    let mut sized = Vec::with_capacity(body.len() + 3);
    push_vint(&mut sized, body.len() as u64);
    sized.extend_from_slice(body);
    out.extend_from_slice(&crc32fast::hash(&sized).to_le_bytes());
    out.extend_from_slice(&sized);
}

/// Names of all entries in a ZIP archive, in central-directory order.
#[must_use]
pub fn zip_part_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Reads one ZIP entry as UTF-8, or `None` if it is absent.
#[must_use]
pub fn read_zip_part(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    Some(content)
}

/// Creates a minimal PPTX deck with `slides` slides.
///
/// # Examples
///
/// ```
/// use deckprep_core::test_utils::create_test_pptx;
///
/// let deck = create_test_pptx(3);
/// assert!(!deck.is_empty());
/// ```
#[must_use]
pub fn create_test_pptx(slides: usize) -> Vec<u8> {
    PptxTestBuilder::new(slides).build()
}

/// Builder for minimal but well-formed PPTX packages.
///
/// Slide `n` (1-based) has id `255 + n`, relationship `rId{n + 1}` and part
/// `ppt/slides/slide{n}.xml`; `rId1` links the presentation properties.
#[derive(Debug, Clone, Copy)]
pub struct PptxTestBuilder {
    slides: usize,
    notes: bool,
    sections: bool,
    custom_show: bool,
}

impl PptxTestBuilder {
    /// Starts a deck with `slides` slides.
    #[must_use]
    pub const fn new(slides: usize) -> Self {
        Self {
            slides,
            notes: false,
            sections: false,
            custom_show: false,
        }
    }

    /// Gives every slide a notes page.
    #[must_use]
    pub const fn with_notes(mut self) -> Self {
        self.notes = true;
        self
    }

    /// Adds a section list containing every slide.
    #[must_use]
    pub const fn with_sections(mut self) -> Self {
        self.sections = true;
        self
    }

    /// Adds a custom show containing every slide.
    #[must_use]
    pub const fn with_custom_show(mut self) -> Self {
        self.custom_show = true;
        self
    }

    /// Builds the package bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut parts: Vec<(String, String)> = vec![
            ("[Content_Types].xml".into(), self.content_types()),
            ("_rels/.rels".into(), package_rels()),
            ("ppt/presentation.xml".into(), self.presentation()),
            ("ppt/_rels/presentation.xml.rels".into(), self.presentation_rels()),
            (
                "ppt/presProps.xml".into(),
                format!(r#"{XML_DECL}<p:presentationPr xmlns:p="{PML_NS}"/>"#),
            ),
        ];

        for n in 1..=self.slides {
            parts.push((format!("ppt/slides/slide{n}.xml"), slide(n)));
            parts.push((format!("ppt/slides/_rels/slide{n}.xml.rels"), self.slide_rels(n)));
            if self.notes {
                parts.push((format!("ppt/notesSlides/notesSlide{n}.xml"), notes_slide(n)));
                parts.push((
                    format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                    relationships(&[(
                        "rId1",
                        "slide",
                        format!("../slides/slide{n}.xml").as_str(),
                    )]),
                ));
            }
        }

        let entries: Vec<(&str, &str)> = parts
            .iter()
            .map(|(name, xml)| (name.as_str(), xml.as_str()))
            .collect();
        create_test_zip(&entries)
    }

    fn content_types(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}<Types xmlns="{CT_NS}"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/presProps.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"/>"#
        );
        for n in 1..=self.slides {
            write!(
                xml,
                r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
            )
            .unwrap();
            if self.notes {
                write!(
                    xml,
                    r#"<Override PartName="/ppt/notesSlides/notesSlide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml"/>"#
                )
                .unwrap();
            }
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation(&self) -> String {
        let mut xml = format!(
            r#"{XML_DECL}<p:presentation xmlns:a="{DML_NS}" xmlns:r="{REL_NS}" xmlns:p="{PML_NS}"><p:sldIdLst>"#
        );
        for n in 1..=self.slides {
            write!(xml, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1).unwrap();
        }
        xml.push_str(r#"</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/>"#);

        if self.custom_show {
            xml.push_str(r#"<p:custShowLst><p:custShow name="Short" id="0"><p:sldLst>"#);
            for n in 1..=self.slides {
                write!(xml, r#"<p:sld r:id="rId{}"/>"#, n + 1).unwrap();
            }
            xml.push_str("</p:sldLst></p:custShow></p:custShowLst>");
        }

        if self.sections {
            write!(
                xml,
                r#"<p:extLst><p:ext uri="{{521415D9-36F7-43E2-AB2F-B90AF26B5E84}}"><p14:sectionLst xmlns:p14="{P14_NS}"><p14:section name="Main" id="{{7D3C1E2A-0B4F-4C55-9A10-3E2F1B6C8D01}}"><p14:sldIdLst>"#
            )
            .unwrap();
            for n in 1..=self.slides {
                write!(xml, r#"<p14:sldId id="{}"/>"#, 255 + n).unwrap();
            }
            xml.push_str("</p14:sldIdLst></p14:section></p14:sectionLst></p:ext></p:extLst>");
        }

        xml.push_str("</p:presentation>");
        xml
    }

    fn presentation_rels(&self) -> String {
        let targets: Vec<(String, String)> = (1..=self.slides)
            .map(|n| (format!("rId{}", n + 1), format!("slides/slide{n}.xml")))
            .collect();
        let mut rels: Vec<(&str, &str, &str)> = vec![("rId1", "presProps", "presProps.xml")];
        rels.extend(
            targets
                .iter()
                .map(|(id, target)| (id.as_str(), "slide", target.as_str())),
        );
        relationships(&rels)
    }

    fn slide_rels(&self, n: usize) -> String {
        if self.notes {
            relationships(&[(
                "rId1",
                "notesSlide",
                format!("../notesSlides/notesSlide{n}.xml").as_str(),
            )])
        } else {
            relationships(&[])
        }
    }
}

fn package_rels() -> String {
    relationships(&[("rId1", "officeDocument", "ppt/presentation.xml")])
}

/// Relationship part from `(id, type suffix, target)` triples.
fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(r#"{XML_DECL}<Relationships xmlns="{PKG_RELS_NS}">"#);
    for (id, kind, target) in rels {
        write!(
            xml,
            r#"<Relationship Id="{id}" Type="{REL_NS}/{kind}" Target="{target}"/>"#
        )
        .unwrap();
    }
    xml.push_str("</Relationships>");
    xml
}

fn slide(n: usize) -> String {
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{DML_NS}" xmlns:r="{REL_NS}" xmlns:p="{PML_NS}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Slide {n}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#
    )
}

fn notes_slide(n: usize) -> String {
    format!(
        r#"{XML_DECL}<p:notes xmlns:a="{DML_NS}" xmlns:r="{REL_NS}" xmlns:p="{PML_NS}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><!-- notes for slide {n} --></p:notes>"#
    )
}
