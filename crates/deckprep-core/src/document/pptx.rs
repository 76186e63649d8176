//! PPTX codec.
//!
//! A `.pptx` file is an OPC package: a ZIP container of XML parts linked by
//! relationship parts. Slide order comes from `p:sldIdLst` in the main
//! presentation part; every `p:sldId` points at its slide part through the
//! presentation's relationships.
//!
//! Removing a slide rewrites only the presentation part, its relationships
//! and `[Content_Types].xml`, and drops the slide's own parts. All other
//! parts are copied into the new package without recompression.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::error::DocumentError;

use super::codec::DeckCodec;
use super::codec::SlideDeck;
use super::codec::SlideRef;

const CONTENT_TYPES: &str = "[Content_Types].xml";
const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_PRESENTATION: &str = "ppt/presentation.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const NOTES_SLIDE_REL: &str = "/notesSlide";

/// Codec for Office Open XML presentations.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxCodec;

impl DeckCodec for PptxCodec {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn SlideDeck>, DocumentError> {
        Ok(Box::new(PptxDeck::parse(bytes)?))
    }
}

#[derive(Debug)]
struct Relationship {
    id: String,
    rel_type: String,
    /// Resolved part name for internal targets, raw URI for external ones.
    target: String,
    external: bool,
}

/// An opened PPTX package with pending slide removals.
pub struct PptxDeck {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    presentation: String,
    slides: Vec<SlideRef>,
    replaced: BTreeMap<String, Vec<u8>>,
    dropped: HashSet<String>,
}

impl std::fmt::Debug for PptxDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PptxDeck")
            .field("presentation", &self.presentation)
            .field("slides", &self.slides)
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

impl PptxDeck {
    /// Parses a package and reads its slide list.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a ZIP container, the
    /// presentation part is missing or malformed, or a slide references a
    /// relationship that does not exist.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut deck = Self {
            archive,
            presentation: String::new(),
            slides: Vec::new(),
            replaced: BTreeMap::new(),
            dropped: HashSet::new(),
        };
        deck.presentation = deck.find_presentation()?;
        deck.slides = deck.read_slide_list()?;
        Ok(deck)
    }

    /// Name of the main presentation part.
    #[must_use]
    pub fn presentation_part(&self) -> &str {
        &self.presentation
    }

    fn find_presentation(&mut self) -> Result<String, DocumentError> {
        let Some(xml) = self.part(PACKAGE_RELS)? else {
            return Ok(DEFAULT_PRESENTATION.to_string());
        };
        let rels = parse_relationships(PACKAGE_RELS, "", &xml)?;
        Ok(rels
            .into_iter()
            .find(|rel| !rel.external && rel.rel_type.ends_with(OFFICE_DOCUMENT_REL))
            .map_or_else(|| DEFAULT_PRESENTATION.to_string(), |rel| rel.target))
    }

    fn read_slide_list(&mut self) -> Result<Vec<SlideRef>, DocumentError> {
        let presentation = self.presentation.clone();
        let xml = self.required_part(&presentation)?;
        let rels_part = rels_path(&presentation);
        let rels = match self.part(&rels_part)? {
            Some(rels_xml) => parse_relationships(&rels_part, part_dir(&presentation), &rels_xml)?,
            None => Vec::new(),
        };

        parse_slide_ids(&presentation, &xml)?
            .into_iter()
            .map(|(id, rel_id)| -> Result<SlideRef, DocumentError> {
                let rel = rels.iter().find(|rel| rel.id == rel_id).ok_or_else(|| {
                    DocumentError::InvalidDocument(format!(
                        "slide {id} references missing relationship {rel_id}"
                    ))
                })?;
                Ok(SlideRef {
                    id,
                    rel_id,
                    part: rel.target.clone(),
                })
            })
            .collect()
    }

    /// Current contents of a part, with pending changes applied.
    fn part(&mut self, name: &str) -> Result<Option<Vec<u8>>, DocumentError> {
        if self.dropped.contains(name) {
            return Ok(None);
        }
        if let Some(data) = self.replaced.get(name) {
            return Ok(Some(data.clone()));
        }
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    fn required_part(&mut self, name: &str) -> Result<Vec<u8>, DocumentError> {
        self.part(name)?
            .ok_or_else(|| DocumentError::InvalidDocument(format!("missing part {name}")))
    }

    /// Parts owned by `slide`: the slide, its relationships, its notes.
    fn owned_parts(&mut self, slide: &SlideRef) -> Result<Vec<String>, DocumentError> {
        let mut owned = vec![slide.part.clone()];
        let slide_rels = rels_path(&slide.part);
        let Some(xml) = self.part(&slide_rels)? else {
            return Ok(owned);
        };

        let rels = parse_relationships(&slide_rels, part_dir(&slide.part), &xml)?;
        for notes in rels
            .iter()
            .filter(|rel| !rel.external && rel.rel_type.ends_with(NOTES_SLIDE_REL))
        {
            owned.push(notes.target.clone());
            let notes_rels = rels_path(&notes.target);
            if self.part(&notes_rels)?.is_some() {
                owned.push(notes_rels);
            }
        }
        owned.push(slide_rels);
        Ok(owned)
    }
}

impl SlideDeck for PptxDeck {
    fn slides(&self) -> &[SlideRef] {
        &self.slides
    }

    fn remove(&mut self, slide: &SlideRef) -> Result<(), DocumentError> {
        let index = self
            .slides
            .iter()
            .position(|candidate| candidate == slide)
            .ok_or_else(|| DocumentError::InvalidDocument(format!("{slide} is not in the deck")))?;

        let presentation = self.presentation.clone();
        let xml = self.required_part(&presentation)?;
        let (xml, removed) = rewrite_xml(&presentation, &xml, |e| references_slide(e, slide))?;
        if removed == 0 {
            return Err(DocumentError::InvalidDocument(format!(
                "{slide} is not listed in {presentation}"
            )));
        }

        let presentation_rels = rels_path(&presentation);
        let rels_xml = self.required_part(&presentation_rels)?;
        let (rels_xml, _) = rewrite_xml(&presentation_rels, &rels_xml, |e| {
            e.local_name().as_ref() == b"Relationship"
                && attribute(e, b"Id").is_some_and(|id| id == slide.rel_id)
        })?;

        let owned = self.owned_parts(slide)?;
        let content_types = self.required_part(CONTENT_TYPES)?;
        let (content_types, _) = rewrite_xml(CONTENT_TYPES, &content_types, |e| {
            e.local_name().as_ref() == b"Override"
                && attribute(e, b"PartName").is_some_and(|name| {
                    let name = name.trim_start_matches('/');
                    owned.iter().any(|part| part == name)
                })
        })?;

        log::debug!("removing {slide} and {} owned parts", owned.len() - 1);
        self.replaced.insert(presentation, xml);
        self.replaced.insert(presentation_rels, rels_xml);
        self.replaced.insert(CONTENT_TYPES.to_string(), content_types);
        for part in owned {
            self.replaced.remove(&part);
            self.dropped.insert(part);
        }
        self.slides.remove(index);
        Ok(())
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..self.archive.len() {
            let file = self.archive.by_index_raw(index)?;
            let name = file.name().to_string();
            if self.dropped.contains(&name) {
                continue;
            }
            match self.replaced.get(&name) {
                Some(data) => {
                    writer.start_file(name, options)?;
                    writer.write_all(data)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

/// Reads `(id, r:id)` pairs from the top-level `sldIdLst`, in order.
///
/// Section lists reuse the `sldIdLst`/`sldId` names deeper in the tree and
/// are ignored here.
fn parse_slide_ids(part: &str, xml: &[u8]) -> Result<Vec<(u32, String)>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_list = false;
    let mut ids = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| DocumentError::xml(part, e))?
        {
            Event::Start(e) => {
                if depth == 1 && e.local_name().as_ref() == b"sldIdLst" {
                    in_list = true;
                } else if in_list && depth == 2 && e.local_name().as_ref() == b"sldId" {
                    ids.push(slide_id_entry(part, &e)?);
                }
                depth += 1;
            }
            Event::Empty(e) if in_list && depth == 2 && e.local_name().as_ref() == b"sldId" => {
                ids.push(slide_id_entry(part, &e)?);
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    in_list = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

fn slide_id_entry(part: &str, e: &BytesStart<'_>) -> Result<(u32, String), DocumentError> {
    let id = attribute(e, b"id")
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| DocumentError::xml(part, "sldId without a numeric id"))?;
    let rel_id = relationship_id(e)
        .ok_or_else(|| DocumentError::xml(part, "sldId without a relationship id"))?;
    Ok((id, rel_id))
}

fn parse_relationships(
    part: &str,
    base_dir: &str,
    xml: &[u8],
) -> Result<Vec<Relationship>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| DocumentError::xml(part, e))?
        {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target"))
                {
                    let external = attribute(&e, b"TargetMode").is_some_and(|mode| mode == "External");
                    rels.push(Relationship {
                        id,
                        rel_type: attribute(&e, b"Type").unwrap_or_default(),
                        target: if external {
                            target
                        } else {
                            resolve_target(base_dir, &target)
                        },
                        external,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Copies `xml` event by event, leaving out every element matched by
/// `should_drop` together with its subtree. Returns the new document and the
/// number of elements dropped.
fn rewrite_xml(
    part: &str,
    xml: &[u8],
    should_drop: impl Fn(&BytesStart<'_>) -> bool,
) -> Result<(Vec<u8>, usize), DocumentError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;
    let mut removed = 0usize;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| DocumentError::xml(part, e))?
        {
            Event::Eof => break,
            Event::Start(_) if skip_depth > 0 => skip_depth += 1,
            Event::End(_) if skip_depth > 0 => skip_depth -= 1,
            _ if skip_depth > 0 => {}
            Event::Empty(e) if should_drop(&e) => removed += 1,
            Event::Start(e) if should_drop(&e) => {
                removed += 1;
                skip_depth = 1;
            }
            event => writer
                .write_event(event)
                .map_err(|e| DocumentError::xml(part, e))?,
        }
        buf.clear();
    }

    Ok((writer.into_inner(), removed))
}

/// Matches slide-list, section and custom-show entries pointing at `slide`.
fn references_slide(e: &BytesStart<'_>, slide: &SlideRef) -> bool {
    let by_rel = || relationship_id(e).is_some_and(|rel_id| rel_id == slide.rel_id);
    match e.local_name().as_ref() {
        b"sldId" => {
            attribute(e, b"id").is_some_and(|id| id.parse::<u32>().ok() == Some(slide.id))
                || by_rel()
        }
        b"sld" => by_rel(),
        _ => false,
    }
}

/// Value of the unprefixed attribute `key`.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| std::str::from_utf8(&attr.value).ok().map(str::to_string))
}

/// Value of the namespaced `r:id` attribute, whatever its prefix.
fn relationship_id(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id")
        .and_then(|attr| std::str::from_utf8(&attr.value).ok().map(str::to_string))
}

/// Directory of a part name (`ppt/slides` for `ppt/slides/slide1.xml`).
fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Relationship part belonging to `part`.
fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target against the source part's directory.
fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{base_dir}/{target}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::PptxTestBuilder;
    use crate::test_utils::create_test_pptx;
    use crate::test_utils::create_test_zip;
    use crate::test_utils::read_zip_part;
    use crate::test_utils::zip_part_names;

    #[test]
    fn test_slide_list_in_presentation_order() {
        let deck = PptxDeck::parse(create_test_pptx(3)).unwrap();
        let slides = deck.slides();
        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].id, 256);
        assert_eq!(slides[2].part, "ppt/slides/slide3.xml");
        assert_eq!(slides[2].rel_id, "rId4");
        assert_eq!(deck.presentation_part(), "ppt/presentation.xml");
    }

    #[test]
    fn test_remove_last_slide_drops_owned_parts() {
        let bytes = PptxTestBuilder::new(3).with_notes().build();
        let mut deck = PptxDeck::parse(bytes).unwrap();
        let last = deck.slides()[2].clone();
        deck.remove(&last).unwrap();
        let out = deck.to_bytes().unwrap();

        let names = zip_part_names(&out);
        assert!(!names.iter().any(|n| n == "ppt/slides/slide3.xml"));
        assert!(!names.iter().any(|n| n == "ppt/slides/_rels/slide3.xml.rels"));
        assert!(!names.iter().any(|n| n == "ppt/notesSlides/notesSlide3.xml"));
        assert!(!names.iter().any(|n| n == "ppt/notesSlides/_rels/notesSlide3.xml.rels"));
        assert!(names.iter().any(|n| n == "ppt/slides/slide2.xml"));
        assert!(names.iter().any(|n| n == "ppt/notesSlides/notesSlide2.xml"));

        let content_types = read_zip_part(&out, CONTENT_TYPES).unwrap();
        assert!(!content_types.contains("/ppt/slides/slide3.xml"));
        assert!(!content_types.contains("/ppt/notesSlides/notesSlide3.xml"));
        assert!(content_types.contains("/ppt/slides/slide2.xml"));

        let rels = read_zip_part(&out, "ppt/_rels/presentation.xml.rels").unwrap();
        assert!(!rels.contains("\"rId4\""));
        assert!(rels.contains("presProps.xml"));

        let reparsed = PptxDeck::parse(out).unwrap();
        assert_eq!(reparsed.slides().len(), 2);
        assert_eq!(reparsed.slides()[1].part, "ppt/slides/slide2.xml");
    }

    #[test]
    fn test_remove_clears_section_and_custom_show_references() {
        let bytes = PptxTestBuilder::new(2)
            .with_sections()
            .with_custom_show()
            .build();
        let mut deck = PptxDeck::parse(bytes).unwrap();
        let last = deck.slides()[1].clone();
        deck.remove(&last).unwrap();
        let out = deck.to_bytes().unwrap();

        let xml = read_zip_part(&out, "ppt/presentation.xml").unwrap();
        assert!(!xml.contains("id=\"257\""));
        assert!(!xml.contains("r:id=\"rId3\""));
        assert!(xml.contains("id=\"256\""));
        assert!(xml.contains("<p14:sectionLst"));
        assert!(xml.contains("<p:custShow "));
    }

    #[test]
    fn test_remove_every_slide() {
        let mut deck = PptxDeck::parse(create_test_pptx(2)).unwrap();
        while let Some(last) = deck.slides().last().cloned() {
            deck.remove(&last).unwrap();
        }
        let reparsed = PptxDeck::parse(deck.to_bytes().unwrap()).unwrap();
        assert!(reparsed.slides().is_empty());
    }

    #[test]
    fn test_remove_unknown_slide_fails() {
        let mut deck = PptxDeck::parse(create_test_pptx(1)).unwrap();
        let ghost = SlideRef {
            id: 999,
            rel_id: "rId99".into(),
            part: "ppt/slides/slide99.xml".into(),
        };
        assert!(matches!(
            deck.remove(&ghost),
            Err(DocumentError::InvalidDocument(_))
        ));
        assert_eq!(deck.slides().len(), 1);
    }

    #[test]
    fn test_not_a_package() {
        assert!(PptxDeck::parse(b"plain text".to_vec()).is_err());
    }

    #[test]
    fn test_dangling_slide_relationship() {
        let presentation = r#"<?xml version="1.0"?><p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId9"/></p:sldIdLst></p:presentation>"#;
        let bytes = create_test_zip(&[
            ("ppt/presentation.xml", presentation),
            (
                "ppt/_rels/presentation.xml.rels",
                r#"<?xml version="1.0"?><Relationships xmlns="x"/>"#,
            ),
        ]);
        let err = PptxDeck::parse(bytes).unwrap_err();
        assert!(err.to_string().contains("rId9"));
    }

    #[test]
    fn test_unchanged_package_round_trips_parts() {
        let bytes = create_test_pptx(2);
        let mut deck = PptxDeck::parse(bytes.clone()).unwrap();
        let out = deck.to_bytes().unwrap();
        assert_eq!(zip_part_names(&out), zip_part_names(&bytes));
        assert_eq!(
            read_zip_part(&out, "ppt/slides/slide1.xml"),
            read_zip_part(&bytes, "ppt/slides/slide1.xml")
        );
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("ppt", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_target("ppt/slides", "../notesSlides/notesSlide1.xml"),
            "ppt/notesSlides/notesSlide1.xml"
        );
        assert_eq!(resolve_target("ppt", "/ppt/slides/a.xml"), "ppt/slides/a.xml");
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
    }

    #[test]
    fn test_rels_path() {
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels_path("root.xml"), "_rels/root.xml.rels");
        assert_eq!(part_dir("ppt/slides/slide1.xml"), "ppt/slides");
    }
}
