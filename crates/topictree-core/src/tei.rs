//! TEI XML input.
//!
//! A TEI file holds several texts. Every element with the configured local
//! name and an `xml:id` attribute becomes one text, whose content is the
//! character data of its whole subtree minus the content of skipped
//! elements. Nested sections each keep the full text of their own subtree.
//!
//! Element names are matched on their local part, so `<div>` and `<tei:div>`
//! are the same element.

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use topictree_types::ExtractionConfig;

use crate::error::TreeError;

/// One text section of a TEI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeiSection {
    /// Value of the section's `xml:id`
    pub xml_id: String,
    /// Concatenated character data
    pub content: String,
}

enum Frame {
    Section,
    Skip,
    Other,
}

enum Kind {
    Section(String),
    Skip,
    Other,
}

/// Splits TEI documents into text sections.
#[derive(Debug, Clone)]
pub struct TeiReader {
    element: String,
    skip: HashSet<String>,
}

impl TeiReader {
    /// Create a reader from the `tei_*` extraction settings.
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            element: config.tei_element.trim().to_string(),
            skip: config.tei_skip_elements.iter().cloned().collect(),
        }
    }

    /// Text sections of `xml` in document order.
    ///
    /// Sections nested in a skipped element are ignored.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Xml` for malformed XML.
    pub fn sections(&self, xml: &str) -> Result<Vec<TeiSection>, TreeError> {
        let mut reader = Reader::from_str(xml);
        let mut sections: Vec<TeiSection> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut skip_depth = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(start) => match self.classify(&start, skip_depth)? {
                    Kind::Section(xml_id) => {
                        open.push(sections.len());
                        sections.push(TeiSection {
                            xml_id,
                            content: String::new(),
                        });
                        frames.push(Frame::Section);
                    }
                    Kind::Skip => {
                        skip_depth += 1;
                        frames.push(Frame::Skip);
                    }
                    Kind::Other => frames.push(Frame::Other),
                },
                Event::Empty(start) => {
                    if let Kind::Section(xml_id) = self.classify(&start, skip_depth)? {
                        sections.push(TeiSection {
                            xml_id,
                            content: String::new(),
                        });
                    }
                }
                Event::End(_) => match frames.pop() {
                    Some(Frame::Section) => {
                        open.pop();
                    }
                    Some(Frame::Skip) => skip_depth -= 1,
                    _ => {}
                },
                Event::Text(text) if skip_depth == 0 && !open.is_empty() => {
                    let text = text.unescape()?;
                    for &i in &open {
                        sections[i].content.push_str(&text);
                    }
                }
                Event::CData(data) if skip_depth == 0 && !open.is_empty() => {
                    let text = String::from_utf8_lossy(&data);
                    for &i in &open {
                        sections[i].content.push_str(&text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(sections)
    }

    fn classify(&self, start: &BytesStart<'_>, skip_depth: usize) -> Result<Kind, TreeError> {
        let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        if self.skip.contains(&local) {
            return Ok(Kind::Skip);
        }
        if skip_depth > 0 || local != self.element {
            return Ok(Kind::Other);
        }

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
            if attr.key.as_ref() == b"xml:id" {
                return Ok(Kind::Section(attr.unescape_value()?.into_owned()));
            }
        }

        debug!(element = %local, "Section element without xml:id, not a text");
        Ok(Kind::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTERS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <text>
    <body>
      <div xml:id="l1" type="letter">
        <head>To my brother</head>
        <p>The dog &amp; the fox<note>editorial remark</note> ran.</p>
      </div>
      <div type="postscript"><p>No id here.</p></div>
      <div xml:id="l2" type="letter">
        <p><![CDATA[A ship]]> and a boat.</p>
        <div xml:id="l2a"><p>Inner cat.</p></div>
      </div>
      <div xml:id="empty"/>
    </body>
  </text>
</TEI>"#;

    fn reader(skip: &[&str]) -> TeiReader {
        TeiReader::new(&ExtractionConfig {
            tei_skip_elements: skip.iter().map(|s| s.to_string()).collect(),
            ..ExtractionConfig::default()
        })
    }

    #[test]
    fn test_sections_with_xml_id() {
        let sections = reader(&[]).sections(LETTERS).unwrap();

        let ids: Vec<&str> = sections.iter().map(|s| s.xml_id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2", "l2a", "empty"]);
        assert!(sections[0].content.contains("To my brother"));
        assert!(sections[0].content.contains("The dog & the fox"));
        assert!(sections[0].content.contains("editorial remark"));
        assert!(sections[3].content.is_empty());
    }

    #[test]
    fn test_nested_section_text_in_both() {
        let sections = reader(&[]).sections(LETTERS).unwrap();

        assert!(sections[1].content.contains("A ship"));
        assert!(sections[1].content.contains("Inner cat."));
        assert!(!sections[2].content.contains("ship"));
        assert!(sections[2].content.contains("Inner cat."));
    }

    #[test]
    fn test_skipped_elements_left_out() {
        let sections = reader(&["note"]).sections(LETTERS).unwrap();
        assert!(!sections[0].content.contains("editorial"));
        assert!(sections[0].content.contains("ran."));
    }

    #[test]
    fn test_prefixed_element_names() {
        let xml = r#"<tei:TEI xmlns:tei="http://www.tei-c.org/ns/1.0"><tei:div xml:id="a">whale</tei:div></tei:TEI>"#;
        let sections = reader(&[]).sections(xml).unwrap();
        assert_eq!(
            sections,
            vec![TeiSection {
                xml_id: "a".to_string(),
                content: "whale".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let result = reader(&[]).sections("<TEI><div xml:id=\"a\">text</p></TEI>");
        assert!(matches!(result, Err(TreeError::Xml(_))));
    }
}
