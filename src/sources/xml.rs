use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use quick_xml::{Reader, events::Event};

use super::{Materialized, RawTable, SourceFormat, SourceOptions, SourceReader, read_text};
use crate::{
    data::RawValue,
    error::{ProfileError, ProfileResult},
};

/// XML documents with one repeated element per row.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlReader;

impl SourceReader for XmlReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Xml
    }

    fn read(&self, path: &Path, options: &SourceOptions) -> ProfileResult<Materialized> {
        let (text, encoding) = read_text(path, options)?;
        Ok(Materialized {
            table: parse_xml_text(&text, options.row_tag.as_deref())?,
            format: self.format(),
            encoding: Some(encoding),
            delimiter: None,
        })
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<usize>,
}

/// Elements in document order; index 0 is the root.
#[derive(Debug, Default)]
struct Document {
    elements: Vec<Element>,
}

impl Document {
    fn parse(text: &str) -> ProfileResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut document = Document::default();
        let mut stack: Vec<usize> = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let index = document.open(&start, stack.last().copied())?;
                    stack.push(index);
                }
                Ok(Event::Empty(start)) => {
                    document.open(&start, stack.last().copied())?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                // Only leading text counts; tail text after a child is dropped.
                Ok(Event::Text(text)) => {
                    if let Some(&current) = stack.last()
                        && document.elements[current].children.is_empty()
                    {
                        let unescaped = text
                            .unescape()
                            .map_err(|err| ProfileError::malformed("xml", err.to_string()))?;
                        document.elements[current].text.push_str(unescaped.trim());
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(&current) = stack.last()
                        && document.elements[current].children.is_empty()
                    {
                        let content = String::from_utf8_lossy(data.as_ref());
                        document.elements[current].text.push_str(content.trim());
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    return Err(ProfileError::malformed(
                        "xml",
                        format!("at byte {}: {err}", reader.buffer_position()),
                    ));
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            let name = &document.elements[stack[stack.len() - 1]].name;
            return Err(ProfileError::malformed(
                "xml",
                format!("element <{name}> is never closed"),
            ));
        }
        if document.elements.is_empty() {
            return Err(ProfileError::malformed("xml", "document has no root element"));
        }
        Ok(document)
    }

    fn open(
        &mut self,
        start: &quick_xml::events::BytesStart<'_>,
        parent: Option<usize>,
    ) -> ProfileResult<usize> {
        if parent.is_none() && !self.elements.is_empty() {
            return Err(ProfileError::malformed(
                "xml",
                "document has more than one root element",
            ));
        }
        let mut element = Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Element::default()
        };
        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|err| ProfileError::malformed("xml", err.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|err| ProfileError::malformed("xml", err.to_string()))?;
            element.attributes.push((key, value.into_owned()));
        }
        let index = self.elements.len();
        self.elements.push(element);
        if let Some(parent) = parent {
            self.elements[parent].children.push(index);
        }
        Ok(index)
    }

    fn root(&self) -> &Element {
        &self.elements[0]
    }

    /// Most frequent tag other than the root's; ties go to the tag seen first.
    fn dominant_tag(&self) -> Option<&str> {
        let root = self.root().name.as_str();
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for element in &self.elements[1..] {
            if element.name != root {
                *counts.entry(element.name.as_str()).or_default() += 1;
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (tag, count) in counts {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((tag, count));
            }
        }
        best.map(|(tag, _)| tag)
    }

    fn row_elements(&self, row_tag: Option<&str>) -> Vec<&Element> {
        let tag = match row_tag {
            Some(tag) => Some(tag),
            None => self.dominant_tag(),
        };
        match tag {
            Some(tag) => self
                .elements
                .iter()
                .filter(|element| element.name == tag)
                .collect(),
            None => vec![self.root()],
        }
    }

    fn record(&self, element: &Element) -> IndexMap<String, RawValue> {
        let mut record = IndexMap::new();
        for (key, value) in &element.attributes {
            record.insert(format!("@{key}"), RawValue::text(value.as_str()));
        }
        if !element.text.is_empty() {
            record.insert("#text".to_string(), RawValue::text(element.text.as_str()));
        }
        for &child in &element.children {
            let child = &self.elements[child];
            let mut key = child.name.clone();
            let mut suffix = 2;
            while record.contains_key(&key) {
                key = format!("{}_{suffix}", child.name);
                suffix += 1;
            }
            record.insert(key, RawValue::text(child.text.as_str()));
        }
        record
    }
}

/// Parse an XML document into rows. `row_tag` selects row elements
/// explicitly; otherwise the dominant non-root tag is used.
pub fn parse_xml_text(text: &str, row_tag: Option<&str>) -> ProfileResult<RawTable> {
    let document = Document::parse(text)?;
    let rows = document.row_elements(row_tag);
    debug!(
        "XML row element <{}> matched {} element(s)",
        rows.first()
            .map(|element| element.name.as_str())
            .or(row_tag)
            .unwrap_or_default(),
        rows.len()
    );
    let records = rows
        .into_iter()
        .map(|element| document.record(element))
        .collect();
    Ok(RawTable::from_records(records))
}
