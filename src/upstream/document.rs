//! Owned element tree for the upstream plan document.
//!
//! The feed is small (one school, one day), so it is parsed into a plain
//! tree once and then walked freely by the merge code.

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Direct text content, trimmed.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Text of a required child element.
    pub fn child_text(&self, name: &str) -> Result<&str> {
        self.child(name)
            .map(|c| c.text.as_str())
            .ok_or_else(|| AppError::parse(format!("<{}> is missing <{}>", self.name, name)))
    }

    pub fn required_attribute(&self, name: &str) -> Result<&str> {
        self.attribute(name)
            .ok_or_else(|| AppError::parse(format!("<{}> is missing attribute {}", self.name, name)))
    }
}

/// Parses a complete document and returns its root element.
pub fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                stack.push(start_element(&reader, e)?);
            }
            Event::Empty(ref e) => {
                let element = start_element(&reader, e)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| AppError::parse("unbalanced closing tag"))?;
                element.text = element.text.trim().to_string();
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = reader
                        .decoder()
                        .decode(e.as_ref())
                        .map_err(|e| AppError::parse(e.to_string()))?;
                    current.text.push_str(&decoded);
                }
            }
            Event::CData(ref e) => {
                if let Some(current) = stack.last_mut() {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|e| AppError::parse(e.to_string()))?;
                    current.text.push_str(text);
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(current) = stack.last_mut() {
                    if let Some(ch) = e
                        .resolve_char_ref()
                        .map_err(|e| AppError::parse(e.to_string()))?
                    {
                        current.text.push(ch);
                    } else {
                        let name = reader
                            .decoder()
                            .decode(e.as_ref())
                            .map_err(|e| AppError::parse(e.to_string()))?;
                        let resolved = resolve_predefined_entity(&name)
                            .ok_or_else(|| AppError::parse(format!("unknown entity &{};", name)))?;
                        current.text.push_str(resolved);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(AppError::parse(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
    }

    root.ok_or_else(|| AppError::parse("document has no root element"))
}

fn start_element(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(e.local_name().as_ref())
        .map_err(|e| AppError::parse(e.to_string()))?
        .to_owned();

    let mut element = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| AppError::parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(|e| AppError::parse(e.to_string()))?
            .to_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| AppError::parse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn close_element(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(AppError::parse("document has more than one root element")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_elements_with_attributes() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
            <VpMobil>
              <Kopf><Zeitstempel>04.03.2024, 07:12</Zeitstempel></Kopf>
              <KlStunden>
                <KlSt ZeitVon="07:30" ZeitBis="08:15">1</KlSt>
                <KlSt ZeitVon="08:25" ZeitBis="09:10">2</KlSt>
              </KlStunden>
            </VpMobil>"#;

        let root = parse_document(xml).unwrap();
        assert_eq!(root.name, "VpMobil");
        assert_eq!(root.text, "");
        assert_eq!(root.child("Kopf").unwrap().child_text("Zeitstempel").unwrap(), "04.03.2024, 07:12");

        let periods: Vec<&Element> = root.child("KlStunden").unwrap().children_named("KlSt").collect();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].text, "2");
        assert_eq!(periods[1].attribute("ZeitVon"), Some("08:25"));
        assert_eq!(
            periods[0].attributes,
            vec![("ZeitVon".to_string(), "07:30".to_string()), ("ZeitBis".to_string(), "08:15".to_string())]
        );
    }

    #[test]
    fn test_empty_elements_and_entities() {
        let root = parse_document(r#"<Std><Le LeAe="LeGeaendert"/><If>A &amp; B</If></Std>"#).unwrap();
        let teacher = root.child("Le").unwrap();
        assert_eq!(teacher.text, "");
        assert!(teacher.has_attribute("LeAe"));
        assert_eq!(root.child_text("If").unwrap(), "A & B");
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        assert!(parse_document("<VpMobil><Kopf></VpMobil>").is_err());
        assert!(parse_document("<VpMobil>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_missing_child_is_a_parse_error() {
        let root = parse_document("<Kl><Kurz>10a</Kurz></Kl>").unwrap();
        let err = root.child_text("Pl").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }
}
