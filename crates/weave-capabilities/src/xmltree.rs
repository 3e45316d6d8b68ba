//! Minimal owned XML tree built from a quick-xml event stream.
//!
//! Element names are stored without their namespace prefix; attribute keys
//! keep the full qualified name (`xlink:href` stays `xlink:href`). DTD
//! declarations, comments and processing instructions are dropped during the
//! fold, which is why a DTD preamble never needs a re-parse.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::CapabilitiesError;

#[derive(Debug, Clone, Default)]
pub struct Element {
    /// Local (prefix-stripped) element name.
    pub name: String,
    /// Attribute key/value pairs with fully qualified keys.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated, trimmed character data.
    pub text: String,
}

impl Element {
    /// Exact-key attribute lookup.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive attribute lookup.
    pub fn attr_ci(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `xlink:href`, tolerating producers that drop the prefix.
    pub fn xlink_href(&self) -> Option<&str> {
        self.attr("xlink:href").or_else(|| self.attr("href"))
    }

    /// First child with the given local name (case-sensitive, like the
    /// schemas themselves).
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == local_name)
    }

    pub fn children_named<'a>(
        &'a self,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == local_name)
    }

    /// Trimmed text content of a direct child, when present and non-empty.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        let text = self.child(local_name)?.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn collect_attributes(
    e: &quick_xml::events::BytesStart<'_>,
) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        attributes.push((key, value));
    }
    attributes
}

/// Parse a full document into its root element.
pub fn parse_document(xml: &str) -> Result<Element, CapabilitiesError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(Element {
                    name: local_name(e.name().as_ref()),
                    attributes: collect_attributes(&e),
                    children: Vec::new(),
                    text: String::new(),
                });
            }
            Ok(Event::Empty(e)) => {
                let element = Element {
                    name: local_name(e.name().as_ref()),
                    attributes: collect_attributes(&e),
                    children: Vec::new(),
                    text: String::new(),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {}
                }
            }
            Ok(Event::End(_)) => {
                let Some(done) = stack.pop() else {
                    return Err(CapabilitiesError::MalformedXml(String::from(
                        "unbalanced end tag",
                    )));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None if root.is_none() => root = Some(done),
                    None => {}
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(top) = stack.last_mut() {
                    if let Ok(text) = t.unescape() {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            top.text.push_str(trimmed);
                        }
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(top) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    top.text.push_str(text.trim());
                }
            }
            // DTD preambles, declarations, comments and PIs carry nothing
            // the model needs.
            Ok(Event::DocType(_))
            | Ok(Event::Decl(_))
            | Ok(Event::Comment(_))
            | Ok(Event::PI(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CapabilitiesError::MalformedXml(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    root.ok_or_else(|| CapabilitiesError::MalformedXml(String::from("no root element")))
}
