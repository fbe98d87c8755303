//! Minimal XML element tree
//!
//! Metadata descriptors are small; they are read whole into an owned tree so
//! callers can query by element name the way the descriptors are documented
//! (`.//IMAGE_REF`, `ANNOTATION`, ...). Namespaces are not resolved: queries
//! match on the local name.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Read {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// One element with its attributes, children and concatenated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
    /// Line where the element starts (1-based)
    pub line: usize,
}

impl XmlElement {
    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key) == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children
            .iter()
            .filter(move |child| child.local_name() == name)
    }

    /// First descendant (document order, excluding self) with the given local name
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.local_name() == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant (document order, excluding self) with the given local name
    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.local_name() == name {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Read and parse an XML file
pub fn parse_file(path: &Path) -> Result<XmlElement, XmlError> {
    let content = std::fs::read_to_string(path).map_err(|source| XmlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&content)
}

/// Parse an XML document into its root element
pub fn parse_str(content: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let line = line_at(content, reader.buffer_position() as usize);
        let event = reader.read_event();

        match event {
            Ok(Event::Start(ref e)) => {
                stack.push(element_from(e, line)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from(e, line)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or_else(|| XmlError::Syntax {
                    line,
                    message: "closing tag without matching opening tag".to_string(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| XmlError::Syntax {
                    line,
                    message: err.to_string(),
                })?;
                match stack.last_mut() {
                    Some(open) => open.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(XmlError::Syntax {
                            line,
                            message: "text outside the root element".to_string(),
                        })
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(XmlError::Syntax {
                    line: line_at(content, reader.buffer_position() as usize),
                    message: err.to_string(),
                })
            }
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Syntax {
            line: open.line,
            message: format!("element <{}> is never closed", open.name),
        });
    }

    root.ok_or_else(|| XmlError::Syntax {
        line: line_at(content, content.len()),
        message: "document has no root element".to_string(),
    })
}

fn element_from(start: &BytesStart<'_>, line: usize) -> Result<XmlElement, XmlError> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| XmlError::Syntax {
            line,
            message: err.to_string(),
        })?;
        let value = attr.unescape_value().map_err(|err| XmlError::Syntax {
            line,
            message: err.to_string(),
        })?;
        attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }

    Ok(XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
        line,
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(XmlError::Syntax {
                line: element.line,
                message: format!("second root element <{}>", element.name),
            })
        }
    }
    Ok(())
}

/// 1-based line of a byte offset
fn line_at(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
