//! Binary XML documents.
//!
//! The parser produces a flat event list mirroring the chunk stream; the
//! [`Document::root`] builder folds it into a typed element tree, keeping
//! sibling and attribute order, and rejects documents whose element stack
//! is not empty (or namespaces unbalanced) at end-of-stream.

use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{StringPool, StringPoolIndex};
use crate::values::{ResolvedValue, Value};

#[derive(Debug)]
pub(crate) struct XmlAttribute {
    pub(crate) ns: Option<StringPoolIndex>,
    pub(crate) name: StringPoolIndex,
    pub(crate) raw_value: Option<StringPoolIndex>,
    pub(crate) typed_value: Value,
}

#[derive(Debug)]
pub(crate) enum XmlEvent {
    StartNamespace {
        prefix: StringPoolIndex,
        uri: StringPoolIndex,
    },
    EndNamespace {
        prefix: StringPoolIndex,
        uri: StringPoolIndex,
    },
    StartElement {
        ns: Option<StringPoolIndex>,
        name: StringPoolIndex,
        attributes: Vec<XmlAttribute>,
    },
    EndElement {
        ns: Option<StringPoolIndex>,
        name: StringPoolIndex,
    },
    Cdata {
        data: StringPoolIndex,
    },
}

/// A decoded binary XML document: the shared string pool, the optional
/// resource-id map and the raw event stream.
#[derive(Debug)]
pub struct Document {
    pub(crate) string_pool: StringPool,
    pub(crate) resource_ids: Vec<u32>,
    pub(crate) events: Vec<XmlEvent>,
}

/// An element attribute. The namespace is the full URI, the typed value
/// is resolved against the document string pool (references are kept
/// symbolic).
#[derive(Debug, Clone)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub raw: Option<String>,
    pub value: ResolvedValue,
}

/// A tree element with ordered attributes and children.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Element>,
    pub cdata: Vec<String>,
}

impl Element {
    pub fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == namespace)
    }

    /// Finds an attribute by local name regardless of its namespace.
    pub fn attribute_anyns(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child_named(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

impl Document {
    #[inline]
    #[must_use]
    pub const fn string_pool(&self) -> &StringPool {
        &self.string_pool
    }

    #[inline]
    #[must_use]
    pub fn resource_ids(&self) -> &[u32] {
        &self.resource_ids
    }

    /// Builds the element tree from the event stream.
    pub fn root(&self) -> ResourcesResult<Element> {
        let mut namespace_stack: Vec<(StringPoolIndex, StringPoolIndex)> = Vec::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        for event in &self.events {
            match event {
                XmlEvent::StartNamespace { prefix, uri } => {
                    namespace_stack.push((*prefix, *uri));
                }
                XmlEvent::EndNamespace { prefix, uri } => {
                    match namespace_stack.pop() {
                        Some((p, u)) if p == *prefix && u == *uri => {}
                        _ => {
                            return Err(ResourcesError::MalformedDocument(
                                "unbalanced namespace scopes".to_string(),
                            ))
                        }
                    }
                }
                XmlEvent::StartElement {
                    ns,
                    name,
                    attributes,
                } => {
                    let element = Element {
                        namespace: self.optional_string(*ns)?,
                        name: self.string_pool.get(*name)?.to_string(),
                        attributes: attributes
                            .iter()
                            .map(|a| self.build_attribute(a))
                            .collect::<ResourcesResult<_>>()?,
                        children: Vec::new(),
                        cdata: Vec::new(),
                    };
                    element_stack.push(element);
                }
                XmlEvent::EndElement { ns: _, name } => {
                    let closed = element_stack.pop().ok_or_else(|| {
                        ResourcesError::MalformedDocument(
                            "end tag without matching start tag".to_string(),
                        )
                    })?;
                    let expected = self.string_pool.get(*name)?;
                    if closed.name != expected {
                        return Err(ResourcesError::MalformedDocument(format!(
                            "end tag '{expected}' closes '{}'",
                            closed.name
                        )));
                    }
                    match element_stack.last_mut() {
                        Some(parent) => parent.children.push(closed),
                        None => {
                            if root.is_some() {
                                return Err(ResourcesError::MalformedDocument(
                                    "multiple root elements".to_string(),
                                ));
                            }
                            root = Some(closed);
                        }
                    }
                }
                XmlEvent::Cdata { data } => {
                    if let Some(top) = element_stack.last_mut() {
                        top.cdata.push(self.string_pool.get(*data)?.to_string());
                    }
                }
            }
        }

        if !element_stack.is_empty() {
            return Err(ResourcesError::MalformedDocument(format!(
                "{} unclosed element(s) at end of stream",
                element_stack.len()
            )));
        }

        root.ok_or_else(|| {
            ResourcesError::MalformedDocument("document has no root element".to_string())
        })
    }

    fn optional_string(&self, idx: Option<StringPoolIndex>) -> ResourcesResult<Option<String>> {
        idx.map(|i| self.string_pool.get(i).map(str::to_string))
            .transpose()
    }

    fn build_attribute(&self, attr: &XmlAttribute) -> ResourcesResult<Attribute> {
        Ok(Attribute {
            namespace: self.optional_string(attr.ns)?,
            name: self.string_pool.get(attr.name)?.to_string(),
            raw: self.optional_string(attr.raw_value)?,
            value: attr.typed_value.resolve(&self.string_pool)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(strings: &[&str]) -> StringPool {
        StringPool {
            sorted: false,
            utf8: true,
            strings: strings.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn start(name: usize) -> XmlEvent {
        XmlEvent::StartElement {
            ns: None,
            name: StringPoolIndex::new(name),
            attributes: Vec::new(),
        }
    }

    fn end(name: usize) -> XmlEvent {
        XmlEvent::EndElement {
            ns: None,
            name: StringPoolIndex::new(name),
        }
    }

    #[test]
    fn builds_nested_tree() {
        let doc = Document {
            string_pool: pool(&["manifest", "application", "activity"]),
            resource_ids: Vec::new(),
            events: vec![start(0), start(1), start(2), end(2), end(1), end(0)],
        };
        let root = doc.root().unwrap();
        assert_eq!(root.name, "manifest");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "application");
        assert_eq!(root.children[0].children[0].name, "activity");
    }

    #[test]
    fn sibling_order_is_preserved() {
        let doc = Document {
            string_pool: pool(&["root", "a", "b"]),
            resource_ids: Vec::new(),
            events: vec![start(0), start(1), end(1), start(2), end(2), end(0)],
        };
        let root = doc.root().unwrap();
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn rejects_unclosed_elements() {
        let doc = Document {
            string_pool: pool(&["root", "child"]),
            resource_ids: Vec::new(),
            events: vec![start(0), start(1), end(1)],
        };
        assert!(matches!(
            doc.root(),
            Err(ResourcesError::MalformedDocument(_))
        ));
    }

    #[test]
    fn rejects_mismatched_end_tag() {
        let doc = Document {
            string_pool: pool(&["root", "child"]),
            resource_ids: Vec::new(),
            events: vec![start(0), end(1)],
        };
        assert!(doc.root().is_err());
    }
}
