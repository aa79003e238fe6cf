//! Index-based element tree built from a cleaned XML string.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::XmlError;

/// Index into the document's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        NodeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    /// Text before the first child element.
    text: String,
    children: Vec<NodeId>,
}

/// A parsed XML document.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    /// Parse a complete document. Any well-formedness problem is an error.
    pub fn parse(xml: &str) -> Result<Document, XmlError> {
        let mut reader = Reader::from_str(xml);
        let mut builder = TreeBuilder::default();

        loop {
            let position = reader.buffer_position();
            match reader.read_event() {
                Ok(Event::Start(ref e)) => builder.open(e, position)?,
                Ok(Event::Empty(ref e)) => {
                    builder.open(e, position)?;
                    builder.close(position)?;
                },
                Ok(Event::End(_)) => builder.close(position)?,
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(|err| XmlError::syntax(position, err))?;
                    builder.text(&text, position)?;
                },
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    builder.text(&text, position)?;
                },
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions and doctypes carry no data.
                Ok(_) => {},
                Err(err) => return Err(XmlError::syntax(reader.error_position(), err)),
            }
        }

        builder.finish()
    }

    /// The document element.
    pub fn root(&self) -> Node<'_> {
        Node { doc: self, id: self.root }
    }

    /// Number of elements in the document.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// A lightweight handle for navigating the tree.
#[derive(Clone, Copy)]
pub struct Node<'doc> {
    doc: &'doc Document,
    id: NodeId,
}

impl<'doc> Node<'doc> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Tag name as written in the source, prefix included.
    pub fn tag(&self) -> &'doc str {
        &self.doc.data(self.id).tag
    }

    /// Leading text, entities resolved, untrimmed.
    pub fn text(&self) -> &'doc str {
        &self.doc.data(self.id).text
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&'doc str, &'doc str)> + 'doc {
        self.doc
            .data(self.id)
            .attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'doc>> + 'doc {
        let doc = self.doc;
        doc.data(self.id).children.iter().map(move |&id| Node { doc, id })
    }

    /// This node and everything below it, depth-first in document order.
    pub fn descendants(&self) -> Descendants<'doc> {
        Descendants {
            doc: self.doc,
            stack: vec![self.id],
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .finish()
    }
}

/// Pre-order iterator returned by [`Node::descendants`].
pub struct Descendants<'doc> {
    doc: &'doc Document,
    stack: Vec<NodeId>,
}

impl<'doc> Iterator for Descendants<'doc> {
    type Item = Node<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack.extend(self.doc.data(id).children.iter().rev());
        Some(Node { doc: self.doc, id })
    }
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<NodeData>,
    open: Vec<NodeId>,
    root: Option<NodeId>,
}

impl TreeBuilder {
    fn open(&mut self, start: &BytesStart<'_>, position: u64) -> Result<(), XmlError> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(XmlError::TrailingContent(position));
        }

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| XmlError::syntax(position, err))?;
            let value = attr.unescape_value().map_err(|err| XmlError::syntax(position, err))?;
            attributes.push((String::from_utf8_lossy(attr.key.as_ref()).into_owned(), value.into_owned()));
        }

        let id = NodeId::new(self.nodes.len());
        self.nodes.push(NodeData {
            tag: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            children: Vec::new(),
        });

        match self.open.last() {
            Some(parent) => self.nodes[parent.index()].children.push(id),
            None => self.root = Some(id),
        }
        self.open.push(id);

        Ok(())
    }

    fn close(&mut self, position: u64) -> Result<(), XmlError> {
        match self.open.pop() {
            Some(_) => Ok(()),
            None => Err(XmlError::syntax(position, "end tag without a matching start tag")),
        }
    }

    fn text(&mut self, text: &str, position: u64) -> Result<(), XmlError> {
        match self.open.last() {
            Some(current) => {
                let node = &mut self.nodes[current.index()];
                // Text after a child element is tail text and is not kept.
                if node.children.is_empty() {
                    node.text.push_str(text);
                }
                Ok(())
            },
            None if text.trim().is_empty() => Ok(()),
            None if self.root.is_some() => Err(XmlError::TrailingContent(position)),
            None => Err(XmlError::syntax(position, "text before the root element")),
        }
    }

    fn finish(self) -> Result<Document, XmlError> {
        if let Some(unclosed) = self.open.last() {
            return Err(XmlError::UnclosedElement(self.nodes[unclosed.index()].tag.clone()));
        }

        match self.root {
            Some(root) => Ok(Document { nodes: self.nodes, root }),
            None => Err(XmlError::NoRootElement),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_builds_tree() -> Result<(), XmlError> {
        let doc = Document::parse(
            r#"<?xml version="1.0"?>
            <ENVELOPE><BODY a="1" b="x &amp; y"><NAME>Cash</NAME><EMPTY/></BODY></ENVELOPE>"#,
        )?;

        let root = doc.root();
        assert_eq!(root.tag(), "ENVELOPE");
        assert_eq!(doc.len(), 4);

        let body = root.children().next().unwrap();
        assert_eq!(body.attributes().collect::<Vec<_>>(), vec![("a", "1"), ("b", "x & y")]);

        let tags: Vec<_> = body.children().map(|n| n.tag()).collect();
        assert_eq!(tags, vec!["NAME", "EMPTY"]);
        assert_eq!(body.children().next().unwrap().text(), "Cash");

        Ok(())
    }

    #[test]
    fn test_descendants_in_document_order() -> Result<(), XmlError> {
        let doc = Document::parse("<A><B><C/></B><D><E/></D></A>")?;
        let tags: Vec<_> = doc.root().descendants().map(|n| n.tag()).collect();
        assert_eq!(tags, vec!["A", "B", "C", "D", "E"]);

        Ok(())
    }

    #[test]
    fn test_text_keeps_only_leading_text() -> Result<(), XmlError> {
        let doc = Document::parse("<A> head <B>inner</B> tail </A>")?;
        assert_eq!(doc.root().text(), " head ");

        Ok(())
    }

    #[test]
    fn test_character_references_and_cdata() -> Result<(), XmlError> {
        let doc = Document::parse("<A>Line&#10;two <![CDATA[<raw>]]></A>")?;
        assert_eq!(doc.root().text(), "Line\ntwo <raw>");

        Ok(())
    }

    #[test]
    fn test_prefixed_names_are_kept_verbatim() -> Result<(), XmlError> {
        let doc = Document::parse(r#"<UDF:X xmlns:UDF="TallyUDF">1</UDF:X>"#)?;
        assert_eq!(doc.root().tag(), "UDF:X");

        Ok(())
    }

    #[test]
    fn test_node_identity() -> Result<(), XmlError> {
        let doc = Document::parse("<A><B/><B/></A>")?;
        let children: Vec<_> = doc.root().children().collect();
        assert_ne!(children[0], children[1]);
        assert_ne!(children[0].id(), children[1].id());
        assert_eq!(doc.root().children().nth(1), Some(children[1]));

        Ok(())
    }

    #[test]
    fn test_mismatched_end_tag_is_an_error() {
        assert!(matches!(Document::parse("<A><B></A>"), Err(XmlError::Syntax { .. })));
    }

    #[test]
    fn test_unclosed_element_is_an_error() {
        assert!(matches!(
            Document::parse("<A><B>text</B>"),
            Err(XmlError::UnclosedElement(_) | XmlError::Syntax { .. })
        ));
    }

    #[test]
    fn test_second_root_is_an_error() {
        assert!(matches!(Document::parse("<A/><B/>"), Err(XmlError::TrailingContent(_))));
    }

    #[test]
    fn test_empty_input_has_no_root() {
        assert_eq!(Document::parse("  \n").unwrap_err(), XmlError::NoRootElement);
    }

    #[test]
    fn test_unknown_entity_is_an_error() {
        assert!(matches!(Document::parse("<A>&nbsp;</A>"), Err(XmlError::Syntax { .. })));
    }
}
