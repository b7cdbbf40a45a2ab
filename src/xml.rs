//! XML source-document handling.
//!
//! SIP source documents are read with `quick-xml` into a small owned element
//! tree, then queried with a subset of the ElementTree path language:
//! `.//a/b`, `./a`, `prefix:name`, `*`, `[@attr]` and `[@attr='value']`.
//!
//! Many source documents are not strictly well-formed around whitespace, so
//! every document passes through [`clean_xml_string`] before parsing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::{Result, SipError};

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const TEI_NAMESPACE: &str = "http://www.tei-c.org/ns/1.0";
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";
pub const GDAS_NAMESPACE: &str = "http://cm4f.org/gdas/";
pub const DERLA_NAMESPACE: &str = "https://gams.uni-graz.at/o:derla.ontology#";

/// Prefix bindings used to resolve names inside path expressions.
#[derive(Debug)]
pub struct Namespaces {
    /// Namespace for unprefixed steps. Elements without any namespace also
    /// match an unprefixed step.
    pub default: Option<&'static str>,
    pub prefixes: &'static [(&'static str, &'static str)],
}

impl Namespaces {
    fn resolve(&self, prefix: &str) -> Option<&'static str> {
        self.prefixes
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, uri)| *uri)
    }
}

pub static TEI_NAMESPACES: Namespaces = Namespaces {
    default: Some(TEI_NAMESPACE),
    prefixes: &[
        ("xml", XML_NAMESPACE),
        ("t", TEI_NAMESPACE),
        ("tei", TEI_NAMESPACE),
    ],
};

pub static GML_NAMESPACES: Namespaces = Namespaces {
    default: None,
    prefixes: &[
        ("xml", XML_NAMESPACE),
        ("gml", GML_NAMESPACE),
        ("gdas", GDAS_NAMESPACE),
        ("derla", DERLA_NAMESPACE),
    ],
};

/// Collapse line breaks, tabs and space runs, and drop the spaces that sit
/// directly against tag boundaries.
pub fn clean_xml_string(xml: &str) -> String {
    let mut collapsed = String::with_capacity(xml.len());
    let mut prev_space = false;
    for c in xml.chars() {
        let c = if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c };
        if c == ' ' {
            if !prev_space {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            collapsed.push(c);
            prev_space = false;
        }
    }
    collapsed
        .replace(" <", "<")
        .replace("< ", "<")
        .replace(" />", "/>")
        .replace("> ", ">")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Text before the first child element; `None` when absent or empty.
    pub fn text(&self) -> Option<&str> {
        match self.children.first() {
            Some(Node::Text(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// Value of an attribute without namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// All text nodes below this element, in document order.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    pub fn find(&self, path: &ElementPath) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    pub fn find_all(&self, path: &ElementPath) -> Vec<&Element> {
        let mut current: Vec<&Element> = vec![self];
        for step in &path.steps {
            let mut next: Vec<&Element> = Vec::new();
            // Nested context elements share descendants.
            let mut seen: HashSet<*const Element> = HashSet::new();
            for element in current {
                match step.axis {
                    Axis::Child => {
                        next.extend(element.child_elements().filter(|c| step.matches(c)));
                    }
                    Axis::Descendant => element.collect_descendants(step, &mut seen, &mut next),
                }
            }
            current = next;
        }
        current
    }

    fn collect_descendants<'a>(
        &'a self,
        step: &Step,
        seen: &mut HashSet<*const Element>,
        out: &mut Vec<&'a Element>,
    ) {
        for child in self.child_elements() {
            if step.matches(child) && seen.insert(child as *const Element) {
                out.push(child);
            }
            child.collect_descendants(step, seen, out);
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    /// Unprefixed name, resolved against the default namespace.
    Unqualified {
        default: Option<&'static str>,
        local: String,
    },
    Qualified {
        namespace: &'static str,
        local: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributePredicate {
    namespace: Option<&'static str>,
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: NameTest,
    predicate: Option<AttributePredicate>,
}

impl Step {
    fn matches(&self, element: &Element) -> bool {
        let name_ok = match &self.name {
            NameTest::Any => true,
            NameTest::Unqualified { default, local } => {
                element.name == *local
                    && (element.namespace.is_none() || element.namespace.as_deref() == *default)
            }
            NameTest::Qualified { namespace, local } => {
                element.name == *local && element.namespace.as_deref() == Some(*namespace)
            }
        };
        if !name_ok {
            return false;
        }
        match &self.predicate {
            None => true,
            Some(predicate) => {
                let actual = match predicate.namespace {
                    Some(ns) => element.attr_ns(ns, &predicate.name),
                    None => element.attr(&predicate.name),
                };
                match (&predicate.value, actual) {
                    (_, None) => false,
                    (None, Some(_)) => true,
                    (Some(expected), Some(actual)) => expected == actual,
                }
            }
        }
    }
}

/// A compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    steps: Vec<Step>,
}

impl ElementPath {
    pub fn parse(expr: &str, namespaces: &Namespaces) -> std::result::Result<Self, String> {
        let (mut axis, rest) = if let Some(rest) = expr.strip_prefix(".//") {
            (Axis::Descendant, rest)
        } else if let Some(rest) = expr.strip_prefix("./") {
            (Axis::Child, rest)
        } else {
            (Axis::Child, expr)
        };

        let mut steps = Vec::new();
        for segment in split_segments(rest) {
            if segment.is_empty() {
                axis = Axis::Descendant;
                continue;
            }
            steps.push(parse_step(segment, axis, namespaces)?);
            axis = Axis::Child;
        }

        if steps.is_empty() {
            return Err(format!("empty path expression '{}'", expr));
        }
        Ok(Self { steps })
    }
}

/// Split on `/` outside of predicates and quotes.
fn split_segments(expr: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => {
                segments.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&expr[start..]);
    segments
}

fn parse_step(
    segment: &str,
    axis: Axis,
    namespaces: &Namespaces,
) -> std::result::Result<Step, String> {
    let (name_part, predicate) = match segment.find('[') {
        Some(open) => {
            let inner = segment[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated predicate in '{}'", segment))?;
            (&segment[..open], Some(parse_predicate(inner, namespaces)?))
        }
        None => (segment, None),
    };

    let name = if name_part == "*" {
        NameTest::Any
    } else {
        match name_part.split_once(':') {
            Some((prefix, local)) => NameTest::Qualified {
                namespace: namespaces
                    .resolve(prefix)
                    .ok_or_else(|| format!("unknown namespace prefix '{}'", prefix))?,
                local: local.to_string(),
            },
            None => NameTest::Unqualified {
                default: namespaces.default,
                local: name_part.to_string(),
            },
        }
    };

    Ok(Step {
        axis,
        name,
        predicate,
    })
}

fn parse_predicate(
    inner: &str,
    namespaces: &Namespaces,
) -> std::result::Result<AttributePredicate, String> {
    let inner = inner
        .strip_prefix('@')
        .ok_or_else(|| format!("only attribute predicates are supported, got '[{}]'", inner))?;

    let (qname, value) = match inner.split_once('=') {
        Some((qname, raw)) => {
            let raw = raw.trim();
            let unquoted = raw
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| format!("predicate value must be quoted in '[@{}]'", inner))?;
            (qname.trim(), Some(unquoted.to_string()))
        }
        None => (inner.trim(), None),
    };

    let (namespace, name) = match qname.split_once(':') {
        Some((prefix, local)) => (
            Some(
                namespaces
                    .resolve(prefix)
                    .ok_or_else(|| format!("unknown namespace prefix '{}'", prefix))?,
            ),
            local.to_string(),
        ),
        None => (None, qname.to_string()),
    };

    Ok(AttributePredicate {
        namespace,
        name,
        value,
    })
}

fn owned_namespace(resolved: ResolveResult<'_>) -> std::result::Result<Option<String>, String> {
    match resolved {
        ResolveResult::Bound(Namespace(ns)) => Ok(Some(String::from_utf8_lossy(ns).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        )),
    }
}

fn read_attributes(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
) -> std::result::Result<Vec<Attribute>, String> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let is_xml_prefixed = attr
            .key
            .prefix()
            .map(|p| p.as_ref() == b"xml")
            .unwrap_or(false);
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let namespace = if is_xml_prefixed {
            Some(XML_NAMESPACE.to_string())
        } else {
            owned_namespace(resolved)?
        };
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        attributes.push(Attribute {
            namespace,
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: value.into_owned(),
        });
    }
    Ok(attributes)
}

/// Parse a document string into its root element.
pub fn parse_document(xml: &str) -> std::result::Result<Element, String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                let (resolved, local) = reader.resolve_element(start.name());
                let namespace = owned_namespace(resolved)?;
                let name = String::from_utf8_lossy(local.as_ref()).into_owned();
                let attributes = read_attributes(&reader, &start)?;
                stack.push(Element {
                    namespace,
                    name,
                    attributes,
                    children: Vec::new(),
                });
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "unbalanced end tag".to_string())?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => return Err("document has more than one root element".to_string()),
                }
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    parent.push_text(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unclosed element <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

/// A parsed SIP source document together with the namespaces its queries use.
#[derive(Debug)]
pub struct SourceDocument {
    path: PathBuf,
    root: Element,
    namespaces: &'static Namespaces,
}

impl SourceDocument {
    pub fn load(path: &Path, namespaces: &'static Namespaces) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(SipError::io(path))?;
        Self::from_str(path, &raw, namespaces)
    }

    pub fn from_str(path: &Path, raw: &str, namespaces: &'static Namespaces) -> Result<Self> {
        let cleaned = clean_xml_string(raw);
        let root = parse_document(&cleaned).map_err(|message| SipError::Xml {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            root,
            namespaces,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    fn compile(&self, xpath: &str) -> Result<ElementPath> {
        ElementPath::parse(xpath, self.namespaces).map_err(|message| SipError::Xml {
            path: self.path.clone(),
            message,
        })
    }

    pub fn find(&self, xpath: &str) -> Result<Option<&Element>> {
        Ok(self.root.find(&self.compile(xpath)?))
    }

    pub fn find_all(&self, xpath: &str) -> Result<Vec<&Element>> {
        Ok(self.root.find_all(&self.compile(xpath)?))
    }

    /// Evaluate `xpath` relative to `context` instead of the document root.
    pub fn find_from<'a>(&self, context: &'a Element, xpath: &str) -> Result<Option<&'a Element>> {
        Ok(context.find(&self.compile(xpath)?))
    }

    /// Text of the first match; a reference error when absent or textless.
    pub fn require_text(&self, xpath: &str) -> Result<String> {
        let element = self.find(xpath)?.ok_or_else(|| {
            SipError::reference(&self.path, xpath, "no matching element in source document")
        })?;
        element.text().map(str::to_string).ok_or_else(|| {
            SipError::reference(&self.path, xpath, "matching element carries no text")
        })
    }

    /// Concatenated text of the whole (already whitespace-cleaned) document.
    pub fn full_text(&self) -> String {
        self.root.full_text().trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <fileDesc>
      <titleStmt>
        <title>First   Letter</title>
      </titleStmt>
      <publicationStmt>
        <idno type="local">x1</idno>
        <idno type="PID">o:demo.letter1</idno>
      </publicationStmt>
    </fileDesc>
  </teiHeader>
  <facsimile>
    <graphic xml:id="IMG.1" url="file:///1.JPG" mimeType="image/jpeg"/>
  </facsimile>
  <text><body><p>Dear <hi>friend</hi>, hello.</p></body></text>
</TEI>"#;

    fn doc() -> SourceDocument {
        SourceDocument::from_str(Path::new("/sips/letter1/SOURCE.xml"), TEI, &TEI_NAMESPACES)
            .unwrap()
    }

    #[test]
    fn clean_collapses_whitespace_at_tag_boundaries() {
        let cleaned = clean_xml_string("<a>\n\t<b>  x  </b>\n <c />\n</a>");
        assert_eq!(cleaned, "<a><b>x</b><c/></a>");
    }

    #[test]
    fn finds_by_attribute_predicate() {
        assert_eq!(
            doc().require_text(".//idno[@type='PID']").unwrap(),
            "o:demo.letter1"
        );
    }

    #[test]
    fn finds_child_path_below_descendant() {
        assert_eq!(
            doc().require_text(".//titleStmt/title").unwrap(),
            "First Letter"
        );
    }

    #[test]
    fn missing_element_is_reference_error() {
        let err = doc()
            .require_text(".//encodingDesc/editorialDecl/p")
            .unwrap_err();
        assert!(err.is_reference());
    }

    #[test]
    fn resolves_xml_id_attribute() {
        let doc = doc();
        let graphics = doc.find_all(".//facsimile/graphic").unwrap();
        assert_eq!(graphics.len(), 1);
        assert_eq!(graphics[0].attr_ns(XML_NAMESPACE, "id"), Some("IMG.1"));
        assert_eq!(graphics[0].attr("url"), Some("file:///1.JPG"));
    }

    #[test]
    fn nested_descendant_contexts_yield_each_match_once() {
        let xml = "<root><div><div><p>a</p></div><p>b</p></div></root>";
        let doc =
            SourceDocument::from_str(Path::new("SOURCE.xml"), xml, &TEI_NAMESPACES).unwrap();
        let texts: Vec<_> = doc
            .find_all(".//div//p")
            .unwrap()
            .iter()
            .map(|p| p.text().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn qualified_steps_require_namespace() {
        let xml = r#"<gml:FeatureCollection xmlns:gml="http://www.opengis.net/gml" xmlns:gdas="http://cm4f.org/gdas/">
            <gml:name>Graz</gml:name><gdas:PID>o:places.1</gdas:PID><name>plain</name>
        </gml:FeatureCollection>"#;
        let doc =
            SourceDocument::from_str(Path::new("SOURCE.xml"), xml, &GML_NAMESPACES).unwrap();
        assert_eq!(doc.require_text(".//gml:name").unwrap(), "Graz");
        assert_eq!(doc.require_text(".//gdas:PID").unwrap(), "o:places.1");
        assert_eq!(doc.require_text(".//name").unwrap(), "plain");
    }

    #[test]
    fn unknown_prefix_in_path_is_rejected() {
        assert!(ElementPath::parse(".//foo:bar", &TEI_NAMESPACES).is_err());
    }

    #[test]
    fn full_text_joins_text_nodes() {
        let text = doc().full_text();
        assert!(text.starts_with("First Letter"));
        assert!(text.contains("o:demo.letter1"));
        assert!(text.ends_with("friend, hello."));
        assert!(!text.contains('<'));
    }

    #[test]
    fn malformed_document_is_xml_error() {
        let err = SourceDocument::from_str(Path::new("x.xml"), "<a><b></a>", &TEI_NAMESPACES)
            .unwrap_err();
        assert!(matches!(err, SipError::Xml { .. }));
    }
}
