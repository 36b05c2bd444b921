//! XML records and a namespace-aware XPath subset.
//!
//! Documents are read into a small owned tree ([`XmlNode`]) with resolved
//! namespace URIs, so records can outlive the input text. Supported paths:
//!
//! - absolute `/mods/titleInfo/title`, descendant `//subject/topic`, relative `titleInfo/title`
//! - `prefix:local` (prefixes come from the crosswalk `namespaces` setting), `*`
//! - `@attr` and `text()` as the last step
//! - predicates `[n]` (1-based), `[@a]`, `[@a='v']`
//!
//! An unprefixed name matches that local name in any namespace.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use serde_json::Value;
use std::collections::HashMap;

use super::{squish, Extractor};
use crate::error::{ConfigError, ConfigResult, ReaderError, ReaderResult};

// =============================================================================
// Document Tree
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

/// An element with its resolved namespace, attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// Attribute value by local name, ignoring its namespace.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Concatenated descendant text, whitespace-normalized.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        squish(&raw)
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(e) => {
                    out.push(' ');
                    e.collect_text(out);
                    out.push(' ');
                }
            }
        }
    }

    /// All descendants in document order, excluding `self`.
    fn descendants<'a>(&'a self, out: &mut Vec<&'a XmlNode>) {
        for child in self.elements() {
            out.push(child);
            child.descendants(out);
        }
    }
}

/// Read an XML document. With `record_element`, every element with that local
/// name becomes one record (in document order); otherwise the root is the record.
pub fn read_xml(text: &str, record_element: Option<&str>) -> ReaderResult<Vec<XmlNode>> {
    let root = parse_document(text)?;
    let Some(wanted) = record_element else {
        return Ok(vec![root]);
    };

    let mut records = Vec::new();
    collect_records(root, wanted, &mut records);
    if records.is_empty() {
        return Err(ReaderError::Empty);
    }
    Ok(records)
}

fn collect_records(node: XmlNode, wanted: &str, out: &mut Vec<XmlNode>) {
    if node.name == wanted {
        out.push(node);
        return;
    }
    for child in node.children {
        if let XmlChild::Element(e) = child {
            collect_records(e, wanted, out);
        }
    }
}

fn resolved_uri(ns: ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(uri) => Some(String::from_utf8_lossy(uri.as_ref()).into_owned()),
        _ => None,
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(text: &str) -> ReaderResult<XmlNode> {
    let mut reader = NsReader::from_str(text);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let resolved = reader
            .read_resolved_event()
            .map(|(ns, event)| (resolved_uri(ns), event));
        let (namespace, event) = match resolved {
            Ok(pair) => pair,
            Err(e) => {
                return Err(ReaderError::Xml {
                    position: reader.error_position(),
                    message: e.to_string(),
                })
            }
        };
        let position = reader.buffer_position();
        let xml_err = |message: String| ReaderError::Xml { position, message };

        match event {
            Event::Start(start) => {
                let node = element_node(&reader, namespace, &start).map_err(xml_err)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = element_node(&reader, namespace, &start).map_err(xml_err)?;
                attach(&mut stack, &mut root, node);
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node);
                }
            }
            Event::Text(text) => {
                let decoded = text.decode().map_err(|e| xml_err(e.to_string()))?;
                push_text(&mut stack, &decoded);
            }
            Event::CData(data) => {
                let decoded = data.decode().map_err(|e| xml_err(e.to_string()))?;
                push_text(&mut stack, &decoded);
            }
            Event::GeneralRef(reference) => {
                if let Ok(Some(ch)) = reference.resolve_char_ref() {
                    push_text(&mut stack, ch.encode_utf8(&mut [0; 4]));
                } else {
                    let name = reference.decode().map_err(|e| xml_err(e.to_string()))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                        .ok_or_else(|| xml_err(format!("unknown entity &{};", name)))?;
                    push_text(&mut stack, resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ReaderError::Xml {
            position: reader.buffer_position(),
            message: format!("unclosed element <{}>", open.name),
        });
    }
    root.ok_or(ReaderError::Empty)
}

fn element_node<R>(
    reader: &NsReader<R>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<XmlNode, String> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.local_name().as_ref()));
    node.namespace = namespace;

    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (ns, local) = reader.resolve_attribute(attr.key);
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| e.to_string())?;
        node.attributes.push(XmlAttribute {
            namespace: resolved_uri(ns),
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            value: value.into_owned(),
        });
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlChild::Element(node)),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

fn push_text(stack: &mut [XmlNode], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    // Entity references split text into several events; keep them contiguous.
    if let Some(XmlChild::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(XmlChild::Text(text.to_string()));
    }
}

// =============================================================================
// XPath Subset
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct QName {
    namespace: Option<String>,
    local: Option<String>,
}

impl QName {
    fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        let local_ok = self.local.as_deref().map_or(true, |l| l == local);
        let ns_ok = match &self.namespace {
            Some(uri) => namespace == Some(uri.as_str()),
            None => true,
        };
        local_ok && ns_ok
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Element(QName),
    Attribute(QName),
    Text,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    HasAttribute(QName),
    AttributeEquals(QName, String),
}

impl Predicate {
    fn holds(&self, node: &XmlNode) -> bool {
        match self {
            Predicate::Position(_) => true,
            Predicate::HasAttribute(name) => node
                .attributes
                .iter()
                .any(|a| name.matches(a.namespace.as_deref(), &a.name)),
            Predicate::AttributeEquals(name, value) => node
                .attributes
                .iter()
                .any(|a| name.matches(a.namespace.as_deref(), &a.name) && &a.value == value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct XStep {
    descendant: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A compiled XPath expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPath {
    absolute: bool,
    steps: Vec<XStep>,
}

/// Split on `/` outside predicates and quotes.
fn split_steps(path: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in path.char_indices() {
        match (ch, quote) {
            ('\'' | '"', None) => quote = Some(ch),
            (c, Some(q)) if c == q => quote = None,
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            ('/', None) if depth == 0 => {
                parts.push(&path[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&path[start..]);
    parts
}

impl XPath {
    pub fn parse(path: &str, namespaces: &HashMap<String, String>) -> ConfigResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(invalid("path is empty".into()));
        }

        let absolute = trimmed.starts_with('/');
        let mut parts = split_steps(trimmed).into_iter().peekable();
        if absolute {
            parts.next();
        }

        let mut steps = Vec::new();
        let mut descendant = false;
        while let Some(part) = parts.next() {
            let part = part.trim();
            if part.is_empty() {
                if descendant || parts.peek().is_none() {
                    return Err(invalid("empty step".into()));
                }
                descendant = true;
                continue;
            }
            let step = parse_step(part, descendant, namespaces).map_err(&invalid)?;
            descendant = false;
            if let Some(previous) = steps.last() {
                if matches!(previous, XStep { test: NodeTest::Attribute(_) | NodeTest::Text, .. }) {
                    return Err(invalid("@attr and text() must be the last step".into()));
                }
            }
            steps.push(step);
        }

        if steps.is_empty() {
            return Err(invalid("no steps".into()));
        }
        Ok(Self { absolute, steps })
    }

    /// Evaluate against a record element.
    pub fn evaluate(&self, record: &XmlNode) -> Vec<String> {
        let mut context: Vec<&XmlNode> = Vec::new();
        let mut results = Vec::new();

        for (idx, step) in self.steps.iter().enumerate() {
            let last = idx + 1 == self.steps.len();

            if matches!(step.test, NodeTest::Attribute(_) | NodeTest::Text) {
                let owners = if idx == 0 { vec![record] } else { context.clone() };
                let owners = if step.descendant { with_descendants(&owners) } else { owners };
                for node in owners {
                    match &step.test {
                        NodeTest::Attribute(name) => results.extend(
                            node.attributes
                                .iter()
                                .filter(|a| name.matches(a.namespace.as_deref(), &a.name))
                                .map(|a| a.value.trim().to_string()),
                        ),
                        _ => results.extend(node.children.iter().filter_map(|c| match c {
                            XmlChild::Text(t) => Some(squish(t)),
                            XmlChild::Element(_) => None,
                        })),
                    }
                }
                results.retain(|s| !s.is_empty());
                return results;
            }

            let candidates_per_owner: Vec<Vec<&XmlNode>> = if idx == 0 && self.absolute {
                let mut all = vec![record];
                if step.descendant {
                    record.descendants(&mut all);
                }
                vec![all]
            } else {
                let owners = if idx == 0 { vec![record] } else { std::mem::take(&mut context) };
                owners
                    .into_iter()
                    .map(|owner| match (&step.test, step.descendant) {
                        (NodeTest::SelfNode, _) => vec![owner],
                        (_, true) => {
                            let mut all = Vec::new();
                            owner.descendants(&mut all);
                            all
                        }
                        (_, false) => owner.elements().collect(),
                    })
                    .collect()
            };

            let mut next: Vec<&XmlNode> = Vec::new();
            for candidates in candidates_per_owner {
                let mut selected: Vec<&XmlNode> = candidates
                    .into_iter()
                    .filter(|n| match &step.test {
                        NodeTest::Element(q) => q.matches(n.namespace.as_deref(), &n.name),
                        _ => true,
                    })
                    .collect();
                for predicate in &step.predicates {
                    selected = match predicate {
                        Predicate::Position(n) => selected.get(n - 1).copied().into_iter().collect(),
                        other => selected.into_iter().filter(|n| other.holds(n)).collect(),
                    };
                }
                for node in selected {
                    if !next.iter().any(|seen| std::ptr::eq(*seen, node)) {
                        next.push(node);
                    }
                }
            }
            context = next;

            if last {
                results.extend(context.iter().map(|n| n.text_content()));
            }
        }

        results.retain(|s| !s.is_empty());
        results
    }
}

fn with_descendants<'a>(owners: &[&'a XmlNode]) -> Vec<&'a XmlNode> {
    let mut all = Vec::new();
    for owner in owners {
        all.push(*owner);
        owner.descendants(&mut all);
    }
    all
}

fn parse_qname(raw: &str, namespaces: &HashMap<String, String>) -> Result<QName, String> {
    if raw.is_empty() {
        return Err("empty name".into());
    }
    if raw == "*" {
        return Ok(QName {
            namespace: None,
            local: None,
        });
    }
    let (namespace, local) = match raw.split_once(':') {
        Some((prefix, local)) => {
            let uri = namespaces
                .get(prefix)
                .ok_or_else(|| format!("unknown namespace prefix '{}'", prefix))?;
            (Some(uri.clone()), local)
        }
        None => (None, raw),
    };
    if local.is_empty() || local.contains(|c: char| c.is_whitespace() || "[]@'\"=".contains(c)) {
        return Err(format!("invalid name '{}'", raw));
    }
    Ok(QName {
        namespace,
        local: (local != "*").then(|| local.to_string()),
    })
}

fn parse_step(
    part: &str,
    descendant: bool,
    namespaces: &HashMap<String, String>,
) -> Result<XStep, String> {
    let (head, mut rest) = match part.find('[') {
        Some(idx) => (&part[..idx], &part[idx..]),
        None => (part, ""),
    };

    let test = match head.trim() {
        "." => NodeTest::SelfNode,
        "text()" => NodeTest::Text,
        h if h.starts_with('@') => NodeTest::Attribute(parse_qname(&h[1..], namespaces)?),
        h => NodeTest::Element(parse_qname(h, namespaces)?),
    };

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let close = rest.find(']').ok_or("unclosed predicate")?;
        if !rest.starts_with('[') {
            return Err(format!("unexpected '{}'", rest));
        }
        predicates.push(parse_predicate(rest[1..close].trim(), namespaces)?);
        rest = &rest[close + 1..];
    }

    if !predicates.is_empty() && !matches!(test, NodeTest::Element(_)) {
        return Err("predicates are only supported on element steps".into());
    }
    Ok(XStep {
        descendant,
        test,
        predicates,
    })
}

fn parse_predicate(inner: &str, namespaces: &HashMap<String, String>) -> Result<Predicate, String> {
    if let Ok(position) = inner.parse::<usize>() {
        if position == 0 {
            return Err("positions start at 1".into());
        }
        return Ok(Predicate::Position(position));
    }
    let Some(attr) = inner.strip_prefix('@') else {
        return Err(format!("unsupported predicate '{}'", inner));
    };
    match attr.split_once('=') {
        None => Ok(Predicate::HasAttribute(parse_qname(attr.trim(), namespaces)?)),
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                .ok_or_else(|| format!("unquoted predicate value {}", value))?;
            Ok(Predicate::AttributeEquals(
                parse_qname(name.trim(), namespaces)?,
                unquoted.to_string(),
            ))
        }
    }
}

/// Extractor for XML records.
#[derive(Debug, Clone, Default)]
pub struct XmlExtractor {
    namespaces: HashMap<String, String>,
}

impl XmlExtractor {
    pub fn new(namespaces: HashMap<String, String>) -> Self {
        Self { namespaces }
    }
}

impl Extractor for XmlExtractor {
    type Record = XmlNode;
    type Query = XPath;

    fn name(&self) -> &'static str {
        "xml"
    }

    fn compile(&self, path: &str) -> ConfigResult<XPath> {
        XPath::parse(path, &self.namespaces)
    }

    fn extract(&self, record: &XmlNode, query: &XPath) -> Vec<Value> {
        query.evaluate(record).into_iter().map(Value::String).collect()
    }
}
