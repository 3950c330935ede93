//! Element tree for OFX documents.
//!
//! OFX 1.x is SGML: leaf elements are usually left unclosed (`<NAME>ACME`) and
//! the document is preceded by a `KEY:VALUE` header block. OFX 2.x is XML with
//! closed leaves and a `<?OFX ...?>` processing instruction. Both are read into
//! the same [`Element`] tree; tag names are folded to upper case.

use std::collections::HashSet;

use thiserror::Error;

use crate::error::ImportError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    #[error("empty tag name at byte {0}")]
    EmptyTag(usize),
    #[error("document has no <OFX> element")]
    MissingRoot,
}

impl From<MarkupError> for ImportError {
    fn from(e: MarkupError) -> Self {
        ImportError::Markup(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn named(name: String) -> Self {
        Element {
            name,
            ..Element::default()
        }
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Follow a chain of direct children.
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |el, name| el.child(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name.eq_ignore_ascii_case(name))
    }

    /// Trimmed text content, `None` when blank.
    pub fn value(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Trimmed text of a direct child, `None` when absent or blank.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::value)
    }

    fn has_text(&self) -> bool {
        self.children.is_empty() && !self.text.trim().is_empty()
    }
}

/// Names that appear in a closing tag anywhere in the document.
///
/// SGML leaves are never closed, so once a document closes anything at all,
/// an element whose name is never closed is a leaf even when its value is
/// empty.
fn closed_names(content: &str) -> HashSet<String> {
    content
        .match_indices("</")
        .filter_map(|(i, _)| {
            let tail = &content[i + 2..];
            tail.find('>').map(|end| tag_name(&tail[..end]))
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse a whole OFX document and return its `<OFX>` element.
pub fn parse_document(content: &str) -> Result<Element, MarkupError> {
    let mut root = parse(content)?;
    let idx = root
        .children
        .iter()
        .position(|c| c.name == "OFX")
        .ok_or(MarkupError::MissingRoot)?;
    Ok(root.children.swap_remove(idx))
}

/// Parse markup into a nameless root element holding the top-level elements.
/// Text outside any element (the SGML header block) is discarded.
pub fn parse(content: &str) -> Result<Element, MarkupError> {
    let closed = closed_names(content);
    let is_open_leaf = |el: &Element| {
        el.has_text()
            || (el.children.is_empty() && !closed.is_empty() && !closed.contains(&el.name))
    };

    let mut stack = vec![Element::default()];
    let mut rest = content;

    while let Some(lt) = rest.find('<') {
        let offset = content.len() - rest.len() + lt;
        push_text(&mut stack, &rest[..lt]);
        let tail = &rest[lt..];

        if let Some(after) = tail.strip_prefix("<!--") {
            let end = after.find("-->").ok_or(MarkupError::Unterminated("comment"))?;
            rest = &after[end + 3..];
            continue;
        }

        let end = tail.find('>').ok_or(MarkupError::Unterminated("tag"))?;
        let tag = tail[1..end].trim();
        rest = &tail[end + 1..];

        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }

        if let Some(closing) = tag.strip_prefix('/') {
            close(&mut stack, &tag_name(closing));
            continue;
        }

        let self_closing = tag.ends_with('/');
        let name = tag_name(tag.trim_end_matches('/'));
        if name.is_empty() {
            return Err(MarkupError::EmptyTag(offset));
        }

        // The previous SGML leaf was never closed.
        if stack.len() > 1 && stack.last().is_some_and(|top| is_open_leaf(top)) {
            pop_into_parent(&mut stack);
        }

        let element = Element::named(name);
        if self_closing {
            attach(&mut stack, element);
        } else {
            stack.push(element);
        }
    }
    push_text(&mut stack, rest);

    while stack.len() > 1 {
        pop_into_parent(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

fn tag_name(tag: &str) -> String {
    tag.split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

fn push_text(stack: &mut [Element], text: &str) {
    if stack.len() < 2 || text.is_empty() {
        return;
    }
    if let Some(top) = stack.last_mut() {
        top.text.push_str(&decode_entities(text));
    }
}

fn attach(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

fn pop_into_parent(stack: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        attach(stack, done);
    }
}

/// Close the innermost open element with `name`, closing any unclosed
/// elements above it. Stray closing tags are ignored.
fn close(stack: &mut Vec<Element>, name: &str) {
    let Some(idx) = stack.iter().skip(1).rposition(|el| el.name == name) else {
        return;
    };
    // `skip(1)` shifts positions by one.
    while stack.len() > idx + 1 {
        pop_into_parent(stack);
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── SGML ──────────────────────────────────────────────────────────────────

    #[test]
    fn unclosed_leaves_become_siblings() {
        let root = parse("<STMTTRN>\n<TRNAMT>-4.85\n<NAME>CAFE\n</STMTTRN>").unwrap();
        let trn = root.child("STMTTRN").unwrap();
        assert_eq!(trn.children.len(), 2);
        assert_eq!(trn.value_of("TRNAMT"), Some("-4.85"));
        assert_eq!(trn.value_of("NAME"), Some("CAFE"));
    }

    #[test]
    fn header_block_is_ignored() {
        let doc = parse_document("OFXHEADER:100\nDATA:OFXSGML\n\n<OFX>\n<SIGNONMSGSRSV1>\n</SIGNONMSGSRSV1>\n</OFX>\n")
            .unwrap();
        assert_eq!(doc.name, "OFX");
        assert!(doc.text.trim().is_empty());
        assert!(doc.child("SIGNONMSGSRSV1").is_some());
    }

    #[test]
    fn aggregates_close_their_open_leaves() {
        let root = parse(
            "<BANKACCTFROM><BANKID>1<ACCTID>99</BANKACCTFROM><BANKTRANLIST></BANKTRANLIST>",
        )
        .unwrap();
        let acct = root.child("BANKACCTFROM").unwrap();
        assert_eq!(acct.value_of("ACCTID"), Some("99"));
        assert!(root.child("BANKTRANLIST").is_some());
    }

    #[test]
    fn empty_sgml_leaves_do_not_swallow_siblings() {
        let root = parse(
            "<BANKTRANLIST>\n<DTSTART>\n<DTEND>20260131\n<STMTTRN>\n<FITID>F1\n<MEMO>\n<NAME>CAFE\n</STMTTRN>\n</BANKTRANLIST>",
        )
        .unwrap();
        let list = root.child("BANKTRANLIST").unwrap();
        assert_eq!(list.children.len(), 3);
        assert_eq!(list.value_of("DTSTART"), None);
        assert_eq!(list.value_of("DTEND"), Some("20260131"));

        let trn = list.child("STMTTRN").unwrap();
        assert!(trn.child("MEMO").unwrap().children.is_empty());
        assert_eq!(trn.value_of("NAME"), Some("CAFE"));
    }

    #[test]
    fn closed_names_collects_end_tags() {
        let names = closed_names("<A><b>1</b ></A><C>2");
        assert_eq!(names, HashSet::from(["A".to_string(), "B".to_string()]));
        assert!(closed_names("<OFX><CURDEF>USD").is_empty());
    }

    #[test]
    fn unclosed_document_is_unwound() {
        let root = parse("<OFX><STMTRS><CURDEF>USD").unwrap();
        assert_eq!(root.path(&["OFX", "STMTRS", "CURDEF"]).and_then(Element::value), Some("USD"));
    }

    #[test]
    fn stray_close_tag_ignored() {
        let root = parse("<A><B>x</C></A>").unwrap();
        assert_eq!(root.path(&["A", "B"]).and_then(Element::value), Some("x"));
    }

    // ── XML ───────────────────────────────────────────────────────────────────

    #[test]
    fn xml_with_instructions_comments_and_entities() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<?OFX OFXHEADER="200" VERSION="220"?>
<!-- exported -->
<OFX>
  <STMTTRN>
    <NAME>AT&amp;T &lt;WIRELESS&gt;</NAME>
    <MEMO/>
  </STMTTRN>
</OFX>"#;
        let doc = parse_document(xml).unwrap();
        let trn = doc.child("STMTTRN").unwrap();
        assert_eq!(trn.value_of("NAME"), Some("AT&T <WIRELESS>"));
        assert!(trn.child("MEMO").is_some());
        assert_eq!(trn.value_of("MEMO"), None);
    }

    #[test]
    fn tag_names_fold_case_and_drop_attributes() {
        let root = parse(r#"<ofx><StmtTrn id="1"><name>X</name></StmtTrn></ofx>"#).unwrap();
        let trn = root.path(&["OFX", "STMTTRN"]).unwrap();
        assert_eq!(trn.name, "STMTTRN");
        assert_eq!(trn.value_of("name"), Some("X"));
    }

    #[test]
    fn children_named_preserves_order() {
        let root = parse("<L><T>1</T><X/><T>2</T><T>3</T></L>").unwrap();
        let values: Vec<_> = root
            .child("L")
            .unwrap()
            .children_named("T")
            .filter_map(Element::value)
            .collect();
        assert_eq!(values, ["1", "2", "3"]);
    }

    // ── failures ──────────────────────────────────────────────────────────────

    #[test]
    fn unterminated_constructs_fail() {
        assert_eq!(parse("<OFX><NAME"), Err(MarkupError::Unterminated("tag")));
        assert_eq!(parse("<OFX><!-- open"), Err(MarkupError::Unterminated("comment")));
        assert!(matches!(parse("<OFX><>"), Err(MarkupError::EmptyTag(_))));
    }

    #[test]
    fn missing_ofx_root_fails() {
        assert_eq!(parse_document("<HTML></HTML>"), Err(MarkupError::MissingRoot));
        assert_eq!(parse_document("plain text"), Err(MarkupError::MissingRoot));
    }

    #[test]
    fn converts_into_import_error() {
        let err: ImportError = MarkupError::MissingRoot.into();
        assert!(matches!(err, ImportError::Markup(_)));
        assert!(err.to_string().starts_with("Failed to parse OFX file"));
    }
}
