//! Parsed markup backed by `scraper`.
//!
//! Armory pages are XML. They are tokenized with html5ever (which forgives
//! broken markup) but the tree is built with XML nesting rules: `<tag/>`
//! closes itself, no element switches the tokenizer into raw text, and an end
//! tag closes the nearest open element of that name. The HTML tree rules would
//! turn everything after a self-closing `<title/>` into text.
//!
//! The tokenizer lowercases element and attribute names. Elements are placed
//! in the HTML namespace so CSS selectors match case-insensitively, and
//! [`Document::select_attr`] folds the requested attribute name to match.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use html5ever::tree_builder::{ElementFlags, NodeOrText, TreeSink};
use html5ever::{LocalName, Namespace, QualName};
use scraper::{Html, Selector};

use crate::error::EvalError;
use crate::extraction::Extractor;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

type NodeId = <Html as TreeSink>::Handle;

/// A traversable parsed document.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse markup into a document. Never fails; unusable input yields an
    /// empty tree.
    pub fn parse(markup: &str) -> Self {
        let mut input = BufferQueue::default();
        input.push_back(StrTendril::from(markup));

        let mut tokenizer = Tokenizer::new(XmlTreeBuilder::new(), TokenizerOpts::default());
        let _ = tokenizer.feed(&mut input);
        tokenizer.end();

        Self {
            html: tokenizer.sink.html,
        }
    }

    /// Whether the document contains at least one element.
    pub fn has_content(&self) -> bool {
        self.html
            .tree
            .root()
            .descendants()
            .any(|node| node.value().is_element())
    }

    /// Compile a CSS selector, mapping the parse error to [`EvalError`].
    pub fn compile(selector: &str) -> Result<Selector, EvalError> {
        Selector::parse(selector).map_err(|e| EvalError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Builds a `scraper` tree from tokens using XML nesting.
struct XmlTreeBuilder {
    html: Html,
    root: NodeId,
    open: Vec<(NodeId, LocalName)>,
}

impl XmlTreeBuilder {
    fn new() -> Self {
        let mut html = Html::new_document();
        let root = html.get_document();

        Self {
            html,
            root,
            open: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().map_or(self.root, |(node, _)| *node)
    }

    fn tag(&mut self, tag: Tag) {
        let Tag {
            kind,
            name,
            self_closing,
            attrs,
        } = tag;

        match kind {
            TagKind::StartTag => {
                let parent = self.current();
                let qualified = QualName::new(None, Namespace::from(HTML_NS), name.clone());
                let element = self
                    .html
                    .create_element(qualified, attrs, ElementFlags::default());
                self.html.append(&parent, NodeOrText::AppendNode(element));

                if !self_closing {
                    self.open.push((element, name));
                }
            }
            TagKind::EndTag => {
                // Stray end tags are dropped; unclosed children close with their parent.
                if let Some(pos) = self.open.iter().rposition(|(_, open)| *open == name) {
                    self.open.truncate(pos);
                }
            }
        }
    }
}

impl TokenSink for XmlTreeBuilder {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(tag) => self.tag(tag),
            Token::CharacterTokens(text) => {
                let parent = self.current();
                self.html.append(&parent, NodeOrText::AppendText(text));
            }
            _ => {}
        }

        TokenSinkResult::Continue
    }
}

impl Extractor for Document {
    fn select_attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, EvalError> {
        let compiled = Self::compile(selector)?;
        let attribute = attribute.to_ascii_lowercase();

        Ok(self
            .html
            .select(&compiled)
            .next()
            .and_then(|el| el.value().attr(&attribute))
            .map(str::to_string))
    }

    fn select_text(&self, selector: &str) -> Result<Option<String>, EvalError> {
        let compiled = Self::compile(selector)?;

        Ok(self
            .html
            .select(&compiled)
            .next()
            .map(|el| el.text().collect::<String>()))
    }

    fn count(&self, selector: &str) -> Result<usize, EvalError> {
        let compiled = Self::compile(selector)?;
        Ok(self.html.select(&compiled).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<page globalSearch="1" lang="en_us">
  <characterInfo>
    <character name="Adries" level="48" classId="1" guildName="" suffix=" the Explorer"/>
    <characterTab>
      <title value="Explorer"/>
      <professions>
        <skill key="mining" value="275"/>
        <skill key="herbalism" value="300"/>
      </professions>
    </characterTab>
  </characterInfo>
</page>"#;

    #[test]
    fn test_select_camel_case_attribute() {
        let doc = Document::parse(SHEET);

        assert_eq!(
            doc.select_attr("characterInfo character", "classId").unwrap(),
            Some("1".to_string())
        );
        assert_eq!(
            doc.select_attr("characterInfo character", "suffix").unwrap(),
            Some(" the Explorer".to_string())
        );
    }

    #[test]
    fn test_missing_attribute_and_element() {
        let doc = Document::parse(SHEET);

        assert_eq!(doc.select_attr("characterInfo character", "prefix").unwrap(), None);
        assert_eq!(doc.select_attr("arenaTeam", "name").unwrap(), None);
        assert_eq!(doc.count("arenaTeam").unwrap(), 0);
    }

    #[test]
    fn test_elements_after_self_closing_title() {
        let doc = Document::parse(SHEET);

        assert_eq!(doc.count("professions skill").unwrap(), 2);
        assert_eq!(doc.count("characterTab title").unwrap(), 1);
        assert_eq!(doc.count("title skill").unwrap(), 0);
        assert_eq!(
            doc.select_attr("professions skill", "key").unwrap(),
            Some("mining".to_string())
        );
    }

    #[test]
    fn test_title_before_character() {
        let doc = Document::parse(
            r#"<page><title value="x"/><characterInfo><character name="Adries"/></characterInfo></page>"#,
        );

        assert_eq!(
            doc.select_attr("characterInfo character", "name").unwrap(),
            Some("Adries".to_string())
        );
    }

    #[test]
    fn test_self_closing_siblings_do_not_nest() {
        let doc = Document::parse(
            r#"<arenaTeams><arenaTeam teamSize="2"/><arenaTeam teamSize="5"/></arenaTeams>"#,
        );

        assert_eq!(doc.count("arenaTeams > arenaTeam").unwrap(), 2);
        assert_eq!(doc.count("arenaTeam arenaTeam").unwrap(), 0);
    }

    #[test]
    fn test_attribute_selector_matches_camel_case() {
        let doc = Document::parse(
            r#"<arenaTeams><arenaTeam teamSize="2" name="Orange Team"></arenaTeam></arenaTeams>"#,
        );

        assert_eq!(doc.count(r#"arenaTeam[teamSize="2"]"#).unwrap(), 1);
        assert_eq!(doc.count(r#"arenaTeam[teamSize="3"]"#).unwrap(), 0);
    }

    #[test]
    fn test_entities_decoded() {
        let doc = Document::parse(r#"<character guildName="Salt &amp; Pepper"/>"#);
        assert_eq!(
            doc.select_attr("character", "guildName").unwrap(),
            Some("Salt & Pepper".to_string())
        );
    }

    #[test]
    fn test_select_text() {
        let doc = Document::parse("<page><motd>  Hello  </motd></page>");
        assert_eq!(doc.select_text("motd").unwrap(), Some("  Hello  ".to_string()));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SHEET);
        assert!(matches!(
            doc.count("character[["),
            Err(EvalError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_has_content() {
        assert!(Document::parse(SHEET).has_content());
        assert!(!Document::parse("").has_content());
        assert!(!Document::parse("   ").has_content());
        assert!(!Document::parse("Service Unavailable").has_content());
    }
}
