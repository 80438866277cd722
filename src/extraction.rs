//! Declarative field expressions and their evaluation.
//!
//! An expression selects something from a parsed document, then pipes it
//! through named transforms:
//!
//! ```text
//! attr("characterInfo character", "level") | int
//! attr("characterInfo character", "guildName") | nonempty | default("")
//! attr("arenaTeam[teamSize=\"{size}\"]", "rating")
//! concat($realm, "-", attr("character", "name"))
//! ```
//!
//! Primaries are `attr(selector, attribute)`, `text(selector)`,
//! `count(selector)`, `concat(expr, ...)`, string literals, and `$variable`
//! references. `{variable}` placeholders inside selectors are filled from the
//! [`DocumentContext`] before matching. Nothing here executes code: the
//! vocabulary is this grammar plus the transforms in [`TransformRegistry`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::entity::{FieldValue, ValueType};
use crate::error::EvalError;
use crate::runtime::context::DocumentContext;
use crate::transform_registry::TransformRegistry;

/// Selector interface of a parsed document.
///
/// Implementations decide what a selector means; the evaluator only ever asks
/// for the first match.
pub trait Extractor {
    /// Attribute `attribute` of the first node matching `selector`.
    fn select_attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, EvalError>;

    /// Text content of the first node matching `selector`.
    fn select_text(&self, selector: &str) -> Result<Option<String>, EvalError>;

    /// Number of nodes matching `selector`.
    fn count(&self, selector: &str) -> Result<usize, EvalError>;
}

/// A parsed field expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    pipeline: Pipeline,
}

#[derive(Debug, Clone, PartialEq)]
struct Pipeline {
    primary: Primary,
    transforms: Vec<TransformCall>,
}

#[derive(Debug, Clone, PartialEq)]
enum Primary {
    Attr { selector: String, attribute: String },
    Text { selector: String },
    Count { selector: String },
    Concat(Vec<Pipeline>),
    Literal(String),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
struct TransformCall {
    name: String,
    args: Vec<String>,
}

impl Expression {
    /// Parse an expression.
    ///
    /// # Example
    ///
    /// ```
    /// use armory_scrape::Expression;
    ///
    /// let expr = Expression::parse(r#"attr("characterInfo character", "level") | int"#).unwrap();
    /// assert_eq!(expr.selectors(), vec!["characterInfo character"]);
    /// ```
    pub fn parse(source: &str) -> Result<Self, String> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let pipeline = parser.pipeline()?;

        if let Some(token) = parser.peek() {
            return Err(format!("unexpected {} in `{}`", token, source));
        }

        Ok(Self {
            source: source.to_string(),
            pipeline,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every selector the expression uses, placeholders unexpanded.
    pub fn selectors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.pipeline.collect_selectors(&mut out);
        out
    }

    /// Check every transform call against `transforms`.
    pub fn check_transforms(&self, transforms: &TransformRegistry) -> Result<(), EvalError> {
        self.pipeline.check_transforms(transforms)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Pipeline {
    fn collect_selectors<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.primary {
            Primary::Attr { selector, .. }
            | Primary::Text { selector }
            | Primary::Count { selector } => out.push(selector),
            Primary::Concat(parts) => parts.iter().for_each(|p| p.collect_selectors(out)),
            Primary::Literal(_) | Primary::Variable(_) => {}
        }
    }

    fn check_transforms(&self, transforms: &TransformRegistry) -> Result<(), EvalError> {
        if let Primary::Concat(parts) = &self.primary {
            for part in parts {
                part.check_transforms(transforms)?;
            }
        }
        for call in &self.transforms {
            transforms.check_call(&call.name, call.args.len())?;
        }
        Ok(())
    }
}

/// Evaluates expressions with a fixed transform vocabulary.
pub struct Evaluator<'a> {
    transforms: &'a TransformRegistry,
}

impl<'a> Evaluator<'a> {
    pub fn new(transforms: &'a TransformRegistry) -> Self {
        Self { transforms }
    }

    /// Evaluate `expression` against `document`.
    ///
    /// An empty result is reported as `SelectorNotFound`; apply
    /// `default(...)` in the expression to avoid it.
    pub fn evaluate(
        &self,
        document: &dyn Extractor,
        expression: &Expression,
        context: &DocumentContext,
    ) -> Result<FieldValue, EvalError> {
        self.pipeline(document, &expression.pipeline, context)?
            .ok_or_else(|| EvalError::SelectorNotFound {
                expression: expression.source.clone(),
            })
    }

    /// Evaluate and coerce the result to `value_type`.
    pub fn evaluate_as(
        &self,
        document: &dyn Extractor,
        expression: &Expression,
        context: &DocumentContext,
        value_type: ValueType,
    ) -> Result<FieldValue, EvalError> {
        self.evaluate(document, expression, context)?
            .coerce(value_type)
    }

    fn pipeline(
        &self,
        document: &dyn Extractor,
        pipeline: &Pipeline,
        context: &DocumentContext,
    ) -> Result<Option<FieldValue>, EvalError> {
        let mut value = self.primary(document, &pipeline.primary, context)?;

        for call in &pipeline.transforms {
            value = self.transforms.call(&call.name, value, &call.args)?;
        }

        Ok(value)
    }

    fn primary(
        &self,
        document: &dyn Extractor,
        primary: &Primary,
        context: &DocumentContext,
    ) -> Result<Option<FieldValue>, EvalError> {
        match primary {
            Primary::Attr { selector, attribute } => {
                let selector = substitute(selector, context)?;
                Ok(document
                    .select_attr(&selector, attribute)?
                    .map(FieldValue::String))
            }
            Primary::Text { selector } => {
                let selector = substitute(selector, context)?;
                Ok(document.select_text(&selector)?.map(FieldValue::String))
            }
            Primary::Count { selector } => {
                let selector = substitute(selector, context)?;
                let count = document.count(&selector)?;
                Ok(Some(FieldValue::Integer(count as i64)))
            }
            Primary::Concat(parts) => {
                let mut joined = String::new();
                let mut any_present = false;

                for part in parts {
                    if let Some(value) = self.pipeline(document, part, context)? {
                        any_present = true;
                        joined.push_str(&value.to_string());
                    }
                }

                Ok(any_present.then_some(FieldValue::String(joined)))
            }
            Primary::Literal(value) => Ok(Some(FieldValue::String(value.clone()))),
            Primary::Variable(name) => context
                .get(name)
                .map(|value| Some(FieldValue::String(value.to_string())))
                .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Replace `{name}` placeholders in `selector` with context variables.
pub fn substitute(selector: &str, context: &DocumentContext) -> Result<String, EvalError> {
    let mut out = String::with_capacity(selector.len());
    let mut last = 0;

    for caps in placeholder_pattern().captures_iter(selector) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = context
            .get(name.as_str())
            .ok_or_else(|| EvalError::UnknownVariable(name.as_str().to_string()))?;

        out.push_str(&selector[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }

    out.push_str(&selector[last..]);
    Ok(out)
}

/// Replace every placeholder with `0`, for compiling selectors at load time.
pub fn with_placeholder_samples(selector: &str) -> String {
    placeholder_pattern().replace_all(selector, "0").into_owned()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Var(String),
    LParen,
    RParen,
    Comma,
    Pipe,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "`{}`", name),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Var(name) => write!(f, "`${}`", name),
            Token::LParen => write!(f, "`(`"),
            Token::RParen => write!(f, "`)`"),
            Token::Comma => write!(f, "`,`"),
            Token::Pipe => write!(f, "`|`"),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            '|' => tokens.push(Token::Pipe),
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                let mut closed = false;

                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }

                if !closed {
                    return Err(format!("unterminated string at offset {} in `{}`", pos, source));
                }
                tokens.push(Token::Str(value));
            }
            '$' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.is_empty() {
                    return Err(format!("empty variable name at offset {} in `{}`", pos, source));
                }
                tokens.push(Token::Var(name));
            }
            c if is_ident_char(c) => {
                let mut name = c.to_string();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push(Token::Ident(name));
            }
            other => {
                return Err(format!(
                    "unexpected character {:?} at offset {} in `{}`",
                    other, pos, source
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        let token = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(format!("expected {}, found {}", expected, token))
        }
    }

    fn string(&mut self) -> Result<String, String> {
        match self.next()? {
            Token::Str(value) => Ok(value),
            other => Err(format!("expected string literal, found {}", other)),
        }
    }

    fn pipeline(&mut self) -> Result<Pipeline, String> {
        let primary = self.primary()?;
        let mut transforms = Vec::new();

        while self.peek() == Some(&Token::Pipe) {
            self.pos += 1;
            let name = match self.next()? {
                Token::Ident(name) => name,
                other => return Err(format!("expected transform name, found {}", other)),
            };

            let mut args = Vec::new();
            if self.peek() == Some(&Token::LParen) {
                self.pos += 1;
                if self.peek() != Some(&Token::RParen) {
                    args.push(self.string()?);
                    while self.peek() == Some(&Token::Comma) {
                        self.pos += 1;
                        args.push(self.string()?);
                    }
                }
                self.expect(Token::RParen)?;
            }

            transforms.push(TransformCall { name, args });
        }

        Ok(Pipeline {
            primary,
            transforms,
        })
    }

    fn primary(&mut self) -> Result<Primary, String> {
        match self.next()? {
            Token::Str(value) => Ok(Primary::Literal(value)),
            Token::Var(name) => Ok(Primary::Variable(name)),
            Token::Ident(function) => {
                self.expect(Token::LParen)?;
                let primary = match function.as_str() {
                    "attr" => {
                        let selector = self.string()?;
                        self.expect(Token::Comma)?;
                        let attribute = self.string()?;
                        Primary::Attr {
                            selector,
                            attribute,
                        }
                    }
                    "text" => Primary::Text {
                        selector: self.string()?,
                    },
                    "count" => Primary::Count {
                        selector: self.string()?,
                    },
                    "concat" => {
                        let mut parts = vec![self.pipeline()?];
                        while self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                            parts.push(self.pipeline()?);
                        }
                        Primary::Concat(parts)
                    }
                    other => return Err(format!("unknown function `{}`", other)),
                };
                self.expect(Token::RParen)?;
                Ok(primary)
            }
            other => Err(format!("expected expression, found {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct SimpleExtractor {
        attrs: HashMap<(String, String), String>,
    }

    impl SimpleExtractor {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let attrs = entries
                .iter()
                .map(|(sel, attr, value)| ((sel.to_string(), attr.to_string()), value.to_string()))
                .collect();
            Self { attrs }
        }
    }

    impl Extractor for SimpleExtractor {
        fn select_attr(&self, selector: &str, attribute: &str) -> Result<Option<String>, EvalError> {
            Ok(self
                .attrs
                .get(&(selector.to_string(), attribute.to_string()))
                .cloned())
        }

        fn select_text(&self, selector: &str) -> Result<Option<String>, EvalError> {
            self.select_attr(selector, "#text")
        }

        fn count(&self, selector: &str) -> Result<usize, EvalError> {
            Ok(self.attrs.keys().filter(|(sel, _)| sel == selector).count())
        }
    }

    fn eval(doc: &SimpleExtractor, source: &str, ctx: &DocumentContext) -> Result<FieldValue, EvalError> {
        let transforms = TransformRegistry::builtin();
        let expr = Expression::parse(source).unwrap();
        Evaluator::new(&transforms).evaluate(doc, &expr, ctx)
    }

    #[test]
    fn test_parse_attr_with_transforms() {
        let expr = Expression::parse(r#"attr("character", "guildName") | nonempty | default("none")"#).unwrap();

        assert_eq!(expr.selectors(), vec!["character"]);
        assert_eq!(expr.pipeline.transforms.len(), 2);
        assert_eq!(expr.pipeline.transforms[1].args, vec!["none".to_string()]);
    }

    #[test]
    fn test_parse_concat_collects_nested_selectors() {
        let expr = Expression::parse(r#"concat(attr("a", "x"), " ", text('b') | trim, $size)"#).unwrap();
        assert_eq!(expr.selectors(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_code() {
        assert!(Expression::parse("(doc % \"character\")[:name]").is_err());
        assert!(Expression::parse("system(\"ls\")").is_err());
        assert!(Expression::parse(r#"attr("character")"#).is_err());
        assert!(Expression::parse(r#"attr("a", "b") extra"#).is_err());
        assert!(Expression::parse(r#"attr("a, "b")"#).is_err());
    }

    #[test]
    fn test_check_transforms_rejects_unknown() {
        let transforms = TransformRegistry::builtin();
        let expr = Expression::parse(r#"attr("a", "b") | shout"#).unwrap();

        assert_eq!(
            expr.check_transforms(&transforms),
            Err(EvalError::UnknownTransform("shout".to_string()))
        );
    }

    #[test]
    fn test_evaluate_attr() {
        let doc = SimpleExtractor::new(&[("character", "level", "48")]);
        let ctx = DocumentContext::empty();

        assert_eq!(
            eval(&doc, r#"attr("character", "level") | int"#, &ctx),
            Ok(FieldValue::Integer(48))
        );
    }

    #[test]
    fn test_evaluate_missing_is_selector_not_found() {
        let doc = SimpleExtractor::new(&[]);
        let ctx = DocumentContext::empty();

        let result = eval(&doc, r#"attr("character", "prefix")"#, &ctx);
        assert!(matches!(result, Err(EvalError::SelectorNotFound { .. })));

        let defaulted = eval(&doc, r#"attr("character", "prefix") | default("")"#, &ctx);
        assert_eq!(defaulted, Ok(FieldValue::String(String::new())));
    }

    #[test]
    fn test_selector_placeholders_use_context() {
        let doc = SimpleExtractor::new(&[(r#"arenaTeam[teamSize="3"]"#, "rating", "1650")]);
        let ctx = DocumentContext::empty().with_value("size", 3);

        assert_eq!(
            eval(&doc, r#"attr('arenaTeam[teamSize="{size}"]', "rating") | int"#, &ctx),
            Ok(FieldValue::Integer(1650))
        );
    }

    #[test]
    fn test_unbound_placeholder_is_unknown_variable() {
        let doc = SimpleExtractor::new(&[]);
        let ctx = DocumentContext::empty();

        let result = eval(&doc, r#"attr('arenaTeam[teamSize="{size}"]', "rating")"#, &ctx);
        assert_eq!(result, Err(EvalError::UnknownVariable("size".to_string())));
    }

    #[test]
    fn test_concat_and_variables() {
        let doc = SimpleExtractor::new(&[("character", "name", "Adries")]);
        let ctx = DocumentContext::empty().with_value("realm", "Aszune");

        assert_eq!(
            eval(&doc, r#"concat(attr("character", "name"), "@", $realm)"#, &ctx),
            Ok(FieldValue::String("Adries@Aszune".to_string()))
        );
    }

    #[test]
    fn test_concat_of_absent_parts_is_absent() {
        let doc = SimpleExtractor::new(&[]);
        let ctx = DocumentContext::empty();

        let result = eval(&doc, r#"concat(attr("a", "x"), attr("b", "y"))"#, &ctx);
        assert!(matches!(result, Err(EvalError::SelectorNotFound { .. })));
    }

    #[test]
    fn test_count_is_always_present() {
        let doc = SimpleExtractor::new(&[("arenaTeam", "name", "Orange Team")]);
        let ctx = DocumentContext::empty();

        assert_eq!(eval(&doc, r#"count("arenaTeam")"#, &ctx), Ok(FieldValue::Integer(1)));
        assert_eq!(eval(&doc, r#"count("guild")"#, &ctx), Ok(FieldValue::Integer(0)));
    }

    #[test]
    fn test_evaluate_as_coerces() {
        let transforms = TransformRegistry::builtin();
        let doc = SimpleExtractor::new(&[("character", "points", "2450"), ("character", "race", "Human")]);
        let ctx = DocumentContext::empty();
        let evaluator = Evaluator::new(&transforms);

        let points = Expression::parse(r#"attr("character", "points")"#).unwrap();
        assert_eq!(
            evaluator.evaluate_as(&doc, &points, &ctx, ValueType::Integer),
            Ok(FieldValue::Integer(2450))
        );

        let race = Expression::parse(r#"attr("character", "race")"#).unwrap();
        assert!(matches!(
            evaluator.evaluate_as(&doc, &race, &ctx, ValueType::Integer),
            Err(EvalError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_placeholder_samples() {
        assert_eq!(
            with_placeholder_samples(r#"arenaTeam[teamSize="{size}"]"#),
            r#"arenaTeam[teamSize="0"]"#
        );
    }
}
