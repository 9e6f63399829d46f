//! GraphQL operation AST and parser
//!
//! A hand-written lexer and recursive-descent parser for the subset of
//! the GraphQL language this crate compiles: query and mutation
//! operations with arguments, input objects, directives and inline
//! fragments. Named fragment definitions and spreads are rejected up
//! front, as is anything else the compilers cannot honor.
//!
//! The walker half of this module turns a parsed mutation into a
//! [`MutationIntent`]: the root field name's prefix decides whether the
//! operation creates, updates or deletes an entity.

use crate::error::CompileError;
use std::fmt;

/// A GraphQL input value.
///
/// Objects preserve field order; the mutation compiler's statement
/// emission order follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// The GraphQL kind name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Variable(_) => "variable",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// The three GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Query => write!(f, "query"),
            OperationType::Mutation => write!(f, "mutation"),
            OperationType::Subscription => write!(f, "subscription"),
        }
    }
}

/// A variable definition in an operation header (`$id: ID!`).
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    /// The declared type, rendered back to its source form.
    pub var_type: String,
    pub default_value: Option<Value>,
}

/// A directive application (`@single`, `@optional`).
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, Value)>,
}

/// A field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, Value)>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// The name this field surfaces under: its alias when present.
    pub fn response_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.iter().any(|d| d.name == name)
    }
}

/// An inline fragment, optionally type-conditioned (`... on Person`).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// One selection inside a selection set.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    InlineFragment(InlineFragment),
}

/// A `{ ... }` selection set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionSet {
    pub items: Vec<Selection>,
}

/// One operation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub operation_type: OperationType,
    pub name: Option<String>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// A parsed GraphQL document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub operations: Vec<OperationDefinition>,
}

impl Document {
    /// Parses a GraphQL document.
    pub fn parse(source: &str) -> Result<Self, CompileError> {
        Parser::new(source)?.parse_document()
    }

    /// The first operation of the given kind, if any.
    pub fn operation(&self, kind: OperationType) -> Option<&OperationDefinition> {
        self.operations
            .iter()
            .find(|op| op.operation_type == kind)
    }

    /// The single operation of a one-operation document.
    pub fn single_operation(&self) -> Result<&OperationDefinition, CompileError> {
        match self.operations.as_slice() {
            [op] => Ok(op),
            [] => Err(CompileError::validation("document contains no operations")),
            _ => Err(CompileError::validation(
                "document must contain exactly one operation",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(char),
    Spread,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            // Whitespace, commas and comments are insignificant.
            while let Some(&c) = self.chars.peek() {
                if c.is_whitespace() || c == ',' {
                    self.bump();
                } else if c == '#' {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                } else {
                    break;
                }
            }

            let (line, column) = (self.line, self.column);
            let Some(&c) = self.chars.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '{' | '}' | '(' | ')' | '[' | ']' | ':' | '@' | '$' | '=' | '!' => {
                    self.bump();
                    TokenKind::Punct(c)
                }
                '.' => {
                    self.bump();
                    if self.bump() != Some('.') || self.bump() != Some('.') {
                        return Err(self.error("expected '...'"));
                    }
                    TokenKind::Spread
                }
                '"' => self.lex_string()?,
                c if c == '-' || c.is_ascii_digit() => self.lex_number()?,
                c if c == '_' || c.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if c == '_' || c.is_ascii_alphanumeric() {
                            name.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    TokenKind::Name(name)
                }
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            };
            tokens.push(Token { kind, line, column });
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, CompileError> {
        self.bump(); // opening quote
        if self.chars.peek() == Some(&'"') {
            self.bump();
            if self.chars.peek() == Some(&'"') {
                self.bump();
                return self.lex_block_string();
            }
            // Empty string.
            return Ok(TokenKind::Str(String::new()));
        }
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\n') => return Err(self.error("newline in string literal")),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('/') => value.push('/'),
                    Some('b') => value.push('\u{8}'),
                    Some('f') => value.push('\u{c}'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('u') => {
                        let mut code = String::new();
                        for _ in 0..4 {
                            match self.bump() {
                                Some(h) if h.is_ascii_hexdigit() => code.push(h),
                                _ => return Err(self.error("invalid \\u escape")),
                            }
                        }
                        let code = u32::from_str_radix(&code, 16).expect("hex digits");
                        match char::from_u32(code) {
                            Some(c) => value.push(c),
                            None => return Err(self.error("invalid \\u escape")),
                        }
                    }
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_block_string(&mut self) -> Result<TokenKind, CompileError> {
        let mut raw = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated block string")),
                Some('"') => {
                    if self.chars.peek() == Some(&'"') {
                        self.bump();
                        if self.chars.peek() == Some(&'"') {
                            self.bump();
                            return Ok(TokenKind::Str(dedent_block_string(&raw)));
                        }
                        raw.push_str("\"\"");
                    } else {
                        raw.push('"');
                    }
                }
                Some('\\') => {
                    // Only the escaped triple-quote is special in blocks.
                    if self.chars.peek() == Some(&'"') {
                        raw.push('"');
                        self.bump();
                    } else {
                        raw.push('\\');
                    }
                }
                Some(c) => raw.push(c),
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, CompileError> {
        let mut text = String::new();
        if self.chars.peek() == Some(&'-') {
            text.push('-');
            self.bump();
        }
        let mut is_float = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if (c == '.' || c == 'e' || c == 'E') && !text.is_empty() {
                is_float = true;
                text.push(c);
                self.bump();
                if (c == 'e' || c == 'E')
                    && matches!(self.chars.peek(), Some(&'+') | Some(&'-'))
                {
                    text.push(self.bump().expect("sign peeked"));
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(format!("malformed float literal '{text}'")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("malformed int literal '{text}'")))
        }
    }
}

/// GraphQL block string dedent: strip the common indentation of all
/// non-first lines, then drop leading and trailing blank lines.
fn dedent_block_string(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut dedented: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i == 0 {
                l.to_string()
            } else {
                l.chars().skip(common_indent).collect()
            }
        })
        .collect();
    while dedented.first().is_some_and(|l| l.trim().is_empty()) {
        dedented.remove(0);
    }
    while dedented.last().is_some_and(|l| l.trim().is_empty()) {
        dedented.pop();
    }
    dedented.join("\n")
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, CompileError> {
        Ok(Self {
            tokens: Lexer::new(source).tokenize()?,
            position: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn error_at(&self, message: impl Into<String>) -> CompileError {
        let token = self.peek();
        CompileError::Syntax {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }

    fn expect_punct(&mut self, punct: char) -> Result<(), CompileError> {
        match &self.peek().kind {
            TokenKind::Punct(c) if *c == punct => {
                self.advance();
                Ok(())
            }
            other => Err(self.error_at(format!("expected '{punct}', found {other:?}"))),
        }
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if matches!(&self.peek().kind, TokenKind::Punct(c) if *c == punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> Result<String, CompileError> {
        match &self.peek().kind {
            TokenKind::Name(n) => {
                let n = n.clone();
                self.advance();
                Ok(n)
            }
            other => Err(self.error_at(format!("expected a name, found {other:?}"))),
        }
    }

    fn parse_document(&mut self) -> Result<Document, CompileError> {
        let mut operations = Vec::new();
        loop {
            match &self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Punct('{') => {
                    // Query shorthand.
                    operations.push(OperationDefinition {
                        operation_type: OperationType::Query,
                        name: None,
                        variable_definitions: Vec::new(),
                        directives: Vec::new(),
                        selection_set: self.parse_selection_set()?,
                    });
                }
                TokenKind::Name(name) if name == "fragment" => {
                    return Err(CompileError::UnsupportedFeature(
                        "named fragment definitions are not supported".into(),
                    ));
                }
                TokenKind::Name(_) => operations.push(self.parse_operation()?),
                other => {
                    return Err(self.error_at(format!(
                        "expected an operation definition, found {other:?}"
                    )));
                }
            }
        }
        Ok(Document { operations })
    }

    fn parse_operation(&mut self) -> Result<OperationDefinition, CompileError> {
        let keyword = self.expect_name()?;
        let operation_type = match keyword.as_str() {
            "query" => OperationType::Query,
            "mutation" => OperationType::Mutation,
            "subscription" => OperationType::Subscription,
            other => {
                return Err(self.error_at(format!("unknown operation keyword '{other}'")));
            }
        };

        let name = match &self.peek().kind {
            TokenKind::Name(_) => Some(self.expect_name()?),
            _ => None,
        };

        let variable_definitions = if self.eat_punct('(') {
            self.parse_variable_definitions()?
        } else {
            Vec::new()
        };

        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;

        Ok(OperationDefinition {
            operation_type,
            name,
            variable_definitions,
            directives,
            selection_set,
        })
    }

    fn parse_variable_definitions(&mut self) -> Result<Vec<VariableDefinition>, CompileError> {
        let mut definitions = Vec::new();
        while !self.eat_punct(')') {
            self.expect_punct('$')?;
            let name = self.expect_name()?;
            self.expect_punct(':')?;
            let var_type = self.parse_type_reference()?;
            let default_value = if self.eat_punct('=') {
                Some(self.parse_value()?)
            } else {
                None
            };
            definitions.push(VariableDefinition {
                name,
                var_type,
                default_value,
            });
        }
        Ok(definitions)
    }

    fn parse_type_reference(&mut self) -> Result<String, CompileError> {
        let mut rendered = String::new();
        if self.eat_punct('[') {
            rendered.push('[');
            rendered.push_str(&self.parse_type_reference()?);
            self.expect_punct(']')?;
            rendered.push(']');
        } else {
            rendered.push_str(&self.expect_name()?);
        }
        if self.eat_punct('!') {
            rendered.push('!');
        }
        Ok(rendered)
    }

    fn parse_directives(&mut self) -> Result<Vec<Directive>, CompileError> {
        let mut directives = Vec::new();
        while self.eat_punct('@') {
            let name = self.expect_name()?;
            let arguments = if self.eat_punct('(') {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            directives.push(Directive { name, arguments });
        }
        Ok(directives)
    }

    fn parse_selection_set(&mut self) -> Result<SelectionSet, CompileError> {
        self.expect_punct('{')?;
        let mut items = Vec::new();
        while !self.eat_punct('}') {
            match &self.peek().kind {
                TokenKind::Spread => {
                    self.advance();
                    items.push(Selection::InlineFragment(self.parse_inline_fragment()?));
                }
                TokenKind::Name(_) => items.push(Selection::Field(self.parse_field()?)),
                TokenKind::Eof => return Err(self.error_at("unterminated selection set")),
                other => {
                    return Err(self.error_at(format!("expected a selection, found {other:?}")));
                }
            }
        }
        if items.is_empty() {
            return Err(self.error_at("selection set must not be empty"));
        }
        Ok(SelectionSet { items })
    }

    fn parse_inline_fragment(&mut self) -> Result<InlineFragment, CompileError> {
        let type_condition = match &self.peek().kind {
            TokenKind::Name(name) if name == "on" => {
                self.advance();
                Some(self.expect_name()?)
            }
            TokenKind::Name(_) => {
                return Err(CompileError::UnsupportedFeature(
                    "named fragment spreads are not supported".into(),
                ));
            }
            _ => None,
        };
        let directives = self.parse_directives()?;
        let selection_set = self.parse_selection_set()?;
        Ok(InlineFragment {
            type_condition,
            directives,
            selection_set,
        })
    }

    fn parse_field(&mut self) -> Result<Field, CompileError> {
        let first = self.expect_name()?;
        let (alias, name) = if self.eat_punct(':') {
            (Some(first), self.expect_name()?)
        } else {
            (None, first)
        };
        let arguments = if self.eat_punct('(') {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let directives = self.parse_directives()?;
        let selection_set = match &self.peek().kind {
            TokenKind::Punct('{') => Some(self.parse_selection_set()?),
            _ => None,
        };
        Ok(Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<(String, Value)>, CompileError> {
        let mut arguments = Vec::new();
        while !self.eat_punct(')') {
            let name = self.expect_name()?;
            self.expect_punct(':')?;
            arguments.push((name, self.parse_value()?));
        }
        Ok(arguments)
    }

    fn parse_value(&mut self) -> Result<Value, CompileError> {
        match self.peek().kind.clone() {
            TokenKind::Punct('$') => {
                self.advance();
                Ok(Value::Variable(self.expect_name()?))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Value::Int(i))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Value::Float(f))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Value::String(s))
            }
            TokenKind::Name(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    "null" => Ok(Value::Null),
                    _ => Ok(Value::Enum(name)),
                }
            }
            TokenKind::Punct('[') => {
                self.advance();
                let mut items = Vec::new();
                while !self.eat_punct(']') {
                    items.push(self.parse_value()?);
                }
                Ok(Value::List(items))
            }
            TokenKind::Punct('{') => {
                self.advance();
                let mut fields = Vec::new();
                while !self.eat_punct('}') {
                    let key = self.expect_name()?;
                    self.expect_punct(':')?;
                    fields.push((key, self.parse_value()?));
                }
                Ok(Value::Object(fields))
            }
            other => Err(self.error_at(format!("expected a value, found {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutation intent
// ---------------------------------------------------------------------------

/// The resolved intent of a mutation: what to do, to which entity.
///
/// The selection set on the mutation field does not reach the compiler;
/// it only shapes the response synthesized by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    Create {
        entity: String,
        input: Option<Value>,
    },
    Update {
        entity: String,
        id: String,
        input: Option<Value>,
    },
    Delete {
        entity: String,
        id: String,
    },
}

impl MutationIntent {
    /// Resolves the intent of a mutation operation from its first root
    /// field. Mutations carrying GraphQL variables fail fast.
    pub fn from_operation(operation: &OperationDefinition) -> Result<Self, CompileError> {
        if operation.operation_type != OperationType::Mutation {
            return Err(CompileError::UnsupportedOperation(format!(
                "expected a mutation, got a {}",
                operation.operation_type
            )));
        }
        if !operation.variable_definitions.is_empty() {
            return Err(CompileError::UnsupportedFeature(
                "variables are not supported in mutations".into(),
            ));
        }

        let field = operation
            .selection_set
            .items
            .iter()
            .find_map(|s| match s {
                Selection::Field(f) => Some(f),
                _ => None,
            })
            .ok_or_else(|| CompileError::validation("mutation has no root field"))?;

        let input = field.argument("input").cloned();

        if let Some(entity) = strip_verb(&field.name, "create") {
            return Ok(MutationIntent::Create { entity, input });
        }
        if let Some(entity) = strip_verb(&field.name, "update") {
            let id = required_id_argument(field)?;
            return Ok(MutationIntent::Update { entity, id, input });
        }
        if let Some(entity) = strip_verb(&field.name, "delete") {
            let id = required_id_argument(field)?;
            return Ok(MutationIntent::Delete { entity, id });
        }

        Err(CompileError::Conversion(format!(
            "mutation field '{}' does not follow the create|update|delete<Entity> convention",
            field.name
        )))
    }

    pub fn entity(&self) -> &str {
        match self {
            MutationIntent::Create { entity, .. }
            | MutationIntent::Update { entity, .. }
            | MutationIntent::Delete { entity, .. } => entity,
        }
    }
}

fn strip_verb(name: &str, verb: &str) -> Option<String> {
    let rest = name.strip_prefix(verb)?;
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

fn required_id_argument(field: &Field) -> Result<String, CompileError> {
    match field.argument("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(CompileError::validation_at(
            format!("'id' argument must be a string, got {}", other.kind()),
            "id",
            format!("{other:?}"),
        )),
        None => Err(CompileError::validation(format!(
            "'{}' requires an 'id' argument",
            field.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shorthand_query() {
        let doc = Document::parse("{ users { name } }").unwrap();
        let op = doc.single_operation().unwrap();
        assert_eq!(op.operation_type, OperationType::Query);
        assert_eq!(op.selection_set.items.len(), 1);
    }

    #[test]
    fn parses_mutation_with_input_object() {
        let doc = Document::parse(
            r#"mutation { createUser(input: {id: "ex:user1", name: "Alice", age: 30}) { id } }"#,
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(field.name, "createUser");
        let Some(Value::Object(fields)) = field.argument("input") else {
            panic!("expected an input object");
        };
        assert_eq!(
            fields[0],
            ("id".to_string(), Value::String("ex:user1".into()))
        );
        assert_eq!(fields[2], ("age".to_string(), Value::Int(30)));
    }

    #[test]
    fn input_object_preserves_field_order() {
        let doc = Document::parse(
            r#"mutation { createX(input: {z: 1, a: 2, m: 3}) { id } }"#,
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Some(Value::Object(fields)) = field.argument("input") else {
            panic!("expected an input object");
        };
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let doc = Document::parse(
            r#"mutation { createX(input: {name: "say \"hi\"\nthere\té"}) { id } }"#,
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Some(Value::Object(fields)) = field.argument("input") else {
            panic!("expected an input object");
        };
        assert_eq!(fields[0].1, Value::String("say \"hi\"\nthere\t\u{e9}".into()));
    }

    #[test]
    fn parses_directives_aliases_and_fragments() {
        let doc = Document::parse(
            r#"query Q {
                people: users(limit: 10) @single {
                    name @optional
                    ... on Employee { salary }
                }
            }"#,
        )
        .unwrap();
        let op = doc.single_operation().unwrap();
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        assert_eq!(field.response_name(), "people");
        assert_eq!(field.name, "users");
        assert!(field.has_directive("single"));
        let set = field.selection_set.as_ref().unwrap();
        assert!(matches!(&set.items[1], Selection::InlineFragment(f)
            if f.type_condition.as_deref() == Some("Employee")));
    }

    #[test]
    fn rejects_named_fragments() {
        let err = Document::parse("fragment F on User { name } query { users { ...F } }")
            .unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FEATURE");

        let err = Document::parse("query { users { ...F } }").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FEATURE");
    }

    #[test]
    fn reports_syntax_positions() {
        let err = Document::parse("query { users { } }").unwrap_err();
        match err {
            CompileError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn block_strings_dedent() {
        let doc = Document::parse(
            "mutation { createX(input: {bio: \"\"\"\n    line one\n      line two\n    \"\"\"}) { id } }",
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let Selection::Field(field) = &op.selection_set.items[0] else {
            panic!("expected a field");
        };
        let Some(Value::Object(fields)) = field.argument("input") else {
            panic!("expected an input object");
        };
        assert_eq!(fields[0].1, Value::String("line one\n  line two".into()));
    }

    #[test]
    fn intent_create() {
        let doc = Document::parse(r#"mutation { createUser(input: {name: "Bob"}) { id } }"#)
            .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let intent = MutationIntent::from_operation(op).unwrap();
        match intent {
            MutationIntent::Create { entity, input } => {
                assert_eq!(entity, "User");
                assert!(input.is_some());
            }
            other => panic!("expected create, got {other:?}"),
        }
    }

    #[test]
    fn intent_update_and_delete_require_id() {
        let doc = Document::parse(
            r#"mutation { updateUser(id: "ex:user1", input: {name: "Alicia"}) { id } }"#,
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        match MutationIntent::from_operation(op).unwrap() {
            MutationIntent::Update { entity, id, .. } => {
                assert_eq!(entity, "User");
                assert_eq!(id, "ex:user1");
            }
            other => panic!("expected update, got {other:?}"),
        }

        let doc = Document::parse("mutation { deleteUser { id } }").unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let err = MutationIntent::from_operation(op).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let doc = Document::parse("mutation { deleteUser(id: 42) }").unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let err = MutationIntent::from_operation(op).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn intent_rejects_unknown_prefixes_and_variables() {
        let doc = Document::parse(r#"mutation { renameUser(id: "x") }"#).unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let err = MutationIntent::from_operation(op).unwrap_err();
        assert_eq!(err.code(), "CONVERSION_ERROR");

        let doc = Document::parse(
            r#"mutation M($name: String!) { createUser(input: {name: $name}) { id } }"#,
        )
        .unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let err = MutationIntent::from_operation(op).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_FEATURE");
    }

    #[test]
    fn bare_delete_without_selection_parses() {
        let doc = Document::parse(r#"mutation { deleteUser(id: "ex:user1") }"#).unwrap();
        let op = doc.operation(OperationType::Mutation).unwrap();
        let intent = MutationIntent::from_operation(op).unwrap();
        assert_eq!(intent.entity(), "User");
    }
}
