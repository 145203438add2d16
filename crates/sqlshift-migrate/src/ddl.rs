//! DDL text utilities for the SQLite table rebuild.
//!
//! SQLite keeps each table's schema only as the original `CREATE TABLE`
//! text, so changing a column means editing that text. Everything here works
//! on tokens rather than raw substrings: commas and parentheses inside
//! quoted identifiers, string literals or comments never split a
//! definition, and renames only ever touch whole identifier tokens.

/// Errors raised while taking DDL text apart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DdlError {
    /// A quoted identifier, string literal or comment is not closed.
    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated {
        /// What was left open.
        what: &'static str,
        /// Byte offset of the opening character.
        offset: usize,
    },

    /// The statement has no parenthesised column list.
    #[error("no column list found")]
    MissingColumnList,

    /// Parentheses do not balance.
    #[error("unbalanced parentheses")]
    Unbalanced,

    /// The header does not end with the expected table name.
    #[error("table name '{0}' not found in statement header")]
    TableNameNotFound(String),
}

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: identifier, keyword or number.
    Word,
    /// Quoted identifier; carries the opening quote (`"`, `` ` `` or `[`).
    Quoted(char),
    /// Single-quoted string literal.
    String,
    /// Run of whitespace.
    Whitespace,
    /// `--` line comment or `/* */` block comment.
    Comment,
    /// Any other single character.
    Punct(char),
}

/// A token borrowed from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token category.
    pub kind: TokenKind,
    /// Source text, quotes included.
    pub text: &'a str,
    /// Byte offset in the input.
    pub start: usize,
}

impl Token<'_> {
    /// Returns the identifier this token names, with quoting removed.
    ///
    /// Single-quoted strings count: SQLite accepts them as column names in
    /// `CREATE TABLE` for compatibility.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        let inner = || &self.text[1..self.text.len() - 1];
        match self.kind {
            TokenKind::Word => Some(self.text.to_string()),
            TokenKind::Quoted('[') => Some(inner().to_string()),
            TokenKind::Quoted(q) => Some(inner().replace(&format!("{q}{q}"), &q.to_string())),
            TokenKind::String => Some(inner().replace("''", "'")),
            _ => None,
        }
    }

    /// Returns true if the token is the given keyword, ignoring case.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    const fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// Splits SQL text into tokens.
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    start: usize,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn token(&self, kind: TokenKind) -> Token<'a> {
        Token {
            kind,
            text: &self.input[self.start..self.pos],
            start: self.start,
        }
    }

    /// Consumes a quoted run closed by `close`, where a doubled `close` is an escape.
    fn scan_quoted(&mut self, close: char, escapable: bool, what: &'static str) -> Result<(), DdlError> {
        self.advance();
        loop {
            match self.advance() {
                Some(c) if c == close => {
                    if escapable && self.peek() == Some(close) {
                        self.advance();
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => {
                    return Err(DdlError::Unterminated {
                        what,
                        offset: self.start,
                    })
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, DdlError> {
        self.start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = match c {
            c if c.is_whitespace() => {
                while self.peek().is_some_and(char::is_whitespace) {
                    self.advance();
                }
                TokenKind::Whitespace
            }
            '-' if self.peek_next() == Some('-') => {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                TokenKind::Comment
            }
            '/' if self.peek_next() == Some('*') => {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        Some(_) => {}
                        // SQLite accepts a block comment left open at end of input.
                        None => break,
                    }
                }
                TokenKind::Comment
            }
            '"' | '`' => {
                self.scan_quoted(c, true, "quoted identifier")?;
                TokenKind::Quoted(c)
            }
            '[' => {
                self.scan_quoted(']', false, "bracketed identifier")?;
                TokenKind::Quoted('[')
            }
            '\'' => {
                self.scan_quoted('\'', true, "string literal")?;
                TokenKind::String
            }
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                while self
                    .peek()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
                {
                    self.advance();
                }
                TokenKind::Word
            }
            other => {
                self.advance();
                TokenKind::Punct(other)
            }
        };

        Ok(Some(self.token(kind)))
    }
}

/// Tokenizes `input`. Concatenating the token texts yields `input` again.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, DdlError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Joins tokens back into text, collapsing whitespace and dropping comments.
fn render(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    for token in tokens {
        if token.is_trivia() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        } else {
            out.push_str(token.text);
        }
    }
    out.trim().to_string()
}

/// A `CREATE TABLE` statement cut around its column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTable<'a> {
    /// Everything before the opening parenthesis, e.g. `CREATE TABLE "story" `.
    pub header: &'a str,
    /// The column and constraint list, without the outer parentheses.
    pub body: &'a str,
    /// Everything after the closing parenthesis, e.g. ` WITHOUT ROWID`.
    pub trailer: &'a str,
}

/// Splits a `CREATE TABLE` statement into header, column list and trailer.
pub fn split_create_table(sql: &str) -> Result<CreateTable<'_>, DdlError> {
    let mut depth = 0_usize;
    let mut open = None;

    for token in tokenize(sql)? {
        match token.kind {
            TokenKind::Punct('(') => {
                if open.is_none() {
                    open = Some(token.start);
                }
                depth += 1;
            }
            TokenKind::Punct(')') => {
                depth = depth.checked_sub(1).ok_or(DdlError::Unbalanced)?;
                if depth == 0 {
                    let open = open.ok_or(DdlError::Unbalanced)?;
                    return Ok(CreateTable {
                        header: &sql[..open],
                        body: &sql[open + 1..token.start],
                        trailer: &sql[token.start + 1..],
                    });
                }
            }
            _ => {}
        }
    }

    if open.is_some() {
        Err(DdlError::Unbalanced)
    } else {
        Err(DdlError::MissingColumnList)
    }
}

/// Splits a column list on top-level commas.
///
/// Commas nested in parentheses (`DECIMAL(10, 2)`, `PRIMARY KEY (a, b)`),
/// quoted identifiers, literals and comments do not split. Each definition
/// comes back trimmed, with comments removed and whitespace collapsed.
pub fn split_definitions(body: &str) -> Result<Vec<String>, DdlError> {
    let tokens = tokenize(body)?;
    let mut definitions = Vec::new();
    let mut depth = 0_usize;
    let mut current_start = 0;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct('(') => depth += 1,
            TokenKind::Punct(')') => {
                depth = depth.checked_sub(1).ok_or(DdlError::Unbalanced)?;
            }
            TokenKind::Punct(',') if depth == 0 => {
                definitions.push(render(&tokens[current_start..i]));
                current_start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(DdlError::Unbalanced);
    }
    definitions.push(render(&tokens[current_start..]));
    definitions.retain(|d| !d.is_empty());

    Ok(definitions)
}

/// The leading identifier of a column or constraint definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadingName {
    /// Name with quoting removed.
    pub name: String,
    /// Whether the name was quoted in the source.
    pub quoted: bool,
}

impl LeadingName {
    /// Returns true for table constraints (`PRIMARY KEY (..)`, `FOREIGN KEY`,
    /// `UNIQUE (..)`, `CHECK (..)`, `CONSTRAINT name ..`), which hold no data.
    #[must_use]
    pub fn is_table_constraint(&self) -> bool {
        !self.quoted
            && ["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT"]
                .iter()
                .any(|kw| self.name.eq_ignore_ascii_case(kw))
    }

    /// Compares against a column name the way SQLite does.
    #[must_use]
    pub fn matches(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
    }
}

/// Returns the leading identifier of a definition.
pub fn leading_name(definition: &str) -> Result<Option<LeadingName>, DdlError> {
    let tokens = tokenize(definition)?;
    Ok(tokens
        .iter()
        .find(|t| !t.is_trivia())
        .and_then(|t| {
            t.identifier().map(|name| LeadingName {
                name,
                quoted: t.kind != TokenKind::Word,
            })
        }))
}

/// Renders `name` in the quoting style of `like`.
fn requote(like: &Token<'_>, name: &str) -> String {
    match like.kind {
        TokenKind::Quoted('[') => format!("[{name}]"),
        TokenKind::Quoted(q) => format!("{q}{}{q}", name.replace(q, &format!("{q}{q}"))),
        TokenKind::String => format!("'{}'", name.replace('\'', "''")),
        _ if is_bare_identifier(name) => name.to_string(),
        _ => quote(name),
    }
}

/// Double-quotes an identifier.
#[must_use]
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_bare_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Renames the column a definition declares.
///
/// Only the leading name token changes: type names, referenced columns of
/// other tables and literals in the rest of the definition stay as written.
pub fn rename_definition(definition: &str, new_name: &str) -> Result<String, DdlError> {
    let tokens = tokenize(definition)?;
    let mut renamed = false;
    let mut out = String::with_capacity(definition.len() + new_name.len());
    for token in &tokens {
        if !renamed && !token.is_trivia() {
            renamed = true;
            if token.identifier().is_some() {
                out.push_str(&requote(token, new_name));
                continue;
            }
        }
        out.push_str(token.text);
    }
    Ok(out)
}

/// Retargets an index definition from column `old` to `new`.
///
/// Only identifiers after the opening parenthesis (the indexed expressions
/// and any `WHERE` predicate) are rewritten, so the index and table names
/// are left alone. Words directly followed by `(` are function calls.
pub fn rename_index_column(sql: &str, old: &str, new: &str) -> Result<String, DdlError> {
    let tokens = tokenize(sql)?;
    let mut out = String::with_capacity(sql.len() + new.len());
    let mut in_columns = false;

    for (i, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::Punct('(') {
            in_columns = true;
        }
        if in_columns && is_column_reference(&tokens, i, old) {
            out.push_str(&requote(token, new));
        } else {
            out.push_str(token.text);
        }
    }
    Ok(out)
}

/// Returns true if an index definition mentions column `name` after its
/// opening parenthesis, as a key, inside a key expression or in the `WHERE`
/// predicate.
pub fn index_references(sql: &str, name: &str) -> Result<bool, DdlError> {
    let tokens = tokenize(sql)?;
    let Some(open) = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Punct('('))
    else {
        return Ok(false);
    };
    Ok((open..tokens.len()).any(|i| is_column_reference(&tokens, i, name)))
}

/// Renames column references inside a table constraint.
///
/// Identifiers within the constraint's parentheses change; the constraint
/// name and anything from `REFERENCES` on (the other table's columns) stay.
pub fn rename_constraint_column(definition: &str, old: &str, new: &str) -> Result<String, DdlError> {
    let tokens = tokenize(definition)?;
    let mut out = String::with_capacity(definition.len() + new.len());
    let mut depth = 0_usize;
    let mut referencing = false;

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct('(') => depth += 1,
            TokenKind::Punct(')') => depth = depth.saturating_sub(1),
            _ => referencing |= token.is_keyword("REFERENCES"),
        }
        if depth > 0 && !referencing && is_column_reference(&tokens, i, old) {
            out.push_str(&requote(token, new));
        } else {
            out.push_str(token.text);
        }
    }
    Ok(out)
}

/// True if `tokens[i]` names column `name` rather than a function call.
fn is_column_reference(tokens: &[Token<'_>], i: usize, name: &str) -> bool {
    let token = &tokens[i];
    let is_call = tokens[i + 1..]
        .iter()
        .find(|t| !t.is_trivia())
        .is_some_and(|t| t.kind == TokenKind::Punct('('));
    matches!(token.kind, TokenKind::Word | TokenKind::Quoted(_))
        && !is_call
        && token
            .identifier()
            .is_some_and(|ident| ident.eq_ignore_ascii_case(name))
}

/// Points a `CREATE TABLE` header at a different table name.
///
/// The header must end with the table name (optionally schema-qualified and
/// quoted in any style); only that token is replaced.
pub fn rename_table_in_header(header: &str, table: &str, new_table: &str) -> Result<String, DdlError> {
    let tokens = tokenize(header)?;
    let position = tokens
        .iter()
        .rposition(|t| !t.is_trivia())
        .filter(|&i| {
            tokens[i]
                .identifier()
                .is_some_and(|name| name.eq_ignore_ascii_case(table))
        })
        .ok_or_else(|| DdlError::TableNameNotFound(table.to_string()))?;

    let target = tokens[position];
    Ok(format!(
        "{}{}",
        &header[..target.start],
        quote(new_table)
    ))
}

/// Returns true if the definition carries a `NOT NULL` constraint.
pub fn has_not_null(definition: &str) -> Result<bool, DdlError> {
    Ok(find_not_null(&tokenize(definition)?).is_some())
}

/// Index of the next non-trivia token at or after `from`.
fn next_significant(tokens: &[Token<'_>], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&i| !tokens[i].is_trivia())
}

/// Finds the token range of the column's own `NOT NULL` constraint,
/// including any `ON CONFLICT` clause attached to it.
///
/// Only top-level tokens count, so `CHECK (x IS NOT NULL)` or a generated
/// expression never matches, and neither does an `IS NOT NULL` test.
fn find_not_null(tokens: &[Token<'_>]) -> Option<(usize, usize)> {
    let mut depth = 0_usize;
    let mut after_is = false;

    for (i, token) in tokens.iter().enumerate() {
        if token.is_trivia() {
            continue;
        }
        match token.kind {
            TokenKind::Punct('(') => depth += 1,
            TokenKind::Punct(')') => depth = depth.saturating_sub(1),
            _ if depth == 0 && !after_is && token.is_keyword("NOT") => {
                let null = next_significant(tokens, i + 1)
                    .filter(|&j| tokens[j].is_keyword("NULL"));
                if let Some(null) = null {
                    return Some((i, conflict_clause_end(tokens, null)));
                }
            }
            _ => {}
        }
        after_is = token.is_keyword("IS");
    }
    None
}

/// Extends a constraint ending at `end` over a trailing `ON CONFLICT <action>`.
fn conflict_clause_end(tokens: &[Token<'_>], end: usize) -> usize {
    let on = next_significant(tokens, end + 1).filter(|&i| tokens[i].is_keyword("ON"));
    let conflict = on
        .and_then(|i| next_significant(tokens, i + 1))
        .filter(|&i| tokens[i].is_keyword("CONFLICT"));
    conflict
        .and_then(|i| next_significant(tokens, i + 1))
        .unwrap_or(end)
}

/// Adds `NOT NULL` to a column definition that lacks it.
pub fn add_not_null(definition: &str) -> Result<String, DdlError> {
    if has_not_null(definition)? {
        return Ok(definition.to_string());
    }
    Ok(format!("{} NOT NULL", definition.trim_end()))
}

/// Removes every `NOT NULL` constraint from a column definition.
pub fn drop_not_null(definition: &str) -> Result<String, DdlError> {
    let mut tokens = tokenize(definition)?;
    while let Some((not, null)) = find_not_null(&tokens) {
        tokens.drain(not..=null);
    }
    Ok(render(&tokens))
}
