//! Free-text search expressions over Kafka request columns.
//!
//! Grammar:
//!
//! ```text
//! query     := and_group ("or" and_group)*
//! and_group := condition ("and" condition)*
//! condition := column ("=" | "<>" | "like" | "ilike") value
//!            | column "in" "(" value ("," value)* ")"
//! value     := bare-word | 'single quoted'
//! ```
//!
//! `and` binds tighter than `or`. A parsed [`SearchQuery`] can be rendered
//! to a parameterized SQL fragment or evaluated directly against a record.

use kfm_models::KafkaRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchColumn {
    Id,
    Name,
    Owner,
    OrganisationId,
    CloudProvider,
    Region,
    Status,
    ClusterId,
}

impl SearchColumn {
    fn parse(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "id" => SearchColumn::Id,
            "name" => SearchColumn::Name,
            "owner" => SearchColumn::Owner,
            "organisation_id" => SearchColumn::OrganisationId,
            "cloud_provider" => SearchColumn::CloudProvider,
            "region" => SearchColumn::Region,
            "status" => SearchColumn::Status,
            "cluster_id" => SearchColumn::ClusterId,
            _ => return None,
        })
    }

    pub fn column_name(&self) -> &'static str {
        match self {
            SearchColumn::Id => "id",
            SearchColumn::Name => "name",
            SearchColumn::Owner => "owner",
            SearchColumn::OrganisationId => "organisation_id",
            SearchColumn::CloudProvider => "cloud_provider",
            SearchColumn::Region => "region",
            SearchColumn::Status => "status",
            SearchColumn::ClusterId => "cluster_id",
        }
    }

    fn value_of<'a>(&self, request: &'a KafkaRequest) -> &'a str {
        match self {
            SearchColumn::Id => &request.id,
            SearchColumn::Name => &request.name,
            SearchColumn::Owner => &request.owner,
            SearchColumn::OrganisationId => &request.organisation_id,
            SearchColumn::CloudProvider => &request.cloud_provider,
            SearchColumn::Region => &request.region,
            SearchColumn::Status => request.status.as_str(),
            SearchColumn::ClusterId => &request.cluster_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Eq(String),
    NotEq(String),
    Like(String),
    ILike(String),
    In(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: SearchColumn,
    pub comparison: Comparison,
}

impl Condition {
    fn matches(&self, request: &KafkaRequest) -> bool {
        let actual = self.column.value_of(request);
        match &self.comparison {
            Comparison::Eq(v) => actual == v,
            Comparison::NotEq(v) => actual != v,
            Comparison::Like(p) => like_match(actual, p),
            Comparison::ILike(p) => {
                like_match(&actual.to_lowercase(), &p.to_lowercase())
            }
            Comparison::In(values) => values.iter().any(|v| v == actual),
        }
    }

    fn write_sql(&self, sql: &mut String, values: &mut Vec<String>) {
        let col = self.column.column_name();
        match &self.comparison {
            Comparison::Eq(v) => {
                sql.push_str(col);
                sql.push_str(" = ?");
                values.push(v.clone());
            }
            Comparison::NotEq(v) => {
                sql.push_str(col);
                sql.push_str(" <> ?");
                values.push(v.clone());
            }
            Comparison::Like(v) => {
                sql.push_str(col);
                sql.push_str(" LIKE ?");
                values.push(v.clone());
            }
            Comparison::ILike(v) => {
                sql.push_str("LOWER(");
                sql.push_str(col);
                sql.push_str(") LIKE LOWER(?)");
                values.push(v.clone());
            }
            Comparison::In(vs) => {
                sql.push_str(col);
                sql.push_str(" IN (");
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    values.push(v.clone());
                }
                sql.push(')');
            }
        }
    }
}

/// Disjunction of conjunctions of column conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub any_of: Vec<Vec<Condition>>,
}

impl SearchQuery {
    pub fn parse(input: &str) -> Result<Self, SearchParseError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(SearchParseError::Empty);
        }
        Parser { tokens, pos: 0 }.query()
    }

    pub fn matches(&self, request: &KafkaRequest) -> bool {
        self.any_of
            .iter()
            .any(|group| group.iter().all(|c| c.matches(request)))
    }

    /// Render as a SQL boolean expression with `?` placeholders, returning
    /// the fragment and the values to bind, in order.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut sql = String::new();
        let mut values = Vec::new();
        for (i, group) in self.any_of.iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            sql.push('(');
            for (j, cond) in group.iter().enumerate() {
                if j > 0 {
                    sql.push_str(" AND ");
                }
                cond.write_sql(&mut sql, &mut values);
            }
            sql.push(')');
        }
        (sql, values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchParseError {
    #[error("empty search expression")]
    Empty,
    #[error("unterminated quoted value starting at offset {0}")]
    UnterminatedString(usize),
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unsupported column '{0}'")]
    UnknownColumn(String),
    #[error("expected {expected}, found '{found}'")]
    Unexpected { expected: &'static str, found: String },
    #[error("expected {0}, found end of input")]
    UnexpectedEnd(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Eq,
    NotEq,
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(q) => format!("'{q}'"),
            Token::Eq => "=".into(),
            Token::NotEq => "<>".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, SearchParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(idx, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '<' | '!' => {
                chars.next();
                let expected = if c == '<' { '>' } else { '=' };
                match chars.next() {
                    Some((_, n)) if n == expected => tokens.push(Token::NotEq),
                    _ => return Err(SearchParseError::UnexpectedChar(c, idx)),
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, n)) = chars.next() {
                    if n == '\'' {
                        // '' inside a quoted value is a literal quote
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                            value.push('\'');
                            continue;
                        }
                        closed = true;
                        break;
                    }
                    value.push(n);
                }
                if !closed {
                    return Err(SearchParseError::UnterminatedString(idx));
                }
                tokens.push(Token::Quoted(value));
            }
            '>' | ';' => return Err(SearchParseError::UnexpectedChar(c, idx)),
            _ => {
                let mut word = String::new();
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_whitespace()
                        || matches!(n, '=' | '<' | '>' | '!' | '(' | ')' | ',' | '\'' | ';')
                    {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(Token::Word(word));
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

    fn next(&mut self, expected: &'static str) -> Result<Token, SearchParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(SearchParseError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn query(mut self) -> Result<SearchQuery, SearchParseError> {
        let mut any_of = vec![self.and_group()?];
        while let Some(token) = self.peek() {
            if token.is_keyword("or") {
                self.pos += 1;
                any_of.push(self.and_group()?);
            } else {
                return Err(SearchParseError::Unexpected {
                    expected: "'and' or 'or'",
                    found: token.describe(),
                });
            }
        }
        Ok(SearchQuery { any_of })
    }

    fn and_group(&mut self) -> Result<Vec<Condition>, SearchParseError> {
        let mut group = vec![self.condition()?];
        while matches!(self.peek(), Some(t) if t.is_keyword("and")) {
            self.pos += 1;
            group.push(self.condition()?);
        }
        Ok(group)
    }

    fn condition(&mut self) -> Result<Condition, SearchParseError> {
        let column = match self.next("column name")? {
            Token::Word(w) => SearchColumn::parse(&w)
                .ok_or(SearchParseError::UnknownColumn(w))?,
            other => {
                return Err(SearchParseError::Unexpected {
                    expected: "column name",
                    found: other.describe(),
                });
            }
        };
        let comparison = match self.next("comparison operator")? {
            Token::Eq => Comparison::Eq(self.value()?),
            Token::NotEq => Comparison::NotEq(self.value()?),
            t if t.is_keyword("like") => Comparison::Like(self.value()?),
            t if t.is_keyword("ilike") => Comparison::ILike(self.value()?),
            t if t.is_keyword("in") => Comparison::In(self.value_list()?),
            other => {
                return Err(SearchParseError::Unexpected {
                    expected: "comparison operator",
                    found: other.describe(),
                });
            }
        };
        Ok(Condition { column, comparison })
    }

    fn value(&mut self) -> Result<String, SearchParseError> {
        match self.next("value")? {
            Token::Word(w) if !is_reserved(&w) => Ok(w),
            Token::Quoted(q) => Ok(q),
            other => Err(SearchParseError::Unexpected {
                expected: "value",
                found: other.describe(),
            }),
        }
    }

    fn value_list(&mut self) -> Result<Vec<String>, SearchParseError> {
        match self.next("'('")? {
            Token::LParen => {}
            other => {
                return Err(SearchParseError::Unexpected {
                    expected: "'('",
                    found: other.describe(),
                });
            }
        }
        let mut values = vec![self.value()?];
        loop {
            match self.next("',' or ')'")? {
                Token::Comma => values.push(self.value()?),
                Token::RParen => return Ok(values),
                other => {
                    return Err(SearchParseError::Unexpected {
                        expected: "',' or ')'",
                        found: other.describe(),
                    });
                }
            }
        }
    }
}

fn is_reserved(word: &str) -> bool {
    ["and", "or", "like", "ilike", "in"]
        .iter()
        .any(|k| k.eq_ignore_ascii_case(word))
}

/// SQL `LIKE` semantics: `%` matches any run of characters, `_` exactly one.
fn like_match(value: &str, pattern: &str) -> bool {
    let v: Vec<char> = value.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut vi, mut pi) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while vi < v.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == v[vi]) && p[pi] != '%' {
            vi += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, vi));
            pi += 1;
        } else if let Some((bp, bv)) = backtrack {
            pi = bp + 1;
            vi = bv + 1;
            backtrack = Some((bp, bv + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}
