/// Minimal XML reader for Mitsuba-style scene descriptions.
///
/// Handles exactly the subset the scene files use: nested elements,
/// `key="value"` attributes, self-closing tags, the `<?xml …?>` declaration,
/// `<!DOCTYPE …>` directives and `<!-- … -->` comments. Text content between
/// elements carries no scene data and is skipped.
use std::fmt;

/// A parse error with 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ParseError {
    fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: msg.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scene xml parse error at {}:{}: {}",
            self.line, self.col, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// One XML element: tag, attributes in document order, child elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    /// Attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Nth child element carrying the given tag (0-based).
    pub fn find_child(&self, tag: &str, index: usize) -> Option<&Element> {
        self.children.iter().filter(|c| c.tag == tag).nth(index)
    }
}

/// Parse a document into its root element.
pub fn parse_str(src: &str) -> Result<Element, ParseError> {
    let mut cursor = Cursor::new(src);
    cursor.skip_prolog()?;
    let root = cursor.parse_element()?;
    cursor.skip_misc()?;
    if !cursor.at_eof() {
        return Err(cursor.err("trailing content after root element"));
    }
    Ok(root)
}

// ── Cursor ────────────────────────────────────────────────────────────────

struct Cursor<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'s> Cursor<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.line, self.col)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> Result<(), ParseError> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.err(format!("expected {:?}, got {:?}", expected, c))),
            None => Err(self.err(format!("expected {:?}, got end of input", expected))),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Skip whitespace, comments, the XML declaration, and DOCTYPE-style
    /// directives preceding or following the root element.
    fn skip_misc(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
            } else if self.rest().starts_with("<?") {
                self.skip_until("?>", "unterminated processing instruction")?;
            } else if self.rest().starts_with("<!") {
                self.skip_until(">", "unterminated directive")?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_prolog(&mut self) -> Result<(), ParseError> {
        self.skip_misc()
    }

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        self.skip_until("-->", "unterminated comment")
    }

    fn skip_until(&mut self, terminator: &str, msg: &str) -> Result<(), ParseError> {
        loop {
            if self.rest().starts_with(terminator) {
                for _ in 0..terminator.chars().count() {
                    self.advance();
                }
                return Ok(());
            }
            if self.advance().is_none() {
                return Err(self.err(msg));
            }
        }
    }

    // ── Element ───────────────────────────────────────────────────────────

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        self.eat('<')?;
        let tag = self.parse_name()?;
        let attributes = self.parse_attributes()?;

        // Self-closing element.
        if self.rest().starts_with("/>") {
            self.advance();
            self.advance();
            return Ok(Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }
        self.eat('>')?;

        let children = self.parse_children(&tag)?;
        Ok(Element {
            tag,
            attributes,
            children,
        })
    }

    fn parse_children(&mut self, open_tag: &str) -> Result<Vec<Element>, ParseError> {
        let mut children = Vec::new();
        loop {
            // Skip text content and comments between child elements.
            while !self.at_eof() && self.peek() != Some('<') {
                self.advance();
            }
            if self.rest().starts_with("<!--") {
                self.skip_comment()?;
                continue;
            }
            if self.rest().starts_with("</") {
                self.advance();
                self.advance();
                let close = self.parse_name()?;
                if close != open_tag {
                    return Err(self.err(format!(
                        "mismatched closing tag: expected </{}>, got </{}>",
                        open_tag, close
                    )));
                }
                self.skip_whitespace();
                self.eat('>')?;
                return Ok(children);
            }
            if self.at_eof() {
                return Err(self.err(format!("unclosed element <{}>", open_tag)));
            }
            children.push(self.parse_element()?);
        }
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.err("expected a name"));
        }
        Ok(name)
    }

    fn parse_attributes(&mut self) -> Result<Vec<(String, String)>, ParseError> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('>') | Some('/') => return Ok(attributes),
                None => return Err(self.err("unterminated start tag")),
                _ => {}
            }
            let key = self.parse_name()?;
            self.skip_whitespace();
            self.eat('=')?;
            self.skip_whitespace();
            let value = self.parse_quoted()?;
            attributes.push((key, value));
        }
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        let quote = match self.advance() {
            Some(c @ ('"' | '\'')) => c,
            _ => return Err(self.err("expected a quoted attribute value")),
        };
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated attribute value")),
                Some(c) if c == quote => break,
                Some('&') => value.push(self.parse_entity()?),
                Some(c) => value.push(c),
            }
        }
        Ok(value)
    }

    fn parse_entity(&mut self) -> Result<char, ParseError> {
        let mut name = String::new();
        loop {
            match self.advance() {
                None => return Err(self.err("unterminated entity reference")),
                Some(';') => break,
                Some(c) => name.push(c),
            }
        }
        match name.as_str() {
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "amp" => Ok('&'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            other => Err(self.err(format!("unknown entity &{};", other))),
        }
    }
}
