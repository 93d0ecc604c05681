//! The reader: text to values.
//!
//! Reading is incremental. When the input ends in the middle of a form,
//! [`Reader::read`] returns an `Incomplete` error and rewinds to the start
//! of that form, so the caller can [`Reader::feed`] more text and try again.
//! Every composite form (and every symbol) carries its source position in
//! metadata under `:start :end :line :col` (plus `:file` when known).

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::collections::{Dict, HashSet};
use crate::error::{Error, Result, Span};
use crate::identifier::{Keyword, PrefixName, QName, QSym, Symbol};
use crate::language::{RegexValue, Value};
use crate::lexer::{Lexer, Position, Token};

/// Handler for a `#tag form` literal; receives the already-read form
pub type DataReader = Rc<dyn Fn(Value) -> Result<Value>>;

pub struct Reader {
    lexer: Lexer,
    file: Option<Rc<str>>,
    data_readers: FxHashMap<String, DataReader>,
    /// Start positions of the composite forms currently being read
    meta_stack: Vec<Position>,
    /// Inside `#( ... )`
    in_fn_literal: bool,
}

fn describe(token: &Token) -> String {
    match token {
        Token::RParen => ")".into(),
        Token::RBracket => "]".into(),
        Token::RBrace => "}".into(),
        other => format!("{other:?}"),
    }
}

impl Reader {
    pub fn new(input: &str) -> Self {
        Reader {
            lexer: Lexer::new(input),
            file: None,
            data_readers: FxHashMap::default(),
            meta_stack: Vec::new(),
            in_fn_literal: false,
        }
    }

    /// Record `file` in the position metadata of everything read
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(Rc::from(file));
        self
    }

    pub fn with_data_readers(mut self, readers: FxHashMap<String, DataReader>) -> Self {
        self.data_readers.extend(readers);
        self
    }

    pub fn register_data_reader(&mut self, tag: &str, reader: DataReader) {
        self.data_readers.insert(tag.to_string(), reader);
    }

    /// Append more input
    pub fn feed(&mut self, more: &str) {
        self.lexer.feed(more);
    }

    /// Read the next form, or None at end of input
    pub fn read(&mut self) -> Result<Option<Value>> {
        let mark = self.lexer.mark();
        let result = self.read_top();
        if result.is_err() {
            self.meta_stack.clear();
            self.in_fn_literal = false;
        }
        if matches!(&result, Err(e) if e.is_incomplete()) {
            self.lexer.reset(mark);
        }
        result
    }

    /// Read every remaining form
    pub fn read_all(&mut self) -> Result<Vec<Value>> {
        let mut forms = Vec::new();
        while let Some(form) = self.read()? {
            forms.push(form);
        }
        Ok(forms)
    }

    // ========================================================================
    // Form Dispatch
    // ========================================================================

    fn read_top(&mut self) -> Result<Option<Value>> {
        loop {
            let (token, start) = self.lexer.next_token()?;
            match token {
                Token::Eof => return Ok(None),
                Token::Discard => {
                    self.read_next("#_")?;
                }
                token => return self.read_form(token, start).map(Some),
            }
        }
    }

    /// Read the form a prefix (quote, meta, tag, discard) applies to
    fn read_next(&mut self, context: &str) -> Result<Value> {
        loop {
            let (token, start) = self.lexer.next_token()?;
            match token {
                Token::Eof => {
                    return Err(Error::incomplete(format!(
                        "Unexpected end of input after {context}"
                    )));
                }
                Token::Discard => {
                    self.read_next("#_")?;
                }
                token => return self.read_form(token, start),
            }
        }
    }

    fn read_form(&mut self, token: Token, start: Position) -> Result<Value> {
        self.read_form_inner(token, start)
            .map_err(|e| e.with_span(Some(self.span(start))))
    }

    fn read_form_inner(&mut self, token: Token, start: Position) -> Result<Value> {
        match token {
            Token::LParen => {
                let items = self.read_delimited(start, Token::RParen)?;
                self.positioned(Value::list(items), start)
            }
            Token::LBracket => {
                let items = self.read_delimited(start, Token::RBracket)?;
                self.positioned(Value::array(items), start)
            }
            Token::LBrace => {
                let items = self.read_delimited(start, Token::RBrace)?;
                let dict = self.build_dict(items)?;
                self.positioned(dict, start)
            }
            Token::SetOpen => {
                let items = self.read_delimited(start, Token::RBrace)?;
                let set = self.build_set(items)?;
                self.positioned(set, start)
            }
            Token::FnOpen => self.read_fn_literal(start),
            Token::Quote => self.read_wrapped("quote", start),
            Token::SyntaxQuote => self.read_wrapped("syntax-quote", start),
            Token::Unquote => self.read_wrapped("unquote", start),
            Token::UnquoteSplice => self.read_wrapped("unquote-splice", start),
            Token::Meta => self.read_meta(),
            Token::Tag(tag) => self.read_tagged(&tag),
            Token::Discard => {
                self.read_next("#_")?;
                self.read_next("#_")
            }
            Token::String(s) => Ok(Value::from(s)),
            Token::Number(n) => Ok(Value::Number(n)),
            Token::Keyword(text) => keyword_value(&text),
            Token::Symbol(text) => {
                let value = symbol_value(&text)?;
                if value.supports_meta() {
                    self.positioned(value, start)
                } else {
                    Ok(value)
                }
            }
            Token::Percent { kind, body, flags } => percent_value(kind, &body, &flags),
            Token::RParen | Token::RBracket | Token::RBrace => {
                Err(Error::parse(format!("Unexpected {}", describe(&token))))
            }
            Token::Eof => Err(Error::incomplete("Unexpected end of input")),
        }
    }

    fn read_delimited(&mut self, start: Position, close: Token) -> Result<Vec<Value>> {
        self.meta_stack.push(start);
        let mut items = Vec::new();
        loop {
            let (token, item_start) = self.lexer.next_token()?;
            match token {
                Token::Eof => {
                    return Err(Error::incomplete(format!(
                        "Unexpected end of input, expected {}",
                        describe(&close)
                    )));
                }
                ref t if *t == close => break,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    return Err(Error::parse(format!(
                        "Mismatched delimiter: expected {}, found {}",
                        describe(&close),
                        describe(&token)
                    )));
                }
                Token::Discard => {
                    self.read_next("#_")?;
                }
                token => items.push(self.read_form(token, item_start)?),
            }
        }
        Ok(items)
    }

    fn read_wrapped(&mut self, head: &str, start: Position) -> Result<Value> {
        let inner = self.read_next(head)?;
        self.positioned(Value::list(vec![Value::symbol(head), inner]), start)
    }

    // ========================================================================
    // Positions
    // ========================================================================

    fn span(&self, start: Position) -> Span {
        Span {
            start: start.offset,
            end: self.lexer.mark().offset,
            line: start.line,
            col: start.col,
            file: self.file.clone(),
        }
    }

    fn position_meta(&self, span: &Span) -> Result<Dict> {
        let mut meta = Dict::new()
            .assoc(Value::keyword("start"), Value::from(span.start as i64))?
            .assoc(Value::keyword("end"), Value::from(span.end as i64))?
            .assoc(Value::keyword("line"), Value::from(span.line as i64))?
            .assoc(Value::keyword("col"), Value::from(span.col as i64))?;
        if let Some(ref file) = span.file {
            meta = meta.assoc(Value::keyword("file"), Value::from(&**file))?;
        }
        Ok(meta)
    }

    /// Attach position metadata, popping the composite's start if it was
    /// pushed
    fn positioned(&mut self, value: Value, start: Position) -> Result<Value> {
        if self.meta_stack.last() == Some(&start) {
            self.meta_stack.pop();
        }
        let meta = self.position_meta(&self.span(start))?;
        value.vary_meta(&meta)
    }

    // ========================================================================
    // Composite Builders
    // ========================================================================

    fn build_dict(&self, items: Vec<Value>) -> Result<Value> {
        if items.len() % 2 != 0 {
            return Err(Error::parse(
                "Map literal must contain an even number of forms",
            ));
        }
        let mut dict = Dict::new();
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            if dict.contains_key(&k)? {
                return Err(Error::parse(format!("Duplicate key: {k}")));
            }
            dict = dict.assoc(k, v)?;
        }
        Ok(Value::from(dict))
    }

    fn build_set(&self, items: Vec<Value>) -> Result<Value> {
        let mut set = HashSet::new();
        for item in items {
            if set.contains(&item)? {
                return Err(Error::parse(format!("Duplicate key: {item}")));
            }
            set = set.conj(item)?;
        }
        Ok(Value::from(set))
    }

    fn read_meta(&mut self) -> Result<Value> {
        let meta = self.read_next("^")?;
        let meta = match meta {
            Value::Keyword(_) => Dict::new().assoc(meta, Value::Bool(true))?,
            Value::Symbol(_) | Value::String(_) => {
                // Drop the symbol's own position metadata
                let tag = meta.with_meta(None).unwrap_or(meta);
                Dict::new().assoc(Value::keyword("tag"), tag)?
            }
            Value::Dict(d) => d.with_meta(None),
            other => {
                return Err(Error::assertion(format!(
                    "Metadata must be a keyword, symbol, string or map, got {}",
                    other.type_name()
                )));
            }
        };
        let target = self.read_next("^")?;
        if !target.supports_meta() {
            return Err(Error::assertion(format!(
                "Metadata cannot be applied to a {}",
                target.type_name()
            )));
        }
        target.vary_meta(&meta)
    }

    fn read_tagged(&mut self, tag: &str) -> Result<Value> {
        let form = self.read_next(&format!("#{tag}"))?;
        let handler = self
            .data_readers
            .get(tag)
            .cloned()
            .ok_or_else(|| Error::parse(format!("No reader function for tag {tag}")))?;
        handler(form)
    }

    // ========================================================================
    // Anonymous Function Literals
    // ========================================================================

    fn read_fn_literal(&mut self, start: Position) -> Result<Value> {
        if self.in_fn_literal {
            return Err(Error::parse("Nested #()s are not allowed"));
        }
        self.in_fn_literal = true;
        let body = self.read_delimited(start, Token::RParen);
        self.in_fn_literal = false;
        let body = body?;

        let mut info = Placeholders::default();
        let body: Vec<Value> = body
            .iter()
            .map(|form| info.rewrite(form))
            .collect::<Result<_>>()?;

        let mut params: Vec<Value> = (1..=info.max_index)
            .map(|i| Value::symbol(&format!("%{i}")))
            .collect();
        if info.has_rest {
            params.push(Value::symbol("&"));
            params.push(Value::symbol("%&"));
        }
        let lambda = Value::list(vec![
            Value::symbol("fn"),
            Value::array(params),
            Value::list(body),
        ]);
        self.positioned(lambda, start)
    }
}

/// Placeholder usage inside a `#()` body
#[derive(Default)]
struct Placeholders {
    max_index: usize,
    has_rest: bool,
}

impl Placeholders {
    /// Record placeholder use and rewrite bare `%` to `%1`
    fn rewrite(&mut self, form: &Value) -> Result<Value> {
        match form {
            Value::Symbol(s) if !s.is_qualified() => {
                let name = s.name();
                if name == "%" {
                    self.max_index = self.max_index.max(1);
                    return Ok(Value::Symbol(Rc::new(Symbol::new("%1").with_meta(s.meta().cloned()))));
                }
                if name == "%&" {
                    self.has_rest = true;
                } else if let Some(n) = name.strip_prefix('%').and_then(|d| d.parse::<usize>().ok()) {
                    if n == 0 {
                        return Err(Error::parse("Placeholder %0 is not allowed"));
                    }
                    self.max_index = self.max_index.max(n);
                }
                Ok(form.clone())
            }
            Value::List(l) => {
                let items = l.iter().map(|x| self.rewrite(x)).collect::<Result<_>>()?;
                Value::list(items).with_meta(form.meta().cloned())
            }
            Value::Array(a) => {
                let items = a.items.iter().map(|x| self.rewrite(x)).collect::<Result<_>>()?;
                Value::array(items).with_meta(form.meta().cloned())
            }
            Value::Dict(d) => {
                let mut out = Dict::new();
                for (k, v) in d.iter() {
                    out = out.assoc(self.rewrite(k)?, self.rewrite(v)?)?;
                }
                Value::from(out).with_meta(form.meta().cloned())
            }
            Value::Set(s) => {
                let mut out = HashSet::new();
                for x in s.iter() {
                    out = out.conj(self.rewrite(x)?)?;
                }
                Value::from(out).with_meta(form.meta().cloned())
            }
            other => Ok(other.clone()),
        }
    }
}

// ============================================================================
// Atoms
// ============================================================================

fn keyword_value(text: &str) -> Result<Value> {
    if text.contains("://") {
        return Ok(Value::QName(Rc::new(QName::new(text))));
    }
    let parts: Vec<&str> = text.split(':').collect();
    match parts.as_slice() {
        [name] => Ok(Value::Keyword(Keyword::new(name))),
        [prefix, suffix] if !prefix.is_empty() && !suffix.is_empty() => {
            Ok(Value::PrefixName(Rc::new(PrefixName::new(prefix, suffix))))
        }
        _ => Err(Error::parse(format!("Invalid keyword: :{text}"))),
    }
}

fn symbol_value(text: &str) -> Result<Value> {
    match text {
        "nil" => return Ok(Value::Nil),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if text.contains("://") {
        let qsym = QSym::new(text);
        qsym.parts()?;
        return Ok(Value::QSym(Rc::new(qsym)));
    }
    Ok(Value::from(Symbol::parse(text)?))
}

fn percent_value(kind: char, body: &str, flags: &str) -> Result<Value> {
    match kind {
        'q' => Ok(Value::from(body)),
        'w' => Ok(Value::array(body.split_whitespace().map(Value::from).collect())),
        'r' => Ok(Value::Regex(Rc::new(RegexValue::new(body, flags)?))),
        other => Err(Error::parse(format!("Unknown percent literal: %{other}"))),
    }
}

/// Source span recorded in a form's position metadata
pub fn span_of(form: &Value) -> Option<Span> {
    let meta = form.meta()?;
    let int = |name: &str| -> Option<usize> {
        match meta.get_builtin(&Value::keyword(name))? {
            Value::Number(n) => n.to_i64().and_then(|i| usize::try_from(i).ok()),
            _ => None,
        }
    };
    Some(Span {
        start: int("start")?,
        end: int("end")?,
        line: int("line")?,
        col: int("col")?,
        file: match meta.get_builtin(&Value::keyword("file")) {
            Some(Value::String(f)) => Some(f.clone()),
            _ => None,
        },
    })
}

// ============================================================================
// Convenience entry points
// ============================================================================

/// Read the first form of `input`
pub fn read_string(input: &str) -> Result<Option<Value>> {
    Reader::new(input).read()
}

/// Read every form of `input`
pub fn read_all(input: &str) -> Result<Vec<Value>> {
    Reader::new(input).read_all()
}
