//! Bencode codec.
//!
//! Dictionaries are kept in a [`BTreeMap`] keyed by raw bytes, so iteration (and therefore
//! encoding) always yields keys in ascending byte order. A decoded dictionary whose keys were
//! not sorted in the input re-encodes sorted; that changes the byte layout but is what the
//! format requires, and it is what makes info-hashes reproducible.

use derive_more::Display;
use std::collections::BTreeMap;
use std::{fmt, io, str};
use thiserror::Error;

#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone)]
pub enum Element {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<Element>),
    Dictionary(BTreeMap<Vec<u8>, Element>),
}

/// Variant tag, used in [`TypeMismatch`] reports.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    #[display("integer")]
    Integer,
    #[display("byte string")]
    ByteString,
    #[display("list")]
    List,
    #[display("dictionary")]
    Dictionary,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    pub expected: Kind,
    pub found: Kind,
}

/// Malformed bencode. Every variant carries the byte offset where decoding stopped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    EmptySource(usize),
    #[error("invalid type prefix {prefix:#04x} at byte {offset}")]
    InvalidPrefix { offset: usize, prefix: u8 },
    #[error("unterminated integer at byte {0}")]
    NoIntegerEnd(usize),
    #[error("invalid integer at byte {0}")]
    InvalidInteger(usize),
    #[error("missing string length delimiter at byte {0}")]
    NoStringDelimiter(usize),
    #[error("invalid string length at byte {0}")]
    InvalidStringLength(usize),
    #[error("unterminated list at byte {0}")]
    NoListEnd(usize),
    #[error("unterminated dictionary at byte {0}")]
    NoDictionaryEnd(usize),
    #[error("dictionary key at byte {0} is not a byte string")]
    InvalidDictionaryKey(usize),
    #[error("nesting deeper than {max} levels at byte {0}", max = MAX_DEPTH)]
    TooDeep(usize),
}

impl ParseError {
    pub fn offset(&self) -> usize {
        match *self {
            ParseError::EmptySource(offset)
            | ParseError::InvalidPrefix { offset, .. }
            | ParseError::NoIntegerEnd(offset)
            | ParseError::InvalidInteger(offset)
            | ParseError::NoStringDelimiter(offset)
            | ParseError::InvalidStringLength(offset)
            | ParseError::NoListEnd(offset)
            | ParseError::NoDictionaryEnd(offset)
            | ParseError::InvalidDictionaryKey(offset)
            | ParseError::TooDeep(offset) => offset,
        }
    }
}

impl From<ParseError> for io::Error {
    fn from(e: ParseError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

/// Lists and dictionaries nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 256;

/// Decode one value from the start of `src`. Bytes following the first complete value are
/// ignored.
pub fn decode(src: &[u8]) -> Result<Element, ParseError> {
    Element::from_bytes(src)
}

/// Encode `e` canonically. Never fails.
pub fn encode(e: &Element) -> Vec<u8> {
    e.to_bytes()
}

impl Element {
    pub fn from_bytes(src: &[u8]) -> Result<Element, ParseError> {
        let mut reader = Reader {
            src,
            pos: 0,
            depth: 0,
        };
        reader.read_element()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut dest = Vec::<u8>::new();
        write_element(self, &mut dest);
        dest
    }

    pub fn kind(&self) -> Kind {
        match self {
            Element::Integer(_) => Kind::Integer,
            Element::ByteString(_) => Kind::ByteString,
            Element::List(_) => Kind::List,
            Element::Dictionary(_) => Kind::Dictionary,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Element::Integer(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Element::ByteString(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Element::List(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Element::Dictionary(_))
    }

    pub fn as_int(&self) -> Result<i64, TypeMismatch> {
        match self {
            Element::Integer(number) => Ok(*number),
            other => Err(other.mismatch(Kind::Integer)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], TypeMismatch> {
        match self {
            Element::ByteString(data) => Ok(data),
            other => Err(other.mismatch(Kind::ByteString)),
        }
    }

    pub fn as_list(&self) -> Result<&[Element], TypeMismatch> {
        match self {
            Element::List(list) => Ok(list),
            other => Err(other.mismatch(Kind::List)),
        }
    }

    pub fn as_dict(&self) -> Result<&BTreeMap<Vec<u8>, Element>, TypeMismatch> {
        match self {
            Element::Dictionary(map) => Ok(map),
            other => Err(other.mismatch(Kind::Dictionary)),
        }
    }

    pub fn into_dict(self) -> Result<BTreeMap<Vec<u8>, Element>, TypeMismatch> {
        match self {
            Element::Dictionary(map) => Ok(map),
            other => Err(other.mismatch(Kind::Dictionary)),
        }
    }

    fn mismatch(&self, expected: Kind) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::ByteString(Vec::<u8>::from(text))
    }
}

impl From<&[u8]> for Element {
    fn from(data: &[u8]) -> Self {
        Element::ByteString(data.to_vec())
    }
}

impl From<Vec<u8>> for Element {
    fn from(data: Vec<u8>) -> Self {
        Element::ByteString(data)
    }
}

impl From<i64> for Element {
    fn from(number: i64) -> Self {
        Element::Integer(number)
    }
}

impl From<Vec<Element>> for Element {
    fn from(list: Vec<Element>) -> Self {
        Element::List(list)
    }
}

impl From<BTreeMap<Vec<u8>, Element>> for Element {
    fn from(map: BTreeMap<Vec<u8>, Element>) -> Self {
        Element::Dictionary(map)
    }
}

/// Indented tree dump, for debug logs.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn fmt_indented(e: &Element, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let pad = indent;
            match e {
                Element::Integer(number) => writeln!(f, "{:pad$}int: {number}", ""),
                Element::ByteString(data) => {
                    writeln!(f, "{:pad$}string: {}", "", String::from_utf8_lossy(data))
                }
                Element::List(list) => {
                    writeln!(f, "{:pad$}list:", "")?;
                    for item in list {
                        fmt_indented(item, indent + 2, f)?;
                    }
                    Ok(())
                }
                Element::Dictionary(map) => {
                    writeln!(f, "{:pad$}dict:", "")?;
                    for (key, value) in map {
                        writeln!(f, "{:pad$}  key: {}", "", String::from_utf8_lossy(key))?;
                        fmt_indented(value, indent + 4, f)?;
                    }
                    Ok(())
                }
            }
        }
        fmt_indented(self, 0, f)
    }
}

/// Keep only the entries whose keys are valid UTF-8.
pub fn convert_dictionary(src: BTreeMap<Vec<u8>, Element>) -> BTreeMap<String, Element> {
    src.into_iter()
        .filter_map(|(key, value)| String::from_utf8(key).ok().map(|text| (text, value)))
        .collect()
}

const DELIMITER_STRING: u8 = b':';
const PREFIX_INTEGER: u8 = b'i';
const PREFIX_LIST: u8 = b'l';
const PREFIX_DICTIONARY: u8 = b'd';
const SUFFIX_COMMON: u8 = b'e';

fn write_element(e: &Element, dest: &mut Vec<u8>) {
    match e {
        Element::Integer(number) => {
            dest.push(PREFIX_INTEGER);
            dest.extend_from_slice(number.to_string().as_bytes());
            dest.push(SUFFIX_COMMON);
        }
        Element::ByteString(data) => write_string(data, dest),
        Element::List(list) => {
            dest.push(PREFIX_LIST);
            for e in list {
                write_element(e, dest);
            }
            dest.push(SUFFIX_COMMON);
        }
        Element::Dictionary(map) => {
            dest.push(PREFIX_DICTIONARY);
            for (key, value) in map {
                write_string(key, dest);
                write_element(value, dest);
            }
            dest.push(SUFFIX_COMMON);
        }
    }
}

fn write_string(data: &[u8], dest: &mut Vec<u8>) {
    dest.extend_from_slice(data.len().to_string().as_bytes());
    dest.push(DELIMITER_STRING);
    dest.extend_from_slice(data);
}

/// Forward-only cursor over the input.
struct Reader<'a> {
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Reader<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn enter_container(&mut self) -> Result<(), ParseError> {
        if self.depth == MAX_DEPTH {
            return Err(ParseError::TooDeep(self.pos));
        }
        self.depth += 1;
        Ok(())
    }

    fn read_element(&mut self) -> Result<Element, ParseError> {
        let first_byte = self.peek().ok_or(ParseError::EmptySource(self.pos))?;
        match first_byte {
            b'0'..=b'9' => Ok(Element::ByteString(self.read_string()?)),
            PREFIX_INTEGER => self.read_integer(),
            PREFIX_LIST => self.read_list(),
            PREFIX_DICTIONARY => self.read_dictionary(),
            prefix => Err(ParseError::InvalidPrefix {
                offset: self.pos,
                prefix,
            }),
        }
    }

    /// Consume bytes up to (not including) `delimiter`, then skip the delimiter.
    fn take_until(&mut self, delimiter: u8) -> Option<&[u8]> {
        let rest = self.src.get(self.pos..)?;
        let index = rest.iter().position(|b| *b == delimiter)?;
        let taken = &rest[..index];
        self.pos += index + 1;
        Some(taken)
    }

    fn read_integer(&mut self) -> Result<Element, ParseError> {
        let start = self.pos;
        self.pos += 1; // 'i'
        let number_data = self.take_until(SUFFIX_COMMON).ok_or(ParseError::NoIntegerEnd(start))?;
        let number = parse_integer(number_data).ok_or(ParseError::InvalidInteger(start))?;
        Ok(Element::Integer(number))
    }

    fn read_string(&mut self) -> Result<Vec<u8>, ParseError> {
        let start = self.pos;
        let size_data =
            self.take_until(DELIMITER_STRING).ok_or(ParseError::NoStringDelimiter(start))?;
        if !size_data.iter().all(u8::is_ascii_digit) {
            return Err(ParseError::InvalidStringLength(start));
        }
        let size = str::from_utf8(size_data)
            .ok()
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or(ParseError::InvalidStringLength(start))?;

        let end = self.pos.checked_add(size).ok_or(ParseError::InvalidStringLength(start))?;
        let data = self.src.get(self.pos..end).ok_or(ParseError::InvalidStringLength(start))?;
        self.pos = end;
        Ok(data.to_vec())
    }

    fn read_list(&mut self) -> Result<Element, ParseError> {
        let start = self.pos;
        self.enter_container()?;
        self.pos += 1; // 'l'

        let mut list = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::NoListEnd(start)),
                Some(SUFFIX_COMMON) => break,
                Some(_) => list.push(self.read_element()?),
            }
        }
        self.pos += 1;
        self.depth -= 1;
        Ok(Element::List(list))
    }

    fn read_dictionary(&mut self) -> Result<Element, ParseError> {
        let start = self.pos;
        self.enter_container()?;
        self.pos += 1; // 'd'

        let mut map = BTreeMap::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::NoDictionaryEnd(start)),
                Some(SUFFIX_COMMON) => break,
                Some(b'0'..=b'9') => {
                    let key = self.read_string()?;
                    let value = self.read_element()?;
                    map.insert(key, value);
                }
                Some(_) => return Err(ParseError::InvalidDictionaryKey(self.pos)),
            }
        }
        self.pos += 1;
        self.depth -= 1;
        Ok(Element::Dictionary(map))
    }
}

/// Canonical decimal: optional '-', no leading zeros, no "-0", no '+'.
fn parse_integer(data: &[u8]) -> Option<i64> {
    let digits = data.strip_prefix(b"-").unwrap_or(data);
    let canonical = match digits {
        [] => false,
        [b'0'] => digits.len() == data.len(),
        [b'0', ..] => false,
        _ => digits.iter().all(u8::is_ascii_digit),
    };
    if !canonical {
        return None;
    }
    str::from_utf8(data).ok()?.parse::<i64>().ok()
}
