//! Rendering host values, calls, and assignments into Python source.

use std::fmt::{self, Display, Formatter, Write as _};

use crate::error::{Error, Result};
use crate::handle::RemoteEnum;

/// A host value rendered into Python source as a literal.
///
/// Conversions cover the transferable scalar kinds; remote handles render as
/// their accessor expression, verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum PyLiteral {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Remote enum literal name, rendered quoted.
    Enum(&'static str),
    /// Remote enum-set, rendered as a list of quoted names.
    EnumSet(Vec<&'static str>),
    /// A list of literals, rendered as a Python list.
    List(Vec<PyLiteral>),
    /// A verbatim expression, typically a remote handle's accessor path.
    Expr(String),
}

impl PyLiteral {
    /// Literal for a remote enum value.
    pub fn from_enum<E: RemoteEnum>(value: E) -> Self {
        Self::Enum(value.name())
    }

    /// Literal for a set of remote enum values, kept in the given order.
    pub fn from_enum_set<E: RemoteEnum>(values: impl IntoIterator<Item = E>) -> Self {
        Self::EnumSet(values.into_iter().map(|value| value.name()).collect())
    }
}

impl Display for PyLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write_py_float(f, *value),
            Self::Str(value) => write_py_str(f, value),
            Self::Enum(name) => write_py_str(f, name),
            Self::EnumSet(names) => {
                f.write_str("[")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_py_str(f, name)?;
                }
                f.write_str("]")
            }
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Expr(expr) => f.write_str(expr),
        }
    }
}

impl From<bool> for PyLiteral {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PyLiteral {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PyLiteral {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for PyLiteral {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for PyLiteral {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for PyLiteral {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<&str> for PyLiteral {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PyLiteral {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<PyLiteral>> From<Vec<T>> for PyLiteral {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Keyword arguments for a remote call, in insertion order.
///
/// Arguments render exactly as supplied; an optional the caller leaves out is
/// elided from the call entirely, so the remote side applies its own default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    args: Vec<(String, PyLiteral)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyword argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<PyLiteral>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Append a keyword argument for a remote enum value.
    pub fn arg_enum<E: RemoteEnum>(self, name: impl Into<String>, value: E) -> Self {
        self.arg(name, PyLiteral::from_enum(value))
    }

    /// Append a keyword argument only when a value is present.
    pub fn arg_opt(self, name: impl Into<String>, value: Option<impl Into<PyLiteral>>) -> Self {
        match value {
            Some(value) => self.arg(name, value),
            None => self,
        }
    }

    /// True when no arguments have been supplied.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Number of supplied arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }
}

impl Display for CallArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Render `target.method(args)` as Python source.
pub(crate) fn render_call(target: &str, method: &str, args: &CallArgs) -> String {
    format!("{target}.{method}({args})")
}

/// Render `target.attr = value` as Python source.
pub(crate) fn render_assign(target: &str, attr: &str, value: &PyLiteral) -> String {
    format!("{target}.{attr} = {value}")
}

/// Escaped, double-quoted Python string literal.
fn write_py_str(f: &mut Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_str("\"")
}

/// Float literal that stays a float on the Python side.
fn write_py_float(f: &mut Formatter<'_>, value: f64) -> fmt::Result {
    if value.is_nan() {
        return f.write_str("float(\"nan\")");
    }
    if value.is_infinite() {
        return f.write_str(if value > 0.0 {
            "float(\"inf\")"
        } else {
            "float(\"-inf\")"
        });
    }
    let rendered = value.to_string();
    if rendered.contains('.') {
        f.write_str(&rendered)
    } else {
        write!(f, "{rendered}.0")
    }
}

/// Check the syntactic shape of an accessor path: non-empty, balanced
/// brackets and string quotes. Whether the path resolves is the remote
/// side's business.
pub(crate) fn validate_expression(expr: &str) -> Result<()> {
    let malformed = |reason: String| Error::decode("accessor path", format!("{reason}: {expr:?}"));

    if expr.trim().is_empty() {
        return Err(malformed("empty expression".to_string()));
    }
    let mut open: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in expr.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => open.push(')'),
            '[' => open.push(']'),
            ')' | ']' => {
                if open.pop() != Some(c) {
                    return Err(malformed(format!("unbalanced `{c}`")));
                }
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(malformed("unterminated string literal".to_string()));
    }
    if let Some(expected) = open.pop() {
        return Err(malformed(format!("missing `{expected}`")));
    }
    Ok(())
}
