//! Remote handles and the contracts generated wrappers build on.

use std::fmt;

use crate::{
    collection::Collection,
    decode::FromPayload,
    encode::{self, CallArgs, PyLiteral},
    error::Result,
    session::Session,
};

/// Contract for wrapper types constructed around a remote handle.
///
/// Generated classes implement this so typed results can be built anywhere a
/// remote value comes back as a reference.
pub trait FromHandle {
    fn from_handle(handle: ObjectRef) -> Self;
}

impl FromHandle for ObjectRef {
    fn from_handle(handle: ObjectRef) -> Self {
        handle
    }
}

/// Contract for enums mirrored from the remote API: a bijection between
/// variants and their remote literal names.
pub trait RemoteEnum: Sized {
    /// Remote literal name of this variant.
    fn name(&self) -> &'static str;

    /// Parse a remote literal name.
    fn from_name(name: &str) -> Option<Self>;
}

/// A reference to a value living in the worker interpreter.
///
/// A handle is an accessor expression plus the session to evaluate it
/// against, nothing more. Deriving a child handle is string composition; no
/// values are cached and dropping a handle has no remote effect. Two handles
/// are equal exactly when their expressions are equal, however they were
/// derived and whichever session they belong to.
#[derive(Clone)]
pub struct ObjectRef {
    session: Session,
    expression: String,
}

impl ObjectRef {
    /// Construct a handle from an accessor expression, checking only its
    /// syntactic shape.
    pub fn new(session: Session, expression: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        encode::validate_expression(&expression)?;
        Ok(Self {
            session,
            expression,
        })
    }

    /// Construct from parts already known to be well formed.
    pub(crate) fn from_parts(session: Session, expression: String) -> Self {
        Self {
            session,
            expression,
        }
    }

    /// The accessor expression this handle stands for.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The session this handle evaluates against.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Child handle for an attribute: `expr.attr`.
    pub fn attr(&self, name: &str) -> Self {
        Self::from_parts(self.session.clone(), self.attr_expression(name))
    }

    /// Child handle for a positional element: `expr[index]`.
    pub fn index(&self, index: usize) -> Self {
        Self::from_parts(
            self.session.clone(),
            format!("{}[{index}]", self.expression),
        )
    }

    /// Child handle for a keyed element: `expr.get("key")`.
    pub fn keyed(&self, key: &str) -> Self {
        Self::from_parts(
            self.session.clone(),
            format!("{}.get({})", self.expression, PyLiteral::from(key)),
        )
    }

    /// Collection proxy over an attribute of this handle. Built fresh on
    /// every access; the proxy holds no state beyond the base handle.
    pub fn collection(&self, attr: &str) -> Collection {
        Collection::new(self.attr(attr))
    }

    /// Python source for calling a method on this handle.
    pub fn call_expression(&self, method: &str, args: &CallArgs) -> String {
        encode::render_call(&self.expression, method, args)
    }

    /// Read an attribute as a bool.
    pub async fn get_bool(&self, attr: &str) -> Result<bool> {
        self.session.eval_bool(&self.attr_expression(attr)).await
    }

    /// Read an attribute as an integer.
    pub async fn get_integer(&self, attr: &str) -> Result<i64> {
        self.session.eval_integer(&self.attr_expression(attr)).await
    }

    /// Read an attribute as a float.
    pub async fn get_float(&self, attr: &str) -> Result<f64> {
        self.session.eval_float(&self.attr_expression(attr)).await
    }

    /// Read an attribute as a string.
    pub async fn get_string(&self, attr: &str) -> Result<String> {
        self.session.eval_string(&self.attr_expression(attr)).await
    }

    /// Read an attribute as an enum value.
    pub async fn get_enum<E: RemoteEnum>(&self, attr: &str) -> Result<E> {
        self.session.eval_enum(&self.attr_expression(attr)).await
    }

    /// Read an attribute as a set of enum values.
    pub async fn get_enum_set<E: RemoteEnum>(&self, attr: &str) -> Result<Vec<E>> {
        self.session.eval_enum_set(&self.attr_expression(attr)).await
    }

    /// Read an attribute as a fixed-length array.
    pub async fn get_array<T: FromPayload>(&self, attr: &str, len: usize) -> Result<Vec<T>> {
        self.session.eval_array(&self.attr_expression(attr), len).await
    }

    /// Read an attribute as a row-major matrix.
    pub async fn get_matrix<T: FromPayload>(
        &self,
        attr: &str,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<Vec<T>>> {
        self.session
            .eval_matrix(&self.attr_expression(attr), rows, cols)
            .await
    }

    /// Read an attribute as a typed object handle.
    pub async fn get_class<T: FromHandle>(&self, attr: &str) -> Result<T> {
        self.session.eval_class(&self.attr_expression(attr)).await
    }

    /// Evaluate an attribute access expected to yield nothing.
    pub async fn get_void(&self, attr: &str) -> Result<()> {
        self.session.eval_void(&self.attr_expression(attr)).await
    }

    /// Assign a bool attribute.
    pub async fn set_bool(&self, attr: &str, value: bool) -> Result<()> {
        self.assign(attr, PyLiteral::from(value)).await
    }

    /// Assign an integer attribute.
    pub async fn set_integer(&self, attr: &str, value: i64) -> Result<()> {
        self.assign(attr, PyLiteral::from(value)).await
    }

    /// Assign a float attribute.
    pub async fn set_float(&self, attr: &str, value: f64) -> Result<()> {
        self.assign(attr, PyLiteral::from(value)).await
    }

    /// Assign a string attribute.
    pub async fn set_string(&self, attr: &str, value: &str) -> Result<()> {
        self.assign(attr, PyLiteral::from(value)).await
    }

    /// Assign an enum attribute.
    pub async fn set_enum<E: RemoteEnum>(&self, attr: &str, value: E) -> Result<()> {
        self.assign(attr, PyLiteral::from_enum(value)).await
    }

    /// Assign an enum-set attribute, keeping the given order.
    pub async fn set_enum_set<E: RemoteEnum>(
        &self,
        attr: &str,
        values: impl IntoIterator<Item = E>,
    ) -> Result<()> {
        self.assign(attr, PyLiteral::from_enum_set(values)).await
    }

    /// Assign an array attribute.
    pub async fn set_array<T: Into<PyLiteral>>(
        &self,
        attr: &str,
        values: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        let items = values.into_iter().map(Into::into).collect();
        self.assign(attr, PyLiteral::List(items)).await
    }

    /// Assign a matrix attribute, row by row.
    pub async fn set_matrix<T: Into<PyLiteral>>(
        &self,
        attr: &str,
        rows: impl IntoIterator<Item = Vec<T>>,
    ) -> Result<()> {
        let rows = rows.into_iter().map(PyLiteral::from).collect();
        self.assign(attr, PyLiteral::List(rows)).await
    }

    /// Assign an attribute to another remote object.
    pub async fn set_class(&self, attr: &str, value: &ObjectRef) -> Result<()> {
        self.assign(attr, PyLiteral::from(value)).await
    }

    /// Call a method for its side effect.
    pub async fn call_void(&self, method: &str, args: CallArgs) -> Result<()> {
        self.session
            .eval_void(&self.call_expression(method, &args))
            .await
    }

    /// Call a method expected to return a bool.
    pub async fn call_boolean(&self, method: &str, args: CallArgs) -> Result<bool> {
        self.session
            .eval_bool(&self.call_expression(method, &args))
            .await
    }

    /// Call a method expected to return a fixed-length array.
    pub async fn call_array<T: FromPayload>(
        &self,
        method: &str,
        args: CallArgs,
        len: usize,
    ) -> Result<Vec<T>> {
        self.session
            .eval_array(&self.call_expression(method, &args), len)
            .await
    }

    /// Call a method expected to return an object, wrapped into a typed
    /// handle.
    pub async fn call_class<T: FromHandle>(&self, method: &str, args: CallArgs) -> Result<T> {
        self.session
            .eval_class(&self.call_expression(method, &args))
            .await
    }

    fn attr_expression(&self, attr: &str) -> String {
        format!("{}.{attr}", self.expression)
    }

    async fn assign(&self, attr: &str, value: PyLiteral) -> Result<()> {
        self.session
            .eval_void(&encode::render_assign(&self.expression, attr, &value))
            .await
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

impl From<&ObjectRef> for PyLiteral {
    fn from(handle: &ObjectRef) -> Self {
        Self::Expr(handle.expression.clone())
    }
}
