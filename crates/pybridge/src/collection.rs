//! Collection proxies: one remote object served as a positional sequence, a
//! keyed mapping, and a bag of domain methods, with a fixed resolution order.

use std::{collections::HashMap, fmt, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    decode,
    encode::CallArgs,
    error::{Error, Result},
    handle::{FromHandle, ObjectRef},
    wire::RawValue,
};

/// Shared boxed future type used by specialized dispatch.
pub type OpFuture<'a, T> = BoxFuture<'a, T>;

/// Handler function for a specialized operation.
type SpecializedOp =
    Arc<dyn for<'a> Fn(&'a Collection, CallArgs) -> OpFuture<'a, Result<RawValue>> + Send + Sync>;

/// Built-in operations every collection answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericOp {
    Length,
    Get,
    Keys,
    Values,
    Items,
    Find,
}

impl GenericOp {
    /// Table lookup by access name.
    fn resolve(name: &str) -> Option<Self> {
        match name {
            "length" => Some(Self::Length),
            "get" => Some(Self::Get),
            "keys" => Some(Self::Keys),
            "values" => Some(Self::Values),
            "items" => Some(Self::Items),
            "find" => Some(Self::Find),
            _ => None,
        }
    }
}

/// Fallback element address: a positional index or a mapping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKey {
    Index(usize),
    Key(String),
}

impl ItemKey {
    /// Classify a bare access token: an integer-like token is a positional
    /// subscript, anything else a mapping key.
    pub fn parse(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Key(token.to_string()),
        }
    }
}

impl From<usize> for ItemKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ItemKey {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// How an access name resolves against a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One of the built-in collection operations.
    Generic(GenericOp),
    /// A domain operation from the specialized table.
    Specialized,
    /// Neither table matched: the name addresses an element.
    Item(ItemKey),
}

/// Named domain operations a collection kind adds beside the generic set.
///
/// Handlers receive the collection and the call arguments and produce a raw
/// payload; typed wrappers decode it. Registering a name that collides with
/// the generic table is legal but pointless: the generic table always
/// resolves first.
#[derive(Clone, Default)]
pub struct SpecializedTable {
    ops: HashMap<String, SpecializedOp>,
}

impl SpecializedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name. Replaces a previous registration of
    /// the same name.
    pub fn op<F>(mut self, name: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a Collection, CallArgs) -> OpFuture<'a, Result<RawValue>>
            + Send
            + Sync
            + 'static,
    {
        self.ops.insert(name.to_string(), Arc::new(handler));
        self
    }

    /// Register the common case: a pass-through call to the remote method of
    /// the same name.
    pub fn remote_method(self, name: &str) -> Self {
        let method = name.to_string();
        self.op(name, move |collection: &Collection, args: CallArgs| {
            let session = collection.base().session().clone();
            let code = collection.base().call_expression(&method, &args);
            Box::pin(async move { session.execute(&code).await })
        })
    }

    /// Registered names in deterministic sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.ops.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// True when no operations are registered.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<SpecializedOp> {
        self.ops.get(name).cloned()
    }
}

impl fmt::Debug for SpecializedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializedTable")
            .field("ops", &self.names())
            .finish()
    }
}

/// Stateless proxy over a remote collection object.
///
/// The proxy holds the base handle and an optional specialized table,
/// nothing else. Every access resolves its name afresh and reads through to
/// the worker, so remote mutation between calls is always visible. Element
/// access composes a child handle locally and costs no round trip.
#[derive(Clone)]
pub struct Collection {
    base: ObjectRef,
    specialized: SpecializedTable,
}

impl Collection {
    /// Proxy over a base handle with no specialized operations.
    pub fn new(base: ObjectRef) -> Self {
        Self {
            base,
            specialized: SpecializedTable::new(),
        }
    }

    /// Proxy with a specialized table for the collection kind.
    pub fn with_table(base: ObjectRef, specialized: SpecializedTable) -> Self {
        Self { base, specialized }
    }

    /// The collection's own handle.
    pub fn base(&self) -> &ObjectRef {
        &self.base
    }

    /// Resolve an access name through the ordered chain: the generic table
    /// first, the specialized table second, element address last.
    ///
    /// The order is load-bearing: a specialized op can never shadow a
    /// generic one, and data keys can never shadow either.
    pub fn resolve(&self, name: &str) -> Resolution {
        if let Some(op) = GenericOp::resolve(name) {
            return Resolution::Generic(op);
        }
        if self.specialized.contains(name) {
            return Resolution::Specialized;
        }
        Resolution::Item(ItemKey::parse(name))
    }

    /// Number of elements, by remote `len()`.
    pub async fn length(&self) -> Result<i64> {
        self.base
            .session()
            .eval_integer(&format!("len({})", self.base.expression()))
            .await
    }

    /// Element handle for a key or index. Pure composition: positional
    /// access becomes `base[i]`, keyed access `base.get("key")`.
    pub fn get(&self, key: impl Into<ItemKey>) -> ObjectRef {
        match key.into() {
            ItemKey::Index(index) => self.base.index(index),
            ItemKey::Key(key) => self.base.keyed(&key),
        }
    }

    /// Typed element wrapper for a key or index.
    pub fn get_as<T: FromHandle>(&self, key: impl Into<ItemKey>) -> T {
        T::from_handle(self.get(key))
    }

    /// The collection's keys, in remote order. Empty means the collection
    /// is positional, not necessarily that it is empty.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let code = format!("list({}.keys())", self.base.expression());
        let payload = self.base.session().execute(&code).await?;
        match &payload {
            RawValue::List(items) => items.iter().map(decode::decode_scalar).collect(),
            other => Err(Error::decode("list", other.tag())),
        }
    }

    /// Element handles, in the collection's order.
    ///
    /// A keyed collection is walked by mapping `get(key)` over [`keys`],
    /// which composes handles locally. A positional collection falls back
    /// to remote enumeration, wrapping each returned accessor path.
    pub async fn values(&self) -> Result<Vec<ObjectRef>> {
        let keys = self.keys().await?;
        if keys.is_empty() {
            return self.positional_values().await;
        }
        Ok(keys.iter().map(|key| self.base.keyed(key)).collect())
    }

    /// Key/element pairs, in the same order as [`values`]. Positional
    /// collections pair elements with their 0-based indices.
    pub async fn items(&self) -> Result<Vec<(ItemKey, ObjectRef)>> {
        let keys = self.keys().await?;
        if keys.is_empty() {
            let values = self.positional_values().await?;
            return Ok(values
                .into_iter()
                .enumerate()
                .map(|(index, value)| (ItemKey::Index(index), value))
                .collect());
        }
        Ok(keys
            .into_iter()
            .map(|key| {
                let value = self.base.keyed(&key);
                (ItemKey::Key(key), value)
            })
            .collect())
    }

    /// Position of a key among [`keys`], or `-1` when the key is absent or
    /// the collection is positional. A missing key is an answer here, not
    /// an error.
    pub async fn find(&self, key: &str) -> Result<i64> {
        let keys = self.keys().await?;
        Ok(keys
            .iter()
            .position(|candidate| candidate == key)
            .map_or(-1, |index| index as i64))
    }

    /// Invoke a specialized operation by name.
    ///
    /// The call goes through the same resolution chain as any access, so a
    /// name the generic table claims never reaches the specialized table.
    pub async fn call_specialized(&self, name: &str, args: CallArgs) -> Result<RawValue> {
        if GenericOp::resolve(name).is_some() {
            return Err(Error::NotImplemented(
                "specialized operation shadowed by the generic table",
            ));
        }
        match self.specialized.get(name) {
            Some(handler) => handler(self, args).await,
            None => Err(Error::NotImplemented(
                "specialized operation not registered",
            )),
        }
    }

    /// Bulk attribute read across all elements. Declared for parity with
    /// the accessor surface; there is no wire support, so this fails fast
    /// instead of quietly doing nothing.
    pub async fn foreach_get(&self, _attr: &str) -> Result<Vec<RawValue>> {
        Err(Error::NotImplemented("foreach_get"))
    }

    /// Bulk attribute write across all elements. Declared for parity with
    /// the accessor surface; there is no wire support, so this fails fast
    /// instead of quietly doing nothing.
    pub async fn foreach_set(&self, _attr: &str, _values: &[RawValue]) -> Result<()> {
        Err(Error::NotImplemented("foreach_set"))
    }

    /// Remote enumeration for collections that report no keys.
    async fn positional_values(&self) -> Result<Vec<ObjectRef>> {
        let code = format!("list({}.values())", self.base.expression());
        let payload = self.base.session().execute(&code).await?;
        match &payload {
            RawValue::List(items) => items
                .iter()
                .map(|item| {
                    let path = decode::decode_ref(item)?;
                    Ok(ObjectRef::from_parts(self.base.session().clone(), path))
                })
                .collect(),
            other => Err(Error::decode("list", other.tag())),
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("base", &self.base.expression())
            .field("specialized", &self.specialized.names())
            .finish()
    }
}
