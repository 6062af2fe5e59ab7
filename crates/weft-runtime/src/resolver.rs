#![forbid(unsafe_code)]

//! Resolver boundary.
//!
//! The host application resolves component names, partials, and compiled
//! handles. Its hooks answer with a [`Resolution`]; [`DefaultResolver`]
//! turns a missing hook or a missing answer into a [`ResolverError`] that
//! names what could not be resolved, so the failure surfaces at the boundary
//! instead of deep inside a render pass.

use std::fmt;

use weft_core::Value;

use crate::error::ResolverError;

/// Answer of a resolver hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// The host does not provide this hook.
    NotImplemented,
    /// The hook ran but found nothing.
    Undefined,
    Resolved(T),
}

impl<T> Resolution<T> {
    fn into_result(
        self,
        method: &'static str,
        missing: impl FnOnce() -> ResolverError,
    ) -> Result<T, ResolverError> {
        match self {
            Resolution::Resolved(value) => Ok(value),
            Resolution::Undefined => Err(missing()),
            Resolution::NotImplemented => Err(ResolverError::NotImplemented { method }),
        }
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Resolution::Undefined, Resolution::Resolved)
    }
}

/// Host-side lookups. Every hook defaults to
/// [`Resolution::NotImplemented`].
pub trait ResolverDelegate {
    /// Where a lookup originates, usually a template module name.
    type Referrer: fmt::Display;
    type Component;
    type Template;

    fn lookup_component(
        &self,
        name: &str,
        referrer: Option<&Self::Referrer>,
    ) -> Resolution<Self::Component> {
        let _ = (name, referrer);
        Resolution::NotImplemented
    }

    fn lookup_partial(&self, name: &str, referrer: Option<&Self::Referrer>) -> Resolution<u32> {
        let _ = (name, referrer);
        Resolution::NotImplemented
    }

    fn resolve(&self, handle: u32) -> Resolution<Value> {
        let _ = handle;
        Resolution::NotImplemented
    }

    fn compilable(&self, locator: &Self::Referrer) -> Resolution<Self::Template> {
        let _ = locator;
        Resolution::NotImplemented
    }
}

/// Strict wrapper over a [`ResolverDelegate`].
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver<D> {
    inner: D,
}

fn referrer_name<R: fmt::Display>(referrer: Option<&R>) -> String {
    referrer.map_or_else(|| "unknown referrer".to_owned(), ToString::to_string)
}

impl<D: ResolverDelegate> DefaultResolver<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn lookup_component(
        &self,
        name: &str,
        referrer: Option<&D::Referrer>,
    ) -> Result<D::Component, ResolverError> {
        self.inner
            .lookup_component(name, referrer)
            .into_result("lookup_component", || ResolverError::Unresolved {
                what: "component",
                method: "lookup_component",
                name: name.to_owned(),
                referrer: referrer_name(referrer),
            })
    }

    pub fn lookup_partial(
        &self,
        name: &str,
        referrer: Option<&D::Referrer>,
    ) -> Result<u32, ResolverError> {
        self.inner
            .lookup_partial(name, referrer)
            .into_result("lookup_partial", || ResolverError::Unresolved {
                what: "partial",
                method: "lookup_partial",
                name: name.to_owned(),
                referrer: referrer_name(referrer),
            })
    }

    pub fn resolve(&self, handle: u32) -> Result<Value, ResolverError> {
        self.inner
            .resolve(handle)
            .into_result("resolve", || ResolverError::UnresolvedHandle { handle })
    }

    pub fn compilable(&self, locator: &D::Referrer) -> Result<D::Template, ResolverError> {
        self.inner
            .compilable(locator)
            .into_result("compilable", || ResolverError::Uncompilable {
                locator: locator.to_string(),
            })
    }
}
