//! Remote resource client boundary
//!
//! The reconciler never talks to a provider directly. Hosts implement
//! [`CloudClient`] on top of an already-authenticated connection; the engine
//! only needs this capability set.

use crate::context::CancellationToken;
use crate::error::RemoteError;
use crate::identity::ResourceIdentity;
use crate::model::Configuration;
use crate::paging::{Page, Pager};
use crate::types::Change;

/// Authenticated gateway to the remote system
///
/// Every call receives the pass's cancellation token. Implementations may
/// check it and return [`RemoteError::Cancelled`]; the reconciler checks it
/// before every mutating call regardless.
pub trait CloudClient: Send + Sync {
    /// Fetch the observed state of a resource
    ///
    /// Missing resources may be reported either as `Ok(None)` or as a
    /// not-found error; the reconciler treats both the same way.
    fn get(
        &self,
        identity: &ResourceIdentity,
        cancel: &CancellationToken,
    ) -> Result<Option<Configuration>, RemoteError>;

    /// Create a resource from its desired configuration
    ///
    /// Only attributes set on `desired` are meaningful; unset attributes take
    /// the provider default. Returns the observed state after creation.
    fn create(
        &self,
        desired: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<Configuration, RemoteError>;

    /// Apply attribute changes to an existing resource
    fn update(
        &self,
        identity: &ResourceIdentity,
        changes: &[Change],
        cancel: &CancellationToken,
    ) -> Result<Configuration, RemoteError>;

    fn delete(
        &self,
        identity: &ResourceIdentity,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError>;

    /// Spell provider-defined values the way [`CloudClient::get`] reports them
    ///
    /// The reconciler compares desired state against observed state only
    /// after this, so two spellings of one region are not a difference.
    fn canonicalize(&self, desired: &Configuration) -> Configuration {
        desired.clone()
    }

    /// One page of resource group names
    ///
    /// `token` is `None` for the first page and the previous page's
    /// continuation token afterwards.
    fn list_resource_groups(
        &self,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Page<String>, RemoteError>;
}

/// Names of every resource group, drained across pages
pub fn all_resource_groups<C: CloudClient + ?Sized>(
    client: &C,
    cancel: &CancellationToken,
) -> Result<Vec<String>, RemoteError> {
    crate::paging::collect_all(
        || client.list_resource_groups(None, cancel),
        |token| client.list_resource_groups(Some(token), cancel),
    )
}

/// Resource group names, fetched a page at a time as the iterator advances
///
/// Stops after the first error.
pub fn resource_groups<'c, C: CloudClient + ?Sized>(
    client: &'c C,
    cancel: &'c CancellationToken,
) -> impl Iterator<Item = Result<String, RemoteError>> + 'c {
    Pager::new(move |token| client.list_resource_groups(token, cancel))
}
