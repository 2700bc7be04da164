//! # Provisioner Cache
//!
//! Keeps one provisioner per authority so reconciliations reuse AWS clients.
//!
//! Each key owns a `OnceCell`; concurrent callers for the same authority wait on
//! the same construction instead of racing to build their own. A failed build
//! leaves the cell empty, so the next reconciliation tries again.
//!
//! A slot remembers the spec it was built from. When the authority's spec
//! changes (new CA ARN, region or credentials) the slot is replaced and the
//! provisioner is rebuilt on next use.

use super::{Provisioner, ProvisionerError, ProvisionerFactory};
use crate::crd::{AwsPcaIssuerSpec, IssuerKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Identity of an authority: kind (scope) plus namespace and name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorityKey {
    pub kind: IssuerKind,
    /// Set for namespaced issuers only
    pub namespace: Option<String>,
    pub name: String,
}

impl AuthorityKey {
    #[must_use]
    pub fn issuer(namespace: &str, name: &str) -> Self {
        Self {
            kind: IssuerKind::Issuer,
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn cluster_issuer(name: &str) -> Self {
        Self {
            kind: IssuerKind::ClusterIssuer,
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for AuthorityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

struct Slot {
    spec: AwsPcaIssuerSpec,
    provisioner: OnceCell<Arc<dyn Provisioner>>,
}

/// Construct-once cache of provisioners keyed by authority
pub struct ProvisionerCache {
    factory: Arc<dyn ProvisionerFactory>,
    entries: Mutex<HashMap<AuthorityKey, Arc<Slot>>>,
}

impl std::fmt::Debug for ProvisionerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionerCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl ProvisionerCache {
    pub fn new(factory: Arc<dyn ProvisionerFactory>) -> Self {
        Self {
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &AuthorityKey, spec: &AwsPcaIssuerSpec) -> Arc<Slot> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = entries.get(key) {
            if slot.spec == *spec {
                return Arc::clone(slot);
            }
            info!(authority = %key, "Issuer spec changed, replacing cached provisioner");
        }
        let slot = Arc::new(Slot {
            spec: spec.clone(),
            provisioner: OnceCell::new(),
        });
        entries.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    /// Return the cached provisioner for `key`, building it on first use or
    /// whenever `spec` differs from the one the cached provisioner was built from
    ///
    /// # Errors
    ///
    /// Returns the factory error when construction fails. Nothing is cached in that case.
    pub async fn get_or_create(
        &self,
        key: &AuthorityKey,
        spec: &AwsPcaIssuerSpec,
    ) -> Result<Arc<dyn Provisioner>, ProvisionerError> {
        let slot = self.slot(key, spec);
        let provisioner = slot
            .provisioner
            .get_or_try_init(|| async {
                info!(authority = %key, "Building provisioner");
                self.factory.build(key, spec).await
            })
            .await?;
        Ok(Arc::clone(provisioner))
    }

    /// Drop the provisioner for one authority (e.g. after its spec changed)
    pub fn invalidate(&self, key: &AuthorityKey) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            debug!(authority = %key, "Invalidated cached provisioner");
        }
    }

    /// Drop every cached provisioner
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    /// Number of authorities with an initialized provisioner
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter(|slot| slot.provisioner.initialized())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
