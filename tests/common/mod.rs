//! Shared fixtures for the integration tests
//!
//! In-memory stores, a scripted provisioner and builders for the resources the
//! reconciler reads. Nothing here talks to a cluster or to AWS.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use aws_privateca_issuer::config::ControllerConfig;
use aws_privateca_issuer::controller::events::EventPublisher;
use aws_privateca_issuer::controller::reconciler::{
    owned_status, AuthorityStore, CertificateRequestStore, Reconciler,
};
use aws_privateca_issuer::crd::{
    reasons, AwsCredentialsSecretReference, AwsPcaClusterIssuer, AwsPcaClusterIssuerSpec,
    AwsPcaIssuer, AwsPcaIssuerSpec, AwsPcaIssuerStatus, CertificateRequest,
    CertificateRequestSpec, CertificateRequestStatus, Condition, ConditionStatus, IssuerRef,
    CERTIFICATE_ARN_ANNOTATION, ISSUER_GROUP,
};
use aws_privateca_issuer::provider::{
    AuthorityKey, IssuedCertificate, Provisioner, ProvisionerCache, ProvisionerError,
    ProvisionerFactory,
};
use base64::Engine;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "ns1";
pub const REQUEST_NAME: &str = "cr1";
pub const ISSUER_NAME: &str = "issuer1";
pub const CLUSTER_ISSUER_NAME: &str = "clusterissuer1";
pub const CA_ARN: &str =
    "arn:aws:acm-pca:us-east-1:account:certificate-authority/12345678-1234-1234-1234-123456789012";
pub const CERTIFICATE_ARN: &str = "arn";
pub const REGION: &str = "us-east-1";

const CSR_PEM: &str = "-----BEGIN CERTIFICATE REQUEST-----\nMIIBWDCB/gIBADA=\n-----END CERTIFICATE REQUEST-----\n";

pub fn b64(value: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(value)
}

pub fn decode_b64(value: &str) -> String {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value)
        .expect("status field should be valid base64");
    String::from_utf8(bytes).expect("status field should be UTF-8")
}

// ---------------------------------------------------------------------------
// Resource builders
// ---------------------------------------------------------------------------

pub fn ready_condition(status: ConditionStatus, reason: &str) -> Condition {
    Condition::ready(status, reason, "")
}

/// CertificateRequest `ns1/cr1` pointing at `issuer_name` of `kind` in our group
pub fn certificate_request(kind: &str, issuer_name: &str) -> CertificateRequest {
    let mut request = CertificateRequest::new(
        REQUEST_NAME,
        CertificateRequestSpec {
            request: b64(CSR_PEM),
            issuer_ref: IssuerRef {
                name: issuer_name.to_string(),
                kind: Some(kind.to_string()),
                group: Some(ISSUER_GROUP.to_string()),
            },
            ..Default::default()
        },
    );
    request.metadata.namespace = Some(NAMESPACE.to_string());
    request
}

pub fn issued_request(kind: &str, issuer_name: &str, certificate: &str, ca: &str) -> CertificateRequest {
    let mut request = certificate_request(kind, issuer_name);
    request.status = Some(CertificateRequestStatus {
        conditions: vec![ready_condition(ConditionStatus::True, reasons::ISSUED)],
        certificate: Some(b64(certificate)),
        ca: Some(b64(ca)),
        failure_time: None,
    });
    request
}

fn issuer_spec(secret_name: &str) -> AwsPcaIssuerSpec {
    AwsPcaIssuerSpec {
        arn: CA_ARN.to_string(),
        region: Some(REGION.to_string()),
        secret_ref: Some(AwsCredentialsSecretReference {
            name: secret_name.to_string(),
            ..Default::default()
        }),
    }
}

fn issuer_status(ready: bool) -> AwsPcaIssuerStatus {
    let status = if ready {
        ConditionStatus::True
    } else {
        ConditionStatus::False
    };
    AwsPcaIssuerStatus {
        conditions: vec![ready_condition(status, "Verified")],
    }
}

pub fn issuer(ready: bool) -> AwsPcaIssuer {
    let mut issuer = AwsPcaIssuer::new(ISSUER_NAME, issuer_spec("issuer1-credentials"));
    issuer.metadata.namespace = Some(NAMESPACE.to_string());
    issuer.status = Some(issuer_status(ready));
    issuer
}

pub fn cluster_issuer(ready: bool) -> AwsPcaClusterIssuer {
    let mut issuer = AwsPcaClusterIssuer::new(
        CLUSTER_ISSUER_NAME,
        AwsPcaClusterIssuerSpec {
            config: issuer_spec("clusterissuer1-credentials"),
        },
    );
    issuer.status = Some(issuer_status(ready));
    issuer
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

fn identity(request: &CertificateRequest) -> (String, String) {
    (
        request.metadata.namespace.clone().unwrap_or_default(),
        request.metadata.name.clone().unwrap_or_default(),
    )
}

/// CertificateRequests held in memory, updated in place by the reconciler
#[derive(Default)]
pub struct InMemoryRequests {
    requests: Mutex<HashMap<(String, String), CertificateRequest>>,
    pub fail_writes: AtomicBool,
    pub status_writes: AtomicUsize,
    /// Condition another controller adds right after the next read
    pub concurrent_condition: Mutex<Option<Condition>>,
}

impl InMemoryRequests {
    pub fn insert(&self, request: CertificateRequest) {
        self.requests.lock().unwrap().insert(identity(&request), request);
    }

    pub fn current(&self) -> CertificateRequest {
        self.requests
            .lock()
            .unwrap()
            .get(&(NAMESPACE.to_string(), REQUEST_NAME.to_string()))
            .cloned()
            .expect("request ns1/cr1 should exist")
    }

    pub fn status(&self) -> CertificateRequestStatus {
        self.current().status.unwrap_or_default()
    }

    pub fn ready(&self) -> Condition {
        self.current()
            .ready_condition()
            .cloned()
            .expect("request should carry a Ready condition")
    }
}

#[async_trait]
impl CertificateRequestStore for InMemoryRequests {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CertificateRequest>> {
        let mut requests = self.requests.lock().unwrap();
        let Some(stored) = requests.get_mut(&(namespace.to_string(), name.to_string())) else {
            return Ok(None);
        };
        let read = stored.clone();
        if let Some(condition) = self.concurrent_condition.lock().unwrap().take() {
            stored
                .status
                .get_or_insert_with(Default::default)
                .conditions
                .push(condition);
        }
        Ok(Some(read))
    }

    async fn set_certificate_arn(&self, request: &CertificateRequest, arn: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("api server unavailable");
        }
        let mut requests = self.requests.lock().unwrap();
        let Some(stored) = requests.get_mut(&identity(request)) else {
            bail!("CertificateRequest not found");
        };
        stored
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(CERTIFICATE_ARN_ANNOTATION.to_string(), arn.to_string());
        Ok(())
    }

    async fn patch_status(
        &self,
        request: &CertificateRequest,
        status: &CertificateRequestStatus,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("api server unavailable");
        }
        let mut requests = self.requests.lock().unwrap();
        let Some(stored) = requests.get_mut(&identity(request)) else {
            bail!("CertificateRequest not found");
        };
        // Same outcome as a server-side apply: the Ready entry is replaced by
        // type, our payload fields are set, other conditions are kept.
        let owned = owned_status(status);
        let current = stored.status.get_or_insert_with(Default::default);
        current.conditions.retain(|c| !c.is_ready_type());
        current.conditions.extend(owned.conditions);
        current.certificate = owned.certificate;
        current.ca = owned.ca;
        current.failure_time = owned.failure_time;
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuthorities {
    issuers: Mutex<HashMap<(String, String), AwsPcaIssuer>>,
    cluster_issuers: Mutex<HashMap<String, AwsPcaClusterIssuer>>,
}

impl InMemoryAuthorities {
    pub fn insert_issuer(&self, issuer: AwsPcaIssuer) {
        let key = (
            issuer.metadata.namespace.clone().unwrap_or_default(),
            issuer.metadata.name.clone().unwrap_or_default(),
        );
        self.issuers.lock().unwrap().insert(key, issuer);
    }

    pub fn insert_cluster_issuer(&self, issuer: AwsPcaClusterIssuer) {
        let key = issuer.metadata.name.clone().unwrap_or_default();
        self.cluster_issuers.lock().unwrap().insert(key, issuer);
    }
}

#[async_trait]
impl AuthorityStore for InMemoryAuthorities {
    async fn get_issuer(&self, namespace: &str, name: &str) -> Result<Option<AwsPcaIssuer>> {
        Ok(self
            .issuers
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn get_cluster_issuer(&self, name: &str) -> Result<Option<AwsPcaClusterIssuer>> {
        Ok(self.cluster_issuers.lock().unwrap().get(name).cloned())
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

/// What the fake CA answers to `get`
#[derive(Debug, Clone)]
pub enum GetBehavior {
    Issue { certificate: String, ca: String },
    InProgress,
    Fail(String),
}

/// Scripted provisioner counting the calls it receives
pub struct FakeProvisioner {
    pub sign_error: Option<String>,
    pub get_behavior: GetBehavior,
    pub sign_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub last_certificate_id: Mutex<Option<String>>,
}

impl FakeProvisioner {
    pub fn issuing(certificate: &str, ca: &str) -> Self {
        Self::with(
            None,
            GetBehavior::Issue {
                certificate: certificate.to_string(),
                ca: ca.to_string(),
            },
        )
    }

    pub fn with(sign_error: Option<String>, get_behavior: GetBehavior) -> Self {
        Self {
            sign_error,
            get_behavior,
            sign_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            last_certificate_id: Mutex::new(None),
        }
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn sign(&self, _request: &CertificateRequest) -> Result<String, ProvisionerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        match &self.sign_error {
            Some(message) => Err(ProvisionerError::Api(message.clone())),
            None => Ok(CERTIFICATE_ARN.to_string()),
        }
    }

    async fn get(
        &self,
        _request: &CertificateRequest,
        certificate_id: &str,
    ) -> Result<IssuedCertificate, ProvisionerError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_certificate_id.lock().unwrap() = Some(certificate_id.to_string());
        match &self.get_behavior {
            GetBehavior::Issue { certificate, ca } => Ok(IssuedCertificate {
                certificate: certificate.as_bytes().to_vec(),
                ca: ca.as_bytes().to_vec(),
            }),
            GetBehavior::InProgress => Err(ProvisionerError::RequestInProgress),
            GetBehavior::Fail(message) => Err(ProvisionerError::Api(message.clone())),
        }
    }
}

/// Factory handing out one shared provisioner, or failing like a bad AWS config
pub struct FakeFactory {
    pub provisioner: Arc<FakeProvisioner>,
    pub error: Option<String>,
    pub builds: AtomicUsize,
    pub last_key: Mutex<Option<AuthorityKey>>,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisionerFactory for FakeFactory {
    async fn build(
        &self,
        key: &AuthorityKey,
        _spec: &AwsPcaIssuerSpec,
    ) -> Result<Arc<dyn Provisioner>, ProvisionerError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock().unwrap() = Some(key.clone());
        match &self.error {
            Some(message) => Err(ProvisionerError::Configuration(message.clone())),
            None => Ok(Arc::clone(&self.provisioner) as Arc<dyn Provisioner>),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

#[derive(Default)]
pub struct RecordingEventPublisher {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn recorded(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        });
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Everything a reconciliation touches, wired to in-memory fakes
pub struct Harness {
    pub requests: Arc<InMemoryRequests>,
    pub authorities: Arc<InMemoryAuthorities>,
    pub provisioner: Arc<FakeProvisioner>,
    pub factory: Arc<FakeFactory>,
    pub events: Arc<RecordingEventPublisher>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(provisioner: FakeProvisioner, factory_error: Option<String>) -> Self {
        Self::with_config(provisioner, factory_error, ControllerConfig::default())
    }

    pub fn with_config(
        provisioner: FakeProvisioner,
        factory_error: Option<String>,
        config: ControllerConfig,
    ) -> Self {
        let requests = Arc::new(InMemoryRequests::default());
        let authorities = Arc::new(InMemoryAuthorities::default());
        let provisioner = Arc::new(provisioner);
        let factory = Arc::new(FakeFactory {
            provisioner: Arc::clone(&provisioner),
            error: factory_error,
            builds: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        });
        let events = Arc::new(RecordingEventPublisher::default());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&requests) as Arc<dyn CertificateRequestStore>,
            Arc::clone(&authorities) as Arc<dyn AuthorityStore>,
            Arc::new(ProvisionerCache::new(
                Arc::clone(&factory) as Arc<dyn ProvisionerFactory>
            )),
            Arc::clone(&events) as Arc<dyn EventPublisher>,
            config,
        ));
        Self {
            requests,
            authorities,
            provisioner,
            factory,
            events,
            reconciler,
        }
    }
}
