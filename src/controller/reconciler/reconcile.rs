//! # Reconcile
//!
//! The CertificateRequest state machine.
//!
//! Every invocation re-reads the request and performs at most one call against
//! the CA:
//!
//! 1. no `aws-privateca-issuer/certificate-arn` annotation: `sign`, persist the
//!    ARN, requeue
//! 2. annotation present: `get`, store the certificate and chain, done
//!
//! Issuance on the CA side is asynchronous. Waiting for it is a requeue, never an
//! in-process sleep. The annotation is the only state carried between invocations.

use crate::controller::reconciler::authority;
use crate::controller::reconciler::status::{project, StatusUpdate};
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError, Requeue};
use crate::crd::CertificateRequest;
use crate::provider::{Provisioner, ProvisionerError};
use crate::runtime::error_policy::reset_backoff;
use chrono::Utc;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

const MESSAGE_ISSUANCE_REQUESTED: &str = "certificate issuance in progress, waiting for AWS Private CA";
const MESSAGE_ISSUANCE_PENDING: &str = "certificate not yet issued by AWS Private CA";

/// kube-runtime entry point
///
/// # Errors
///
/// Propagates [`reconcile_request`] errors to the error policy.
pub async fn reconcile(
    obj: Arc<CertificateRequest>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.version = obj.metadata.resource_version.as_deref().unwrap_or("unknown"),
    );

    let outcome = reconcile_request(&ctx, &namespace, &name)
        .instrument(span)
        .await?;

    reset_backoff(&ctx, &namespace, &name);
    Ok(outcome.requeue.into_action())
}

/// Reconcile one CertificateRequest by identity
///
/// # Errors
///
/// Returns an error for unresolved or unready issuers, provisioner construction
/// failures, sign failures, terminal get failures and store write failures. The
/// request status is written before any classified error is returned.
pub async fn reconcile_request(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(request) = ctx.requests.get(namespace, name).await? else {
        debug!("CertificateRequest no longer exists, nothing to do");
        return Ok(ReconcileOutcome::done());
    };

    if !request.targets_this_issuer() {
        debug!(
            group = request.spec.issuer_ref.group.as_deref().unwrap_or_default(),
            "CertificateRequest belongs to another issuer group, ignoring"
        );
        return Ok(ReconcileOutcome::done());
    }

    if request.is_issued() {
        debug!("Certificate already issued, nothing to do");
        return Ok(ReconcileOutcome::done());
    }

    if request.is_failed() {
        debug!("CertificateRequest has failed, not retrying");
        return Ok(ReconcileOutcome::done());
    }

    let authority = match authority::resolve(ctx.authorities.as_ref(), &request).await {
        Ok(authority) => authority,
        Err(e) => {
            warn!(error = %e, "Issuer is not usable, leaving request pending");
            write_status(ctx, &request, StatusUpdate::pending(e.to_string())).await?;
            return Err(e);
        }
    };

    let provisioner = match ctx
        .provisioners
        .get_or_create(&authority.key(), authority.spec())
        .await
    {
        Ok(provisioner) => provisioner,
        Err(e) => {
            let err = ReconcilerError::Provisioner(e);
            write_status(ctx, &request, StatusUpdate::failed(err.to_string())).await?;
            return Err(err);
        }
    };

    match request.certificate_arn() {
        None => sign(ctx, &request, provisioner.as_ref()).await,
        Some(certificate_arn) => {
            let certificate_arn = certificate_arn.to_string();
            get(ctx, &request, provisioner.as_ref(), &certificate_arn).await
        }
    }
}

async fn sign(
    ctx: &Reconciler,
    request: &CertificateRequest,
    provisioner: &dyn Provisioner,
) -> Result<ReconcileOutcome, ReconcilerError> {
    if let Err(e) = request.csr_pem() {
        let err = ReconcilerError::InvalidRequest(format!("spec.request is not valid base64: {e}"));
        write_status(ctx, request, StatusUpdate::failed(err.to_string())).await?;
        return Err(err);
    }

    let certificate_arn = match provisioner.sign(request).await {
        Ok(arn) => arn,
        Err(e) => {
            let err = ReconcilerError::Sign(e);
            warn!(error = %err, "Sign failed");
            write_status(ctx, request, StatusUpdate::failed(err.to_string())).await?;
            return Err(err);
        }
    };

    ctx.requests
        .set_certificate_arn(request, &certificate_arn)
        .await?;
    info!(certificate.arn = %certificate_arn, "Certificate requested from AWS Private CA");

    write_status(ctx, request, StatusUpdate::pending(MESSAGE_ISSUANCE_REQUESTED)).await?;
    Ok(ReconcileOutcome::requeue(Requeue::after(
        ctx.config.issuance_poll_interval(),
    )))
}

async fn get(
    ctx: &Reconciler,
    request: &CertificateRequest,
    provisioner: &dyn Provisioner,
    certificate_arn: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let result = provisioner
        .get(request, certificate_arn)
        .await
        .and_then(|issued| {
            if issued.certificate.is_empty() || issued.ca.is_empty() {
                Err(ProvisionerError::Api(
                    "AWS Private CA returned an empty certificate or chain".to_string(),
                ))
            } else {
                Ok(issued)
            }
        });

    match result {
        Ok(issued) => {
            write_status(ctx, request, StatusUpdate::issued(issued.certificate, issued.ca)).await?;
            info!(certificate.arn = certificate_arn, "Certificate issued");
            Ok(ReconcileOutcome::done())
        }
        Err(e) if e.is_in_progress() => {
            debug!(certificate.arn = certificate_arn, "Certificate not issued yet, requeueing");
            write_status(ctx, request, StatusUpdate::pending(MESSAGE_ISSUANCE_PENDING)).await?;
            Ok(ReconcileOutcome::requeue(Requeue::after(
                ctx.config.issuance_poll_interval(),
            )))
        }
        Err(e) => {
            let err = ReconcilerError::Get(e);
            warn!(certificate.arn = certificate_arn, error = %err, "Get failed");
            write_status(ctx, request, StatusUpdate::failed(err.to_string())).await?;
            Err(err)
        }
    }
}

/// Persist a status decision and mirror it as an event
async fn write_status(
    ctx: &Reconciler,
    request: &CertificateRequest,
    update: StatusUpdate,
) -> Result<(), ReconcilerError> {
    let status = project(request.status.as_ref(), &update, Utc::now());
    ctx.requests.patch_status(request, &status).await?;

    let event_type = if update.is_warning() {
        EventType::Warning
    } else {
        EventType::Normal
    };
    ctx.events
        .publish(
            &request.object_ref(&()),
            event_type,
            update.reason,
            Some(update.message),
        )
        .await;
    Ok(())
}
