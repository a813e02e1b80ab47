//! Site reconciliation engine
//!
//! The SiteEngine is responsible for:
//! - Resolving the desired configuration against persisted state
//! - Driving bucket, distribution, hosted zone and certificate to match it
//! - Persisting every completed step before starting the next
//! - Tearing the deployment down in reverse dependency order
//!
//! ## Deploy Flow
//!
//! ```text
//! resolve ─► bucket ─► hosting config ┐
//!                   └► content sync ──┴► distribution ─► [domain] ─► distribution config ─► invalidate
//!                                                            │
//!                                         hosted zone ─► certificate ─► alias record
//! ```
//!
//! Each arrow is a persisted step. A run that stops halfway resumes at the
//! first step whose result is not yet recorded.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::{Action, EngineConfig, ExecutionRequest, SiteConfig};
use crate::error::{Error, Result};
use crate::provision::{self, cdn, certificate, dns, storage};
use crate::report::ExecutionReport;
use crate::resolver::{self, DEFAULT_REGION};
use crate::state::StateLedger;
use crate::traits::{CertificateStatus, CredentialProvider, ResourceClientsFactory, StateStore};

/// Notice shown when a distribution was created or reconfigured
pub const DISTRIBUTION_UPDATING_NOTICE: &str = "The CDN distribution is being updated. This may \
take up to 15 minutes. Use the bucket website URL to preview the site in the meantime, and try \
the custom domain again after 15 minutes.";

/// Reconciliation steps, in deploy order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Bucket,
    Hosting,
    Content,
    Distribution,
    HostedZone,
    Certificate,
    AliasRecord,
    DistributionConfig,
    Invalidation,
    Teardown,
}

/// Events emitted by the SiteEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// An action started
    Started {
        action: Action,
        instance_name: String,
    },

    /// A step finished and its result was persisted
    StepCompleted { step: Step },

    /// A step had nothing to do
    StepSkipped { step: Step },

    /// A tolerated condition the operator should know about
    Warning { message: String },

    /// An action finished successfully
    Completed { action: Action },

    /// An action failed
    Failed { action: Action, error: String },
}

/// Core site engine
///
/// Owns the state store of one deployment instance, the credential source
/// and the backend that hands out resource clients.
///
/// ## Lifecycle
///
/// 1. Create with [`SiteEngine::new()`]
/// 2. Call [`SiteEngine::execute()`], or `deploy` / `info` / `remove`
/// 3. Drop to cleanup
pub struct SiteEngine {
    /// Deployment document of this instance
    state_store: Box<dyn StateStore>,

    /// Source of cloud credentials
    credentials: Box<dyn CredentialProvider>,

    /// Builds the resource clients of a run
    backend: Arc<dyn ResourceClientsFactory>,

    /// Delays, budgets and timeouts
    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl SiteEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `state_store`: State store of the deployment instance
    /// - `credentials`: Credential provider
    /// - `backend`: Resource backend
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        state_store: Box<dyn StateStore>,
        credentials: Box<dyn CredentialProvider>,
        backend: Arc<dyn ResourceClientsFactory>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            state_store,
            credentials,
            backend,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Route a request to its action
    ///
    /// Errors are folded into a failure report.
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionReport {
        let result = match request.action {
            Action::Run => self.deploy(&request.instance_name, &request.config).await,
            Action::Info => self.info().await,
            Action::Remove => self.remove(&request.instance_name).await,
        };

        match result {
            Ok(report) => report,
            Err(e) => {
                error!("Action {:?} failed: {}", request.action, e);
                self.emit_event(EngineEvent::Failed {
                    action: request.action,
                    error: e.to_string(),
                });
                ExecutionReport::failure(&e)
            }
        }
    }

    /// Deploy or update the site
    ///
    /// # Returns
    ///
    /// - `Ok(ExecutionReport)`: The site converged; warnings list tolerated
    ///   conditions such as a certificate that is still validating
    /// - `Err(Error)`: Validation failed (nothing was touched) or a resource
    ///   call failed (everything persisted so far stays valid)
    pub async fn deploy(&self, instance_name: &str, site: &SiteConfig) -> Result<ExecutionReport> {
        debug!("Running the deploy action for {}", instance_name);
        self.emit_event(EngineEvent::Started {
            action: Action::Run,
            instance_name: instance_name.to_string(),
        });

        let credentials = self.credentials.credentials().await?;
        let mut ledger = StateLedger::load(self.state_store.as_ref()).await?;
        let desired = resolver::resolve(
            site,
            ledger.get(),
            instance_name,
            &self.config.workspace_root,
        )?;
        let clients = self.backend.create(&credentials, &desired.region)?;

        let mut warnings = Vec::new();
        let mut distribution_updating = false;

        ledger
            .update(|s| s.aws.region = Some(desired.region.clone()))
            .await?;

        debug!("Finding or creating bucket {}", desired.bucket_name);
        let bucket_recorded = ledger.get().aws.s3_bucket_name.is_some();
        storage::find_or_create_bucket(
            clients.storage.as_ref(),
            &desired.bucket_name,
            bucket_recorded,
            &self.config,
        )
        .await?;
        ledger
            .update(|s| s.aws.s3_bucket_name = Some(desired.bucket_name.clone()))
            .await?;
        self.emit_event(EngineEvent::StepCompleted { step: Step::Bucket });

        let src = desired.src.as_deref();
        if ledger.get().aws.hosting_configured() {
            debug!("Uploading content to bucket {}", desired.bucket_name);
            self.emit_event(EngineEvent::StepSkipped { step: Step::Hosting });
            storage::sync_content(clients.storage.as_ref(), &desired.bucket_name, src, &self.config)
                .await?;
        } else {
            debug!("Configuring bucket {} for hosting and uploading content", desired.bucket_name);
            tokio::try_join!(
                storage::configure_for_hosting(
                    clients.storage.as_ref(),
                    &desired.bucket_name,
                    &desired.index_document,
                    &desired.error_document,
                    &self.config,
                ),
                storage::sync_content(
                    clients.storage.as_ref(),
                    &desired.bucket_name,
                    src,
                    &self.config,
                ),
            )?;
            let website_url = storage::website_endpoint(&desired.bucket_name, &desired.region);
            ledger
                .update(|s| {
                    s.aws.s3_bucket_configured_for_hosting = Some(true);
                    s.aws.s3_bucket_website_url = Some(website_url);
                })
                .await?;
            self.emit_event(EngineEvent::StepCompleted { step: Step::Hosting });
        }
        self.emit_event(EngineEvent::StepCompleted { step: Step::Content });

        let website_url = ledger
            .get()
            .aws
            .s3_bucket_website_url
            .clone()
            .unwrap_or_else(|| storage::website_endpoint(&desired.bucket_name, &desired.region));

        let (distribution_id, distribution_domain) = match (
            ledger.get().aws.cloudfront_distribution_id.clone(),
            ledger.get().aws.cloudfront_distribution_url.clone(),
        ) {
            (Some(id), recorded_url) => {
                let existing = cdn::ensure_present(clients.cdn.as_ref(), &id).await?;
                let url = match recorded_url {
                    Some(url) => url,
                    None => {
                        debug!("Recovering domain of distribution {}", id);
                        ledger
                            .update(|s| {
                                s.aws.cloudfront_distribution_url = Some(existing.domain_name.clone());
                                if s.aws.cloudfront_distribution_arn.is_none() {
                                    s.aws.cloudfront_distribution_arn = Some(existing.arn.clone());
                                }
                            })
                            .await?;
                        existing.domain_name
                    }
                };
                self.emit_event(EngineEvent::StepSkipped {
                    step: Step::Distribution,
                });
                (id, url)
            }
            (None, _) => {
                debug!("Creating distribution for bucket {}", desired.bucket_name);
                let distribution = cdn::create_distribution(
                    clients.cdn.as_ref(),
                    &desired.distribution_description,
                    &desired.bucket_name,
                    &website_url,
                    &desired.index_document,
                )
                .await?;
                ledger
                    .update(|s| {
                        s.aws.cloudfront_distribution_id = Some(distribution.id.clone());
                        s.aws.cloudfront_distribution_arn = Some(distribution.arn.clone());
                        s.aws.cloudfront_distribution_url = Some(distribution.domain_name.clone());
                    })
                    .await?;
                distribution_updating = true;
                self.emit_event(EngineEvent::StepCompleted {
                    step: Step::Distribution,
                });
                (distribution.id, distribution.domain_name)
            }
        };

        if let Some(domain) = desired.domain.as_deref() {
            ledger.update(|s| s.domain = Some(domain.to_string())).await?;
            self.reconcile_domain(&clients, &mut ledger, domain, &distribution_domain, &mut warnings)
                .await?;
        }

        debug!("Ensuring distribution {} is configured", distribution_id);
        let state_domain = ledger.get().domain.clone();
        let certificate_arn = ledger.get().aws.acm_certificate_arn.clone();
        match cdn::ensure_configured(
            clients.cdn.as_ref(),
            &distribution_id,
            state_domain.as_deref(),
            certificate_arn.as_deref(),
            &self.config,
        )
        .await
        {
            Ok(cdn::ConfigureOutcome::Updated) => {
                distribution_updating = true;
                self.emit_event(EngineEvent::StepCompleted {
                    step: Step::DistributionConfig,
                });
            }
            Ok(cdn::ConfigureOutcome::Unchanged) => {
                self.emit_event(EngineEvent::StepSkipped {
                    step: Step::DistributionConfig,
                });
            }
            Err(e @ Error::CertificateNotYetValid { .. }) => {
                warn!("{}", e);
                self.warn(&mut warnings, e.to_string());
            }
            Err(e) => return Err(e),
        }

        cdn::invalidate(clients.cdn.as_ref(), &distribution_id).await?;
        self.emit_event(EngineEvent::StepCompleted {
            step: Step::Invalidation,
        });

        if distribution_updating {
            info!("{}", DISTRIBUTION_UPDATING_NOTICE);
        }

        self.state_store.flush().await?;
        self.emit_event(EngineEvent::Completed { action: Action::Run });
        Ok(ExecutionReport::success(ledger.get(), warnings))
    }

    /// Hosted zone, certificate and alias record for `domain`
    async fn reconcile_domain(
        &self,
        clients: &crate::traits::ResourceClients,
        ledger: &mut StateLedger<'_>,
        domain: &str,
        distribution_domain: &str,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        debug!("Finding or creating hosted zone for {}", domain);
        let (zone_id, created, name_servers) = match ledger.get().aws.route53_hosted_zone_id.clone() {
            Some(zone_id) => {
                let name_servers = dns::verify_hosted_zone(clients.dns.as_ref(), &zone_id).await?;
                let created = ledger
                    .get()
                    .aws
                    .route53_hosted_zone_created_by_extension
                    .unwrap_or(false);
                (zone_id, created, name_servers)
            }
            None => {
                let zone = dns::find_or_create_hosted_zone(clients.dns.as_ref(), domain).await?;
                (zone.zone_id, zone.created, zone.name_servers)
            }
        };
        ledger
            .update(|s| {
                s.aws.route53_hosted_zone_id = Some(zone_id.clone());
                s.aws.route53_hosted_zone_created_by_extension = Some(created);
                s.aws.route53_hosted_zone_nameservers = Some(name_servers);
            })
            .await?;
        self.emit_event(EngineEvent::StepCompleted {
            step: Step::HostedZone,
        });

        debug!("Finding or creating certificate for {}", domain);
        let recorded_arn = ledger.get().aws.acm_certificate_arn.clone();
        let outcome = certificate::find_or_create_certificate(
            clients.certificates.as_ref(),
            clients.dns.as_ref(),
            domain,
            &zone_id,
            recorded_arn.as_deref(),
            &self.config,
        )
        .await?;
        ledger
            .update(|s| s.aws.acm_certificate_arn = Some(outcome.arn.clone()))
            .await?;
        match outcome.status {
            CertificateStatus::Issued => {}
            CertificateStatus::PendingValidation => self.warn(
                warnings,
                format!(
                    "Certificate {} for {} is still pending validation. It is checked again on \
                     the next deploy.",
                    outcome.arn, domain
                ),
            ),
            status => self.warn(
                warnings,
                format!("Certificate {} for {} has status {:?}", outcome.arn, domain, status),
            ),
        }
        self.emit_event(EngineEvent::StepCompleted {
            step: Step::Certificate,
        });

        debug!("Pointing {} at {}", domain, distribution_domain);
        dns::upsert_alias_record(clients.dns.as_ref(), &zone_id, domain, distribution_domain).await?;
        self.emit_event(EngineEvent::StepCompleted {
            step: Step::AliasRecord,
        });
        Ok(())
    }

    /// Report outputs from persisted state
    ///
    /// Needs no credentials and makes no resource calls.
    pub async fn info(&self) -> Result<ExecutionReport> {
        let state = self.state_store.get().await?;
        self.emit_event(EngineEvent::Completed {
            action: Action::Info,
        });
        Ok(ExecutionReport::success(&state, Vec::new()))
    }

    /// Tear the deployment down
    ///
    /// The certificate is kept and reported as a warning.
    pub async fn remove(&self, instance_name: &str) -> Result<ExecutionReport> {
        debug!("Running the remove action for {}", instance_name);
        self.emit_event(EngineEvent::Started {
            action: Action::Remove,
            instance_name: instance_name.to_string(),
        });

        let credentials = self.credentials.credentials().await?;
        let mut ledger = StateLedger::load(self.state_store.as_ref()).await?;
        let mut warnings = Vec::new();

        if ledger.get().is_empty() {
            info!("Nothing deployed for {}", instance_name);
            self.emit_event(EngineEvent::StepSkipped {
                step: Step::Teardown,
            });
        } else {
            let region = ledger
                .get()
                .aws
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string());
            let clients = self.backend.create(&credentials, &region)?;
            let summary = provision::teardown(&clients, &mut ledger, &self.config).await?;
            if let Some(arn) = summary.retained_certificate {
                self.warn(
                    &mut warnings,
                    format!(
                        "The certificate {} was not deleted. Delete it manually if it is no \
                         longer needed.",
                        arn
                    ),
                );
            }
            self.emit_event(EngineEvent::StepCompleted {
                step: Step::Teardown,
            });
        }

        self.state_store.flush().await?;
        self.emit_event(EngineEvent::Completed {
            action: Action::Remove,
        });
        Ok(ExecutionReport::success(ledger.get(), warnings))
    }

    fn warn(&self, warnings: &mut Vec<String>, message: String) {
        self.emit_event(EngineEvent::Warning {
            message: message.clone(),
        });
        warnings.push(message);
    }

    /// Emit an engine event
    ///
    /// Dropped with a warning when the channel is full, silently when nobody
    /// is listening.
    fn emit_event(&self, event: EngineEvent) {
        if let Err(TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}
