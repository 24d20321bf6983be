//! The running airdrop service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use airdrop_broadcaster::{BroadcastEngine, Reconciler, RecoveryReport, Submitter};
use airdrop_crypto::{keypair_from_private, AddressCodec};
use airdrop_ledger::{LedgerClient, RestLedgerClient, TxBuilder};
use airdrop_rpc::{AppState, ClaimIntake, IntakeMode, RpcServer};
use airdrop_store::{ClaimStore, MetaStore, StoreError};
use airdrop_store_lmdb::integrity::check_data_dir;
use airdrop_store_lmdb::LmdbEnvironment;
use airdrop_types::{Clock, PrivateKey, SystemClock};
use airdrop_verification::{Groth16Verifier, IdentityVerifier, ProofVerifier, VerificationKeys};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::tracing_spans::{engine_span, http_span, recovery_span};
use crate::{NodeConfig, NodeError, ServiceMetrics, ShutdownController, ShutdownReason};

/// How long [`AirdropService::stop`] waits for the engine and the server.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Meta key recording which campaign a data directory belongs to.
const CAMPAIGN_META_KEY: &str = "campaign_event_id";

pub struct AirdropService {
    pub config: NodeConfig,
    pub store: Arc<dyn ClaimStore>,
    pub metrics: Arc<ServiceMetrics>,
    pub shutdown: Arc<ShutdownController>,
    env: LmdbEnvironment,
    intake: Arc<ClaimIntake>,
    engine: Arc<BroadcastEngine>,
    reconciler: Arc<Reconciler>,
    local_addr: Option<SocketAddr>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl AirdropService {
    /// Production wiring: REST ledger gateway, Groth16 proofs, wall clock.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let ledger = Arc::new(RestLedgerClient::with_timeout(
            config.broadcaster.ledger_url.clone(),
            Duration::from_millis(config.broadcaster.request_timeout_ms),
        ));
        Self::with_parts(config, ledger, Arc::new(Groth16Verifier), Arc::new(SystemClock))
    }

    /// Open the claim database, load keys and wire every component. Nothing
    /// runs until [`start`](Self::start).
    pub fn with_parts(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        proof_verifier: Arc<dyn ProofVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let data_dir = &config.store.data_dir;
        check_data_dir(data_dir).map_err(NodeError::Config)?;
        let env = LmdbEnvironment::open(data_dir, config.map_size_bytes())?;
        let report = env.check_integrity()?;
        if !report.is_healthy() {
            return Err(NodeError::Config(format!(
                "claim database at {} failed its integrity check: {}",
                data_dir.display(),
                report.errors.join("; ")
            )));
        }
        bind_campaign(&env.meta_store(), &config.campaign.event_id)?;
        tracing::info!(
            path = %data_dir.display(),
            entries = report.total_entries,
            "claim database opened"
        );

        let codec = AddressCodec::new(config.airdrop.address_prefix.clone());
        let keys = VerificationKeys::load(&config.verifier.keys)?;
        tracing::info!(algorithms = keys.len(), "verification keys loaded");
        let verifier = Arc::new(IdentityVerifier::new(
            config.eligibility_policy(),
            keys,
            proof_verifier,
            codec.clone(),
        )?);

        let sender_key = config
            .broadcaster
            .sender_key
            .as_deref()
            .ok_or_else(|| NodeError::Config("sender key missing".into()))?;
        let private = PrivateKey::from_hex(sender_key)
            .map_err(|e| NodeError::Config(format!("sender key: {e}")))?;
        let mut builder = TxBuilder::new(
            config.broadcaster.chain_id.clone(),
            keypair_from_private(private),
            &codec,
        );
        if !config.broadcaster.memo.is_empty() {
            builder = builder.with_memo(config.broadcaster.memo.clone());
        }
        tracing::info!(
            sender = %builder.sender(),
            chain_id = %builder.chain_id(),
            "signing account loaded"
        );

        let store: Arc<dyn ClaimStore> = Arc::new(env.claim_store());
        let metrics = Arc::new(ServiceMetrics::new());
        let engine_config = config.broadcaster.engine.clone();

        let submitter = Arc::new(Submitter::new(
            Arc::clone(&ledger),
            Arc::new(builder),
            config.broadcaster.gas_multiplier,
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            ledger,
            Arc::clone(&clock),
            metrics.clone(),
            engine_config.status_retry,
        ));
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&store),
            Arc::clone(&submitter),
            Arc::clone(&reconciler),
            Arc::clone(&clock),
            metrics.clone(),
            engine_config,
        ));

        let mut intake = ClaimIntake::new(verifier, Arc::clone(&store), clock, config.amount())
            .with_observer(metrics.clone());
        if config.intake.mode == IntakeMode::Sync {
            intake = intake.with_sync_payout(submitter, Arc::clone(&reconciler));
        }

        Ok(Self {
            config,
            store,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            env,
            intake: Arc::new(intake),
            engine,
            reconciler,
            local_addr: None,
            task_handles: Vec::new(),
        })
    }

    /// Address the HTTP API is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Resolve leftover in-flight transfers, then start the broadcast engine
    /// and the HTTP API. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, NodeError> {
        if self.local_addr.is_some() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            mode = self.intake.mode().as_str(),
            event_id = %self.config.campaign.event_id,
            amount = %self.intake.amount(),
            "airdrop service starting"
        );

        let recovered = self.recover().await?;
        if recovered != RecoveryReport::default() {
            tracing::info!(
                completed = recovered.completed,
                failed = recovered.failed,
                deferred = recovered.deferred,
                "startup recovery finished"
            );
        }

        // Broadcast engine
        {
            let engine = Arc::clone(&self.engine);
            let shutdown_rx = self.shutdown.subscribe();
            let span = engine_span(engine.config().query_limit);
            let handle = tokio::spawn(
                async move {
                    engine.run(shutdown_rx).await;
                }
                .instrument(span),
            );
            self.task_handles.push(handle);
        }

        // HTTP API
        let bind = format!("{}:{}", self.config.server.listen_addr, self.config.server.port);
        let listener = TcpListener::bind(&bind).await?;
        let addr = listener.local_addr()?;
        {
            let registry = Arc::new(self.metrics.registry.clone());
            let state = AppState::new(
                Arc::clone(&self.intake),
                self.config.campaign_params()?,
                registry,
            );
            let server = RpcServer::new(state);
            let shutdown_rx = self.shutdown.subscribe();
            let handle = tokio::spawn(
                async move {
                    if let Err(e) = server.serve(listener, shutdown_rx).await {
                        tracing::error!(error = %e, "HTTP API stopped with an error");
                    }
                }
                .instrument(http_span(&addr.to_string())),
            );
            self.task_handles.push(handle);
        }

        self.local_addr = Some(addr);
        tracing::info!(%addr, "airdrop service started");
        Ok(addr)
    }

    /// Startup recovery; also usable on its own (e.g. by tooling).
    pub async fn recover(&self) -> Result<RecoveryReport, NodeError> {
        let span = recovery_span(&self.config.store.data_dir.display().to_string());
        Ok(self.reconciler.recover().instrument(span).await?)
    }

    /// Signal every task and wait for them. The engine finishes the claim it
    /// is working on first.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        self.shutdown.shutdown();
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Requested);
        tracing::info!(%reason, "airdrop service stopping");

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        let timed_out = tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err();

        match self.store.pending_count() {
            Ok(pending) => tracing::info!(pending, "claims left pending for the next start"),
            Err(e) => tracing::warn!(error = %e, "could not count pending claims"),
        }
        if let Err(e) = self.env.env().force_sync() {
            tracing::warn!(error = %e, "LMDB force_sync failed");
        }

        if timed_out {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
            return Err(NodeError::ShutdownTimeout);
        }
        tracing::info!("airdrop service stopped");
        Ok(())
    }

    /// Start, wait for SIGINT/SIGTERM, stop.
    pub async fn run(mut self) -> Result<(), NodeError> {
        self.start().await?;
        let shutdown = Arc::clone(&self.shutdown);
        let mut stopped = shutdown.subscribe();
        tokio::select! {
            _ = shutdown.wait_for_signal() => {}
            _ = stopped.recv() => {}
        }
        self.stop().await
    }
}

/// A data directory holds the claims of exactly one campaign.
fn bind_campaign(meta: &dyn MetaStore, event_id: &str) -> Result<(), NodeError> {
    match meta.get_meta(CAMPAIGN_META_KEY) {
        Ok(stored) if stored == event_id.as_bytes() => Ok(()),
        Ok(stored) => Err(NodeError::Config(format!(
            "data directory belongs to campaign {}, configured event_id is {event_id}",
            String::from_utf8_lossy(&stored)
        ))),
        Err(StoreError::NotFound(_)) => {
            meta.put_meta(CAMPAIGN_META_KEY, event_id.as_bytes())?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
