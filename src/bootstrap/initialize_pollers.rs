//! Poller wiring
//!
//! Each direction reads `MessageSent` events on its origin chain and claims on its
//! destination chain. Listening (sent events and anchoring) always runs; claiming only runs
//! when auto claiming is enabled for the direction.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use eyre::{Result, WrapErr};
use futures::future::join_all;
use log::{error, info};
use tokio::task::JoinHandle;

use crate::{
    bootstrap::PostmanRepository,
    config::{ClaimingConfig, NetworkConfig, PostmanConfig, ServerConfig},
    constants::DEFAULT_PRICE_BUMP_PERCENT,
    domain::{
        AnchoringProcessorConfig, ClaimingPersisterConfig, ClaimingProcessorConfig,
        DatabaseCleaner, DatabaseCleanerConfig, L2ClaimMessageTransactionSizeProcessor,
        MessageAnchoringProcessor, MessageClaimingPersister, MessageClaimingProcessor,
        MessageProcessor, MessageSentEventProcessor, NonceCoordinator, SentEventProcessorConfig,
        TransactionSizeProcessorConfig,
    },
    jobs::{MessageSentEventPoller, Poller, SentEventPollerConfig},
    models::{Direction, MessageStatus},
    services::{
        EthereumGasProvider, EthereumTransactionValidationService, EvmProvider,
        GasProviderConfig, GasProviderTrait, LineaGasProvider, LineaTransactionValidationService,
        LocalSigner, MessageSentEventLogClient, MessageServiceClient, MessageServiceClientTrait,
        MessageServiceConfig, MessageServiceFlavor, RetryConfig, TransactionValidationService,
        ValidationConfig,
    },
};

pub type ClaimClient = MessageServiceClient<EvmProvider, LocalSigner>;
pub type ValidationService =
    TransactionValidationService<ClaimClient, EthereumGasProvider<EvmProvider>, EvmProvider>;
type Nonces = NonceCoordinator<PostmanRepository, EvmProvider>;

/// Handles of every running poller.
pub struct PostmanService {
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl PostmanService {
    pub fn poller_count(&self) -> usize {
        self.handles.len()
    }

    /// Clears the running flag and waits for every poller to finish its iteration.
    pub async fn stop(self) {
        self.running.store(false, Ordering::Relaxed);
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!("Poller task failed: {}", e);
            }
        }
        info!("All pollers stopped");
    }
}

struct Chain {
    provider: Arc<EvmProvider>,
    config: NetworkConfig,
}

impl Chain {
    fn new(server_config: &ServerConfig, config: &NetworkConfig, section: &str) -> Result<Self> {
        let retry_config = RetryConfig::new(
            server_config.provider_max_retries,
            server_config.provider_retry_base_delay_ms,
            server_config.provider_retry_max_delay_ms,
        );
        let provider = EvmProvider::new(&config.rpc_url, server_config.rpc_timeout_ms, retry_config)
            .wrap_err_with(|| format!("Failed to create the {} provider", section))?;

        Ok(Self {
            provider: Arc::new(provider),
            config: config.clone(),
        })
    }

    fn claim_client(&self, flavor: MessageServiceFlavor) -> Result<Arc<ClaimClient>> {
        let claiming = &self.config.claiming;
        let private_key = claiming.signer_private_key.get_value()?;
        let signer = LocalSigner::new(&private_key)?;

        Ok(Arc::new(MessageServiceClient::new(
            self.provider.clone(),
            Arc::new(signer),
            MessageServiceConfig {
                contract_address: self.config.message_service_contract_address,
                claim_via_address: claiming.claim_via_address,
                flavor,
                max_fee_per_gas_cap: claiming.max_fee_per_gas_cap,
            },
        )))
    }
}

fn gas_provider_config(claiming: &ClaimingConfig) -> GasProviderConfig {
    GasProviderConfig {
        max_fee_per_gas_cap: claiming.max_fee_per_gas_cap,
        gas_estimation_percentile: claiming.gas_estimation_percentile,
        enforce_max_gas_fee: claiming.is_max_gas_fee_enforced,
    }
}

fn validation_config(claiming: &ClaimingConfig) -> ValidationConfig {
    ValidationConfig {
        profit_margin: claiming.profit_margin,
        max_claim_gas_limit: claiming.max_claim_gas_limit,
        is_postman_sponsorship_enabled: claiming.is_postman_sponsorship_enabled,
        max_postman_sponsor_gas_limit: claiming.sponsor_gas_limit(),
    }
}

/// Everything the pollers of one direction share.
struct DirectionContext<'a> {
    direction: Direction,
    origin: &'a Chain,
    destination: &'a Chain,
    client: Arc<ClaimClient>,
    repository: Arc<PostmanRepository>,
    running: Arc<AtomicBool>,
}

impl DirectionContext<'_> {
    fn poll_interval(&self) -> u64 {
        self.destination.config.listener.polling_interval
    }

    fn spawn(&self, processor: Arc<dyn MessageProcessor>, interval_ms: u64) -> JoinHandle<()> {
        Poller::new(self.direction, processor, interval_ms).start(self.running.clone())
    }

    fn nonce_coordinator(&self) -> Arc<Nonces> {
        Arc::new(NonceCoordinator::new(
            self.repository.clone(),
            self.destination.provider.clone(),
            self.client.signer_address(),
            self.direction,
            self.destination.config.claiming.max_nonce_diff,
        ))
    }

    /// Sent-event and anchoring pollers.
    fn spawn_listeners(&self) -> Result<Vec<JoinHandle<()>>> {
        let origin = &self.origin.config;
        let filters = &origin.listener.event_filters;
        let calldata_filter = filters
            .calldata_filter
            .as_ref()
            .map(|filter| filter.compile())
            .transpose()?;

        let log_client = Arc::new(MessageSentEventLogClient::new(
            self.origin.provider.clone(),
            origin.message_service_contract_address,
        ));
        let sent_event_processor = MessageSentEventProcessor::new(
            self.repository.clone(),
            log_client,
            self.origin.provider.clone(),
            SentEventProcessorConfig {
                direction: self.direction,
                max_blocks_to_fetch_logs: origin.listener.max_blocks_to_fetch_logs,
                block_confirmation: origin.listener.block_confirmation,
                is_eoa_enabled: origin.is_eoa_enabled,
                is_calldata_enabled: origin.is_calldata_enabled,
                message_sender_filter: filters.from_address_filter,
                destination_filter: filters.to_address_filter,
                calldata_filter,
            },
        );
        let sent_event_poller = MessageSentEventPoller::new(
            sent_event_processor,
            self.repository.clone(),
            self.origin.provider.clone(),
            SentEventPollerConfig {
                origin_contract_address: origin.message_service_contract_address,
                initial_from_block: origin.listener.initial_from_block,
                polling_interval_ms: origin.listener.polling_interval,
            },
        );

        let anchoring = MessageAnchoringProcessor::new(
            self.repository.clone(),
            self.client.clone(),
            self.destination.provider.clone(),
            AnchoringProcessorConfig {
                direction: self.direction,
                origin_contract_address: origin.message_service_contract_address,
                max_fetch_messages_from_db: origin.listener.max_fetch_messages_from_db,
            },
        );

        Ok(vec![
            sent_event_poller.start(self.running.clone()),
            self.spawn(Arc::new(anchoring), self.poll_interval()),
        ])
    }

    /// Claiming and persisting pollers.
    fn spawn_claimers<G>(
        &self,
        validation: Arc<ValidationService>,
        gas_provider: Arc<G>,
        nonce_coordinator: Arc<Nonces>,
        claimable_statuses: Vec<MessageStatus>,
        use_gas_price_threshold: bool,
    ) -> Vec<JoinHandle<()>>
    where
        G: GasProviderTrait + 'static,
    {
        let destination = &self.destination.config;
        let claiming = MessageClaimingProcessor::new(
            self.repository.clone(),
            self.client.clone(),
            validation,
            gas_provider,
            nonce_coordinator,
            ClaimingProcessorConfig {
                direction: self.direction,
                origin_contract_address: self.origin.config.message_service_contract_address,
                fee_recipient: destination.claiming.fee_recipient(),
                claimable_statuses,
                max_number_of_retries: destination.claiming.max_number_of_retries,
                retry_delay_in_seconds: destination.claiming.retry_delay_in_seconds,
                profit_margin: destination.claiming.profit_margin,
                use_gas_price_threshold,
            },
        );
        let persister = MessageClaimingPersister::new(
            self.repository.clone(),
            self.client.clone(),
            self.destination.provider.clone(),
            ClaimingPersisterConfig {
                direction: self.direction,
                message_submission_timeout_ms: destination.claiming.message_submission_timeout,
                max_tx_retries: destination.claiming.max_tx_retries,
                price_bump_percent: DEFAULT_PRICE_BUMP_PERCENT,
                receipt_polling_interval_ms: destination.listener.receipt_polling_interval,
            },
        );

        vec![
            self.spawn(Arc::new(claiming), self.poll_interval()),
            self.spawn(
                Arc::new(persister),
                destination.listener.receipt_polling_interval,
            ),
        ]
    }
}

/// L1 to L2: claims land on L2, priced by compressed transaction size.
fn start_l1_to_l2(ctx: &DirectionContext<'_>) -> Vec<JoinHandle<()>> {
    let destination = &ctx.destination.config;
    let gas_provider = Arc::new(LineaGasProvider::new(
        ctx.destination.provider.clone(),
        gas_provider_config(&destination.claiming),
        destination.enable_linea_estimate_gas,
    ));
    let validation = Arc::new(TransactionValidationService::Linea(
        LineaTransactionValidationService::new(
            ctx.client.clone(),
            gas_provider.clone(),
            validation_config(&destination.claiming),
        ),
    ));
    let nonce_coordinator = ctx.nonce_coordinator();

    let transaction_size = L2ClaimMessageTransactionSizeProcessor::new(
        ctx.repository.clone(),
        ctx.client.clone(),
        gas_provider.clone(),
        nonce_coordinator.clone(),
        TransactionSizeProcessorConfig {
            direction: ctx.direction,
            origin_contract_address: ctx.origin.config.message_service_contract_address,
            fee_recipient: destination.claiming.fee_recipient(),
        },
    );

    let mut handles = vec![ctx.spawn(Arc::new(transaction_size), ctx.poll_interval())];
    handles.extend(ctx.spawn_claimers(
        validation,
        gas_provider,
        nonce_coordinator,
        vec![
            MessageStatus::TransactionSizeComputed,
            MessageStatus::FeeUnderpriced,
        ],
        false,
    ));
    handles
}

/// L2 to L1: claims land on L1, priced from the L1 fee history.
fn start_l2_to_l1(ctx: &DirectionContext<'_>) -> Vec<JoinHandle<()>> {
    let destination = &ctx.destination.config;
    let gas_provider = Arc::new(EthereumGasProvider::new(
        ctx.destination.provider.clone(),
        gas_provider_config(&destination.claiming),
    ));
    let validation = Arc::new(TransactionValidationService::Ethereum(
        EthereumTransactionValidationService::new(
            ctx.client.clone(),
            gas_provider.clone(),
            validation_config(&destination.claiming),
        ),
    ));

    ctx.spawn_claimers(
        validation,
        gas_provider,
        ctx.nonce_coordinator(),
        vec![MessageStatus::Anchored, MessageStatus::FeeUnderpriced],
        true,
    )
}

/// Builds the clients of both chains and starts every poller the config enables.
///
/// # Errors
///
/// Returns error if a provider, signer or calldata filter cannot be built.
pub fn initialize_pollers(
    server_config: &ServerConfig,
    config: &PostmanConfig,
    repository: Arc<PostmanRepository>,
) -> Result<PostmanService> {
    let l1 = Chain::new(server_config, &config.l1, "l1")?;
    let l2 = Chain::new(server_config, &config.l2, "l2")?;
    let running = Arc::new(AtomicBool::new(true));
    let mut handles = Vec::new();

    let l1_to_l2 = DirectionContext {
        direction: Direction::L1ToL2,
        origin: &l1,
        destination: &l2,
        client: l2.claim_client(MessageServiceFlavor::L2MessageService)?,
        repository: repository.clone(),
        running: running.clone(),
    };
    let l2_to_l1 = DirectionContext {
        direction: Direction::L2ToL1,
        origin: &l2,
        destination: &l1,
        client: l1.claim_client(MessageServiceFlavor::LineaRollup)?,
        repository: repository.clone(),
        running: running.clone(),
    };

    handles.extend(l1_to_l2.spawn_listeners()?);
    handles.extend(l2_to_l1.spawn_listeners()?);

    if config.l1_l2_auto_claim_enabled {
        handles.extend(start_l1_to_l2(&l1_to_l2));
    } else {
        info!("Auto claiming disabled: direction={}", Direction::L1ToL2);
    }
    if config.l2_l1_auto_claim_enabled {
        handles.extend(start_l2_to_l1(&l2_to_l1));
    } else {
        info!("Auto claiming disabled: direction={}", Direction::L2ToL1);
    }

    let cleaner_config = DatabaseCleanerConfig::from(&config.database_cleaner);
    if cleaner_config.enabled {
        let interval = cleaner_config.cleaning_interval_ms;
        let cleaner = DatabaseCleaner::new(repository, cleaner_config);
        handles.push(Poller::unscoped(Arc::new(cleaner), interval).start(running.clone()));
    }

    info!("Postman started: pollers={}", handles.len());
    Ok(PostmanService { running, handles })
}
