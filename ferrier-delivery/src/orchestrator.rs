//! Single-attempt delivery and the resulting status transition.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use ferrier_common::address::Mailbox;
use ferrier_queue::{MessageStatus, OutboundMessage, QueueStore};
use ferrier_smtp::{Response, SmtpClient};
use tracing::{info, warn};

use crate::{
    config::{DeliveryConfig, SigningFailurePolicy},
    dns::MxLookup,
    error::{DeliveryError, Result},
    retry,
    signer::{MessageSigner, SigningOutcome},
};

/// Executes one delivery attempt per claimed message and records the
/// outcome in the queue store.
///
/// Routing picks the configured relay when one exists, otherwise the
/// best mail exchanger for the recipient domain on port 25. A transient
/// failure consumes one retry and reschedules the message with
/// exponential backoff; an unparseable recipient fails it permanently.
#[derive(Debug)]
pub struct DeliveryOrchestrator {
    store: Arc<dyn QueueStore>,
    resolver: Arc<dyn MxLookup>,
    signer: Option<MessageSigner>,
    config: DeliveryConfig,
}

impl DeliveryOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        resolver: Arc<dyn MxLookup>,
        config: DeliveryConfig,
    ) -> Self {
        let signer = config.dkim.clone().map(MessageSigner::new);

        Self {
            store,
            resolver,
            signer,
            config,
        }
    }

    /// Attempt delivery of a claimed message and persist the transition.
    ///
    /// Returns the status the message ended in.
    ///
    /// # Errors
    ///
    /// Only store failures surface as errors; delivery failures are
    /// absorbed into the message's retry state.
    pub async fn deliver(&self, mut message: OutboundMessage) -> Result<MessageStatus> {
        let outcome = self.attempt(&message).await;
        let now = SystemTime::now();

        match outcome {
            Ok(()) => {
                info!(id = %message.id, recipient = message.recipient, "Delivered");
                message.mark_sent(now);
            }
            Err(e) if e.is_permanent() => {
                warn!(id = %message.id, error = %e, "Permanent failure, not retrying");
                message.mark_unroutable(e.to_string(), now);
            }
            Err(e) => {
                let failures = message.retry_count + 1;
                if failures >= self.config.retry.max_retries {
                    warn!(
                        id = %message.id,
                        failures,
                        error = %e,
                        "Retries exhausted, abandoning message"
                    );
                    message.mark_exhausted(e.to_string(), now);
                } else {
                    let delay =
                        retry::backoff_delay(self.config.retry.backoff_factor, failures);
                    warn!(
                        id = %message.id,
                        failures,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "Delivery failed, scheduling retry"
                    );
                    message.schedule_retry(e.to_string(), now + delay, now);
                }
            }
        }

        let status = message.status;
        self.store.update(&message).await?;

        Ok(status)
    }

    async fn attempt(&self, message: &OutboundMessage) -> Result<()> {
        let recipient = Mailbox::parse(&message.recipient)
            .map_err(|e| DeliveryError::InvalidAddress(format!("{}: {e}", message.recipient)))?;

        let (host, port) = match &self.config.relay {
            Some(relay) => (relay.host.clone(), relay.port),
            None => {
                let exchangers = self.resolver.lookup(recipient.domain()).await;
                match exchangers.into_iter().next() {
                    Some(exchanger) => (exchanger, 25),
                    None => {
                        return Err(DeliveryError::NoRoute(recipient.domain().to_string()));
                    }
                }
            }
        };

        let rendered = message
            .payload
            .render(&message.id, &message.sender, &message.recipient);

        let body = match &self.signer {
            None => rendered,
            Some(signer) => match signer.sign(&rendered).await {
                SigningOutcome::Signed(signed) => signed,
                SigningOutcome::Failed(reason) => {
                    let policy = self
                        .config
                        .dkim
                        .as_ref()
                        .map_or(SigningFailurePolicy::Abort, |dkim| dkim.on_failure);

                    match policy {
                        SigningFailurePolicy::Abort => {
                            return Err(DeliveryError::SigningFailed(reason));
                        }
                        SigningFailurePolicy::SendUnsigned => {
                            warn!(id = %message.id, reason, "Sending unsigned: DKIM failed");
                            rendered
                        }
                    }
                }
            },
        };

        self.transmit(&host, port, &message.sender, &message.recipient, &body)
            .await
    }

    async fn transmit(
        &self,
        host: &str,
        port: u16,
        sender: &str,
        recipient: &str,
        body: &[u8],
    ) -> Result<()> {
        let connect_timeout = Duration::from_secs(self.config.transport.connect_secs);

        let (mut client, greeting) =
            match tokio::time::timeout(connect_timeout, SmtpClient::connect(host, port)).await {
                Ok(Ok(connected)) => connected,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(DeliveryError::Transport(format!(
                        "connect to {host}:{port} timed out"
                    )));
                }
            };

        expect(&greeting, "greeting", Response::is_success)?;

        let helo = self
            .exchange("HELO", client.helo(&self.config.transport.helo_hostname))
            .await?;
        expect(&helo, "HELO", Response::is_success)?;

        let mail = self
            .exchange("MAIL FROM", client.mail_from(sender))
            .await?;
        expect(&mail, "MAIL FROM", Response::is_success)?;

        let rcpt = self.exchange("RCPT TO", client.rcpt_to(recipient)).await?;
        expect(&rcpt, "RCPT TO", Response::is_success)?;

        let data = self.exchange("DATA", client.data()).await?;
        expect(&data, "DATA", Response::is_intermediate)?;

        let accepted = self
            .exchange("message body", client.send_message(body))
            .await?;
        expect(&accepted, "message body", Response::is_success)?;

        // QUIT is courtesy; the message is already accepted.
        let _ = tokio::time::timeout(
            Duration::from_secs(self.config.transport.read_secs),
            client.quit(),
        )
        .await;

        Ok(())
    }

    async fn exchange<T>(
        &self,
        step: &str,
        exchange: impl Future<Output = ferrier_smtp::Result<T>>,
    ) -> Result<T> {
        let read_timeout = Duration::from_secs(self.config.transport.read_secs);

        match tokio::time::timeout(read_timeout, exchange).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DeliveryError::Transport(format!("{step} timed out"))),
        }
    }
}

fn expect(reply: &Response, step: &str, accept: impl Fn(&Response) -> bool) -> Result<()> {
    if accept(reply) {
        Ok(())
    } else {
        Err(DeliveryError::Transport(format!(
            "{step} rejected: {} {}",
            reply.code,
            reply.message()
        )))
    }
}

#[cfg(test)]
mod tests {
    use ferrier_queue::{MemoryQueueStore, MessagePayload, NewMessage};

    use super::*;

    #[derive(Debug)]
    struct StaticRoutes(Vec<String>);

    #[async_trait::async_trait]
    impl MxLookup for StaticRoutes {
        async fn lookup(&self, _domain: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn orchestrator(
        store: Arc<MemoryQueueStore>,
        routes: Vec<String>,
        config: DeliveryConfig,
    ) -> DeliveryOrchestrator {
        DeliveryOrchestrator::new(store, Arc::new(StaticRoutes(routes)), config)
    }

    async fn claimed(store: &MemoryQueueStore, recipient: &str) -> OutboundMessage {
        store
            .enqueue(NewMessage {
                sender: "sender@example.com".to_string(),
                recipient: recipient.to_string(),
                payload: MessagePayload::Raw(b"Subject: hi\r\n\r\nhello\r\n".to_vec()),
            })
            .await
            .unwrap();

        store
            .claim_due(1, SystemTime::now())
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn malformed_recipient_fails_permanently() {
        let store = Arc::new(MemoryQueueStore::new());
        let orchestrator = orchestrator(Arc::clone(&store), vec![], DeliveryConfig::default());

        let message = claimed(&store, "not-an-address").await;
        let id = message.id;

        let status = orchestrator.deliver(message).await.unwrap();
        assert_eq!(status, MessageStatus::Failed);

        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.retry_count, 0);
        assert!(stored.error_message.unwrap().contains("invalid recipient"));
    }

    #[tokio::test]
    async fn no_route_schedules_retry() {
        let store = Arc::new(MemoryQueueStore::new());
        let orchestrator = orchestrator(Arc::clone(&store), vec![], DeliveryConfig::default());

        let message = claimed(&store, "user@example.net").await;
        let id = message.id;
        let before = SystemTime::now();

        let status = orchestrator.deliver(message).await.unwrap();
        assert_eq!(status, MessageStatus::Retry);

        let stored = store.get(&id).await.unwrap();
        assert_eq!(stored.retry_count, 1);
        assert!(stored.error_message.unwrap().contains("no mail route"));
        // First retry waits backoff_factor^1 = 2 minutes.
        assert!(stored.next_retry_at >= before + Duration::from_secs(2 * 60));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_message() {
        let store = Arc::new(MemoryQueueStore::new());
        let orchestrator = orchestrator(Arc::clone(&store), vec![], DeliveryConfig::default());

        let mut message = claimed(&store, "user@example.net").await;
        message.retry_count = 4;
        store.update(&message).await.unwrap();

        let status = orchestrator.deliver(message).await.unwrap();
        assert_eq!(status, MessageStatus::Failed);

        let stored = store
            .claim_due(10, SystemTime::now() + Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(stored.is_empty(), "failed message must not be claimable");
    }
}
