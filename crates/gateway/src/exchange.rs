//! One protocol client per endpoint, behind a single subscribe surface

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{EventSender, ProtocolClient};
use crate::config::{ClientConfig, Credentials, Endpoint};
use crate::error::{GatewayError, Result};
use crate::handler::MessageHandler;
use crate::subscription::Subscription;
use crate::transport::Connector;

pub struct ExchangeClient {
    clients: HashMap<Endpoint, Arc<ProtocolClient>>,
}

impl ExchangeClient {
    /// Build public and business clients, plus a private one when
    /// credentials are given
    pub fn new(
        config: &ClientConfig,
        credentials: Option<Credentials>,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn MessageHandler>,
        events: Option<EventSender>,
    ) -> Self {
        let mut clients = HashMap::new();
        for endpoint in Endpoint::ALL {
            if endpoint.requires_login() && credentials.is_none() {
                continue;
            }
            let mut client =
                ProtocolClient::new(endpoint, config.clone(), connector.clone(), handler.clone());
            if endpoint.requires_login()
                && let Some(credentials) = &credentials
            {
                client = client.with_credentials(credentials.clone());
            }
            if let Some(events) = &events {
                client = client.with_events(events.clone());
            }
            clients.insert(endpoint, Arc::new(client));
        }
        Self { clients }
    }

    pub fn client(&self, endpoint: Endpoint) -> Option<Arc<ProtocolClient>> {
        self.clients.get(&endpoint).cloned()
    }

    pub fn has_private(&self) -> bool {
        self.clients.contains_key(&Endpoint::Private)
    }

    /// Connect every endpoint; stops at the first failure
    pub async fn connect_all(&self) -> Result<()> {
        for endpoint in Endpoint::ALL {
            if let Some(client) = self.clients.get(&endpoint) {
                client.connect().await?;
            }
        }
        Ok(())
    }

    pub async fn disconnect_all(&self) {
        for client in self.clients.values() {
            client.disconnect().await;
        }
    }

    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        self.route(&subscription)?.subscribe(subscription).await
    }

    pub async fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.route(subscription)?.unsubscribe(subscription).await
    }

    fn route(&self, subscription: &Subscription) -> Result<&ProtocolClient> {
        subscription.validate()?;
        let endpoint = subscription.endpoint().ok_or_else(|| {
            GatewayError::Validation(format!("unknown channel '{}'", subscription.channel()))
        })?;
        self.clients
            .get(&endpoint)
            .map(Arc::as_ref)
            .ok_or_else(|| {
                GatewayError::Validation(format!(
                    "channel '{}' needs the {} endpoint, which requires credentials",
                    subscription.channel(),
                    endpoint
                ))
            })
    }
}
