//! Network-first: fresh data when reachable, cached data when not.

use super::{Resolution, ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
use crate::http::Request;
use crate::Error;

impl StrategyEngine {
    pub(crate) async fn network_first(&self, request: &Request, config: &StrategyConfig) -> Result<Resolution, Error> {
        let key = request.cache_key();

        match self.fetch_network(request).await {
            Ok(response) => {
                self.write_back(&config.partition, &key, &response, config.max_age_ms, StrategyKind::NetworkFirst)
                    .await;
                Ok(Resolution::new(response, ResponseSource::Network))
            }
            Err(err) => {
                tracing::debug!(%key, strategy = "network-first", error = %err, "network failed, trying cache");
                match self.lookup(&config.partition, &key, StrategyKind::NetworkFirst).await {
                    Some(entry) => Ok(Resolution::new(entry.value, ResponseSource::CacheFallback)),
                    None => Err(err),
                }
            }
        }
    }
}
