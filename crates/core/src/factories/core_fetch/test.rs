mod exchange;
mod requester;

pub(crate) mod utils {
    use crate::factories::{
        core_fetch::{CoreFetch, CoreFetchConfig},
        MemChannel, MemContentStore, MemNetwork,
    };
    use hashvend_api::PeerId;
    use hashvend_test_utils::id::random_peer_id;
    use std::sync::Arc;

    /// Short timeouts and pauses so failing exchanges give up quickly.
    pub fn test_config() -> CoreFetchConfig {
        CoreFetchConfig {
            response_timeout_ms: 200,
            request_timeout_ms: 1000,
            first_retry_interval_ms: 10,
            last_retry_interval_ms: 20,
            first_back_off_interval_ms: 1000,
            last_back_off_interval_ms: 5000,
            ..Default::default()
        }
    }

    pub struct Side {
        pub peer: PeerId,
        pub store: Arc<MemContentStore>,
        pub channel: Arc<MemChannel>,
        pub fetch: CoreFetch,
    }

    pub struct TestCase {
        pub net: Arc<MemNetwork>,
        pub requester: Side,
        pub responder: Side,
    }

    fn side(net: &Arc<MemNetwork>, config: &CoreFetchConfig) -> Side {
        let channel = net.join(random_peer_id());
        let store = MemContentStore::create();
        let fetch =
            CoreFetch::new(config.clone(), store.clone(), channel.clone());
        Side {
            peer: channel.peer().clone(),
            store,
            channel,
            fetch,
        }
    }

    pub fn setup(config: CoreFetchConfig) -> TestCase {
        let net = MemNetwork::create();
        let requester = side(&net, &config);
        let responder = side(&net, &config);
        TestCase {
            net,
            requester,
            responder,
        }
    }
}

use super::*;

#[test]
fn default_config_uses_module_key() {
    let config = hashvend_api::config::Config::default();
    CoreFetchFactory::create().default_config(&config).unwrap();

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["coreFetch"]["maxBatchSize"], 100);
    assert_eq!(json["coreFetch"]["responseTimeoutMs"], 30_000);
    assert_eq!(json["coreFetch"]["numBackOffIntervals"], 4);

    // registering twice is a conflict
    assert!(CoreFetchFactory::create().default_config(&config).is_err());
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let config: hashvend_api::config::Config = serde_json::from_value(
        serde_json::json!({ "coreFetch": { "maxRetries": 7 } }),
    )
    .unwrap();

    let mod_config: CoreFetchModConfig = config.get_module_config().unwrap();
    assert_eq!(
        CoreFetchConfig {
            max_retries: 7,
            ..Default::default()
        },
        mod_config.core_fetch
    );
}
