//! Typed RPC methods.
//!
//! Only the calls the client makes itself get a dedicated variant;
//! anything else goes through [`Method::Raw`].
//!
//! | Group | Methods |
//! |-------|---------|
//! | `system` | chain, name, version, health, properties |
//! | `chain` | block hash, header, finalized head |
//! | `state` | runtime version, metadata, storage |
//! | `rpc` | method listing |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

// ============================================================================
// Method
// ============================================================================

/// A JSON-RPC method call with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    /// Chain name, e.g. `"Subsocial"`.
    SystemChain,
    /// Node implementation name.
    SystemName,
    /// Node implementation version.
    SystemVersion,
    /// Peer count and sync status.
    SystemHealth,
    /// Chain spec properties (token symbol, decimals).
    SystemProperties,
    /// Methods exposed by the node.
    RpcMethods,

    /// Block hash by number, or the best block when `None`.
    ChainGetBlockHash {
        /// Block number.
        number: Option<u64>,
    },
    /// Block header by hash, or the best header when `None`.
    ChainGetHeader {
        /// Block hash, `0x`-prefixed.
        hash: Option<String>,
    },
    /// Hash of the last finalized block.
    ChainGetFinalizedHead,

    /// Runtime spec name and version.
    StateGetRuntimeVersion,
    /// SCALE-encoded runtime metadata.
    StateGetMetadata,
    /// Raw storage value.
    StateGetStorage {
        /// Hex storage key.
        key: String,
        /// Block hash to read at, best block when `None`.
        at: Option<String>,
    },

    /// Any other method.
    Raw {
        /// Method name.
        name: String,
        /// Positional parameters.
        params: Vec<Value>,
    },
}

impl Method {
    /// Creates a raw method call.
    #[inline]
    #[must_use]
    pub fn raw(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Raw {
            name: name.into(),
            params,
        }
    }

    /// Returns the wire method name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SystemChain => "system_chain",
            Self::SystemName => "system_name",
            Self::SystemVersion => "system_version",
            Self::SystemHealth => "system_health",
            Self::SystemProperties => "system_properties",
            Self::RpcMethods => "rpc_methods",
            Self::ChainGetBlockHash { .. } => "chain_getBlockHash",
            Self::ChainGetHeader { .. } => "chain_getHeader",
            Self::ChainGetFinalizedHead => "chain_getFinalizedHead",
            Self::StateGetRuntimeVersion => "state_getRuntimeVersion",
            Self::StateGetMetadata => "state_getMetadata",
            Self::StateGetStorage { .. } => "state_getStorage",
            Self::Raw { name, .. } => name,
        }
    }

    /// Returns the positional parameters.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        match self {
            Self::ChainGetBlockHash { number: Some(n) } => vec![json!(n)],
            Self::ChainGetHeader { hash: Some(h) } => vec![json!(h)],
            Self::StateGetStorage { key, at } => {
                let mut params = vec![json!(key)];
                if let Some(at) = at {
                    params.push(json!(at));
                }
                params
            }
            Self::Raw { params, .. } => params.clone(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// SubscriptionMethod
// ============================================================================

/// A pub/sub method pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionMethod {
    /// New best block headers.
    NewHeads,
    /// Finalized block headers.
    FinalizedHeads,
    /// Runtime upgrades.
    RuntimeVersion,
    /// Changes to the given storage keys.
    Storage {
        /// Hex storage keys.
        keys: Vec<String>,
    },
    /// Any other subscription.
    Raw {
        /// Subscribe method name.
        subscribe: String,
        /// Unsubscribe method name.
        unsubscribe: String,
        /// Positional parameters for the subscribe call.
        params: Vec<Value>,
    },
}

impl SubscriptionMethod {
    /// Returns the subscribe method name.
    #[must_use]
    pub fn subscribe_name(&self) -> &str {
        match self {
            Self::NewHeads => "chain_subscribeNewHeads",
            Self::FinalizedHeads => "chain_subscribeFinalizedHeads",
            Self::RuntimeVersion => "state_subscribeRuntimeVersion",
            Self::Storage { .. } => "state_subscribeStorage",
            Self::Raw { subscribe, .. } => subscribe,
        }
    }

    /// Returns the unsubscribe method name.
    #[must_use]
    pub fn unsubscribe_name(&self) -> &str {
        match self {
            Self::NewHeads => "chain_unsubscribeNewHeads",
            Self::FinalizedHeads => "chain_unsubscribeFinalizedHeads",
            Self::RuntimeVersion => "state_unsubscribeRuntimeVersion",
            Self::Storage { .. } => "state_unsubscribeStorage",
            Self::Raw { unsubscribe, .. } => unsubscribe,
        }
    }

    /// Returns the parameters of the subscribe call.
    #[must_use]
    pub fn params(&self) -> Vec<Value> {
        match self {
            Self::Storage { keys } => vec![json!(keys)],
            Self::Raw { params, .. } => params.clone(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_methods_have_no_params() {
        for method in [Method::SystemChain, Method::SystemName, Method::SystemVersion] {
            assert!(method.params().is_empty());
            assert!(method.name().starts_with("system_"));
        }
    }

    #[test]
    fn test_block_hash_params() {
        let genesis = Method::ChainGetBlockHash { number: Some(0) };
        assert_eq!(genesis.name(), "chain_getBlockHash");
        assert_eq!(genesis.params(), vec![json!(0)]);

        let best = Method::ChainGetBlockHash { number: None };
        assert!(best.params().is_empty());
    }

    #[test]
    fn test_storage_params_with_block() {
        let method = Method::StateGetStorage {
            key: "0x01".into(),
            at: Some("0xff".into()),
        };
        assert_eq!(method.params(), vec![json!("0x01"), json!("0xff")]);
    }

    #[test]
    fn test_raw_method() {
        let method = Method::raw("author_pendingExtrinsics", vec![]);
        assert_eq!(method.name(), "author_pendingExtrinsics");
    }

    #[test]
    fn test_storage_subscription() {
        let method = SubscriptionMethod::Storage {
            keys: vec!["0xaa".into(), "0xbb".into()],
        };
        assert_eq!(method.subscribe_name(), "state_subscribeStorage");
        assert_eq!(method.unsubscribe_name(), "state_unsubscribeStorage");
        assert_eq!(method.params(), vec![json!(["0xaa", "0xbb"])]);
    }
}
