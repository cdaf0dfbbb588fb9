use std::sync::Arc;

use crate::{
    atom::Atom,
    error::{Error, Result},
    pattern::matches_pattern,
};

/// Configuration-provided description of one remote endpoint.
///
/// This is the registry's input format. It is turned into an [`Endpoint`] via
/// [`TryFrom`], which validates the atoms and patterns.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndpointDescriptor {
    /// Wildcard pattern of remote addresses this endpoint serves.
    pub remote_address: String,
    /// Wildcard pattern of contracts this endpoint implements.
    pub contract: String,
    /// Network name.
    pub network: String,
    /// Binding (protocol) name.
    pub binding: String,
    /// Shard this endpoint belongs to.
    pub shard: u32,
    /// Priority inside the shard. Lower values are tried first.
    #[cfg_attr(feature = "serde", serde(default))]
    pub shard_order: i32,
    /// Physical address a transport connects to, e.g. `http://10.0.0.7:7000`.
    pub node: String,
}

/// An immutable, registered remote endpoint.
///
/// Equality and hashing are structural, which makes endpoints (and the
/// [`EndpointAssignment`]s built from them) usable as cache keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    remote_address: String,
    contract: String,
    network: Atom,
    binding: Atom,
    shard: u32,
    shard_order: i32,
    node: String,
}

impl Endpoint {
    /// Creates an endpoint from already-parsed parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if a pattern or the node is blank.
    pub fn new(
        remote_address: impl Into<String>,
        contract: impl Into<String>,
        network: Atom,
        binding: Atom,
        shard: u32,
        shard_order: i32,
        node: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = Self {
            remote_address: remote_address.into(),
            contract: contract.into(),
            network,
            binding,
            shard,
            shard_order,
            node: node.into(),
        };

        for (name, value) in [
            ("remote_address", &endpoint.remote_address),
            ("contract", &endpoint.contract),
            ("node", &endpoint.node),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidEndpoint {
                    reason: format!("`{name}` must not be blank"),
                });
            }
        }

        Ok(endpoint)
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub const fn network(&self) -> Atom {
        self.network
    }

    pub const fn binding(&self) -> Atom {
        self.binding
    }

    pub const fn shard(&self) -> u32 {
        self.shard
    }

    pub const fn shard_order(&self) -> i32 {
        self.shard_order
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Returns `true` if this endpoint can serve `contract` at
    /// `remote_address` over the given network and binding.
    pub fn serves(&self, remote_address: &str, contract: &str, network: Atom, binding: Atom) -> bool {
        self.network == network
            && self.binding == binding
            && matches_pattern(&self.remote_address, remote_address)
            && matches_pattern(&self.contract, contract)
    }
}

impl TryFrom<EndpointDescriptor> for Endpoint {
    type Error = Error;

    fn try_from(desc: EndpointDescriptor) -> Result<Self> {
        Self::new(
            desc.remote_address,
            desc.contract,
            desc.network.parse()?,
            desc.binding.parse()?,
            desc.shard,
            desc.shard_order,
            desc.node,
        )
    }
}

/// A resolved, callable binding of an endpoint to the concrete remote address
/// and contract it was resolved for.
///
/// Used as the key of the transport pool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EndpointAssignment {
    endpoint: Arc<Endpoint>,
    remote_address: String,
    contract: String,
}

impl EndpointAssignment {
    pub fn new(
        endpoint: Arc<Endpoint>,
        remote_address: impl Into<String>,
        contract: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            remote_address: remote_address.into(),
            contract: contract.into(),
        }
    }

    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    pub fn remote_address(&self) -> &str {
        &self.remote_address
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Shorthand for the endpoint's physical node address.
    pub fn node(&self) -> &str {
        self.endpoint.node()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grpc() -> Atom {
        Atom::encode("grpc").unwrap()
    }

    fn noc() -> Atom {
        Atom::encode("noc").unwrap()
    }

    #[test]
    fn serves_matching_requests_only() {
        let ep = Endpoint::new("sky://idgen*", "gdid.*", noc(), grpc(), 0, 0, "http://n1").unwrap();

        assert!(ep.serves("sky://idgen-east", "gdid.authority", noc(), grpc()));
        assert!(ep.serves("SKY://IDGEN", "GDID.authority", noc(), grpc()));
        assert!(!ep.serves("sky://other", "gdid.authority", noc(), grpc()));
        assert!(!ep.serves("sky://idgen", "ledger", noc(), grpc()));
        assert!(!ep.serves("sky://idgen", "gdid.authority", grpc(), grpc()));
        assert!(!ep.serves("sky://idgen", "gdid.authority", noc(), noc()));
    }

    #[test]
    fn descriptor_conversion_validates() {
        let desc = EndpointDescriptor {
            remote_address: "*".into(),
            contract: "gdid".into(),
            network: "noc".into(),
            binding: "grpc".into(),
            shard: 3,
            shard_order: -1,
            node: "http://127.0.0.1:7000".into(),
        };
        let ep = Endpoint::try_from(desc.clone()).unwrap();
        assert_eq!(ep.shard(), 3);
        assert_eq!(ep.shard_order(), -1);
        assert_eq!(ep.network(), noc());

        let bad_atom = EndpointDescriptor {
            network: "not an atom".into(),
            ..desc.clone()
        };
        assert!(matches!(Endpoint::try_from(bad_atom), Err(Error::InvalidAtom { .. })));

        let blank_node = EndpointDescriptor {
            node: "  ".into(),
            ..desc
        };
        assert!(matches!(Endpoint::try_from(blank_node), Err(Error::InvalidEndpoint { .. })));
    }

    #[test]
    fn assignments_compare_structurally() {
        let a = Arc::new(Endpoint::new("*", "*", noc(), grpc(), 0, 0, "http://n1").unwrap());
        let b = Arc::new(Endpoint::new("*", "*", noc(), grpc(), 0, 0, "http://n1").unwrap());

        assert_eq!(
            EndpointAssignment::new(a.clone(), "sky://x", "gdid"),
            EndpointAssignment::new(b, "sky://x", "gdid")
        );
        assert_ne!(
            EndpointAssignment::new(a.clone(), "sky://x", "gdid"),
            EndpointAssignment::new(a, "sky://y", "gdid")
        );
    }
}
