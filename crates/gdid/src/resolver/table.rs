use std::sync::Arc;

use crate::{
    atom::Atom,
    endpoint::{Endpoint, EndpointAssignment},
    resolver::{ShardKey, shard_position},
};

/// Identifies one resolution-cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub remote_address: String,
    pub contract: String,
    pub network: Atom,
    pub binding: Atom,
}

impl RequestKey {
    pub fn new(
        remote_address: impl Into<String>,
        contract: impl Into<String>,
        network: Atom,
        binding: Atom,
    ) -> Self {
        Self {
            remote_address: remote_address.into(),
            contract: contract.into(),
            network,
            binding,
        }
    }
}

/// One shard: its index and its endpoints in priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shard {
    index: u32,
    assignments: Vec<EndpointAssignment>,
}

impl Shard {
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Endpoints in the order calls should try them.
    pub fn assignments(&self) -> &[EndpointAssignment] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Immutable result of resolving a [`RequestKey`]: the matching endpoints
/// grouped by shard (ascending shard index), each shard ordered by priority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardTable {
    shards: Vec<Shard>,
}

impl ShardTable {
    /// Builds a table from `endpoints` (in registration order). Returns `None`
    /// if nothing matches `key`.
    pub fn build(key: &RequestKey, endpoints: &[Arc<Endpoint>]) -> Option<Self> {
        let mut matching: Vec<&Arc<Endpoint>> = endpoints
            .iter()
            .filter(|e| e.serves(&key.remote_address, &key.contract, key.network, key.binding))
            .collect();

        if matching.is_empty() {
            return None;
        }

        // Stable sort keeps registration order for equal (shard, order) pairs.
        matching.sort_by_key(|e| (e.shard(), e.shard_order()));

        let mut shards: Vec<Shard> = Vec::new();
        for endpoint in matching {
            let assignment = EndpointAssignment::new(
                Arc::clone(endpoint),
                key.remote_address.clone(),
                key.contract.clone(),
            );
            match shards.last_mut() {
                Some(shard) if shard.index == endpoint.shard() => {
                    shard.assignments.push(assignment);
                }
                _ => shards.push(Shard {
                    index: endpoint.shard(),
                    assignments: vec![assignment],
                }),
            }
        }

        Some(Self { shards })
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Position in [`Self::shards`] that serves `key`, or `None` if the table
    /// is empty.
    pub fn position_for<K: ShardKey + ?Sized>(&self, key: &K) -> Option<usize> {
        shard_position(key, self.shards.len())
    }

    /// The shard that serves `key`.
    pub fn select<K: ShardKey + ?Sized>(&self, key: &K) -> Option<&Shard> {
        self.position_for(key).map(|i| &self.shards[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Atom {
        Atom::encode(s).unwrap()
    }

    fn ep(contract: &str, shard: u32, order: i32, node: &str) -> Arc<Endpoint> {
        Arc::new(Endpoint::new("*", contract, atom("noc"), atom("grpc"), shard, order, node).unwrap())
    }

    fn key(contract: &str) -> RequestKey {
        RequestKey::new("sky://idgen", contract, atom("noc"), atom("grpc"))
    }

    fn nodes(shard: &Shard) -> Vec<&str> {
        shard.assignments().iter().map(|a| a.node()).collect()
    }

    #[test]
    fn groups_and_orders_shards() {
        let endpoints = vec![
            ep("svc", 1, 5, "n1-b"),
            ep("svc", 0, 2, "n0-b"),
            ep("svc", 1, 1, "n1-a"),
            ep("other", 0, 0, "x"),
            ep("svc", 0, 1, "n0-a"),
        ];
        let table = ShardTable::build(&key("svc"), &endpoints).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.shards()[0].index(), 0);
        assert_eq!(nodes(&table.shards()[0]), ["n0-a", "n0-b"]);
        assert_eq!(table.shards()[1].index(), 1);
        assert_eq!(nodes(&table.shards()[1]), ["n1-a", "n1-b"]);

        let a = &table.shards()[0].assignments()[0];
        assert_eq!(a.remote_address(), "sky://idgen");
        assert_eq!(a.contract(), "svc");
    }

    #[test]
    fn ties_keep_registration_order() {
        let endpoints = vec![ep("svc", 0, 0, "first"), ep("svc", 0, 0, "second")];
        let table = ShardTable::build(&key("svc"), &endpoints).unwrap();
        assert_eq!(nodes(&table.shards()[0]), ["first", "second"]);
    }

    #[test]
    fn sparse_shard_indices_are_compacted_by_position() {
        let endpoints = vec![ep("svc", 10, 0, "ten"), ep("svc", 3, 0, "three")];
        let table = ShardTable::build(&key("svc"), &endpoints).unwrap();

        assert_eq!(table.select(&0_u64).unwrap().index(), 3);
        assert_eq!(table.select(&1_u64).unwrap().index(), 10);
        assert_eq!(table.select(&2_u64).unwrap().index(), 3);
    }

    #[test]
    fn no_match_is_none() {
        let endpoints = vec![ep("svc", 0, 0, "a")];
        assert!(ShardTable::build(&key("nope"), &endpoints).is_none());
        assert!(ShardTable::build(&key("svc"), &[]).is_none());
    }
}
