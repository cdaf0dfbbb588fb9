use crate::gdid::Gdid;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A value that can pick a shard.
///
/// The hash must be stable across processes and builds: two clients routing
/// the same key must land on the same shard. Unsigned integers therefore hash
/// to themselves and strings use FNV-1a, never a randomly seeded hasher.
pub trait ShardKey {
    fn shard_hash(&self) -> u64;
}

/// Returns the position of the shard serving `key` in a table of
/// `shard_count` shards, or `None` if there are no shards.
#[inline]
pub fn shard_position<K: ShardKey + ?Sized>(key: &K, shard_count: usize) -> Option<usize> {
    (shard_count > 0).then(|| (key.shard_hash() % shard_count as u64) as usize)
}

/// 64-bit FNV-1a over `bytes`.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

impl ShardKey for u64 {
    fn shard_hash(&self) -> u64 {
        *self
    }
}

impl ShardKey for u32 {
    fn shard_hash(&self) -> u64 {
        u64::from(*self)
    }
}

impl ShardKey for usize {
    fn shard_hash(&self) -> u64 {
        *self as u64
    }
}

impl ShardKey for i64 {
    fn shard_hash(&self) -> u64 {
        self.unsigned_abs()
    }
}

impl ShardKey for str {
    fn shard_hash(&self) -> u64 {
        fnv1a64(self.as_bytes())
    }
}

impl ShardKey for String {
    fn shard_hash(&self) -> u64 {
        self.as_str().shard_hash()
    }
}

impl ShardKey for Gdid {
    fn shard_hash(&self) -> u64 {
        // Counters are dense, so the low bits spread well; fold the era in so
        // the same counter in two eras does not always collide.
        self.id() ^ u64::from(self.era()).rotate_left(32)
    }
}

impl<K: ShardKey + ?Sized> ShardKey for &K {
    fn shard_hash(&self) -> u64 {
        (**self).shard_hash()
    }
}
