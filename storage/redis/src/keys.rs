use byteorder::{BigEndian, ByteOrder};
use redis::{RedisWrite, ToRedisArgs};

/// The single byte key prefix for all keys stored in Redis.
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum CachePrefix {
    /// Per-user profile hashes: username, roles, last_seen, created_at, summary.
    UserMemory = 1_u8,
    /// Per-user lists of remembered facts, oldest first.
    UserFacts = 2_u8,
    /// The dashboard event log. A single list, newest entry first. No secondary key.
    EventLog = 3_u8,
}

impl CachePrefix {
    pub fn make_key<T>(self, data: T) -> PrefixedKey<Self, T> {
        PrefixedKey(self, data)
    }
}

impl From<CachePrefix> for u8 {
    fn from(value: CachePrefix) -> Self {
        value as u8
    }
}

/// A prefixed key schema for 64-bit integer keys. Implements ToRedisArgs, so its generically
/// usable as an argument to direct Redis calls.
#[derive(Copy, Clone, Debug)]
pub struct PrefixedKey<P: Into<u8> + Clone, T>(pub P, pub T);
pub type CacheKey<T> = PrefixedKey<CachePrefix, T>;

impl<P: Into<u8> + Clone> ToRedisArgs for PrefixedKey<P, ()> {
    fn write_redis_args<W: ?Sized>(&self, out: &mut W)
    where
        W: RedisWrite,
    {
        let key_enc = [self.0.clone().into(); 1];
        out.write_arg(&key_enc[..]);
    }
}

impl<P: Into<u8> + Clone> ToRedisArgs for PrefixedKey<P, u64> {
    fn write_redis_args<W: ?Sized>(&self, out: &mut W)
    where
        W: RedisWrite,
    {
        let mut key_enc = [self.0.clone().into(); 9];
        BigEndian::write_u64(&mut key_enc[1..9], self.1);
        out.write_arg(&key_enc[..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_key_is_prefix_only() {
        let args = CachePrefix::EventLog.make_key(()).to_redis_args();
        assert_eq!(args, vec![vec![3_u8]]);
    }

    #[test]
    fn test_id_key_is_big_endian() {
        let args = CachePrefix::UserFacts.make_key(0x0102_0304_0506_0708_u64).to_redis_args();
        assert_eq!(args, vec![vec![2, 1, 2, 3, 4, 5, 6, 7, 8]]);
    }
}
