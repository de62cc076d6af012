//! Redis Backend - Production Connections
//!
//! TigerStyle: one multiplexed connection per pool slot, explicit `AUTH`
//! handshake, `MULTI`/`EXEC` for batches.

use ::redis::aio::MultiplexedConnection;
use ::redis::{cmd, pipe, Client};
use async_trait::async_trait;

use super::{KvConnection, WriteOp};
use crate::config::BackendConfig;
use crate::error::{FortuneError, FortuneResult};
use crate::pool::ManageConnection;

// =============================================================================
// RedisConnector
// =============================================================================

/// Dials Redis for a `ConnectionPool`.
pub struct RedisConnector {
    client: Client,
    address: String,
    credential: Option<String>,
}

impl RedisConnector {
    /// Build a connector from config. Nothing is dialed yet.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the address is not a usable Redis URL.
    pub fn new(config: &BackendConfig) -> FortuneResult<Self> {
        config.validate()?;
        let url = config.url();
        let client = Client::open(url.as_str())
            .map_err(|e| FortuneError::InvalidConfig(format!("backend address {url}: {e}")))?;

        Ok(Self {
            client,
            address: config.address.clone(),
            credential: config.credential.clone(),
        })
    }

    /// Address this connector dials.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ManageConnection for RedisConnector {
    type Connection = RedisConnection;

    async fn connect(&self) -> FortuneResult<RedisConnection> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FortuneError::unavailable(format!("cannot connect to {}: {e}", self.address)))?;

        if let Some(credential) = &self.credential {
            let _: () = cmd("AUTH")
                .arg(credential)
                .query_async(&mut conn)
                .await
                .map_err(|e| FortuneError::unavailable(format!("authentication failed: {e}")))?;
        }

        Ok(RedisConnection { conn })
    }

    async fn is_valid(&self, conn: &mut RedisConnection) -> FortuneResult<()> {
        conn.ping().await
    }
}

// =============================================================================
// RedisConnection
// =============================================================================

/// A live Redis connection.
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl KvConnection for RedisConnection {
    async fn ping(&mut self) -> FortuneResult<()> {
        let _: String = cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn set_add(&mut self, key: &str, member: &str) -> FortuneResult<bool> {
        let added: i64 = cmd("SADD").arg(key).arg(member).query_async(&mut self.conn).await?;
        Ok(added > 0)
    }

    async fn set_is_member(&mut self, key: &str, member: &str) -> FortuneResult<bool> {
        let member: bool = cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut self.conn)
            .await?;
        Ok(member)
    }

    async fn set_random_member(&mut self, key: &str) -> FortuneResult<Option<String>> {
        let member: Option<String> = cmd("SRANDMEMBER").arg(key).query_async(&mut self.conn).await?;
        Ok(member)
    }

    async fn set_members(&mut self, key: &str) -> FortuneResult<Vec<String>> {
        let members: Vec<String> = cmd("SMEMBERS").arg(key).query_async(&mut self.conn).await?;
        Ok(members)
    }

    async fn set_cardinality(&mut self, key: &str) -> FortuneResult<usize> {
        let n: usize = cmd("SCARD").arg(key).query_async(&mut self.conn).await?;
        Ok(n)
    }

    async fn get(&mut self, key: &str) -> FortuneResult<Option<String>> {
        let value: Option<String> = cmd("GET").arg(key).query_async(&mut self.conn).await?;
        Ok(value)
    }

    async fn set(&mut self, key: &str, value: &str) -> FortuneResult<()> {
        let _: () = cmd("SET").arg(key).arg(value).query_async(&mut self.conn).await?;
        Ok(())
    }

    async fn incr(&mut self, key: &str) -> FortuneResult<u64> {
        let n: u64 = cmd("INCR").arg(key).query_async(&mut self.conn).await?;
        Ok(n)
    }

    async fn exec_atomic(&mut self, ops: &[WriteOp]) -> FortuneResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut batch = pipe();
        batch.atomic();
        for op in ops {
            match op {
                WriteOp::Set { key, value } => batch.cmd("SET").arg(key).arg(value).ignore(),
                WriteOp::SetAdd { key, member } => batch.cmd("SADD").arg(key).arg(member).ignore(),
                WriteOp::SetRemove { key, member } => {
                    batch.cmd("SREM").arg(key).arg(member).ignore()
                }
                WriteOp::Delete { key } => batch.cmd("DEL").arg(key).ignore(),
            };
        }

        let _: () = batch.query_async(&mut self.conn).await?;
        Ok(())
    }
}

// =============================================================================
// Tests (require running Redis)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::context::FortuneContext;
    use std::env;

    /// Get test Redis address from environment.
    fn test_redis_url() -> Option<String> {
        env::var("TEST_REDIS_URL").ok()
    }

    /// Skip test if no Redis available.
    macro_rules! require_redis {
        () => {
            match test_redis_url() {
                Some(url) => url,
                None => {
                    eprintln!("Skipping test: TEST_REDIS_URL not set");
                    return;
                }
            }
        };
    }

    #[test]
    fn test_connector_rejects_bad_address() {
        let config = BackendConfig::new("redis://[::1");
        assert!(matches!(
            RedisConnector::new(&config),
            Err(FortuneError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Port 1 is never a Redis server.
        let connector = RedisConnector::new(&BackendConfig::new("127.0.0.1:1")).unwrap();
        let err = connector.connect().await.err().unwrap();
        assert!(err.is_unavailable(), "got {err}");
    }

    #[tokio::test]
    async fn test_redis_primitives() {
        let url = require_redis!();
        let connector = RedisConnector::new(&BackendConfig::new(url)).unwrap();
        let mut conn = connector.connect().await.unwrap();

        conn.ping().await.unwrap();
        conn.exec_atomic(&[
            WriteOp::delete("rfortune-test/set"),
            WriteOp::delete("rfortune-test/scalar"),
        ])
        .await
        .unwrap();

        assert!(conn.set_add("rfortune-test/set", "a").await.unwrap());
        assert!(!conn.set_add("rfortune-test/set", "a").await.unwrap());
        assert!(conn.set_is_member("rfortune-test/set", "a").await.unwrap());
        assert_eq!(conn.set_cardinality("rfortune-test/set").await.unwrap(), 1);
        assert_eq!(
            conn.set_random_member("rfortune-test/set").await.unwrap(),
            Some("a".to_string())
        );
        assert_eq!(conn.set_random_member("rfortune-test/none").await.unwrap(), None);

        conn.set("rfortune-test/scalar", "x\ny").await.unwrap();
        assert_eq!(
            conn.get("rfortune-test/scalar").await.unwrap().as_deref(),
            Some("x\ny")
        );

        let before = conn.incr("rfortune-test/counter").await.unwrap();
        assert_eq!(conn.incr("rfortune-test/counter").await.unwrap(), before + 1);
    }

    #[tokio::test]
    async fn test_redis_round_trip() {
        let url = require_redis!();
        let connector = RedisConnector::new(&BackendConfig::new(url)).unwrap();
        let ctx = FortuneContext::new(connector, PoolConfig::default());

        match ctx.clear_module("rfortune-test-mod").await {
            Ok(_) | Err(FortuneError::ModuleNotFound(_)) => {}
            Err(e) => panic!("reset failed: {e}"),
        }
        ctx.load_reader("rfortune-test-mod", "line 1\nline 2\n%\n".as_bytes())
            .await
            .unwrap();

        let fortune = ctx.pick_random(Some("rfortune-test-mod")).await.unwrap();
        assert_eq!(fortune.text, "line 1\nline 2");
        assert_eq!(
            ctx.fetch("rfortune-test-mod", fortune.id).await.unwrap(),
            fortune
        );

        ctx.clear_module("rfortune-test-mod").await.unwrap();
    }
}
