use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

/// Outcome of one fixed-window hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub ttl_secs: u64,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!(url = %url, "connected to Redis");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Increment `key` inside a window of `window_secs`, starting the window
    /// on the first hit. Returns the hit count and the seconds left in the window.
    pub async fn window_hit(&self, key: &str, window_secs: u64) -> Result<WindowHit, redis::RedisError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await?;
        if count == 1 {
            conn.expire::<_, ()>(key, window_secs as i64).await?;
        }
        let ttl: i64 = conn.ttl(key).await?;
        // -1 means the expiry was lost (e.g. crash between INCR and EXPIRE).
        if ttl < 0 {
            conn.expire::<_, ()>(key, window_secs as i64).await?;
        }
        Ok(WindowHit {
            count,
            ttl_secs: if ttl > 0 { ttl as u64 } else { window_secs },
        })
    }
}
