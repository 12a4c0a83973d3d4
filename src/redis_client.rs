use redis::{aio::ConnectionManager, Client};

/// Prefix keeping gateway keys apart from other tenants of a shared Redis.
const KEY_PREFIX: &str = "capx:";

/// Redis connection shared by every gateway instance. The connection manager
/// reconnects on its own after a dropped connection.
#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_connection_manager().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(RedisClient { conn })
    }

    pub fn key(name: &str) -> String {
        format!("{KEY_PREFIX}{name}")
    }
}
