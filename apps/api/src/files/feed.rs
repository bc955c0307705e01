//! Live upload notifications, one Redis pub/sub channel per user.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::auth::UserId;
use crate::models::file::UploadedFile;
use crate::store::StoreError;

#[async_trait]
pub trait UploadFeed: Send + Sync {
    async fn publish(&self, user: &UserId, file: &UploadedFile) -> Result<(), StoreError>;

    /// Files uploaded by `user` from now on. Dropping the stream unsubscribes.
    async fn subscribe(
        &self,
        user: &UserId,
    ) -> Result<BoxStream<'static, UploadedFile>, StoreError>;
}

fn channel(user: &UserId) -> String {
    format!("uploads:{user}")
}

pub struct RedisFeed {
    client: redis::Client,
    publisher: MultiplexedConnection,
}

impl RedisFeed {
    /// Opens the shared publishing connection. Subscribers get their own.
    pub async fn connect(client: redis::Client) -> redis::RedisResult<Self> {
        let publisher = client.get_multiplexed_async_connection().await?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl UploadFeed for RedisFeed {
    async fn publish(&self, user: &UserId, file: &UploadedFile) -> Result<(), StoreError> {
        let payload = serde_json::to_string(file)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(channel(user), payload)
            .await
            .map_err(|e| StoreError::Feed(format!("publish failed: {e}")))?;
        debug!("Announced upload {} to {receivers} listener(s)", file.id);
        Ok(())
    }

    async fn subscribe(
        &self,
        user: &UserId,
    ) -> Result<BoxStream<'static, UploadedFile>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Feed(format!("subscribe connection failed: {e}")))?;
        pubsub
            .subscribe(channel(user))
            .await
            .map_err(|e| StoreError::Feed(format!("subscribe failed: {e}")))?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            match serde_json::from_str::<UploadedFile>(&payload) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Dropping undecodable upload notification: {e}");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
