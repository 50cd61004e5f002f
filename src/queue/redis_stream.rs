//! Redis Streams-backed `QueueAdapter`.
//!
//! There is no AMQP broker crate anywhere in the reference corpus, so
//! durability and explicit-ack semantics are built on the already-adopted
//! `redis` client: `XADD` for persistent publish, a single consumer group
//! read via `XREADGROUP`, `XACK` to acknowledge, and "requeue" is simply
//! *not* acking — the entry stays pending in the group and is picked back up
//! by the next idle worker's `XCLAIM` sweep once it has aged past the claim
//! threshold. "Drop" acks immediately without further processing, so a
//! poison message is never redelivered.

use super::{Delivery, DeliveryResolver, QueueAdapter, QueueError, SeckillMessage, SECKILL_QUEUE};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const CONSUMER_GROUP: &str = "seckill_workers";
/// Entries idle longer than this are eligible for `XCLAIM` redelivery.
const CLAIM_IDLE_MS: usize = 30_000;

#[derive(Clone)]
pub struct RedisStreamQueue {
    conn: ConnectionManager,
    consumer_name: String,
}

impl RedisStreamQueue {
    pub async fn connect(redis_url: &str, consumer_name: impl Into<String>) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| QueueError::Backend(e.to_string()))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        // MKSTREAM so group creation succeeds even on a brand-new stream;
        // "$" means "only messages published from now on" is wrong for a
        // durable work queue, so we start the group at the beginning ("0").
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(SECKILL_QUEUE)
            .arg(CONSUMER_GROUP)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(e) = created {
            // BUSYGROUP: the group already exists, which is the expected
            // steady-state case after the first worker has started.
            if !e.to_string().contains("BUSYGROUP") {
                return Err(QueueError::Backend(e.to_string()));
            }
        }

        Ok(Self {
            conn,
            consumer_name: consumer_name.into(),
        })
    }

    async fn claim_stale(&self) -> Result<Option<(String, SeckillMessage)>, QueueError> {
        let mut conn = self.conn.clone();
        let reply: redis::Value = redis::cmd("XAUTOCLAIM")
            .arg(SECKILL_QUEUE)
            .arg(CONSUMER_GROUP)
            .arg(&self.consumer_name)
            .arg(CLAIM_IDLE_MS)
            .arg("0-0")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        parse_xautoclaim(reply)
    }
}

fn parse_xautoclaim(
    reply: redis::Value,
) -> Result<Option<(String, SeckillMessage)>, QueueError> {
    let redis::Value::Array(top) = reply else {
        return Ok(None);
    };
    let Some(redis::Value::Array(entries)) = top.into_iter().nth(1) else {
        return Ok(None);
    };
    let Some(first) = entries.into_iter().next() else {
        return Ok(None);
    };
    let redis::Value::Array(entry) = first else {
        return Ok(None);
    };
    let mut it = entry.into_iter();
    let id = match it.next() {
        Some(redis::Value::BulkString(b)) => String::from_utf8_lossy(&b).to_string(),
        _ => return Ok(None),
    };
    let fields = match it.next() {
        Some(redis::Value::Array(f)) => f,
        _ => return Ok(None),
    };
    let msg = fields_to_message(fields)?;
    Ok(Some((id, msg)))
}

fn fields_to_message(fields: Vec<redis::Value>) -> Result<SeckillMessage, QueueError> {
    let mut payload: Option<String> = None;
    let mut chunks = fields.chunks_exact(2);
    for chunk in &mut chunks {
        if let (redis::Value::BulkString(k), redis::Value::BulkString(v)) = (&chunk[0], &chunk[1])
        {
            if k.as_slice() == b"payload" {
                payload = Some(String::from_utf8_lossy(v).to_string());
            }
        }
    }
    let payload = payload.ok_or_else(|| QueueError::Backend("missing payload field".into()))?;
    serde_json::from_str(&payload).map_err(|e| QueueError::Backend(e.to_string()))
}

struct RedisResolver {
    conn: ConnectionManager,
    entry_id: String,
}

#[async_trait]
impl DeliveryResolver for RedisResolver {
    async fn ack(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.xack::<_, _, _, ()>(SECKILL_QUEUE, CONSUMER_GROUP, &[self.entry_id.clone()])
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }

    async fn nack_requeue(&self) -> Result<(), QueueError> {
        // Deliberately not acked: stays pending for the next XAUTOCLAIM sweep.
        Ok(())
    }

    async fn nack_drop(&self) -> Result<(), QueueError> {
        self.ack().await
    }
}

#[async_trait]
impl QueueAdapter for RedisStreamQueue {
    async fn publish(&self, msg: &SeckillMessage) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(msg).map_err(|e| QueueError::Backend(e.to_string()))?;
        let _: String = conn
            .xadd(SECKILL_QUEUE, "*", &[("payload", payload)])
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn consume_one(&self) -> Result<Delivery, QueueError> {
        if let Some((entry_id, msg)) = self.claim_stale().await? {
            let payload = serde_json::to_vec(&msg).map_err(|e| QueueError::Backend(e.to_string()))?;
            return Ok(Delivery {
                payload,
                resolver: Box::new(RedisResolver {
                    conn: self.conn.clone(),
                    entry_id,
                }),
            });
        }

        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamReadReply = conn
            .xread_options(
                &[SECKILL_QUEUE],
                &[">"],
                &redis::streams::StreamReadOptions::default()
                    .group(CONSUMER_GROUP, &self.consumer_name)
                    .block(5_000)
                    .count(1),
            )
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let stream_key = reply
            .keys
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::Backend("no stream entries available".to_string()))?;
        let id = stream_key
            .ids
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::Backend("no stream entries available".to_string()))?;

        let payload: String = id
            .get("payload")
            .ok_or_else(|| QueueError::Backend("missing payload field".to_string()))?;
        let msg: SeckillMessage =
            serde_json::from_str(&payload).map_err(|e| QueueError::Backend(e.to_string()))?;
        let payload_bytes = serde_json::to_vec(&msg).map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Delivery {
            payload: payload_bytes,
            resolver: Box::new(RedisResolver {
                conn: self.conn.clone(),
                entry_id: id.id,
            }),
        })
    }
}
