//! Redis Streams backend.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamReadReply;
use tracing::{debug, info};

use crate::error::QueueError;
use crate::store::{RawMessage, StreamCursor, StreamStore};

/// Field name carrying the JSON payload in every stream entry.
pub const DATA_FIELD: &str = "data";

/// Redis-backed stream store (`SET NX EX`, `XADD MAXLEN ~`, `XREAD BLOCK 0`).
///
/// A blocking `XREAD` holds the multiplexed connection, so a consumer
/// should own its store instance rather than share it with a producer.
pub struct RedisStreamStore {
    conn: MultiplexedConnection,
}

impl RedisStreamStore {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!("Redis stream store connected");

        Ok(Self { conn })
    }
}

/// `SET key value EX ttl NX`: replies `OK` when set, nil when the key exists.
pub(crate) fn set_nx_cmd(key: &str, value: &str, ttl: Duration) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1)).arg("NX");
    cmd
}

/// `XADD stream MAXLEN ~ max_len * data payload`.
pub(crate) fn xadd_cmd(stream: &str, max_len: usize, payload: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(stream)
        .arg("MAXLEN")
        .arg("~")
        .arg(max_len)
        .arg("*")
        .arg(DATA_FIELD)
        .arg(payload);
    cmd
}

/// `XREAD BLOCK 0 STREAMS stream cursor`.
pub(crate) fn xread_cmd(stream: &str, cursor: &StreamCursor) -> redis::Cmd {
    let mut cmd = redis::cmd("XREAD");
    cmd.arg("BLOCK").arg(0).arg("STREAMS").arg(stream).arg(cursor.as_id());
    cmd
}

pub(crate) fn into_messages(reply: StreamReadReply) -> Vec<RawMessage> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| RawMessage {
            data: entry.get::<String>(DATA_FIELD),
            id: entry.id,
        })
        .collect()
}

#[async_trait]
impl StreamStore for RedisStreamStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = set_nx_cmd(key, value, ttl).query_async(&mut conn).await?;

        Ok(reply.is_some())
    }

    async fn append(&self, stream: &str, max_len: usize, payload: &str) -> Result<String, QueueError> {
        let mut conn = self.conn.clone();
        let id: String = xadd_cmd(stream, max_len, payload).query_async(&mut conn).await?;

        debug!(stream, entry_id = %id, "XADD");
        Ok(id)
    }

    async fn read_blocking(
        &self,
        stream: &str,
        cursor: &StreamCursor,
    ) -> Result<Vec<RawMessage>, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = xread_cmd(stream, cursor).query_async(&mut conn).await?;

        let messages = reply.map(into_messages).unwrap_or_default();
        debug!(stream, count = messages.len(), "XREAD batch");
        Ok(messages)
    }

    fn provider(&self) -> &str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use redis::streams::{StreamId, StreamKey};

    fn args(cmd: &redis::Cmd) -> Vec<String> {
        cmd.args_iter()
            .map(|arg| match arg {
                redis::Arg::Simple(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                redis::Arg::Cursor => "<cursor>".to_string(),
            })
            .collect()
    }

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        let map: HashMap<String, redis::Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), redis::Value::BulkString(v.as_bytes().to_vec())))
            .collect();
        StreamId { id: id.to_string(), map }
    }

    #[test]
    fn marker_command_sets_expiry_then_nx() {
        let cmd = set_nx_cmd("idemp:abc", "processed", Duration::from_secs(86_400));
        assert_eq!(args(&cmd), ["SET", "idemp:abc", "processed", "EX", "86400", "NX"]);
    }

    #[test]
    fn marker_ttl_never_rounds_to_zero() {
        let cmd = set_nx_cmd("idemp:abc", "processed", Duration::from_millis(10));
        assert_eq!(args(&cmd)[4], "1");
    }

    #[test]
    fn append_command_uses_approximate_cap() {
        let cmd = xadd_cmd("transactions", 1000, r#"{"id":"t1"}"#);
        assert_eq!(
            args(&cmd),
            ["XADD", "transactions", "MAXLEN", "~", "1000", "*", "data", r#"{"id":"t1"}"#]
        );
    }

    #[test]
    fn read_command_blocks_forever() {
        assert_eq!(
            args(&xread_cmd("transactions", &StreamCursor::Latest)),
            ["XREAD", "BLOCK", "0", "STREAMS", "transactions", "$"]
        );
        assert_eq!(
            args(&xread_cmd("transactions", &StreamCursor::After("17-0".into())))[5],
            "17-0"
        );
    }

    #[test]
    fn reply_maps_to_raw_messages() {
        let reply = StreamReadReply {
            keys: vec![StreamKey {
                key: "transactions".into(),
                ids: vec![
                    entry("1-0", &[("data", r#"{"id":"t1","merchant":"Costco","amount":1.0}"#)]),
                    entry("2-0", &[("other", "x")]),
                ],
            }],
        };

        let messages = into_messages(reply);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "1-0");
        assert_eq!(messages[0].decode().unwrap().id, "t1");
        assert_eq!(messages[1].id, "2-0");
        assert!(messages[1].data.is_none());
        assert!(matches!(messages[1].decode(), Err(QueueError::Parse(_))));
    }
}
