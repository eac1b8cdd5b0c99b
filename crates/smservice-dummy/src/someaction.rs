//! The `someaction` handler of the dummy service.

use async_trait::async_trait;
use serde_json::{json, Value};
use smservice_core::{ActionContext, ActionHandler, Headers, Result};
use tracing::info;

pub const ACTION: &str = "someaction";

/// Logs the request and, when the caller left a `reply_to`, answers it
/// through the peer channel.
pub struct SomeAction;

#[async_trait]
impl ActionHandler for SomeAction {
    async fn handle(&self, ctx: &ActionContext, headers: &Headers, body: &Value) -> Result<()> {
        info!(
            "Processing action '{}'. Headers: {:?}, message: {}",
            ACTION, headers, body
        );

        if let Some(reply_to) = headers.get("reply_to").and_then(Value::as_str) {
            info!("Action '{}' sending reply to '{}'", ACTION, reply_to);
            ctx.execute(reply_to, json!({"status": "OK", "whatever": "add it here"}))
                .await?;
            info!("Action '{}' reply sent", ACTION);
        }

        info!("Terminating action '{}'", ACTION);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smservice_core::codec::Message;
    use smservice_core::{memory_pair, Channel, Registration, ServiceIdentity};
    use std::sync::Arc;

    fn headers(value: Value) -> Headers {
        match value {
            Value::Object(map) => map,
            _ => panic!("headers must be an object"),
        }
    }

    #[tokio::test]
    async fn test_replies_when_reply_to_present() {
        let identity = Arc::new(ServiceIdentity::new("dummy", [ACTION]).unwrap());
        let (control, _sm) = memory_pair("dummy", "sm");
        let (peer, sm_peer) = memory_pair("dummy", "sm-peer");
        let ctx = ActionContext::new(identity, Registration::new(), Arc::new(control), Arc::new(peer));

        SomeAction
            .handle(&ctx, &headers(json!({"action": "SOMEACTION", "reply_to": "caller"})), &json!({}))
            .await
            .unwrap();

        let (head, body) = sm_peer.receive().await.unwrap();
        let reply = Message::decode(&head, &body).unwrap();
        assert_eq!(reply.headers["service"], json!("caller"));
        assert_eq!(reply.headers["reply_to"], json!("dummy"));
        assert_eq!(reply.body["status"], json!("OK"));
    }

    #[tokio::test]
    async fn test_silent_without_reply_to() {
        let identity = Arc::new(ServiceIdentity::new("dummy", [ACTION]).unwrap());
        let (control, _sm) = memory_pair("dummy", "sm");
        let (peer, sm_peer) = memory_pair("dummy", "sm-peer");
        let ctx = ActionContext::new(identity, Registration::new(), Arc::new(control), Arc::new(peer));

        SomeAction
            .handle(&ctx, &headers(json!({"action": "SOMEACTION"})), &json!({"x": 1}))
            .await
            .unwrap();

        assert!(sm_peer.try_receive().is_none());
    }
}
