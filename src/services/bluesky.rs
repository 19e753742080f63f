// src/services/bluesky.rs

//! Bluesky publishing client.
//!
//! Talks to a PDS over the AT Protocol XRPC endpoints:
//! - `com.atproto.server.createSession` to log in with an app password
//! - `com.atproto.repo.createRecord` to create an `app.bsky.feed.post`
//!
//! The network offers no idempotency key, so a post that times out after
//! the server accepted it may be duplicated by a retry.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::BlueskyConfig;
use crate::utils::http::{create_async_client, excerpt};

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// A push-based sink for rendered announcements.
#[async_trait]
pub trait PostClient: Send {
    /// Publish one post. Any error means the post may or may not exist.
    async fn push(&mut self, text: &str) -> Result<PostRef>;
}

/// Reference to a created post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'static str,
    record: PostRecord<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord<'a> {
    #[serde(rename = "$type")]
    record_type: &'static str,
    text: &'a str,
    created_at: String,
}

impl<'a> PostRecord<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            record_type: POST_COLLECTION,
            text,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Client for posting to a Bluesky account.
pub struct BlueskyClient {
    client: Client,
    service: Url,
    handle: String,
    password: String,
    session: Option<Session>,
}

impl BlueskyClient {
    /// Create a client. No network traffic happens until `login` or `push`.
    pub fn new(config: &BlueskyConfig, user_agent: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: create_async_client(user_agent, timeout_secs)?,
            service: Url::parse(config.service.trim())?,
            handle: config.handle.clone(),
            password: config.password.clone(),
            session: None,
        })
    }

    fn xrpc(&self, method: &str) -> Result<Url> {
        Ok(self.service.join(&format!("/xrpc/{method}"))?)
    }

    /// Create a new session, replacing any existing one.
    pub async fn login(&mut self) -> Result<()> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession")?)
            .json(&CreateSessionRequest {
                identifier: &self.handle,
                password: &self.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::auth(format!(
                "login as {} failed with HTTP {status}: {}",
                self.handle,
                excerpt(&body)
            )));
        }

        let session: Session = response.json().await?;
        log::info!("Successfully logged in as {}", session.handle);
        self.session = Some(session);
        Ok(())
    }

    async fn create_post(&self, session: &Session, text: &str) -> Result<PostRef> {
        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord")?)
            .bearer_auth(&session.access_jwt)
            .json(&CreateRecordRequest {
                repo: &session.did,
                collection: POST_COLLECTION,
                record: PostRecord::new(text),
            })
            .send()
            .await
            .map_err(AppError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::publish(format!(
                "HTTP {status}: {}",
                excerpt(&body)
            )));
        }

        response.json().await.map_err(AppError::publish)
    }
}

#[async_trait]
impl PostClient for BlueskyClient {
    async fn push(&mut self, text: &str) -> Result<PostRef> {
        if self.session.is_none() {
            self.login().await?;
        }
        let Some(session) = self.session.take() else {
            return Err(AppError::auth("no session after login"));
        };

        let result = self.create_post(&session, text).await;

        // Expired tokens surface as 400/401; log in again on the next attempt.
        let expired = matches!(&result, Err(AppError::Publish(msg))
            if msg.starts_with(&format!("HTTP {}", StatusCode::UNAUTHORIZED))
                || msg.contains("ExpiredToken"));
        if expired {
            log::warn!("Bluesky session for {} expired", session.handle);
        } else {
            self.session = Some(session);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::utils::http::stub::StubServer;

    const CREATE_SESSION: &str = "/xrpc/com.atproto.server.createSession";
    const CREATE_RECORD: &str = "/xrpc/com.atproto.repo.createRecord";

    /// PDS whose first `createRecord` answers with `first_status`.
    async fn pds(first_status: u16, first_body: &'static str) -> StubServer {
        let records = Arc::new(AtomicUsize::new(0));
        StubServer::start(move |req| match req.path.as_str() {
            CREATE_SESSION => (
                200,
                r#"{"accessJwt":"jwt","refreshJwt":"r","did":"did:plc:abc","handle":"chicagoeats.bsky.social"}"#
                    .to_string(),
            ),
            CREATE_RECORD if records.fetch_add(1, Ordering::SeqCst) == 0 => {
                (first_status, first_body.to_string())
            }
            CREATE_RECORD => (
                200,
                r#"{"uri":"at://did:plc:abc/app.bsky.feed.post/1","cid":"bafy"}"#.to_string(),
            ),
            _ => (404, "{}".to_string()),
        })
        .await
    }

    fn stub_client(server: &StubServer) -> BlueskyClient {
        let config = BlueskyConfig {
            service: server.base.clone(),
            ..config()
        };
        BlueskyClient::new(&config, "herald-test", 5).unwrap()
    }

    fn config() -> BlueskyConfig {
        BlueskyConfig {
            service: "https://bsky.social".to_string(),
            handle: "chicagoeats.bsky.social".to_string(),
            password: "app-password".to_string(),
        }
    }

    #[test]
    fn test_xrpc_urls() {
        let client = BlueskyClient::new(&config(), "herald-test", 5).unwrap();
        assert_eq!(
            client.xrpc("com.atproto.repo.createRecord").unwrap().as_str(),
            "https://bsky.social/xrpc/com.atproto.repo.createRecord"
        );
    }

    #[test]
    fn test_post_record_shape() {
        let request = CreateRecordRequest {
            repo: "did:plc:abc123",
            collection: POST_COLLECTION,
            record: PostRecord::new("hello"),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["repo"], "did:plc:abc123");
        assert_eq!(value["collection"], "app.bsky.feed.post");
        assert_eq!(value["record"]["$type"], "app.bsky.feed.post");
        assert_eq!(value["record"]["text"], "hello");
        assert!(value["record"]["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_session_decodes_camel_case() {
        let session: Session = serde_json::from_str(
            r#"{"accessJwt":"jwt","refreshJwt":"r","did":"did:plc:abc","handle":"chicagoeats.bsky.social"}"#,
        )
        .unwrap();
        assert_eq!(session.access_jwt, "jwt");
        assert_eq!(session.did, "did:plc:abc");
    }

    #[tokio::test]
    async fn test_unauthorized_post_forces_new_login() {
        let server = pds(401, r#"{"error":"ExpiredToken","message":"Token has expired"}"#).await;
        let mut client = stub_client(&server);

        let err = client.push("first").await.unwrap_err();
        assert!(matches!(err, AppError::Publish(_)));

        let post = client.push("first").await.unwrap();
        assert_eq!(post.cid, "bafy");
        assert_eq!(
            server.paths(),
            vec![CREATE_SESSION, CREATE_RECORD, CREATE_SESSION, CREATE_RECORD]
        );
    }

    #[tokio::test]
    async fn test_server_error_keeps_session() {
        let server = pds(502, r#"{"error":"UpstreamFailure"}"#).await;
        let mut client = stub_client(&server);

        assert!(client.push("first").await.is_err());
        client.push("first").await.unwrap();
        assert_eq!(
            server.paths(),
            vec![CREATE_SESSION, CREATE_RECORD, CREATE_RECORD]
        );
    }

    #[tokio::test]
    async fn test_post_body_targets_session_repo() {
        let server = pds(200, r#"{"uri":"at://did:plc:abc/app.bsky.feed.post/0","cid":"c0"}"#).await;
        let mut client = stub_client(&server);

        client.push("🆕 New Restaurant Alert!").await.unwrap();

        let requests = server.requests();
        let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
        assert_eq!(requests[1].method, "POST");
        assert_eq!(body["repo"], "did:plc:abc");
        assert_eq!(body["record"]["text"], "🆕 New Restaurant Alert!");
    }

    #[test]
    fn test_invalid_service_url_is_rejected() {
        let mut config = config();
        config.service = "not a url".to_string();
        assert!(BlueskyClient::new(&config, "herald-test", 5).is_err());
    }
}
