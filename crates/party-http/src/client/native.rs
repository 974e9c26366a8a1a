//! `reqwest` implementation of [`PartyService`].

use crate::client::config::ClientConfig;
use crate::client::retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
use crate::error::{HttpError, Result, ServiceError};
use crate::traits::PartyService;
use crate::types::{
    CreatePartyRequest, InviteRequest, JoinPartyRequest, LeavePartyRequest, MemberMetaPayload,
    PartyMetaPayload, RawParty, UserParties,
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Party service client over HTTPS.
#[derive(Clone)]
pub struct HttpPartyService {
    client: Client,
    config: Arc<ClientConfig>,
    base: Url,
}

/// A fully decoded response: status, optional `Retry-After`, and body text.
struct RawResponse {
    status: u16,
    retry_after: Option<Duration>,
    body: String,
}

impl HttpPartyService {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90));

        if !config.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&config.proxy_url)
                .map_err(|e| HttpError::Config(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| HttpError::Config(e.to_string()))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            config: Arc::new(config),
            base,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute URL of a party API route such as `parties/{id}`.
    fn endpoint(&self, route: &str) -> Result<Url> {
        let path = format!(
            "/party/api/v1/{}/{}",
            self.config.namespace,
            route.trim_start_matches('/')
        );
        Ok(self.base.join(&path)?)
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::from_client(&self.config)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<RawResponse> {
        let mut req = self.client.request(method.clone(), url.clone());
        if !self.config.auth_token.is_empty() {
            req = req.bearer_auth(&self.config.auth_token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!("[PartyHTTP-Out] {} {}", method, url);

        let response = req.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await?;

        tracing::debug!("[PartyHTTP-In] {} {} -> {}", method, url, status);

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }

    /// Send a request, retrying transient failures, and return the body of
    /// the first successful response.
    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        route: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<String> {
        let mut url = self.endpoint(route)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let body = body.map(serde_json::to_value).transpose()?;
        let mut retry_state = RetryState::new(self.retry_config());

        loop {
            match self.send_once(&method, &url, body.as_ref()).await {
                Ok(resp) => match check_status(resp.status, resp.body) {
                    Ok(text) => return Ok(text),
                    Err(err) => {
                        match retry_state.on_status(resp.status, resp.retry_after) {
                            RetryDecision::Retry(delay) => {
                                tracing::warn!(
                                    "[PartyHTTP] {} {} status {} (attempt {}), retrying in {:?}",
                                    method,
                                    route,
                                    resp.status,
                                    retry_state.attempts,
                                    delay
                                );
                                tokio::time::sleep(delay).await;
                            }
                            RetryDecision::DontRetry => return Err(err),
                        }
                    }
                },
                Err(err) => match retry_state.on_transport_error(err.is_retryable()) {
                    RetryDecision::Retry(delay) => {
                        tracing::warn!(
                            "[PartyHTTP] {} {} failed (attempt {}), retrying in {:?}: {}",
                            method,
                            route,
                            retry_state.attempts,
                            delay,
                            err
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DontRetry => return Err(err),
                },
            }
        }
    }

    async fn request_json<T: DeserializeOwned>(&self, method: Method, route: &str) -> Result<T> {
        let text = self.request::<Value>(method, route, &[], None).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Map a non-2xx response to the service error it carries.
fn check_status(status: u16, body: String) -> Result<String> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(HttpError::Service(ServiceError::from_body(status, &body)))
    }
}

#[async_trait]
impl PartyService for HttpPartyService {
    async fn party_lookup(&self, party_id: &str) -> Result<RawParty> {
        self.request_json(Method::GET, &format!("parties/{party_id}"))
            .await
    }

    async fn party_lookup_user(&self, user_id: &str) -> Result<UserParties> {
        self.request_json(Method::GET, &format!("user/{user_id}"))
            .await
    }

    async fn party_create(&self, request: &CreatePartyRequest) -> Result<RawParty> {
        let text = self
            .request(Method::POST, "parties", &[], Some(request))
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn party_join_request(
        &self,
        party_id: &str,
        user_id: &str,
        request: &JoinPartyRequest,
    ) -> Result<()> {
        let route = format!("parties/{party_id}/members/{user_id}/join");
        self.request(Method::POST, &route, &[], Some(request))
            .await?;
        Ok(())
    }

    async fn party_leave(
        &self,
        party_id: &str,
        user_id: &str,
        request: &LeavePartyRequest,
    ) -> Result<()> {
        let route = format!("parties/{party_id}/members/{user_id}");
        self.request(Method::DELETE, &route, &[], Some(request))
            .await?;
        Ok(())
    }

    async fn party_kick_member(&self, party_id: &str, member_id: &str) -> Result<()> {
        let route = format!("parties/{party_id}/members/{member_id}");
        self.request::<Value>(Method::DELETE, &route, &[], None)
            .await?;
        Ok(())
    }

    async fn party_promote_member(&self, party_id: &str, member_id: &str) -> Result<()> {
        let route = format!("parties/{party_id}/members/{member_id}/promote");
        self.request(Method::POST, &route, &[], Some(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn party_member_confirm(&self, party_id: &str, applicant_id: &str) -> Result<()> {
        let route = format!("parties/{party_id}/members/{applicant_id}/confirm");
        self.request(Method::POST, &route, &[], Some(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn party_member_reject(&self, party_id: &str, applicant_id: &str) -> Result<()> {
        let route = format!("parties/{party_id}/members/{applicant_id}/reject");
        self.request(Method::POST, &route, &[], Some(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn party_send_invite(
        &self,
        party_id: &str,
        user_id: &str,
        request: &InviteRequest,
    ) -> Result<()> {
        let route = format!("parties/{party_id}/invites/{user_id}");
        self.request(Method::POST, &route, &[("sendPing", "true")], Some(request))
            .await?;
        Ok(())
    }

    async fn party_update_meta(&self, party_id: &str, payload: &PartyMetaPayload) -> Result<()> {
        let route = format!("parties/{party_id}");
        self.request(Method::PATCH, &route, &[], Some(payload))
            .await?;
        Ok(())
    }

    async fn party_update_member_meta(
        &self,
        party_id: &str,
        user_id: &str,
        payload: &MemberMetaPayload,
    ) -> Result<()> {
        let route = format!("parties/{party_id}/members/{user_id}/meta");
        self.request(Method::PATCH, &route, &[], Some(payload))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_endpoint_building() {
        let service = HttpPartyService::new(ClientConfig {
            base_url: "http://localhost:8080".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            service.endpoint("parties/abc/members/u1/meta").unwrap().as_str(),
            "http://localhost:8080/party/api/v1/Fortnite/parties/abc/members/u1/meta"
        );
        assert_eq!(
            service.endpoint("/user/u1").unwrap().as_str(),
            "http://localhost:8080/party/api/v1/Fortnite/user/u1"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpPartyService::new(ClientConfig {
            base_url: "not a url".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(HttpError::Url(_))));
    }

    #[test]
    fn test_check_status_maps_service_error() {
        let body = r#"{"errorCode":"errors.com.epicgames.social.party.stale_revision","messageVars":["2","9"]}"#;
        let err = check_status(409, body.to_string()).unwrap_err();
        assert!(err.has_code(codes::STALE_REVISION));
        assert_eq!(err.stale_revision(), Some(9));
        assert_eq!(err.status(), Some(409));
        assert_eq!(check_status(204, String::new()).unwrap(), "");
    }

    #[test]
    fn test_retry_config_follows_client_config() {
        let service = HttpPartyService::new(ClientConfig {
            max_retries: 0,
            ..Default::default()
        })
        .unwrap();
        let mut state = RetryState::new(service.retry_config());
        assert_eq!(state.on_status(503, None), RetryDecision::DontRetry);
    }
}
