use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

use modhub_shared::types::auth::AuthUser;

const MAX_USER_AGENT_LEN: usize = 255;

/// Requesting client as seen through the proxy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    /// Rate-limit subject: the user when signed in, else the address.
    pub fn subject(&self, caller: Option<&AuthUser>) -> String {
        match caller {
            Some(user) => user.id.to_string(),
            None => self.ip.clone(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let ip = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent: String = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .chars()
            .take(MAX_USER_AGENT_LEN)
            .collect();

        Ok(Self { ip, user_agent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn client_from(req: Request<()>) -> ClientInfo {
        let (mut parts, _) = req.into_parts();
        ClientInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn first_forwarded_address_wins() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "ModManager/2.3")
            .body(())
            .unwrap();

        let client = client_from(req).await;
        assert_eq!(client.ip, "203.0.113.7");
        assert_eq!(client.user_agent, "ModManager/2.3");
    }

    #[tokio::test]
    async fn falls_back_to_peer_address() {
        let mut req = Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 5123))));

        assert_eq!(client_from(req).await.ip, "192.0.2.4");
    }

    #[tokio::test]
    async fn unknown_without_any_source() {
        let client = client_from(Request::builder().body(()).unwrap()).await;
        assert_eq!(client.ip, "unknown");
        assert_eq!(client.user_agent, "");
    }
}
