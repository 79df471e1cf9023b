use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::IgnoredAny;
use url::Url;

use common::team::{SigMultiPayload, TeamId};
use common::team_log::{ChainTip, ChainTipProvider, TeamLogError, TeamPoster};

use super::{ApiClient, ApiError, ApiRequest};

pub const SIG_MULTI_PATH: &str = "/_/api/1.0/sig/multi.json";
pub const TEAM_TIP_PATH: &str = "/_/api/1.0/team/tip.json";

/// Read the tip of a team's chain
#[derive(Debug, Clone)]
pub struct TipRequest {
    pub id: TeamId,
}

impl ApiRequest for TipRequest {
    type Response = ChainTip;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let mut full_url = base_url.join(TEAM_TIP_PATH)?;
        full_url.query_pairs_mut().append_pair("id", &self.id.to_hex());
        Ok(client.get(full_url))
    }
}

/// Submit a team creation
#[derive(Debug, Clone)]
pub struct SigMultiRequest(pub SigMultiPayload);

impl ApiRequest for SigMultiRequest {
    type Response = IgnoredAny;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(SIG_MULTI_PATH)?;
        Ok(client.post(full_url).json(&self.0))
    }
}

/// The team server, as a source of chain tips and a sink for new links
#[derive(Debug, Clone)]
pub struct HttpTeamLog {
    client: ApiClient,
}

impl HttpTeamLog {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

/// Sort a failed request into what it means for the submission
fn classify(err: ApiError) -> TeamLogError<ApiError> {
    if err.is_timeout() {
        return TeamLogError::Timeout;
    }
    match err {
        ApiError::HttpStatus(StatusCode::CONFLICT, body) => TeamLogError::Conflict(body),
        ApiError::HttpStatus(status, body) => {
            TeamLogError::Rejected(format!("{}: {}", status, body))
        }
        other => TeamLogError::Provider(other),
    }
}

#[async_trait]
impl ChainTipProvider for HttpTeamLog {
    type Error = ApiError;

    async fn tip(&self, id: &TeamId) -> Result<ChainTip, TeamLogError<Self::Error>> {
        match self.client.call(TipRequest { id: *id }).await {
            Ok(tip) => Ok(tip),
            Err(ApiError::HttpStatus(StatusCode::NOT_FOUND, _)) => {
                Err(TeamLogError::TeamNotFound(*id))
            }
            Err(e) => Err(classify(e)),
        }
    }
}

#[async_trait]
impl TeamPoster for HttpTeamLog {
    type Error = ApiError;

    async fn post(&self, payload: &SigMultiPayload) -> Result<(), TeamLogError<Self::Error>> {
        tracing::debug!(
            url = %self.client.base_url(),
            links = payload.sigs.len(),
            "posting team links"
        );
        match self.client.call(SigMultiRequest(payload.clone())).await {
            Ok(_) => Ok(()),
            // the server answered 2xx with a body we don't read
            Err(ApiError::Reqwest(e)) if e.is_decode() => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://teamchain.example").unwrap()
    }

    #[test]
    fn test_tip_request_url() {
        let id = TeamId::from_hex("0123456789abcdef0123456789abcd24").unwrap();
        let request = TipRequest { id }
            .build_request(&base(), &Client::new())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(
            request.url().as_str(),
            "https://teamchain.example/_/api/1.0/team/tip.json?id=0123456789abcdef0123456789abcd24"
        );
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify(ApiError::HttpStatus(StatusCode::CONFLICT, "stale prev".into())),
            TeamLogError::Conflict(msg) if msg == "stale prev"
        ));
        assert!(matches!(
            classify(ApiError::HttpStatus(StatusCode::FORBIDDEN, "no".into())),
            TeamLogError::Rejected(_)
        ));
        assert!(matches!(
            classify(ApiError::HttpStatus(StatusCode::INTERNAL_SERVER_ERROR, "".into())),
            TeamLogError::Rejected(_)
        ));
        assert!(matches!(
            classify(ApiError::UrlParse(url::ParseError::EmptyHost)),
            TeamLogError::Provider(_)
        ));
    }

    /// Answer one request with `response` and hang up
    async fn serve_once(response: &'static [u8]) -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.ok();
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_conflict_with_truncated_body_is_still_a_conflict() {
        // announces 64 body bytes, sends 5
        let url = serve_once(b"HTTP/1.1 409 Conflict\r\ncontent-length: 64\r\n\r\nstale").await;
        let log = HttpTeamLog::new(ApiClient::new(&url).unwrap());
        let id = TeamId::from_hex("0123456789abcdef0123456789abcd24").unwrap();
        assert!(matches!(log.tip(&id).await, Err(TeamLogError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_transport_error() {
        // nothing listens on port 9 of localhost
        let client = ApiClient::new(&Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        let log = HttpTeamLog::new(client);
        let id = TeamId::from_hex("0123456789abcdef0123456789abcd24").unwrap();
        assert!(matches!(
            log.tip(&id).await,
            Err(TeamLogError::Provider(ApiError::Reqwest(_)))
        ));
    }
}
