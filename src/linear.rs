//! Linear GraphQL API client used by the bulk sync.
//!
//! One query lists the non-archived issues of a project, up to the fetch
//! limit, so a sync run costs a single request. The page info tells the
//! caller whether the limit cut the listing short.

use std::fmt;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::sync::RawIssue;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("evox/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt carried in an error.
const ERROR_BODY_LIMIT: usize = 200;

const PROJECT_ISSUES_QUERY: &str = r#"
query ProjectIssues($projectId: ID!, $first: Int!) {
  issues(
    filter: { project: { id: { eq: $projectId } } }
    includeArchived: false
    first: $first
  ) {
    nodes {
      id
      identifier
      url
      title
      description
      priority
      createdAt
      updatedAt
      state { name }
      assignee { name }
      project { name }
    }
    pageInfo { hasNextPage }
  }
}
"#;

/// Errors from the Linear API.
#[derive(Debug, Error)]
pub enum LinearError {
    /// Client could not be constructed
    #[error("failed to initialize Linear HTTP client: {0}")]
    Client(String),

    /// Network or transport failure
    #[error("failed to call Linear GraphQL API: {0}")]
    Http(String),

    /// Non-2xx response
    #[error("Linear GraphQL API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON
    #[error("failed to parse Linear GraphQL response: {0}")]
    Parse(String),

    /// GraphQL `errors` array
    #[error("Linear GraphQL error: {0}")]
    GraphQl(String),
}

impl From<LinearError> for crate::Error {
    fn from(err: LinearError) -> Self {
        match err {
            LinearError::Client(msg) => crate::Error::Configuration(msg),
            other => crate::Error::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponseEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    nodes: Vec<RawIssue>,
    #[serde(default)]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    has_next_page: bool,
}

/// One page of a project's issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePage {
    pub issues: Vec<RawIssue>,
    /// More issues exist past this page
    pub has_next_page: bool,
}

/// Linear GraphQL client authenticated with a personal API key.
pub struct LinearClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl fmt::Debug for LinearClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl LinearClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LinearError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LinearError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// List the project's non-archived issues (at most `first`).
    pub async fn fetch_project_issues(
        &self,
        project_id: &str,
        first: u32,
    ) -> Result<IssuePage, LinearError> {
        let data: IssuesData = self
            .execute(
                PROJECT_ISSUES_QUERY,
                json!({ "projectId": project_id, "first": first }),
            )
            .await?;
        Ok(IssuePage {
            issues: data.issues.nodes,
            has_next_page: data.issues.page_info.is_some_and(|p| p.has_next_page),
        })
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, LinearError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| LinearError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LinearError::Http(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(LinearError::Status {
                status: status.as_u16(),
                body: truncate_for_error(&body),
            });
        }

        let envelope: GraphqlResponseEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| LinearError::Parse(e.to_string()))?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LinearError::GraphQl(message));
        }

        envelope
            .data
            .ok_or_else(|| LinearError::Parse("response has no data".to_string()))
    }
}

fn truncate_for_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_project_issues() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "lin_api_test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "variables": { "projectId": "proj-1", "first": 100 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": { "issues": { "nodes": [
                        {
                            "id": "lin-1",
                            "identifier": "AGT-1",
                            "title": "First",
                            "state": { "name": "Todo" },
                            "assignee": null,
                            "priority": 2,
                            "project": { "name": "EVOX" }
                        }
                    ], "pageInfo": { "hasNextPage": false } } }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client =
            LinearClient::new(format!("{}/graphql", server.url()), "lin_api_test").unwrap();
        let page = client.fetch_project_issues("proj-1", 100).await.unwrap();

        mock.assert_async().await;
        assert!(!page.has_next_page);
        assert_eq!(page.issues.len(), 1);
        assert_eq!(page.issues[0].identifier.as_deref(), Some("AGT-1"));
        assert_eq!(page.issues[0].priority, Some(2.0));
    }

    #[tokio::test]
    async fn test_fetch_reports_next_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(mockito::Matcher::Regex("pageInfo".to_string()))
            .with_status(200)
            .with_body(
                json!({
                    "data": { "issues": {
                        "nodes": [
                            { "id": "lin-1", "identifier": "AGT-1" },
                            { "id": "lin-2", "identifier": "AGT-2" }
                        ],
                        "pageInfo": { "hasNextPage": true }
                    } }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = LinearClient::new(format!("{}/graphql", server.url()), "key").unwrap();
        let page = client.fetch_project_issues("proj-1", 2).await.unwrap();

        mock.assert_async().await;
        assert!(page.has_next_page);
        assert_eq!(page.issues.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_page_info_means_last_page() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({ "data": { "issues": { "nodes": [] } } }).to_string())
            .create_async()
            .await;

        let client = LinearClient::new(format!("{}/graphql", server.url()), "key").unwrap();
        let page = client.fetch_project_issues("proj-1", 10).await.unwrap();
        assert_eq!(page, IssuePage::default());
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(401)
            .with_body("x".repeat(500))
            .create_async()
            .await;

        let client = LinearClient::new(format!("{}/graphql", server.url()), "bad").unwrap();
        let err = client.fetch_project_issues("proj-1", 10).await.unwrap_err();
        match err {
            LinearError::Status { status, ref body } => {
                assert_eq!(status, 401);
                assert_eq!(body.len(), ERROR_BODY_LIMIT + 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(crate::Error::from(err), crate::Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_graphql_errors_are_joined() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(
                json!({
                    "data": null,
                    "errors": [{ "message": "bad project" }, { "message": "rate limited" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = LinearClient::new(format!("{}/graphql", server.url()), "key").unwrap();
        let err = client.fetch_project_issues("proj-1", 10).await.unwrap_err();
        assert_eq!(err.to_string(), "Linear GraphQL error: bad project; rate limited");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = LinearClient::new(format!("{}/graphql", server.url()), "key").unwrap();
        let err = client.fetch_project_issues("proj-1", 10).await.unwrap_err();
        assert!(matches!(err, LinearError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = LinearClient::new("http://localhost", "lin_api_secret").unwrap();
        assert!(!format!("{:?}", client).contains("lin_api_secret"));
    }
}
