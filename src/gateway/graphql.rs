use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::core::{Repository, RepositoryFilter};
use crate::error::{ExplorerError, Result};
use crate::gateway::{cursor, RepositoryGateway};

/// 远端单次请求最多返回的条数
const MAX_PAGE_SIZE: u32 = 100;

const COUNT_QUERY: &str = r#"query($query: String!) {
  search(type: REPOSITORY, query: $query, first: 1) {
    repositoryCount
  }
}"#;

const STARS_QUERY: &str = r#"query($query: String!, $after: String) {
  search(type: REPOSITORY, query: $query, first: 1, after: $after) {
    edges {
      node {
        ... on Repository { stargazerCount }
      }
    }
  }
}"#;

const SEARCH_QUERY: &str = r#"query($query: String!, $first: Int!, $after: String, $languageCount: Int!) {
  search(type: REPOSITORY, query: $query, first: $first, after: $after) {
    edges {
      cursor
      node {
        ... on Repository {
          name
          owner { login }
          url
          description
          stargazerCount
          forkCount
          createdAt
          updatedAt
          primaryLanguage { name }
          languages(first: $languageCount, orderBy: {field: SIZE, direction: DESC}) {
            nodes { name }
            totalCount
          }
          helpWantedIssues: issues(filterBy: {labels: ["help wanted"]}) { totalCount }
          goodFirstIssues: issues(filterBy: {labels: ["good first issue"]}) { totalCount }
        }
      }
    }
  }
}"#;

#[derive(Clone, Debug)]
pub struct GraphQLOptions {
    pub api_url: String,
    pub access_token: String,
    pub timeout: Duration,
    /// 每个仓库最多加载的语言数
    pub max_languages: u32,
}

/// GitHub GraphQL 检索网关
#[derive(Clone)]
pub struct GraphQLGateway {
    http: reqwest::Client,
    api_url: String,
    max_languages: u32,
}

impl GraphQLGateway {
    pub fn new(options: GraphQLOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("bearer {}", options.access_token))
            .map_err(|e| ExplorerError::Config(format!("invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repo-explorer/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: options.api_url,
            max_languages: options.max_languages,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .http
            .post(&self.api_url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExplorerError::Gateway(format!(
                "graphql request failed: {} - {}",
                status, body
            )));
        }

        let body: GraphQLResponse<T> = resp.json().await?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            return Err(ExplorerError::Gateway(message));
        }
        body.data
            .ok_or_else(|| ExplorerError::Gateway("graphql response without data".into()))
    }
}

#[async_trait]
impl RepositoryGateway for GraphQLGateway {
    async fn count(&self, filter: &RepositoryFilter) -> Result<u32> {
        let query = filter.to_query();
        tracing::debug!("graphql count: {}", query);
        let data: SearchData<CountSearch> =
            self.query(COUNT_QUERY, json!({ "query": query })).await?;
        Ok(data.search.repository_count)
    }

    async fn star_count_at(&self, filter: &RepositoryFilter, index: u32) -> Result<u32> {
        let query = filter.to_query();
        tracing::debug!("graphql stars@{}: {}", index, query);
        let data: SearchData<EdgeSearch<StarsNode>> = self
            .query(
                STARS_QUERY,
                json!({ "query": query, "after": cursor::after_for_position(index) }),
            )
            .await?;
        data.search
            .edges
            .into_iter()
            .next()
            .and_then(|e| e.node.stargazer_count)
            .ok_or(ExplorerError::NotFound { index })
    }

    async fn fetch(
        &self,
        filter: &RepositoryFilter,
        from: u32,
        count: u32,
    ) -> Result<Vec<Repository>> {
        let query = filter.to_query();
        let mut out = Vec::with_capacity(count as usize);
        let mut position = from.max(1);
        let mut remaining = count;

        while remaining > 0 {
            let first = remaining.min(MAX_PAGE_SIZE);
            tracing::debug!("graphql fetch {}+{}: {}", position, first, query);
            let data: SearchData<EdgeSearch<RepositoryNode>> = self
                .query(
                    SEARCH_QUERY,
                    json!({
                        "query": query,
                        "first": first,
                        "after": cursor::after_for_position(position),
                        "languageCount": self.max_languages,
                    }),
                )
                .await?;

            let got = data.search.edges.len() as u32;
            out.extend(data.search.edges.into_iter().filter_map(Edge::into_repository));
            if got < first {
                break;
            }
            position += got;
            remaining -= got;
        }

        Ok(out)
    }
}

#[derive(Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorData>>,
}

#[derive(Deserialize)]
struct GraphQLErrorData {
    message: String,
}

#[derive(Deserialize)]
struct SearchData<S> {
    search: S,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountSearch {
    repository_count: u32,
}

#[derive(Deserialize)]
struct EdgeSearch<N> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<N>>,
}

#[derive(Deserialize)]
struct Edge<N> {
    #[serde(default)]
    cursor: String,
    node: N,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StarsNode {
    stargazer_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: Option<String>,
    owner: Option<Login>,
    url: Option<String>,
    description: Option<String>,
    #[serde(default)]
    stargazer_count: u32,
    #[serde(default)]
    fork_count: u32,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    primary_language: Option<Named>,
    languages: Option<Languages>,
    help_wanted_issues: Option<Total>,
    good_first_issues: Option<Total>,
}

#[derive(Deserialize)]
struct Login {
    login: String,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Languages {
    #[serde(default)]
    nodes: Vec<Named>,
    total_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Total {
    total_count: u32,
}

impl Edge<RepositoryNode> {
    /// 非 Repository 节点（空对象）直接丢弃
    fn into_repository(self) -> Option<Repository> {
        let node = self.node;
        let name = node.name?;
        let (languages, languages_total_count) = match node.languages {
            Some(l) => (l.nodes.into_iter().map(|n| n.name).collect(), l.total_count),
            None => (Vec::new(), 0),
        };
        Some(Repository {
            key: self.cursor,
            name,
            owner: node.owner.map(|o| o.login).unwrap_or_default(),
            url: node.url.unwrap_or_default(),
            description: node.description,
            forks_count: node.fork_count,
            stars_count: node.stargazer_count,
            primary_language: node.primary_language.map(|p| p.name),
            languages,
            languages_total_count,
            created_date: node.created_at.unwrap_or_default(),
            updated_date: node.updated_at.unwrap_or_default(),
            help_wanted_issues_count: node.help_wanted_issues.map_or(0, |t| t.total_count),
            good_first_issues_count: node.good_first_issues.map_or(0, |t| t.total_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn gateway(server: &MockServer) -> GraphQLGateway {
        GraphQLGateway::new(GraphQLOptions {
            api_url: format!("{}/graphql", server.uri()),
            access_token: "t0ken".into(),
            timeout: Duration::from_secs(5),
            max_languages: 10,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn count_sends_query_text_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("authorization", "bearer t0ken"))
            .and(body_partial_json(json!({
                "variables": { "query": "tokio language:Rust sort:stars-desc sort:updated-desc" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "search": { "repositoryCount": 4242 } }
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        let f = RepositoryFilter {
            text: Some("tokio".into()),
            language: Some("Rust".into()),
            ..Default::default()
        };
        assert_eq!(gw.count(&f).await.unwrap(), 4242);
    }

    #[tokio::test]
    async fn star_count_uses_offset_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "variables": { "after": cursor::encode(999) }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "search": { "edges": [ { "node": { "stargazerCount": 77 } } ] } }
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        assert_eq!(
            gw.star_count_at(&RepositoryFilter::default(), 1000).await.unwrap(),
            77
        );
    }

    #[tokio::test]
    async fn empty_edges_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "search": { "edges": [] } }
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        assert!(matches!(
            gw.star_count_at(&RepositoryFilter::default(), 5).await,
            Err(ExplorerError::NotFound { index: 5 })
        ));
    }

    #[tokio::test]
    async fn graphql_errors_are_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [ { "message": "rate" }, { "message": "limited" } ]
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        match gw.count(&RepositoryFilter::default()).await {
            Err(ExplorerError::Gateway(m)) => assert_eq!(m, "rate limited"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_failure_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        assert!(matches!(
            gw.fetch(&RepositoryFilter::default(), 1, 10).await,
            Err(ExplorerError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn fetch_maps_repository_nodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "search": { "edges": [
                    {
                        "cursor": "Y3Vyc29yOjE=",
                        "node": {
                            "name": "tokio",
                            "owner": { "login": "tokio-rs" },
                            "url": "https://github.com/tokio-rs/tokio",
                            "description": "runtime",
                            "stargazerCount": 25000,
                            "forkCount": 2300,
                            "createdAt": "2016-09-09T21:28:41Z",
                            "updatedAt": "2024-05-01T10:00:00Z",
                            "primaryLanguage": { "name": "Rust" },
                            "languages": { "nodes": [ { "name": "Rust" }, { "name": "Shell" } ], "totalCount": 3 },
                            "helpWantedIssues": { "totalCount": 4 },
                            "goodFirstIssues": { "totalCount": 0 }
                        }
                    },
                    { "cursor": "Y3Vyc29yOjI=", "node": {} }
                ] } }
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server).await;
        let repos = gw.fetch(&RepositoryFilter::default(), 1, 2).await.unwrap();
        assert_eq!(repos.len(), 1);
        let r = &repos[0];
        assert_eq!(r.key, "Y3Vyc29yOjE=");
        assert_eq!(r.owner, "tokio-rs");
        assert_eq!(r.stars_count, 25000);
        assert_eq!(r.languages, ["Rust", "Shell"]);
        assert_eq!(r.languages_total_count, 3);
        assert_eq!(r.help_wanted_issues_count, 4);
        assert_eq!(r.primary_language.as_deref(), Some("Rust"));
    }
}
