//! Client for the blog REST API.
//!
//! All calls go through the `RequestPipeline`, which attaches the session
//! token and handles authentication failures.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::error::{ApiError, ApiResult};
use super::pipeline::RequestPipeline;
use crate::models::{CommentDraft, CommentMutation, Post, PostDraft};

// ============================================================================
// Constants
// ============================================================================

/// Default HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Result of loading the home listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub posts: Vec<Post>,
    /// Search was rejected and the unfiltered list was loaded instead
    pub fell_back: bool,
}

/// API client for the blog.
/// Clone is cheap - reqwest::Client and the pipeline are shared.
#[derive(Clone)]
pub struct BlogClient {
    client: Client,
    base_url: String,
    pipeline: Arc<RequestPipeline>,
    initial_backoff: Duration,
}

impl BlogClient {
    pub fn new(base_url: &str, pipeline: Arc<RequestPipeline>) -> Result<Self> {
        Self::with_timeout(base_url, pipeline, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        base_url: &str,
        pipeline: Arc<RequestPipeline>,
        timeout: Duration,
    ) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            pipeline,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Shorten the rate-limit backoff (tests)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(response: Response) -> ApiResult<Option<Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying 429s with exponential backoff.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> ApiResult<Response> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let (mut request, token) = self
                .pipeline
                .authorize(self.client.request(method.clone(), url.clone()));
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    return self.pipeline.on_response(url, token.as_deref(), Err(e.into()))
                }
            };

            match Self::check_response_for_retry(response).await {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        path = url.path(),
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return self.pipeline.on_response(url, token.as_deref(), Err(e)),
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response, url: &Url) -> ApiResult<T> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url.path())))
    }

    /// Like `read_json`, but an empty body is `None`
    async fn read_optional_json<T: DeserializeOwned>(
        response: Response,
        url: &Url,
    ) -> ApiResult<Option<T>> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url.path())))
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, url, None).await?;
        Self::read_json(response, url).await
    }

    // ===== Posts =====

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        let url = self.endpoint(&["posts"])?;
        let posts: Vec<Post> = self.get(&url).await.context("Failed to load posts")?;
        debug!(count = posts.len(), "Loaded posts");
        Ok(posts)
    }

    pub async fn get_post(&self, id: &str) -> Result<Post> {
        let url = self.endpoint(&["posts", id])?;
        self.get(&url)
            .await
            .with_context(|| format!("Failed to load post {}", id))
    }

    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let mut url = self.endpoint(&["posts", "search"])?;
        url.query_pairs_mut().append_pair("q", query);
        let posts: Vec<Post> = self.get(&url).await.context("Search failed")?;
        debug!(count = posts.len(), "Search returned posts");
        Ok(posts)
    }

    /// Listing for the home view.
    ///
    /// A blank query loads every post. A search rejected as unauthorized
    /// falls back to the unfiltered list.
    pub async fn load_listing(&self, query: &str) -> Result<Listing> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Listing {
                posts: self.list_posts().await?,
                fell_back: false,
            });
        }

        match self.search_posts(query).await {
            Ok(posts) => Ok(Listing {
                posts,
                fell_back: false,
            }),
            Err(e) if ApiError::is_unauthorized_error(&e) => {
                info!("Search unauthorized, loading all posts");
                Ok(Listing {
                    posts: self.list_posts().await?,
                    fell_back: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_post(&self, draft: &PostDraft) -> Result<Post> {
        let url = self.endpoint(&["posts"])?;
        let response = self
            .send(Method::POST, &url, Some(draft))
            .await
            .context("Failed to create post")?;
        let post: Post = Self::read_json(response, &url).await?;
        info!(id = %post.id, "Created post");
        Ok(post)
    }

    pub async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<Post> {
        let url = self.endpoint(&["posts", id])?;
        let response = self
            .send(Method::PUT, &url, Some(draft))
            .await
            .with_context(|| format!("Failed to update post {}", id))?;
        let post = Self::read_json(response, &url).await?;
        info!(id, "Updated post");
        Ok(post)
    }

    pub async fn delete_post(&self, id: &str) -> Result<()> {
        let url = self.endpoint(&["posts", id])?;
        self.send::<()>(Method::DELETE, &url, None)
            .await
            .with_context(|| format!("Failed to delete post {}", id))?;
        info!(id, "Deleted post");
        Ok(())
    }

    // ===== Comments =====
    //
    // The API answers comment mutations with the updated post, the comment
    // list or the single comment. `None` means it sent nothing back and
    // the caller should reload the post.

    pub async fn add_comment(
        &self,
        post_id: &str,
        draft: &CommentDraft,
    ) -> Result<Option<CommentMutation>> {
        let url = self.endpoint(&["posts", post_id, "comments"])?;
        let response = self
            .send(Method::POST, &url, Some(draft))
            .await
            .context("Failed to add comment")?;
        Ok(Self::read_optional_json(response, &url).await?)
    }

    pub async fn update_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        draft: &CommentDraft,
    ) -> Result<Option<CommentMutation>> {
        let url = self.endpoint(&["posts", post_id, "comments", comment_id])?;
        let response = self
            .send(Method::PUT, &url, Some(draft))
            .await
            .context("Failed to update comment")?;
        Ok(Self::read_optional_json(response, &url).await?)
    }

    pub async fn delete_comment(
        &self,
        post_id: &str,
        comment_id: &str,
    ) -> Result<Option<CommentMutation>> {
        let url = self.endpoint(&["posts", post_id, "comments", comment_id])?;
        let response = self
            .send::<()>(Method::DELETE, &url, None)
            .await
            .context("Failed to delete comment")?;
        Ok(Self::read_optional_json(response, &url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::accounts::PROFESSOR_TOKEN;
    use crate::auth::{MemoryCredentialStore, SessionManager};
    use crate::routes::Route;
    use crate::SessionEvent;
    use serde_json::json;
    use tokio::sync::{mpsc, watch};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        client: BlogClient,
        session: Arc<SessionManager>,
        events: mpsc::Receiver<SessionEvent>,
        _route: watch::Sender<Route>,
    }

    fn fixture(server: &MockServer, login: Option<&str>) -> Fixture {
        let session = Arc::new(SessionManager::new(Arc::new(
            MemoryCredentialStore::default(),
        )));
        session.restore();
        if let Some(user) = login {
            session.login(user, "1234").unwrap();
        }
        let (route_tx, route_rx) = watch::channel(Route::Home);
        let (events_tx, events) = mpsc::channel(4);
        let pipeline = Arc::new(RequestPipeline::new(session.clone(), route_rx, events_tx));
        let client = BlogClient::new(&server.uri(), pipeline)
            .unwrap()
            .with_initial_backoff(Duration::from_millis(1));
        Fixture {
            client,
            session,
            events,
            _route: route_tx,
        }
    }

    fn post_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "_id": id,
            "title": title,
            "description": "d",
            "content": "c",
            "author": "Matheus",
            "readTime": 3
        })
    }

    #[tokio::test]
    async fn test_list_posts_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .and(header("authorization", format!("Bearer {}", PROFESSOR_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                post_json("1", "First"),
                post_json("2", "Second")
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture(&server, Some("professor"));
        let posts = f.client.list_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "1");
    }

    #[tokio::test]
    async fn test_get_post_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such post"))
            .mount(&server)
            .await;

        let f = fixture(&server, None);
        let err = f.client.get_post("missing").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/search"))
            .and(query_param("q", "rust & tokio"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json("1", "Rust")])))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture(&server, None);
        let posts = f.client.search_posts("rust & tokio").await.unwrap();
        assert_eq!(posts[0].title, "Rust");
    }

    #[tokio::test]
    async fn test_unauthorized_search_falls_back_and_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts/search"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json("1", "All")])))
            .mount(&server)
            .await;

        let mut f = fixture(&server, Some("aluno"));
        let listing = f.client.load_listing("anything").await.unwrap();
        assert!(listing.fell_back);
        assert_eq!(listing.posts.len(), 1);
        assert!(f.session.is_student());
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_blank_query_lists_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture(&server, None);
        let listing = f.client.load_listing("   ").await.unwrap();
        assert!(!listing.fell_back);
        assert!(listing.posts.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_mutation_invalidates_session() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/posts/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut f = fixture(&server, Some("professor"));
        let err = f.client.delete_post("1").await.unwrap_err();

        assert!(ApiError::is_unauthorized_error(&err));
        assert!(f.session.current_token().is_none());
        assert!(matches!(
            f.events.try_recv(),
            Ok(SessionEvent::Invalidated { .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let f = fixture(&server, None);
        assert!(f.client.list_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RATE_LIMIT_RETRIES) + 1)
            .mount(&server)
            .await;

        let f = fixture(&server, None);
        let err = f.client.list_posts().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_create_post_sends_draft() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(post_json("9", "New")))
            .expect(1)
            .mount(&server)
            .await;

        let f = fixture(&server, Some("professor"));
        let mut draft = PostDraft::new("Matheus");
        draft.title = "New".into();
        draft.description = "d".into();
        draft.content = "c".into();
        let post = f.client.create_post(&draft.validated().unwrap()).await.unwrap();
        assert_eq!(post.id, "9");
    }

    #[tokio::test]
    async fn test_comment_mutation_shapes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/1/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"_id": "c1", "author": "Ana", "text": "hi"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/posts/1/comments/c1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let f = fixture(&server, Some("aluno"));
        let draft = CommentDraft {
            author: "Ana".into(),
            text: "hi".into(),
            parent_id: None,
        };
        let added = f.client.add_comment("1", &draft).await.unwrap();
        assert!(matches!(added, Some(CommentMutation::Comments(ref c)) if c.len() == 1));

        let deleted = f.client.delete_comment("1", "c1").await.unwrap();
        assert!(deleted.is_none());
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let (_route_tx, route_rx) = watch::channel(Route::Home);
        let (events_tx, _events_rx) = mpsc::channel(1);
        let session = Arc::new(SessionManager::new(Arc::new(
            MemoryCredentialStore::default(),
        )));
        let pipeline = Arc::new(RequestPipeline::new(session, route_rx, events_tx));

        let client = BlogClient::new("https://api.example.com/v1/", pipeline).unwrap();
        let url = client.endpoint(&["posts", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/posts/a%20b");
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let (_route_tx, route_rx) = watch::channel(Route::Home);
        let (events_tx, _events_rx) = mpsc::channel(1);
        let session = Arc::new(SessionManager::new(Arc::new(
            MemoryCredentialStore::default(),
        )));
        let pipeline = Arc::new(RequestPipeline::new(session, route_rx, events_tx));
        assert!(BlogClient::new("not a url", pipeline).is_err());
    }
}
