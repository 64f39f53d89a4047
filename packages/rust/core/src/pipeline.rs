//! End-to-end annotation pipeline: URLs → fetch → score → persist → project.
//!
//! The relational store is the system of record: a batch lands there in one
//! transaction before any graph statement is sent. Projection failures leave
//! the relational rows in place and the graph partially behind; [`Pipeline::backfill`]
//! exists to re-project from the relational store later.

use moralgraph_graph::{FusekiClient, ProjectionReport, Projector};
use moralgraph_shared::{
    ArticleRecord, AssessmentRecord, FetchedArticle, MoralGraphError, NewArticle, Result,
    ScoredFoundation,
};
use moralgraph_storage::{PersistedBatch, Storage};
use tracing::{info, instrument, warn};

use crate::normalize::{self, DropPolicy};

/// Boundary to the outside world that turns a URL into article content.
pub trait ArticleFetcher {
    /// Fetch and extract one article.
    async fn fetch(&self, url: &str) -> Result<FetchedArticle>;

    /// Expand a feed URL into the article URLs it lists.
    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<String>>;
}

/// Boundary to the external moral scoring service.
pub trait MoralScorer {
    /// Score one article's text across the five foundations. An empty vec
    /// is a valid result: no foundation was detected.
    async fn score(&self, article: &FetchedArticle) -> Result<Vec<ScoredFoundation>>;
}

/// How a run was requested, which decides the failure policy for
/// individual URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// One URL; any fetch or scoring failure aborts the run.
    Single,
    /// Explicit URL list; failing URLs are skipped, the rest proceed.
    Batch,
    /// URLs expanded from a feed; same skip policy as [`RequestMode::Batch`].
    Rss,
}

impl RequestMode {
    fn skips_failures(&self) -> bool {
        matches!(self, RequestMode::Batch | RequestMode::Rss)
    }
}

/// A URL left out of a batch run, with the error that caused it.
#[derive(Debug, Clone)]
pub struct SkippedUrl {
    pub url: String,
    pub reason: String,
}

/// Outcome of the fetch/score/persist half of a run.
#[derive(Debug)]
pub struct AnnotateResult {
    pub persisted: PersistedBatch,
    pub skipped: Vec<SkippedUrl>,
}

/// Outcome of a full run including projection.
#[derive(Debug)]
pub struct PipelineReport {
    pub persisted_articles: usize,
    pub persisted_assessments: usize,
    pub skipped: Vec<SkippedUrl>,
    pub projection: ProjectionReport,
}

/// Liveness of the two stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub database: bool,
    pub graph_store: bool,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.database && self.graph_store
    }
}

/// The annotation pipeline over pluggable fetch and score boundaries.
pub struct Pipeline<'a, F, S> {
    fetcher: &'a F,
    scorer: &'a S,
    storage: &'a Storage,
    drop_policy: DropPolicy,
}

impl<'a, F: ArticleFetcher, S: MoralScorer> Pipeline<'a, F, S> {
    pub fn new(fetcher: &'a F, scorer: &'a S, storage: &'a Storage) -> Self {
        Self {
            fetcher,
            scorer,
            storage,
            drop_policy: DropPolicy::default(),
        }
    }

    pub fn with_drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Fetch, score, and persist a set of URLs as one relational batch.
    ///
    /// In batch modes, fetch and scoring failures skip that URL; anything
    /// else (including any persistence failure) aborts with nothing
    /// persisted. In single mode every failure aborts.
    #[instrument(skip_all, fields(urls = urls.len(), mode = ?mode))]
    pub async fn annotate(&self, urls: &[String], mode: RequestMode) -> Result<AnnotateResult> {
        let mut batch: Vec<NewArticle> = Vec::with_capacity(urls.len());
        let mut skipped = Vec::new();

        for url in urls {
            match self.fetch_and_score(url).await {
                Ok(article) => batch.push(article),
                Err(e) if mode.skips_failures() && e.is_skippable() => {
                    warn!(url = %url, error = %e, "skipping url");
                    skipped.push(SkippedUrl {
                        url: url.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let persisted = self.storage.persist_batch(&batch).await?;
        info!(
            persisted = persisted.articles.len(),
            skipped = skipped.len(),
            "annotation batch persisted"
        );
        Ok(AnnotateResult { persisted, skipped })
    }

    /// Expand a feed and run the batch policy over its article URLs.
    pub async fn annotate_feed(&self, feed_url: &str) -> Result<AnnotateResult> {
        let urls = self.fetcher.fetch_feed(feed_url).await?;
        if urls.is_empty() {
            return Err(MoralGraphError::Fetch(format!(
                "feed {feed_url} lists no articles"
            )));
        }
        info!(feed = %feed_url, articles = urls.len(), "feed expanded");
        self.annotate(&urls, RequestMode::Rss).await
    }

    /// Full end-to-end run: annotate, then project the persisted batch into
    /// the graph. Projection runs only after the relational commit; its
    /// failure propagates but does not touch the relational rows.
    pub async fn annotate_and_project(
        &self,
        urls: &[String],
        mode: RequestMode,
        projector: &Projector<'_>,
    ) -> Result<PipelineReport> {
        let result = self.annotate(urls, mode).await?;
        let projection = self.project_persisted(&result.persisted, projector).await?;
        Ok(PipelineReport {
            persisted_articles: result.persisted.articles.len(),
            persisted_assessments: result.persisted.assessments.len(),
            skipped: result.skipped,
            projection,
        })
    }

    /// Project one persisted batch into the graph.
    pub async fn project_persisted(
        &self,
        persisted: &PersistedBatch,
        projector: &Projector<'_>,
    ) -> Result<ProjectionReport> {
        let batch = normalize::normalize(
            normalize::from_records(&persisted.articles, &persisted.assessments),
            self.drop_policy,
        );
        projector.project(&batch).await
    }

    /// Look up one article and its assessments in the relational store.
    pub async fn article_assessments(
        &self,
        article_id: i64,
    ) -> Result<(ArticleRecord, Vec<AssessmentRecord>)> {
        let article = self
            .storage
            .get_article(article_id)
            .await?
            .ok_or_else(|| {
                MoralGraphError::validation(format!("article {article_id} not found"))
            })?;
        let assessments = self.storage.assessments_for_article(article_id).await?;
        Ok((article, assessments))
    }

    async fn fetch_and_score(&self, url: &str) -> Result<NewArticle> {
        let fetched = self.fetcher.fetch(url).await?;
        let scores = self.scorer.score(&fetched).await?;
        Ok(NewArticle {
            identifier: None,
            title: fetched.title,
            url: fetched.url,
            scores,
        })
    }
}

/// Re-project everything the relational store holds into the graph.
///
/// Needs no fetch or score boundary — rows come from the relational store
/// and go straight to the projector, so callers pass only the stores and the
/// drop policy. Together with the graph's set-union semantics this heals a
/// graph that fell behind: article metadata converges, though annotations
/// from earlier runs stay alongside the freshly minted ones.
#[instrument(skip_all)]
pub async fn backfill(
    storage: &Storage,
    projector: &Projector<'_>,
    policy: DropPolicy,
) -> Result<ProjectionReport> {
    let articles = storage.list_articles().await?;
    let assessments = storage.list_assessments().await?;
    info!(
        articles = articles.len(),
        assessments = assessments.len(),
        "backfilling graph from relational store"
    );

    let batch = normalize::normalize(normalize::from_records(&articles, &assessments), policy);
    projector.project(&batch).await
}

/// Probe both stores. Failures are reported, never propagated.
pub async fn health(storage: &Storage, graph: &FusekiClient) -> HealthReport {
    let database = storage.list_articles().await.is_ok();
    let graph_store = graph.ping().await.unwrap_or(false);
    HealthReport {
        database,
        graph_store,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moralgraph_shared::{Foundation, Polarity};
    use std::collections::HashMap;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("mg_pipeline_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    /// Fetcher backed by a fixed url → article map; unknown urls fail.
    struct MapFetcher {
        articles: HashMap<String, FetchedArticle>,
        feed: Vec<String>,
    }

    impl MapFetcher {
        fn new(urls: &[&str]) -> Self {
            let articles = urls
                .iter()
                .map(|u| {
                    (
                        u.to_string(),
                        FetchedArticle {
                            title: format!("Title for {u}"),
                            url: u.to_string(),
                            text: "body".into(),
                            language: None,
                        },
                    )
                })
                .collect();
            Self {
                articles,
                feed: urls.iter().map(|u| u.to_string()).collect(),
            }
        }
    }

    impl ArticleFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedArticle> {
            self.articles
                .get(url)
                .cloned()
                .ok_or_else(|| MoralGraphError::Fetch(format!("{url}: HTTP 404")))
        }

        async fn fetch_feed(&self, _feed_url: &str) -> Result<Vec<String>> {
            Ok(self.feed.clone())
        }
    }

    /// Scorer returning one care score per article, except for urls listed
    /// as unscorable (error) or scoreless (empty result).
    struct FixedScorer {
        failing: Vec<String>,
        empty: Vec<String>,
    }

    impl FixedScorer {
        fn new() -> Self {
            Self {
                failing: vec![],
                empty: vec![],
            }
        }
    }

    impl MoralScorer for FixedScorer {
        async fn score(&self, article: &FetchedArticle) -> Result<Vec<ScoredFoundation>> {
            if self.failing.contains(&article.url) {
                return Err(MoralGraphError::Scoring(format!(
                    "{}: model unavailable",
                    article.url
                )));
            }
            if self.empty.contains(&article.url) {
                return Ok(vec![]);
            }
            Ok(vec![ScoredFoundation {
                foundation: Foundation::Care,
                polarity: Polarity::Virtue,
                intensity: 7.5,
                confidence: Some(0.9),
                hits: Some(2),
            }])
        }
    }

    async fn mock_graph() -> (MockServer, FusekiClient) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let client = FusekiClient::for_base_url(&server.uri()).unwrap();
        (server, client)
    }

    async fn update_bodies(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/update")
            .map(|r| String::from_utf8(r.body.clone()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_persists_and_projects_both_articles() {
        let urls = vec![
            "https://news.example.com/a".to_string(),
            "https://news.example.com/b".to_string(),
        ];
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        // Second article scores nothing: metadata still projected, no annotation.
        let scorer = FixedScorer {
            failing: vec![],
            empty: vec!["https://news.example.com/b".into()],
        };
        let storage = test_storage().await;
        let (server, graph) = mock_graph().await;
        let projector = Projector::new(&graph);

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let report = pipeline
            .annotate_and_project(&urls, RequestMode::Batch, &projector)
            .await
            .expect("run");

        assert_eq!(report.persisted_articles, 2);
        assert_eq!(report.persisted_assessments, 1);
        assert!(report.skipped.is_empty());
        assert_eq!(report.projection.articles, 2);
        assert_eq!(report.projection.annotations, 1);

        let bodies = update_bodies(&server).await;
        assert_eq!(bodies.len(), 3);
        // The one annotation statement carries all six facts.
        let annotation = bodies
            .iter()
            .find(|b| b.contains("MoralValueAnnotation"))
            .expect("annotation statement");
        assert_eq!(annotation.matches(" .\n").count(), 6);
    }

    #[tokio::test]
    async fn batch_mode_skips_failing_urls() {
        let urls = vec![
            "https://news.example.com/a".to_string(),
            "https://news.example.com/missing".to_string(),
            "https://news.example.com/b".to_string(),
        ];
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline.annotate(&urls, RequestMode::Batch).await.expect("run");

        assert_eq!(result.persisted.articles.len(), 2);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].url, "https://news.example.com/missing");
        assert!(result.skipped[0].reason.contains("404"));
    }

    #[tokio::test]
    async fn single_mode_aborts_on_fetch_failure() {
        let urls = vec!["https://news.example.com/missing".to_string()];
        let fetcher = MapFetcher::new(&[]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline.annotate(&urls, RequestMode::Single).await;
        assert!(matches!(result, Err(MoralGraphError::Fetch(_))));
        assert!(storage.list_articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scoring_failure_skipped_in_batch_mode() {
        let urls = vec![
            "https://news.example.com/a".to_string(),
            "https://news.example.com/b".to_string(),
        ];
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        let scorer = FixedScorer {
            failing: vec!["https://news.example.com/a".into()],
            empty: vec![],
        };
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline.annotate(&urls, RequestMode::Batch).await.expect("run");
        assert_eq!(result.persisted.articles.len(), 1);
        assert_eq!(result.persisted.articles[0].url, "https://news.example.com/b");
        assert_eq!(result.skipped.len(), 1);
    }

    #[tokio::test]
    async fn feed_mode_expands_then_runs_batch_policy() {
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline
            .annotate_feed("https://news.example.com/rss")
            .await
            .expect("run");
        assert_eq!(result.persisted.articles.len(), 2);
    }

    #[tokio::test]
    async fn projection_failure_keeps_relational_rows() {
        let urls = vec![
            "https://news.example.com/a".to_string(),
            "https://news.example.com/b".to_string(),
        ];
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        // Graph refuses everything.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let graph = FusekiClient::for_base_url(&server.uri()).unwrap();
        let projector = Projector::new(&graph);

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline
            .annotate_and_project(&urls, RequestMode::Batch, &projector)
            .await;
        assert!(matches!(result, Err(MoralGraphError::Projection(_))));

        // The relational half committed before projection started.
        assert_eq!(storage.list_articles().await.unwrap().len(), 2);
        assert_eq!(storage.list_assessments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn backfill_reprojects_the_whole_store() {
        let fetcher = MapFetcher::new(&["https://news.example.com/a", "https://news.example.com/b"]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        pipeline
            .annotate(
                &[
                    "https://news.example.com/a".to_string(),
                    "https://news.example.com/b".to_string(),
                ],
                RequestMode::Batch,
            )
            .await
            .expect("persist");

        let (server, graph) = mock_graph().await;
        let projector = Projector::new(&graph);
        let report = backfill(&storage, &projector, DropPolicy::default())
            .await
            .expect("backfill");

        assert_eq!(report.articles, 2);
        assert_eq!(report.annotations, 2);
        let bodies = update_bodies(&server).await;
        assert_eq!(bodies.len(), 4);
        // Identifiers were never stored, so subjects use the derived form.
        assert!(bodies[0].contains("datasets#article:"));
    }

    #[tokio::test]
    async fn keep_empty_policy_flows_through_projection() {
        let fetcher = MapFetcher::new(&["https://news.example.com/a"]);
        let scorer = FixedScorer {
            failing: vec![],
            empty: vec!["https://news.example.com/a".into()],
        };
        let storage = test_storage().await;
        let (server, graph) = mock_graph().await;
        let projector = Projector::new(&graph);

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage)
            .with_drop_policy(DropPolicy::from_flag(false));
        let report = pipeline
            .annotate_and_project(
                &["https://news.example.com/a".to_string()],
                RequestMode::Single,
                &projector,
            )
            .await
            .expect("run");

        // The scoreless article's row survives normalization; it carries no
        // scores, so only the metadata statement goes out.
        assert_eq!(report.projection.articles, 1);
        assert_eq!(report.projection.annotations, 0);
        let bodies = update_bodies(&server).await;
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("NewsArticle"));
    }

    #[tokio::test]
    async fn article_assessments_lookup() {
        let fetcher = MapFetcher::new(&["https://news.example.com/a"]);
        let scorer = FixedScorer::new();
        let storage = test_storage().await;

        let pipeline = Pipeline::new(&fetcher, &scorer, &storage);
        let result = pipeline
            .annotate(&["https://news.example.com/a".to_string()], RequestMode::Single)
            .await
            .expect("persist");
        let id = result.persisted.articles[0].id;

        let (article, assessments) = pipeline.article_assessments(id).await.expect("lookup");
        assert_eq!(article.id, id);
        assert_eq!(assessments.len(), 1);
        assert_eq!(assessments[0].moral_foundation, "care");

        let missing = pipeline.article_assessments(id + 100).await;
        assert!(matches!(missing, Err(MoralGraphError::Validation { .. })));
    }

    #[tokio::test]
    async fn health_reports_both_stores() {
        let storage = test_storage().await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"boolean": true})),
            )
            .mount(&server)
            .await;
        let graph = FusekiClient::for_base_url(&server.uri()).unwrap();

        let report = health(&storage, &graph).await;
        assert!(report.database);
        assert!(report.graph_store);
        assert!(report.healthy());

        // Dead graph endpoint flips only that flag.
        let dead = FusekiClient::for_base_url("http://127.0.0.1:1").unwrap();
        let report = health(&storage, &dead).await;
        assert!(report.database);
        assert!(!report.graph_store);
        assert!(!report.healthy());
    }
}
