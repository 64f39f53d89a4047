//! Projection of canonical batches into the triple store.
//!
//! Article metadata triples are keyed by the article's stable identifier, so
//! re-projecting the same batch is idempotent for them under the store's
//! set-union insert semantics. Annotation nodes are minted fresh per run and
//! therefore accumulate on re-projection; callers who re-run a projection own
//! that duplication.
//!
//! Each article's metadata and each annotation goes out as its own
//! `INSERT DATA` statement. A failed statement aborts the remainder of the
//! run without retracting anything already sent.

use moralgraph_shared::{
    AssessmentRow, ArticleRow, CanonicalBatch, Foundation, FoundationScore, Polarity, Result,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::client::FusekiClient;
use crate::triples::{
    self, AMOR_MFT_HAS_CATEGORY, AMOR_MFT_HAS_POLARITY, AMOR_MFT_HAS_POLARITY_INTENSITY,
    AMOR_MORAL_VALUE_ANNOTATION, DCTERMS_IDENTIFIER, ITSRDF_TA_CONFIDENCE, OA_HAS_TARGET,
    RDFS_LABEL, RDF_TYPE, SCHEMA_HEADLINE, SCHEMA_NEWS_ARTICLE, SCHEMA_URL, Term, Triple,
};

/// Counts from one projection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionReport {
    /// Article metadata statements sent.
    pub articles: usize,
    /// Annotation nodes minted and sent.
    pub annotations: usize,
    /// Foundation scores skipped for a non-finite intensity.
    pub skipped_scores: usize,
}

/// Metadata triples for one article, keyed by its stable identifier.
pub fn article_triples(article: &ArticleRow) -> Vec<Triple> {
    let subject = triples::article_subject(&article.identifier);
    let mut out = vec![
        Triple::new(&subject, RDF_TYPE, Term::Iri(SCHEMA_NEWS_ARTICLE.into())),
        Triple::new(&subject, DCTERMS_IDENTIFIER, Term::integer(article.article_id)),
    ];
    if let Some(title) = &article.title {
        out.push(Triple::new(&subject, SCHEMA_HEADLINE, Term::Literal(title.clone())));
        out.push(Triple::new(&subject, RDFS_LABEL, Term::Literal(title.clone())));
    }
    if let Some(url) = &article.url {
        out.push(Triple::new(&subject, SCHEMA_URL, Term::iri_or_literal(url)));
    }
    out
}

/// Triples for one freshly minted annotation node.
///
/// Polarity is re-derived from the intensity rather than read from the score,
/// so a stale stored label can never disagree with the number next to it.
pub fn annotation_triples(
    annotation_id: &Uuid,
    article_identifier: &str,
    foundation: Foundation,
    score: &FoundationScore,
) -> Vec<Triple> {
    let subject = triples::annotation_iri(annotation_id);
    let polarity = Polarity::from_intensity(score.intensity);

    let mut out = vec![
        Triple::new(&subject, RDF_TYPE, Term::Iri(AMOR_MORAL_VALUE_ANNOTATION.into())),
        Triple::new(
            &subject,
            AMOR_MFT_HAS_CATEGORY,
            Term::Iri(triples::foundation_category(foundation)),
        ),
        Triple::new(
            &subject,
            AMOR_MFT_HAS_POLARITY,
            Term::Iri(triples::polarity_value(polarity.as_str())),
        ),
        Triple::new(&subject, AMOR_MFT_HAS_POLARITY_INTENSITY, Term::float(score.intensity)),
        Triple::new(
            &subject,
            OA_HAS_TARGET,
            Term::Iri(triples::article_subject(article_identifier)),
        ),
    ];
    if let Some(confidence) = score.confidence {
        out.push(Triple::new(&subject, ITSRDF_TA_CONFIDENCE, Term::float(confidence)));
    }
    out
}

/// Sends canonical batches to the triple store.
pub struct Projector<'a> {
    client: &'a FusekiClient,
}

impl<'a> Projector<'a> {
    pub fn new(client: &'a FusekiClient) -> Self {
        Self { client }
    }

    /// Project a whole batch: every article's metadata first, in input order,
    /// then each assessment row's foundations in the fixed order.
    #[instrument(skip_all, fields(articles = batch.articles.len()))]
    pub async fn project(&self, batch: &CanonicalBatch) -> Result<ProjectionReport> {
        let mut report = ProjectionReport::default();

        for article in &batch.articles {
            let statement = triples::insert_data(&article_triples(article));
            self.client.send_update(&statement).await?;
            report.articles += 1;
        }

        for assessment in &batch.assessments {
            let sent = self.project_assessment(batch, assessment, &mut report).await?;
            debug!(article_id = assessment.article_id, annotations = sent, "assessment projected");
        }

        info!(
            articles = report.articles,
            annotations = report.annotations,
            skipped = report.skipped_scores,
            "projection complete"
        );
        Ok(report)
    }

    async fn project_assessment(
        &self,
        batch: &CanonicalBatch,
        assessment: &AssessmentRow,
        report: &mut ProjectionReport,
    ) -> Result<usize> {
        // Fall back to the derived identifier when the metadata row is gone.
        let identifier = batch
            .article(assessment.article_id)
            .map(|a| a.identifier.clone())
            .unwrap_or_else(|| format!("article:{}", assessment.article_id));

        let mut sent = 0;
        for (foundation, score) in assessment.foundations.iter() {
            let Some(score) = score else { continue };
            if !score.intensity.is_finite() {
                debug!(
                    article_id = assessment.article_id,
                    foundation = %foundation,
                    "skipping score with non-finite intensity"
                );
                report.skipped_scores += 1;
                continue;
            }

            let annotation_id = Uuid::now_v7();
            let statement = triples::insert_data(&annotation_triples(
                &annotation_id,
                &identifier,
                foundation,
                score,
            ));
            self.client.send_update(&statement).await?;
            report.annotations += 1;
            sent += 1;
        }
        Ok(sent)
    }
}
