//! Graph vocabulary and N-Triples statement building.
//!
//! Every store mutation is a standalone `INSERT DATA { ... }` statement whose
//! body is serialized N-Triples. Triple insertion into the store is a set
//! union, so re-sending identical triples never accumulates duplicates —
//! the projector relies on this for article metadata.

use moralgraph_shared::Foundation;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

pub const SCHEMA_NEWS_ARTICLE: &str = "http://schema.org/NewsArticle";
pub const SCHEMA_HEADLINE: &str = "http://schema.org/headline";
pub const SCHEMA_URL: &str = "http://schema.org/url";
pub const DCTERMS_IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";

pub const AMOR_MORAL_VALUE_ANNOTATION: &str =
    "http://www.gsi.upm.es/ontologies/amor/ns/1.0.0#MoralValueAnnotation";
pub const AMOR_MFT_HAS_CATEGORY: &str =
    "http://www.gsi.upm.es/ontologies/amor/models/mft/ns#hasMoralValueCategory";
pub const AMOR_MFT_HAS_POLARITY: &str =
    "http://www.gsi.upm.es/ontologies/amor/models/mft/ns#hasPolarity";
pub const AMOR_MFT_HAS_POLARITY_INTENSITY: &str =
    "http://www.gsi.upm.es/ontologies/amor/models/mft/ns#hasPolarityIntensity";
pub const ITSRDF_TA_CONFIDENCE: &str = "http://www.w3.org/2005/11/its/rdf#taConfidence";
pub const OA_HAS_TARGET: &str = "http://www.w3.org/ns/oa#hasTarget";

const MFT_NS: &str = "http://www.gsi.upm.es/ontologies/amor/models/mft/ns#";
const DATASETS_NS: &str = "http://example.org/datasets#";
const ANNOTATION_NS: &str = "http://example.org/annotation/";
const MFT_CATEGORY_NS: &str = "http://www.gsi.upm.es/ontologies/mft/ns#";

/// Subject IRI for an article, derived from its external identifier.
pub fn article_subject(identifier: &str) -> String {
    format!("{DATASETS_NS}{}", identifier.trim())
}

/// IRI for a freshly minted annotation id.
pub fn annotation_iri(id: &uuid::Uuid) -> String {
    format!("{ANNOTATION_NS}{id}")
}

/// Fixed category IRI for a moral foundation.
pub fn foundation_category(foundation: Foundation) -> String {
    let label = match foundation {
        Foundation::Care => "Care",
        Foundation::Fairness => "Fairness",
        Foundation::Loyalty => "Loyalty",
        Foundation::Authority => "Authority",
        Foundation::Purity => "Purity",
    };
    format!("{MFT_CATEGORY_NS}{label}")
}

/// Polarity value IRI; only `vice` and `virtue` exist in the vocabulary.
pub fn polarity_value(polarity_label: &str) -> String {
    format!("{MFT_NS}{polarity_label}")
}

// ---------------------------------------------------------------------------
// Triples
// ---------------------------------------------------------------------------

/// The object position of a triple.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An IRI reference.
    Iri(String),
    /// A plain string literal.
    Literal(String),
    /// A literal with an XSD datatype.
    Typed { value: String, datatype: &'static str },
}

impl Term {
    /// A `schema:url` object: IRI when the value parses as http(s),
    /// plain literal for malformed values.
    pub fn iri_or_literal(value: &str) -> Term {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Term::Iri(trimmed.to_string())
        } else {
            Term::Literal(trimmed.to_string())
        }
    }

    pub fn float(value: f64) -> Term {
        Term::Typed {
            value: value.to_string(),
            datatype: XSD_FLOAT,
        }
    }

    pub fn integer(value: i64) -> Term {
        Term::Typed {
            value: value.to_string(),
            datatype: XSD_INTEGER,
        }
    }
}

/// A single subject-predicate-object fact.
#[derive(Debug, Clone, PartialEq)]
pub struct Triple {
    pub subject: String,
    pub predicate: &'static str,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<String>, predicate: &'static str, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object,
        }
    }
}

impl std::fmt::Display for Triple {
    /// N-Triples line, terminated with ` .`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}> <{}> ", self.subject, self.predicate)?;
        match &self.object {
            Term::Iri(iri) => write!(f, "<{iri}>")?,
            Term::Literal(lit) => write!(f, "\"{}\"", escape_literal(lit))?,
            Term::Typed { value, datatype } => {
                write!(f, "\"{}\"^^<{datatype}>", escape_literal(value))?
            }
        }
        write!(f, " .")
    }
}

/// Escape a literal per N-Triples rules.
fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap triples in a standalone SPARQL `INSERT DATA` statement.
pub fn insert_data(triples: &[Triple]) -> String {
    let mut body = String::new();
    for triple in triples {
        body.push_str(&triple.to_string());
        body.push('\n');
    }
    format!("INSERT DATA {{\n{body}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntriples_formatting() {
        let t = Triple::new(
            article_subject("article:1"),
            RDF_TYPE,
            Term::Iri(SCHEMA_NEWS_ARTICLE.into()),
        );
        assert_eq!(
            t.to_string(),
            "<http://example.org/datasets#article:1> \
             <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> \
             <http://schema.org/NewsArticle> ."
        );
    }

    #[test]
    fn literal_escaping() {
        let t = Triple::new(
            article_subject("a"),
            SCHEMA_HEADLINE,
            Term::Literal("He said \"no\"\nand left".into()),
        );
        let line = t.to_string();
        assert!(line.contains(r#""He said \"no\"\nand left""#));
    }

    #[test]
    fn typed_float_literal() {
        let t = Triple::new(
            annotation_iri(&uuid::Uuid::nil()),
            AMOR_MFT_HAS_POLARITY_INTENSITY,
            Term::float(7.5),
        );
        assert!(t.to_string().contains("\"7.5\"^^<http://www.w3.org/2001/XMLSchema#float>"));
    }

    #[test]
    fn url_object_iri_vs_literal() {
        assert_eq!(
            Term::iri_or_literal("https://news.example.com/a"),
            Term::Iri("https://news.example.com/a".into())
        );
        assert_eq!(
            Term::iri_or_literal("not a url"),
            Term::Literal("not a url".into())
        );
    }

    #[test]
    fn insert_data_wraps_all_triples() {
        let triples = vec![
            Triple::new(article_subject("a"), RDF_TYPE, Term::Iri(SCHEMA_NEWS_ARTICLE.into())),
            Triple::new(article_subject("a"), RDFS_LABEL, Term::Literal("Title".into())),
        ];
        let stmt = insert_data(&triples);
        assert!(stmt.starts_with("INSERT DATA {"));
        assert!(stmt.trim_end().ends_with('}'));
        assert_eq!(stmt.matches(" .\n").count(), 2);
    }

    #[test]
    fn foundation_categories_are_fixed() {
        assert_eq!(
            foundation_category(Foundation::Care),
            "http://www.gsi.upm.es/ontologies/mft/ns#Care"
        );
        assert_eq!(
            foundation_category(Foundation::Purity),
            "http://www.gsi.upm.es/ontologies/mft/ns#Purity"
        );
    }
}
