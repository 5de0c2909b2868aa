//! Forwarding of admitted text to the store.

use crate::error::{QueryError, StoreError};
use crate::filter::{QueryFilter, Rejection};
use crate::store::QueryExecutor;
use crate::validator::Validator;

const PLACEHOLDER: &str = "{sql}";

/// Statement the admitted text is spliced into. The default forwards the
/// admitted text as the whole statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplate {
    before: String,
    after: String,
}

impl QueryTemplate {
    /// Parse a template holding exactly one `{sql}` placeholder.
    ///
    /// # Errors
    /// Returns [`QueryError::InvalidTemplate`] otherwise.
    pub fn parse(template: &str) -> Result<Self, QueryError> {
        match template.split_once(PLACEHOLDER) {
            Some((before, after)) if !after.contains(PLACEHOLDER) => Ok(Self {
                before: before.to_owned(),
                after: after.to_owned(),
            }),
            _ => Err(QueryError::InvalidTemplate(template.to_owned())),
        }
    }

    /// Splice `sql` into the template.
    #[must_use]
    pub fn render(&self, sql: &str) -> String {
        let mut out = String::with_capacity(self.before.len() + sql.len() + self.after.len());
        out.push_str(&self.before);
        out.push_str(sql);
        out.push_str(&self.after);
        out
    }
}

/// Result of forwarding an admitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// First column of the first row.
    Scalar(String),
    /// The statement produced no rows.
    EmptySet,
    /// The store refused the statement; carries its message.
    StoreFailed(String),
}

/// Filter plus executor: the query service proper.
pub struct QueryService<V, E> {
    filter: QueryFilter<V>,
    template: QueryTemplate,
    executor: E,
}

impl<V: Validator, E: QueryExecutor> QueryService<V, E> {
    /// Create a service from its parts.
    pub fn new(filter: QueryFilter<V>, template: QueryTemplate, executor: E) -> Self {
        Self {
            filter,
            template,
            executor,
        }
    }

    /// Screen `text` and, if admitted, run it against the store.
    ///
    /// Rejected text never reaches the executor.
    ///
    /// # Errors
    /// Returns the [`Rejection`] when the filter refuses the text.
    pub async fn handle(&self, text: &str) -> Result<QueryOutcome, Rejection> {
        if let Err(rejection) = self.filter.admit(text) {
            tracing::info!(sql = %text, reason = %rejection, "query rejected");
            return Err(rejection);
        }
        tracing::info!(sql = %text, "query admitted");

        let statement = self.template.render(text);
        let outcome = match self.executor.first_scalar(&statement).await {
            Ok(Some(value)) => QueryOutcome::Scalar(value),
            Ok(None) => QueryOutcome::EmptySet,
            Err(StoreError::Query(message)) => {
                tracing::warn!(sql = %text, error = %message, "store rejected query");
                QueryOutcome::StoreFailed(message)
            }
            Err(other) => {
                tracing::warn!(sql = %text, error = %other, "store failure");
                QueryOutcome::StoreFailed(other.to_string())
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::validator::SqlGrammarValidator;

    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<String>>,
        reply: Option<Result<Option<String>, String>>,
    }

    impl RecordingStore {
        fn replying(reply: Result<Option<String>, String>) -> Self {
            Self {
                seen: Mutex::default(),
                reply: Some(reply),
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for RecordingStore {
        async fn first_scalar(&self, sql: &str) -> Result<Option<String>, StoreError> {
            self.seen.lock().expect("lock").push(sql.to_owned());
            match self.reply.clone() {
                Some(Ok(v)) => Ok(v),
                Some(Err(e)) => Err(StoreError::Query(e)),
                None => Ok(None),
            }
        }
    }

    fn service(store: RecordingStore) -> QueryService<SqlGrammarValidator, RecordingStore> {
        QueryService::new(
            QueryFilter::new(SqlGrammarValidator::new()),
            QueryTemplate::default(),
            store,
        )
    }

    #[tokio::test]
    async fn rejected_queries_never_reach_the_store() {
        let svc = service(RecordingStore::default());
        for text in ["1 OR 1", "1;1", "ab", "select 1", "a'b"] {
            assert!(svc.handle(text).await.is_err(), "{text:?} must be rejected");
        }
        assert!(svc.executor.seen().is_empty());
    }

    #[tokio::test]
    async fn admitted_query_is_forwarded_verbatim() {
        let svc = service(RecordingStore::replying(Ok(Some("42".into()))));
        let outcome = svc.handle("xyz123").await;
        assert_eq!(outcome, Ok(QueryOutcome::Scalar("42".into())));
        assert_eq!(svc.executor.seen(), vec!["xyz123".to_owned()]);
    }

    #[tokio::test]
    async fn no_rows_is_empty_set() {
        let svc = service(RecordingStore::replying(Ok(None)));
        assert_eq!(svc.handle("xyz123").await, Ok(QueryOutcome::EmptySet));
    }

    #[tokio::test]
    async fn store_error_is_reported_not_raised() {
        let svc = service(RecordingStore::replying(Err("Unknown column".into())));
        assert_eq!(
            svc.handle("xyz123").await,
            Ok(QueryOutcome::StoreFailed("Unknown column".into()))
        );
    }

    #[tokio::test]
    async fn template_wraps_admitted_text() {
        let template = match QueryTemplate::parse("select {sql} from dual") {
            Ok(t) => t,
            Err(e) => panic!("template: {e}"),
        };
        let svc = QueryService::new(
            QueryFilter::new(SqlGrammarValidator::new()),
            template,
            RecordingStore::default(),
        );
        let _ = svc.handle("xyz123").await;
        assert_eq!(svc.executor.seen(), vec!["select xyz123 from dual".to_owned()]);
    }

    #[test]
    fn template_requires_exactly_one_placeholder() {
        assert!(QueryTemplate::parse("select 1").is_err());
        assert!(QueryTemplate::parse("{sql} {sql}").is_err());
        assert_eq!(
            QueryTemplate::parse("{sql}").map(|t| t.render("a b")).ok(),
            Some("a b".to_owned())
        );
    }
}
