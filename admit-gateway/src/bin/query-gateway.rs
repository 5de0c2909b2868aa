//! Entry point for the query service.

use std::sync::Arc;

use admit_core::{admission, SecretPolicy, QUERY_SEED_MIX};
use admit_gateway::config::QueryServiceConfig;
use admit_gateway::routes::{query_router, QueryState};
use admit_query::{MySqlExecutor, QueryExecutor, QueryFilter, QueryService, SqlGrammarValidator};

#[tokio::main]
async fn main() {
    admit_gateway::telemetry::init();

    let config = match QueryServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    // An unreachable store aborts startup.
    let connected = MySqlExecutor::connect(&config.database_url).await;
    let executor: Arc<dyn QueryExecutor> = match connected {
        Ok(x) => Arc::new(x),
        Err(e) => {
            tracing::error!(error = %e, "store unavailable");
            std::process::exit(1);
        }
    };

    let service = QueryService::new(
        QueryFilter::new(SqlGrammarValidator::new()),
        config.template.clone(),
        executor,
    );

    let policy = SecretPolicy::new(config.pow_prefix.clone());
    let (gate, rotator) = admission(policy, QUERY_SEED_MIX);
    let _rotation = rotator.spawn(config.rotation_period);

    let state = QueryState {
        gate,
        service: Arc::new(service),
        expose_store_errors: config.expose_store_errors,
    };
    admit_gateway::serve(&config.listen_addr, query_router(state), "query-gateway").await;
}
