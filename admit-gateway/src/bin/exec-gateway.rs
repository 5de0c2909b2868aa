//! Entry point for the program execution service.

use admit_core::{admission, SecretPolicy, EXEC_SEED_MIX};
use admit_gateway::config::ExecServiceConfig;
use admit_gateway::routes::{exec_router, ExecState};
use admit_sandbox::{BuildPipeline, LocalProcessRunner};

#[tokio::main]
async fn main() {
    admit_gateway::telemetry::init();

    let config = match ExecServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let pipeline = match BuildPipeline::new(LocalProcessRunner::new(), config.sandbox.clone()) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "invalid sandbox layout");
            std::process::exit(1);
        }
    };

    let policy = SecretPolicy::new(config.pow_prefix.clone());
    let (gate, rotator) = admission(policy, EXEC_SEED_MIX);
    let _rotation = rotator.spawn(config.rotation_period);

    let app = exec_router(ExecState::new(gate, pipeline));
    admit_gateway::serve(&config.listen_addr, app, "exec-gateway").await;
}
