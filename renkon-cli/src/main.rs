//! Demo binary for `renkon-core`: a scenario-driven mock of a bank accounts
//! API, wired up with the scenarios from `spec.md` §8's end-to-end examples.

use clap::Parser;
use http::{Method, StatusCode};
use renkon_core::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "renkon", version, about = "Renkon demo server: a mock accounts API")]
struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Port to bind the HTTP listener on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn accounts_endpoint() -> Endpoint {
    EndpointBuilder::json(Method::GET, "/accounts")
        .id("GET-/accounts")
        .description("List the accounts belonging to the current session")
        .static_response(
            "zero-balance",
            ResponseEnvelope::json(
                StatusCode::OK,
                &serde_json::json!([{
                    "name": "Annabelle Citizen",
                    "bsb": "000123",
                    "number": "123456789",
                    "balance": 0,
                }]),
            ),
        )
        .static_response(
            "millionaire",
            ResponseEnvelope::json(
                StatusCode::OK,
                &serde_json::json!([{
                    "name": "Annabelle Citizen",
                    "bsb": "000123",
                    "number": "123456789",
                    "balance": 1_000_000,
                }]),
            ),
        )
        .build()
}

fn wire_demo_server() -> Server {
    let mut server = Server::new();
    server
        .add_endpoint(accounts_endpoint())
        .expect("demo endpoints never collide");

    let accounts = EndpointId::new("GET-/accounts");

    server.add_scenario(Scenario::new("flat-broke").configure(
        accounts.clone(),
        vec![ActionConfiguration::new("return-response").with("response-id", "zero-balance")],
    ));
    server.add_scenario(Scenario::new("rotating").configure(
        accounts.clone(),
        vec![
            ActionConfiguration::new("return-response").with("response-id", "zero-balance"),
            ActionConfiguration::new("return-response").with("response-id", "millionaire"),
        ],
    ));
    server.add_scenario(Scenario::new("super-rich").configure(
        accounts,
        vec![
            ActionConfiguration::new("wait").with("duration.seconds", 2i64),
            ActionConfiguration::new("return-response").with("response-id", "millionaire"),
        ],
    ));
    server.set_default_scenario(Some(ScenarioId::new("flat-broke")));

    server
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.hostname, cli.port);
    let server = wire_demo_server();

    tracing::info!(%addr, "starting renkon demo server");
    match server.run(&addr).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "renkon demo server exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
