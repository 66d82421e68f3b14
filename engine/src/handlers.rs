//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: Run the HTTP gateway
//! - generate: Run the pipeline once in-process
//! - check: Validate configuration and probe the provider

use anyhow::{Context, Result};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::conductor::Conductor;
use crate::config::Config;
use crate::gateway::{self, AppState, BearerAuth};
use crate::llm::openai::OpenAIProvider;
use crate::llm::LLMProvider;
use crate::secrets::Secrets;
use sdk::types::{VariantRequest, VariantResult};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn build_conductor(config: Arc<Config>, secrets: &Secrets) -> Arc<Conductor> {
    let provider: Arc<dyn LLMProvider> = Arc::new(OpenAIProvider::new(
        config.llm.clone(),
        secrets.api_key.clone(),
    ));
    Arc::new(Conductor::new(provider, config))
}

/// Run the HTTP gateway until Ctrl-C
pub async fn handle_serve(
    mut config: Config,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let secrets = Secrets::from_env(&config);
    if secrets.api_key.is_none() {
        tracing::warn!("{} is not set; upstream calls will fail", config.llm.api_key_env);
    }

    let auth = BearerAuth::new(secrets.auth_token.as_ref());
    let conductor = build_conductor(Arc::new(config), &secrets);

    gateway::serve(AppState::new(conductor, auth), addr).await
}

/// Generate variants once, without authentication
pub async fn handle_generate(
    question: String,
    num: i64,
    config: Config,
    format: OutputFormat,
) -> Result<()> {
    let request = VariantRequest::new(&question, num)?;
    let secrets = Secrets::from_env(&config);
    let conductor = build_conductor(Arc::new(config), &secrets);

    let result = match conductor.generate(&request).await {
        Ok(result) => result,
        Err(failure) => {
            if let OutputFormat::Json = format {
                let output = json!({
                    "error": failure.error.to_string(),
                    "time": failure.elapsed_ms,
                    "usage": failure.usage,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            return Err(failure.error).context("Variant generation failed");
        }
    };

    match format {
        OutputFormat::Text => print_result(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}

fn print_result(result: &VariantResult) {
    println!("Knowledge point: {}", result.knowledge_point_name);
    println!("  {}", result.knowledge_point_summary);
    println!();

    for (i, question) in result.variant_questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.prompt);
        println!("   A. {}", question.option_a);
        println!("   B. {}", question.option_b);
        println!("   C. {}", question.option_c);
        println!("   D. {}", question.option_d);
        println!("   Answer: {}", question.correct_option);
        println!("   {}", question.explanation);
        println!();
    }

    if !result.unmet_directives.is_empty() {
        println!("Unmet directives: {}", result.unmet_directives.join(", "));
    }
    println!(
        "Time: {} ms  Tokens: {} (input {}, output {}, reasoning {})",
        result.time,
        result.usage.total_tokens,
        result.usage.input_tokens,
        result.usage.output_tokens,
        result.usage.reasoning_tokens
    );
}

/// Validate configuration and check that the provider is reachable
pub async fn handle_check(config: Config, format: OutputFormat) -> Result<()> {
    let mut checks = Vec::new();
    let mut issues = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid"));

    let secrets = Secrets::from_env(&config);
    if secrets.api_key.is_some() {
        checks.push(("Provider API key", "Present"));
    } else {
        checks.push(("Provider API key", "Missing"));
        issues.push(format!("{} is not set", config.llm.api_key_env));
    }
    if secrets.auth_token.is_some() {
        checks.push(("Gateway bearer token", "Present"));
    } else {
        checks.push(("Gateway bearer token", "Missing"));
        issues.push(format!(
            "{} is not set; the gateway will reject every request",
            config.auth.token_env
        ));
    }

    let provider = OpenAIProvider::new(config.llm.clone(), secrets.api_key.clone());
    if provider.check_health().await {
        checks.push(("Provider", "Reachable"));
    } else {
        checks.push(("Provider", "Unreachable"));
        issues.push(format!("Cannot reach {}", config.llm.base_url));
    }

    match format {
        OutputFormat::Text => {
            println!("variantd configuration check");
            println!("============================");
            println!();
            println!("  {:<25} {}", "Model:", config.llm.model);
            println!("  {:<25} {}", "Endpoint:", config.llm.base_url);
            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }
            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "model": config.llm.model,
                "endpoint": config.llm.base_url,
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
