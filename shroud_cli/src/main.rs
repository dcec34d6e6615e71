use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use args::{Cli, Command};
use clap::Parser;
use log::info;
use serde::Serialize;
use shroud_runtime::{
    AggregationRequest, ArithmeticRequest, Engine, EngineConfig, ScoringRequest,
    SimilarityRequest, VoteRequest,
};

mod args;

fn parse_vector(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|x| {
            x.trim()
                .parse::<f64>()
                .with_context(|| format!("\"{x}\" is not a number"))
        })
        .collect()
}

fn print_json<R: Serialize>(r: &R) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(r)?);

    Ok(())
}

fn serve(engine: &Engine) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    info!("Serving JSON requests on stdin");

    for line in stdin.lock().lines() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        writeln!(stdout, "{}", engine.handle_json(&line))?;
        stdout.flush()?;
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let engine = Engine::new(config)?;

    match cli.command {
        Command::Status => print_json(&engine.status())?,
        Command::Score(cmd) => print_json(&engine.weighted_score(&ScoringRequest {
            metric_a: cmd.metric_a,
            metric_b: cmd.metric_b,
            weight_a: cmd.weight_a,
            weight_b: cmd.weight_b,
            scheme: Some(cmd.scheme.into()),
            preset: cmd.preset.preset,
        })?)?,
        Command::Similarity(cmd) => {
            let candidates = cmd
                .candidates
                .iter()
                .map(|c| parse_vector(c))
                .collect::<Result<Vec<_>>>()?;

            print_json(&engine.similarity_rank(&SimilarityRequest {
                query: cmd.query,
                candidates,
                preset: cmd.preset.preset,
            })?)?
        }
        Command::Aggregate(cmd) => {
            let participants = cmd
                .participants
                .iter()
                .map(|p| parse_vector(p))
                .collect::<Result<Vec<_>>>()?;

            print_json(&engine.aggregate(&AggregationRequest {
                participants,
                mode: cmd.mode(),
                scheme: Some(cmd.scheme.into()),
                preset: cmd.preset.preset,
            })?)?
        }
        Command::Arithmetic(cmd) => print_json(&engine.verified_arithmetic(&ArithmeticRequest {
            a: cmd.a,
            b: cmd.b,
            operations: cmd.ops.into_iter().map(Into::into).collect(),
            scheme: cmd.scheme.into(),
            preset: cmd.preset.preset,
        })?)?,
        Command::Vote(cmd) => print_json(&engine.tally_votes(&VoteRequest {
            votes: cmd.votes,
            num_candidates: cmd.candidates,
            preset: cmd.preset.preset,
        })?)?,
        Command::Serve => serve(&engine)?,
    }

    Ok(())
}
