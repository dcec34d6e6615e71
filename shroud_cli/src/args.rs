use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use shroud_lattice::Scheme;
use shroud_runtime::{AggregationMode, ArithmeticOp};

#[derive(Debug, Parser)]
#[command(version, about = "Compute on encrypted vectors with the Shroud engine", long_about = None)]
pub struct Cli {
    #[arg(long, global = true)]
    /// A TOML configuration file. `SHROUD_`-prefixed environment variables override it.
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the engine's availability, presets and counters.
    Status,

    /// Compute weighted composite scores under encryption.
    Score(ScoreCommand),

    /// Rank candidates by their encrypted inner product with a query.
    Similarity(SimilarityCommand),

    /// Sum or average participant vectors under encryption.
    Aggregate(AggregateCommand),

    /// Run operations on two encrypted vectors and compare them to plaintext.
    Arithmetic(ArithmeticCommand),

    /// Tally one-hot encrypted ballots.
    Vote(VoteCommand),

    /// Read JSON requests from stdin, one per line, and write one JSON response per line.
    Serve,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SchemeArg {
    ApproxReal,
    ExactInteger,
}

impl From<SchemeArg> for Scheme {
    fn from(s: SchemeArg) -> Self {
        match s {
            SchemeArg::ApproxReal => Scheme::ApproxReal,
            SchemeArg::ExactInteger => Scheme::ExactInteger,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OpArg {
    Add,
    Multiply,
    DotProduct,
    Negate,
}

impl From<OpArg> for ArithmeticOp {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Add => ArithmeticOp::Add,
            OpArg::Multiply => ArithmeticOp::Multiply,
            OpArg::DotProduct => ArithmeticOp::DotProduct,
            OpArg::Negate => ArithmeticOp::Negate,
        }
    }
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    #[arg(long)]
    /// The parameter preset. Defaults to "light".
    pub preset: Option<String>,
}

#[derive(Debug, Args)]
pub struct ScoreCommand {
    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub metric_a: Vec<f64>,

    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub metric_b: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "0.5", allow_negative_numbers = true)]
    /// One weight for every entity, or a single weight for all.
    pub weight_a: Vec<f64>,

    #[arg(long, value_delimiter = ',', default_value = "0.5", allow_negative_numbers = true)]
    /// One weight for every entity, or a single weight for all.
    pub weight_b: Vec<f64>,

    #[arg(long, value_enum, default_value_t = SchemeArg::ApproxReal)]
    pub scheme: SchemeArg,

    #[command(flatten)]
    pub preset: PresetArgs,
}

#[derive(Debug, Args)]
pub struct SimilarityCommand {
    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub query: Vec<f64>,

    #[arg(long = "candidate", required = true, allow_negative_numbers = true)]
    /// A comma-separated candidate vector. Repeat for each candidate.
    pub candidates: Vec<String>,

    #[command(flatten)]
    pub preset: PresetArgs,
}

#[derive(Debug, Args)]
pub struct AggregateCommand {
    #[arg(long = "participant", required = true, allow_negative_numbers = true)]
    /// A comma-separated participant vector. Repeat for each participant.
    pub participants: Vec<String>,

    #[arg(long)]
    /// Average rather than sum.
    pub average: bool,

    #[arg(long, value_enum, default_value_t = SchemeArg::ApproxReal)]
    pub scheme: SchemeArg,

    #[command(flatten)]
    pub preset: PresetArgs,
}

impl AggregateCommand {
    pub fn mode(&self) -> AggregationMode {
        if self.average {
            AggregationMode::Average
        } else {
            AggregationMode::Sum
        }
    }
}

#[derive(Debug, Args)]
pub struct ArithmeticCommand {
    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub a: Vec<f64>,

    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub b: Vec<f64>,

    #[arg(long = "op", value_enum, value_delimiter = ',', default_value = "add,multiply,dot-product,negate")]
    /// The operations to check.
    pub ops: Vec<OpArg>,

    #[arg(long, value_enum, default_value_t = SchemeArg::ApproxReal)]
    pub scheme: SchemeArg,

    #[command(flatten)]
    pub preset: PresetArgs,
}

#[derive(Debug, Args)]
pub struct VoteCommand {
    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    /// The candidate index of every ballot.
    pub votes: Vec<i64>,

    #[arg(long)]
    pub candidates: usize,

    #[command(flatten)]
    pub preset: PresetArgs,
}
