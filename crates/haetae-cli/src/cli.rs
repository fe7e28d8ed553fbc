use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "haetae")]
#[command(author, version, about = "Korean hate-speech detection toolkit")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge raw annotation files into the canonical binary-labeled CSV
    Preprocess(PreprocessArgs),

    /// Split the canonical CSV into stratified train/validation/test files
    Split(SplitArgs),

    /// Train a LoRA adapter against a frozen backbone
    Train(TrainArgs),

    /// Score a backend against a labeled test file
    Eval(EvalArgs),

    /// Serve the local adapter model over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// Raw tab-separated annotation files, merged in the given order
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Output path for the canonical CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// Skip rows with malformed labels instead of aborting
    #[arg(long)]
    pub skip_malformed: bool,
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Canonical CSV produced by `preprocess`
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory receiving train.csv, validation.csv and test.csv
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Training fraction of the whole dataset
    #[arg(long, default_value_t = 0.8)]
    pub train: f64,

    /// Validation fraction of the whole dataset
    #[arg(long, default_value_t = 0.1)]
    pub validation: f64,

    /// Test fraction of the whole dataset
    #[arg(long, default_value_t = 0.1)]
    pub test: f64,

    /// Shuffle seed; the same seed reproduces the same split
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training partition CSV
    #[arg(long)]
    pub train: PathBuf,

    /// Validation partition CSV
    #[arg(long)]
    pub validation: PathBuf,

    /// Backbone: a local directory or a Hugging Face repository id
    #[arg(short, long)]
    pub backbone: String,

    /// Output directory for the adapter artifact
    #[arg(short, long)]
    pub output: PathBuf,

    /// Optional YAML file with LoRA and schedule defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the LoRA rank
    #[arg(long)]
    pub rank: Option<usize>,

    /// Override the LoRA alpha
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Override the learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Override the batch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Override the epoch count
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Override the shuffle seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Locally-served backbone + adapter
    Local,
    /// OpenAI chat-completions API
    Openai,
    /// Naver CLOVA Studio API
    Clova,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Test partition CSV
    #[arg(short, long)]
    pub test: PathBuf,

    /// Which backend to score
    #[arg(short, long, value_enum)]
    pub backend: BackendKind,

    /// Adapter artifact directory (local backend only)
    #[arg(long)]
    pub adapter: Option<PathBuf>,

    /// Backbone directory or repository id (local backend only)
    #[arg(long)]
    pub backbone: Option<String>,

    /// Score only the first N examples
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Adapter artifact directory
    #[arg(long)]
    pub adapter: PathBuf,

    /// Backbone directory or repository id
    #[arg(short, long)]
    pub backbone: String,

    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1")]
    pub listen: String,

    /// Listen port
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,
}
