use clap::{Args, Parser, Subcommand, ValueEnum};
use effort_core::Slot;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "effort",
    version,
    about = "Score real-effort transcriptions and settle public-goods payoffs"
)]
pub struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a session config and print its round table
    Validate(ValidateArgs),
    /// Score one transcription against a configured slot
    Score(ScoreArgs),
    /// Replay a recorded event script and print the session report
    Replay(ReplayArgs),
    Version,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, default_value = "session.yaml", env = "EFFORT_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[arg(long, default_value = "session.yaml", env = "EFFORT_CONFIG")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = SlotArg::Second)]
    pub slot: SlotArg,

    /// Transcribed text
    #[arg(long, conflicts_with = "text_file", required_unless_present = "text_file")]
    pub text: Option<String>,

    /// Read the transcription from a file (trailing newline stripped)
    #[arg(long)]
    pub text_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    #[arg(long, default_value = "session.yaml", env = "EFFORT_CONFIG")]
    pub config: PathBuf,

    /// Event script (YAML)
    #[arg(long)]
    pub script: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Record failed events and continue instead of stopping at the first one
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SlotArg {
    First,
    Second,
}

impl From<SlotArg> for Slot {
    fn from(s: SlotArg) -> Self {
        match s {
            SlotArg::First => Slot::First,
            SlotArg::Second => Slot::Second,
        }
    }
}
