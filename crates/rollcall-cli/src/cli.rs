use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Keep an event guest list in sync across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new guest
    #[command(alias = "new")]
    Add {
        /// Guest display name
        name: String,
        #[command(flatten)]
        details: GuestDetails,
    },
    /// Update an existing guest
    #[command(alias = "edit")]
    Update {
        /// Guest name or id
        name: String,
        #[command(flatten)]
        details: GuestDetails,
        #[command(flatten)]
        flags: GuestFlags,
    },
    /// Mark a guest as attending
    CheckIn {
        /// Guest name or id
        name: String,
    },
    /// Delete a guest
    Delete {
        /// Guest name or id
        name: String,
    },
    /// List guests
    List {
        #[command(flatten)]
        filter: RosterFilterArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show event-day counters
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push local guests to the shared collection and pull missing ones
    Sync,
    /// Follow remote changes and print the roster after every update
    Watch {
        #[command(flatten)]
        filter: RosterFilterArgs,
    },
    /// Delete every guest locally and in the shared collection
    Reset {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Export guests
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import guests from a CSV sheet (name, phone, email, company)
    Import {
        /// CSV file with a header row
        path: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure the shared guest collection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct GuestDetails {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub amount: Option<String>,
    #[arg(long)]
    pub payment_mode: Option<String>,
    #[arg(long)]
    pub remarks: Option<String>,
}

#[derive(Args, Debug, Default, Clone, Copy)]
pub struct GuestFlags {
    #[arg(long, value_name = "BOOL")]
    pub attending: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub lanyard: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub gift: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub food_coupon: Option<bool>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RosterFilterArgs {
    /// Case-insensitive name search
    #[arg(short, long)]
    pub search: Option<String>,
    /// Only guests in this category
    #[arg(long)]
    pub category: Option<String>,
    /// Attendance filter
    #[arg(long, value_enum, default_value_t = Attendance::All)]
    pub attendance: Attendance,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Attendance {
    #[default]
    All,
    Present,
    YetToAttend,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the collection config
    Init {
        /// Firestore project id
        #[arg(long, value_name = "ID")]
        project_id: Option<String>,
        /// Firestore database id
        #[arg(long, value_name = "ID")]
        database: Option<String>,
        /// Guest collection name
        #[arg(long, value_name = "NAME")]
        collection: Option<String>,
        /// Firestore endpoint (e.g. <http://localhost:8080> for the emulator)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
        /// Web API key
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Seconds between remote polls in `rollcall watch`
        #[arg(long, value_name = "SECS")]
        poll_interval_secs: Option<u64>,
    },
    /// Print the effective config (file plus environment)
    Show,
}
