use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query through the table cache and print a window of rows
    Query {
        /// SQL text; defaults to the query stored in the session file
        #[arg(long)]
        sql: Option<String>,

        #[arg(long, default_value_t = 20, help = "Number of rows to print")]
        rows: usize,

        #[arg(long, default_value_t = 0, help = "First row to print (zero-based)")]
        start: usize,

        #[arg(long, help = "JSON file with cache settings")]
        settings: Option<PathBuf>,
    },
    /// Validate a query and show its fields and paging plan as JSON
    Validate {
        #[arg(long)]
        sql: Option<String>,

        #[arg(long, help = "JSON file with cache settings")]
        settings: Option<PathBuf>,
    },
    /// Connect to the session's server and run a trivial query
    TestConn,
    /// Print the resolved session data with secrets masked
    Session,
}
