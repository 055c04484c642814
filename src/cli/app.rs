use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "ibdrow")]
#[command(about = "Read rows straight out of InnoDB tablespace files")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Log B+tree descent and page loads to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// UTC offset TIMESTAMP values are rendered in (e.g. +08:00)
    #[arg(long, default_value = "+00:00", global = true)]
    pub tz: String,

    /// Verify page checksums on every read
    #[arg(long = "verify-checksums", global = true)]
    pub verify_checksums: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Where the table definition comes from.
#[derive(Args, Clone)]
pub struct TableSource {
    /// Path to a JSON table definition
    #[arg(short, long, conflicts_with = "sdi", required_unless_present = "sdi")]
    pub table: Option<String>,

    /// Derive the table definition from the tablespace's own SDI
    #[arg(long)]
    pub sdi: bool,
}

/// Range bounds shared by `range` and `index`.
///
/// Multi-column bounds are comma separated and may bind a leading prefix
/// of the key.
#[derive(Args, Clone, Default)]
pub struct Bounds {
    /// Rows with key greater than this value
    #[arg(long, conflicts_with = "gte")]
    pub gt: Option<String>,

    /// Rows with key greater than or equal to this value
    #[arg(long)]
    pub gte: Option<String>,

    /// Rows with key less than this value
    #[arg(long, conflicts_with = "lte")]
    pub lt: Option<String>,

    /// Rows with key less than or equal to this value
    #[arg(long)]
    pub lte: Option<String>,

    /// Return rows in descending key order
    #[arg(long)]
    pub reverse: bool,

    /// Only output these columns (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Stop after this many rows
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every page with its type, links and LSN
    Pages {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Only read FIL headers, skipping page bodies
        #[arg(long = "headers-only")]
        headers_only: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decode a single page
    Page {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Page number
        #[arg(short, long)]
        page: u64,

        /// Include a hex dump of the raw page
        #[arg(long)]
        hex: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Rows stored on one clustered-index leaf page
    Rows {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        #[command(flatten)]
        source: TableSource,

        /// Leaf page number
        #[arg(short, long)]
        page: u32,

        /// Include delete-marked records
        #[arg(long = "include-deleted")]
        include_deleted: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Look up one row by its full primary key
    Get {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        #[command(flatten)]
        source: TableSource,

        /// Primary key values (comma separated, in key order)
        #[arg(short, long)]
        key: String,

        /// Clustered index root page
        #[arg(long = "root-page")]
        root_page: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Rows in primary key order between optional bounds
    Range {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        #[command(flatten)]
        source: TableSource,

        #[command(flatten)]
        bounds: Bounds,

        /// Clustered index root page
        #[arg(long = "root-page")]
        root_page: Option<u32>,

        /// Include delete-marked records
        #[arg(long = "include-deleted")]
        include_deleted: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Rows in secondary key order, resolved through the clustered index
    Index {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        #[command(flatten)]
        source: TableSource,

        /// Secondary key name, or its position among the secondary keys
        #[arg(short, long)]
        index: String,

        #[command(flatten)]
        bounds: Bounds,

        /// Root page of the secondary index
        #[arg(long = "root-page")]
        root_page: Option<u32>,

        /// Never scan INDEX pages to locate the secondary root
        #[arg(long = "no-discover")]
        no_discover: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Dump the serialized dictionary information stored in the tablespace
    Sdi {
        /// Path to InnoDB data file (.ibd)
        #[arg(short, long)]
        file: String,

        /// Print the table definition derived from the SDI instead
        #[arg(long = "table-def")]
        table_def: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
