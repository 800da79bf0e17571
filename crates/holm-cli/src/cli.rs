use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "holm",
    about = "Holm — append-only replicated document store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Database directory (defaults to ./holm-data).
    #[arg(short, long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the database over HTTP
    Serve(ServeArgs),
    /// Store a document
    Put(PutArgs),
    /// Fetch a document by key
    Get(GetArgs),
    /// Tombstone a document
    Delete(DeleteArgs),
    /// List live documents
    List(ListArgs),
    /// Check chains, signatures, index, and payloads
    Verify(VerifyArgs),
    /// Show database counters
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind; overrides the config file.
    #[arg(long)]
    pub bind: Option<String>,
    /// TOML config file.
    #[arg(short, long)]
    pub config: Option<String>,
    /// fsync every log append.
    #[arg(long)]
    pub durable: bool,
}

#[derive(Args)]
pub struct PutArgs {
    /// Document body, stored byte-for-byte.
    pub value: String,
    #[arg(short, long)]
    pub key: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Print keys only.
    #[arg(long)]
    pub keys: bool,
}

#[derive(Args)]
pub struct VerifyArgs {}

#[derive(Args)]
pub struct StatsArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from(["holm", "put", "{\"a\":1}"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.value, "{\"a\":1}");
            assert_eq!(args.key, None);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_put_with_key() {
        let cli = Cli::try_parse_from(["holm", "put", "-k", "post-1", "hello"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.key, Some("post-1".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["holm", "get", "post-1"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "post-1");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_delete() {
        let cli = Cli::try_parse_from(["holm", "delete", "post-1"]).unwrap();
        assert!(matches!(cli.command, Command::Delete(_)));
    }

    #[test]
    fn parse_list_keys() {
        let cli = Cli::try_parse_from(["holm", "list", "--keys"]).unwrap();
        if let Command::List(args) = cli.command {
            assert!(args.keys);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verify() {
        let cli = Cli::try_parse_from(["holm", "verify"]).unwrap();
        assert!(matches!(cli.command, Command::Verify(_)));
    }

    #[test]
    fn parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["holm", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".into()));
            assert!(!args.durable);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_data_dir() {
        let cli = Cli::try_parse_from(["holm", "-d", "/tmp/holm", "stats"]).unwrap();
        assert_eq!(cli.data_dir, Some("/tmp/holm".into()));
    }

    #[test]
    fn data_dir_defaults_to_unset() {
        let cli = Cli::try_parse_from(["holm", "list"]).unwrap();
        assert_eq!(cli.data_dir, None);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["holm", "--format", "json", "list"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
