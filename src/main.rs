use clap::{Parser as ClapParser, ValueEnum};
use tracing_subscriber::EnvFilter;
use ypatch::{OutputFormat, PatchOptions, Patcher};

#[derive(ClapParser)]
#[command(name = "ypatch")]
#[command(about = "ypatch - select, merge and mutate YAML document streams with expressions")]
#[command(version)]
struct Cli {
    /// Input files ('-' for stdin; stdin is the default when piped)
    inputs: Vec<String>,

    /// Selector expression; non-matching documents pass through untouched
    #[arg(short, long)]
    selector: Option<String>,

    /// Merge source (file or inline YAML), repeatable, applied in order
    #[arg(short, long = "merge")]
    merges: Vec<String>,

    /// Action expression, repeatable, applied in order
    #[arg(short = 'e', long = "expr")]
    actions: Vec<String>,

    /// Parameter bundle (file or inline YAML), repeatable, later wins
    #[arg(short, long = "param")]
    params: Vec<String>,

    /// Output serialization format
    #[arg(long, value_enum, default_value = "yaml")]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Yaml => OutputFormat::Yaml,
            Format::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.inputs.is_empty() && atty::is(atty::Stream::Stdin) {
        eprintln!("no input files and stdin is a terminal");
        std::process::exit(1);
    }

    let options = PatchOptions {
        selector: cli.selector,
        merges: cli.merges,
        actions: cli.actions,
        params: cli.params,
    };

    let patcher = match Patcher::new(options) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    if let Err(e) = patcher.run(&cli.inputs, stdout.lock(), cli.format.into()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
