//! CLI entry point for `patchmail`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use patchmail::config::{self, Config, TransportKind};
use patchmail::error::PatchError;
use patchmail::model::mail::Mail;
use patchmail::model::metadata::SeriesMetadata;
use patchmail::parser::header::parse_date;
use patchmail::parser::mbox::read_mbox_file;
use patchmail::repo::git::GitCli;
use patchmail::series::pull_request::PullRequestInfo;
use patchmail::series::{PatchSeries, SeriesOptions, SeriesRequest};
use patchmail::store::file::FileStore;
use patchmail::store::AnnotationStoreExt;
use patchmail::transport::mbox::MboxFile;
use patchmail::transport::sendmail::Sendmail;
use patchmail::transport::MailTransport;

#[derive(Parser)]
#[command(
    name = "patchmail",
    version,
    about = "Turn pull requests into mailing-list patch series"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a patch series and send it
    Submit(SubmitArgs),
    /// Split an mbox into numbered .patch files
    Split {
        mbox: PathBuf,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Show the stored state of a series (PR URL or branch name)
    Status {
        key: String,
        /// Annotation store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Write a config file with the given identity and defaults elsewhere
    Init {
        /// `Name <email>` to send as
        #[arg(long)]
        sender: String,
        /// Display name that marks the sender as a bot
        #[arg(long)]
        bot_name: Option<String>,
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(clap::Args)]
struct SubmitArgs {
    /// Repository containing the commits
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Pull request description as JSON
    #[arg(long, value_name = "FILE", conflicts_with = "branch")]
    pr: Option<PathBuf>,

    /// Submit a local branch instead of a pull request
    #[arg(long, requires = "base")]
    branch: Option<String>,

    /// Upstream commit the branch is based on
    #[arg(long)]
    base: Option<String>,

    /// Cover-letter subject (branch mode)
    #[arg(long, default_value = "")]
    title: String,

    /// File with the cover-letter text (branch mode)
    #[arg(long, value_name = "FILE")]
    body_file: Option<PathBuf>,

    /// Override the configured sender identity
    #[arg(long, value_name = "NAME <EMAIL>")]
    sender: Option<String>,

    /// Additional To: recipients
    #[arg(long)]
    to: Vec<String>,

    /// Additional Cc: recipients
    #[arg(long)]
    cc: Vec<String>,

    /// Write mails to this mbox instead of the configured transport
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the tag message and mbox instead of sending
    #[arg(long)]
    dry_run: bool,

    /// Mark the series as RFC
    #[arg(long)]
    rfc: bool,

    /// Send as PREVIEW without recording anything
    #[arg(long)]
    preview: bool,

    /// Send again even if nothing changed
    #[arg(long)]
    redo: bool,

    /// Date of the last mail (RFC 2822 or RFC 3339)
    #[arg(long, value_name = "DATE")]
    force_date: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Submit(args) => cmd_submit(&args, &config),
        Commands::Split { mbox, output } => cmd_split(&mbox, &output),
        Commands::Status { key, store } => cmd_status(&key, store, &config),
        Commands::Init {
            sender,
            bot_name,
            force,
        } => cmd_init(sender, bot_name, force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    let file_name = log_file.file_name().unwrap_or_default().to_os_string();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Write a fresh config file.
fn cmd_init(sender: String, bot_name: Option<String>, force: bool) -> anyhow::Result<()> {
    let Some(path) = config::config_file_path() else {
        anyhow::bail!("Could not determine config file path");
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to replace it", path.display());
    }
    let mut cfg = Config::default();
    cfg.identity.sender = Some(sender);
    cfg.identity.bot_name = bot_name;
    config::save_config(&cfg)?;
    println!("{}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "patchmail", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Build the request from `--pr` or the branch flags.
fn build_request(args: &SubmitArgs, git: &GitCli) -> anyhow::Result<SeriesRequest> {
    if let Some(path) = &args.pr {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let info: PullRequestInfo = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        return Ok(SeriesRequest::from_pull_request(&info)?);
    }

    let Some(branch) = &args.branch else {
        anyhow::bail!("Either --pr or --branch is required");
    };
    let Some(base) = &args.base else {
        anyhow::bail!("--branch needs --base");
    };
    let body = match &args.body_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => String::new(),
    };
    let base_commit = git.rev_parse(base)?;
    let head_commit = git.rev_parse(branch)?;
    Ok(SeriesRequest::for_branch(
        branch,
        &base_commit,
        &head_commit,
        &args.title,
        &body,
    ))
}

/// Generate a series and send it (or print it with `--dry-run`).
fn cmd_submit(args: &SubmitArgs, config: &Config) -> anyhow::Result<()> {
    let mut options = SeriesOptions::from_config(config);
    if let Some(sender) = &args.sender {
        options.sender = sender.clone();
    }
    if options.sender.is_empty() {
        anyhow::bail!("No sender identity: set [identity] sender in the config or pass --sender");
    }
    options.to.extend(args.to.iter().cloned());
    options.cc.extend(args.cc.iter().cloned());
    options.rfc = args.rfc;
    options.preview = args.preview;
    options.redo = args.redo;
    if let Some(date) = &args.force_date {
        let parsed = parse_date(date).ok_or_else(|| PatchError::InvalidDate(date.clone()))?;
        options.force_date = Some(parsed);
    }

    let git = GitCli::new(&args.repo);
    let request = build_request(args, &git)?;
    let mut store = FileStore::open(config::store_dir(config))?;
    let mut series = PatchSeries::new(&git, &mut store, options);

    let prepared = match series.prepare(&request) {
        Ok(prepared) => prepared,
        Err(PatchError::AlreadySubmitted { head }) => {
            anyhow::bail!("{head} was already submitted; use --redo to send it again")
        }
        Err(e) => return Err(e.into()),
    };

    if args.dry_run {
        let mbox = prepared.mbox();
        println!("{}", prepared.tag_message.trim_end());
        println!();
        print!("{mbox}");

        use humansize::{format_size, BINARY};
        eprintln!();
        eprintln!("  Dry run, nothing sent:");
        eprintln!("  {:<25} v{}", "Iteration", prepared.iteration());
        eprintln!("  {:<25} {}", "Tag", prepared.tag_name);
        eprintln!("  {:<25} {}", "Mails", prepared.mails.len());
        eprintln!("  {:<25} {}", "Mbox size", format_size(mbox.len(), BINARY));
        eprintln!();
        return Ok(());
    }

    let mut transport: Box<dyn MailTransport> = match (&args.output, config.transport.kind) {
        (Some(path), _) => Box::new(MboxFile::new(path)),
        (None, TransportKind::Mbox) => Box::new(MboxFile::new(&config.transport.mbox_path)),
        (None, TransportKind::Sendmail) => {
            Box::new(Sendmail::new(&config.transport.sendmail_program))
        }
    };

    let pb = ProgressBar::new(prepared.mails.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Sending [{bar:40.cyan/blue}] {pos}/{len} mails")?
            .progress_chars("#>-"),
    );

    let progress: &dyn Fn(usize, usize) = &|current, total| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
    };
    let report = series.submit(&prepared, transport.as_mut(), Some(progress))?;

    pb.finish_and_clear();

    println!();
    println!("  Series sent:");
    println!("  {:<25} v{}", "Iteration", prepared.iteration());
    println!("  {:<25} {}", "Mails", report.sent.len());
    if let Some(id) = prepared.cover_letter_message_id() {
        println!("  {:<25} <{id}>", "Message-ID");
    }
    if report.persisted {
        println!("  {:<25} {}", "Tag", prepared.tag_name);
    } else {
        println!("  {:<25} not recorded (preview)", "State");
    }
    println!();

    Ok(())
}

/// File name for the `index`-th mail of a split series.
fn patch_file_name(index: usize, mail: &Mail, is_cover_letter: bool) -> String {
    if is_cover_letter {
        return format!("{index:04}-cover-letter.patch");
    }
    let subject = mail.subject().unwrap_or_default();
    let subject = match subject.strip_prefix('[').and_then(|s| s.split_once("] ")) {
        Some((_, rest)) => rest.to_string(),
        None => subject,
    };

    let mut slug = String::new();
    for ch in subject.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_matches(|c| c == '-' || c == '.').chars().take(52).collect();
    format!("{index:04}-{}.patch", slug.trim_end_matches('-'))
}

/// Split an mbox into numbered patch files.
fn cmd_split(mbox: &Path, output: &Path) -> anyhow::Result<()> {
    if !mbox.exists() {
        anyhow::bail!("File not found: {}", mbox.display());
    }
    let parts = read_mbox_file(mbox)?;
    std::fs::create_dir_all(output)?;

    let has_cover_letter = parts.len() > 1;
    let mut total: u64 = 0;
    for (i, raw) in parts.iter().enumerate() {
        let mail = Mail::parse(raw)?;
        let is_cover_letter = has_cover_letter && i == 0 && mail.commit().is_none();
        let index = if has_cover_letter { i } else { i + 1 };
        let path = output.join(patch_file_name(index, &mail, is_cover_letter));
        std::fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
        total += raw.len() as u64;
        println!("{}", path.display());
    }

    use humansize::{format_size, BINARY};
    eprintln!(
        "  {} file(s), {} written to {}",
        parts.len(),
        format_size(total, BINARY),
        output.display()
    );
    Ok(())
}

/// Print the stored metadata of a series.
fn cmd_status(key: &str, store: Option<PathBuf>, config: &Config) -> anyhow::Result<()> {
    let dir = store.unwrap_or_else(|| config::store_dir(config));
    let store = FileStore::open(dir)?;
    let Some(metadata) = store.get_json::<SeriesMetadata>(key)? else {
        anyhow::bail!("No series recorded for '{key}'");
    };
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
