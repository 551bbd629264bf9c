use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use devsol_core::image::open_code_object;
use devsol_core::target::TargetServices;
use devsol_core::types::{Address, ProcessId, TargetSection};
use devsol_core::uri::{file_locator, parse_unsigned, CodeObjectUri};
use devsol_core::{InterruptFlag, LoaderConfig, LoaderError};
use devsol_utils::{info, init_logging, init_logging_with_level, LogLevel, LoggingGuard};

/// Exit status after Ctrl-C, as shells report for SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// Resolve and inspect GPU device code objects the way the debugger loader does.
#[derive(Parser, Debug)]
#[command(name = "devsol")]
#[command(version)]
#[command(about = "Resolve and inspect device code objects", long_about = None)]
struct Cli
{
    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Break a code object URI into its parts
    Parse
    {
        /// `file://` or `memory://` locator
        uri: String,
    },
    /// Build a `file://` locator for a path
    Encode
    {
        /// Path of the file holding the code object
        path: String,
        /// Byte offset of the code object in the file (decimal, 0x hex, or 0 octal)
        #[arg(long)]
        offset: Option<String>,
        /// Size of the code object in bytes
        #[arg(long)]
        size: Option<String>,
    },
    /// Open a code object, validate it, and list its sections
    Inspect
    {
        /// `file://` or `memory://` locator
        uri: String,
        /// Process the code object belongs to (default: this process)
        #[arg(long)]
        pid: Option<u32>,
        /// Oldest accepted ELF ABI version
        #[arg(long)]
        min_abi_version: Option<u8>,
        /// Show sections relocated to this load address
        #[arg(long)]
        load_address: Option<String>,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match start_logging(cli.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        let interrupted = e
            .downcast_ref::<LoaderError>()
            .is_some_and(LoaderError::is_interrupt);
        process::exit(if interrupted { EXIT_INTERRUPTED } else { 1 });
    }
}

fn start_logging(level: Option<LogLevel>) -> Result<LoggingGuard, Box<dyn Error>>
{
    let guard = match level {
        Some(level) => init_logging_with_level(level)?,
        None => init_logging()?,
    };
    Ok(guard)
}

fn run_command(cli: Cli) -> Result<(), Box<dyn Error>>
{
    match cli.command {
        Commands::Parse { uri } => parse_command(&uri),
        Commands::Encode { path, offset, size } => {
            let offset = offset.map(|value| parse_unsigned("offset", &value)).transpose()?;
            let size = size.map(|value| parse_unsigned("size", &value)).transpose()?;
            println!("{}", file_locator(&path, offset, size));
            Ok(())
        }
        Commands::Inspect {
            uri,
            pid,
            min_abi_version,
            load_address,
        } => {
            let pid = pid.map_or_else(|| ProcessId(process::id()), ProcessId);
            let load_address = load_address
                .map(|value| parse_unsigned("load-address", &value).map(Address::from))
                .transpose()?;

            let mut config = LoaderConfig::from_env();
            if let Some(version) = min_abi_version {
                config.min_abi_version = version;
            }
            inspect_command(&uri, pid, &config, load_address)
        }
    }
}

fn parse_command(uri: &str) -> Result<(), Box<dyn Error>>
{
    let parsed = CodeObjectUri::parse(uri)?;
    match parsed.protocol() {
        Ok(protocol) => println!("protocol: {protocol}"),
        Err(_) => println!("protocol: {} (unsupported)", parsed.protocol_name()),
    }
    println!("path:     {}", parsed.path());
    println!("offset:   {:#x}", parsed.offset()?);
    match parsed.size()? {
        Some(size) => println!("size:     {size:#x}"),
        None => println!("size:     to end of file"),
    }
    Ok(())
}

fn inspect_command(uri: &str, pid: ProcessId, config: &LoaderConfig, load_address: Option<Address>) -> Result<(), Box<dyn Error>>
{
    let interrupt = InterruptFlag::new();
    let handler_flag = interrupt.clone();
    ctrlc::set_handler(move || handler_flag.raise())?;

    let services = local_services(pid)?;
    info!(uri, pid = pid.0, "inspecting code object");
    let image = open_code_object(uri, pid, &services, config, &interrupt)?;

    println!("Code object: {}", image.name());
    println!("  Architecture: {}", image.architecture());
    println!("  OS ABI: {} (version {})", image.osabi(), image.abi_version());
    println!("  Size: {} bytes", image.stream_len()?);
    println!("  Allocated sections: {}", image.sections().len());

    for mut section in image.target_sections() {
        if let Some(bias) = load_address {
            section.apply_bias(bias);
        }
        print_section(&section);
    }
    Ok(())
}

fn print_section(section: &TargetSection)
{
    println!("    {:<24} {:#x}..{:#x}", section.name, section.addr, section.endaddr);
}

#[cfg(unix)]
fn local_services(pid: ProcessId) -> Result<TargetServices, Box<dyn Error>>
{
    use std::sync::Arc;

    use devsol_core::target::local::{LocalFileIo, ProcMemory};

    Ok(TargetServices::new(
        Arc::new(LocalFileIo::new()),
        Arc::new(ProcMemory::new(pid)),
        Arc::new(devsol_core::target::NoDeviceRuntime),
    ))
}

#[cfg(not(unix))]
fn local_services(_pid: ProcessId) -> Result<TargetServices, Box<dyn Error>>
{
    Err("inspecting code objects needs a unix host".into())
}
