use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chitii_core::{CodegenOptions, compile};
use clap::Parser;
use tracing::{Level, debug, info};

/// Compile chitii source to LLVM IR, optionally building and running it.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file (defaults to stdin)
    #[arg(short, long)]
    input: Option<String>,

    /// Where to write the emitted artifact (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "llvm",
        help = "Output format: llvm, tokens, ast"
    )]
    emit: String,

    #[arg(long, help = "Build the IR with the native toolchain and run it")]
    run: bool,

    #[arg(
        long,
        value_name = "PROGRAM",
        default_value = "clang",
        help = "Compiler driver used by --run to build the IR"
    )]
    cc: String,

    #[arg(long, value_name = "TRIPLE", help = "Target triple recorded in the module")]
    target_triple: Option<String>,

    #[arg(long, help = "Do not print the value of each `return`")]
    no_return_print: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let (source, module_name) = match &cli.input {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {path}"))?;
            let name = PathBuf::from(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            (source, name)
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read source from stdin")?;
            (buffer, "stdin".to_string())
        }
    };

    let options = CodegenOptions {
        module_name,
        target_triple: cli.target_triple.clone(),
        print_on_return: !cli.no_return_print,
    };
    let artifact = compile(&source, &options)
        .with_context(|| format!("failed to compile {}", options.module_name))?;
    let ir = artifact.llvm_ir();

    let rendered = match cli.emit.as_str() {
        "llvm" => ir.clone(),
        "tokens" => artifact
            .tokens
            .iter()
            .map(|token| format!("{token}\n"))
            .collect(),
        "ast" => format!("{:#?}\n", artifact.program),
        other => bail!("unsupported emit format: {other}"),
    };

    match &cli.output {
        Some(path) => write_output(path, rendered.as_bytes())?,
        // Keep stdout for the program itself when running.
        None if cli.run => {}
        None => print!("{rendered}"),
    }

    if cli.run {
        let code = run_native(&ir, &cli.cc)?;
        println!("Program exited with {code}");
    }

    Ok(())
}

fn write_output(path: &str, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output file {path}"))?;
    debug!(path, bytes = bytes.len(), "wrote output");
    Ok(())
}

/// Build `ir` into an executable in a scratch directory and run it
/// with inherited stdio, returning its exit code.
fn run_native(ir: &str, cc: &str) -> Result<i32> {
    let dir = tempfile::tempdir().context("failed to create build directory")?;
    let ir_path = dir.path().join("program.ll");
    let exe_path = dir.path().join(format!("program{}", std::env::consts::EXE_SUFFIX));
    fs::write(&ir_path, ir).context("failed to write IR for the native toolchain")?;

    info!(cc, "building native executable");
    let build = Command::new(cc)
        .arg(&ir_path)
        .arg("-o")
        .arg(&exe_path)
        .output()
        .with_context(|| format!("failed to invoke {cc}"))?;
    if !build.status.success() {
        bail!(
            "{cc} failed to build the program:\n{}",
            String::from_utf8_lossy(&build.stderr)
        );
    }

    let status = Command::new(&exe_path)
        .status()
        .context("failed to execute the compiled program")?;
    Ok(status.code().unwrap_or(-1))
}
