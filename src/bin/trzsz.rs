#![deny(unsafe_code)]

//! Demo CLI exposing the session engine's documented surface (`spec.md`
//! §6): `--quiet`, `--overwrite`, `--binary`, `--escape`, `--bufsize`,
//! `--timeout`, and a positional file list. Two invocations of this binary,
//! piped stdout-to-stdin in both directions, form one trzsz session: one
//! side names files to send, the other names a destination directory with
//! `--receiver`.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use control::{FrameReader, FrameWriter, Newline};
use frame::FrameBuffer;
use logging::VerbosityConfig;
use session::{Session, SystemPlatform, TransferConfig};

#[derive(Parser, Debug)]
#[command(name = "trzsz", about = "Terminal-tunneled file transfer session engine")]
struct Cli {
    /// Suppress per-file progress and summary output.
    #[arg(short, long)]
    quiet: bool,

    /// Receiver only: overwrite existing destination files instead of
    /// resuming from their current length.
    #[arg(long)]
    overwrite: bool,

    /// Force binary-clean framing (the default whenever a channel allows it).
    #[arg(long, conflicts_with = "escape")]
    binary: bool,

    /// Force the 0xEE-marker escape table, substituting every byte.
    #[arg(long)]
    escape: bool,

    /// Initial adaptive buffer size, in bytes.
    #[arg(long, default_value_t = pipeline::INITIAL_BUFFER_SIZE)]
    bufsize: u64,

    /// Idle-read timeout, in seconds.
    #[arg(long, default_value_t = 20)]
    timeout: u64,

    /// Act as the receiving side; exactly one path, naming the destination
    /// directory, is expected. Without this flag the paths name files (or
    /// directories) to send.
    #[arg(long)]
    receiver: bool,

    /// Source paths to send, or (with `--receiver`) the destination
    /// directory.
    paths: Vec<PathBuf>,
}

impl Cli {
    fn transfer_config(&self) -> TransferConfig {
        let mut config = TransferConfig::binary_defaults();
        config.buffer_size = self.bufsize;
        config.timeout_secs = self.timeout;
        if self.escape {
            config.encoding = session::Encoding::Escape;
            config.escape_all = true;
        } else if self.binary {
            config.encoding = session::Encoding::Binary;
        }
        config
    }
}

/// Reads stdin in chunks and feeds [`FrameBuffer::push`] until EOF, then
/// stops the buffer so any blocked reader sees [`frame::FrameError::Stopped`]
/// rather than hanging forever.
fn pump_stdin(buffer: &FrameBuffer) {
    let mut stdin = io::stdin().lock();
    let mut chunk = [0u8; 8192];
    loop {
        match stdin.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.push(chunk[..n].to_vec()),
        }
    }
    buffer.stop();
}

fn newline_for(platform: &SystemPlatform) -> Newline {
    if session::Platform::is_windows(platform) {
        Newline::Windows
    } else {
        Newline::Unix
    }
}

fn run(cli: &Cli) -> Result<u32, session::TrzszError> {
    let platform = SystemPlatform;
    let newline = newline_for(&platform);
    let timeout = Duration::from_secs(cli.timeout);
    let incoming = FrameBuffer::new(timeout);
    let config = cli.transfer_config();

    std::thread::scope(|scope| {
        scope.spawn(|| pump_stdin(&incoming));

        let stdout = io::stdout();
        let writer = FrameWriter::new(stdout.lock(), newline);
        let reader = FrameReader::new(&incoming, newline, timeout);
        let mut conn = Session::new(writer, reader, &platform, config).with_overwrite(cli.overwrite);

        let result = if cli.receiver {
            let dest = cli
                .paths
                .first()
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            conn.negotiate_config_as_receiver()
                .and_then(|()| conn.run_receiver(&dest))
        } else {
            conn.negotiate_config_as_sender()
                .and_then(|()| conn.run_sender(&cli.paths))
        };
        incoming.stop();
        result.map(|()| conn.failed_files())
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(if cli.quiet {
        VerbosityConfig::default()
    } else {
        VerbosityConfig::from_verbose_level(1)
    });

    match run(&cli) {
        Ok(failed_files) => ExitCode::from(failed_files.min(255) as u8),
        Err(err) => {
            let mut stderr = io::stderr();
            let _ = writeln!(stderr, "trzsz: {err}");
            ExitCode::from(err.kind().as_i32().clamp(0, 255) as u8)
        }
    }
}
