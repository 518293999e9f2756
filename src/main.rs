#[cfg(not(feature = "rustysynth"))]
fn main() {
    eprintln!(
        "The fmidi CLI requires the \"rustysynth\" feature. Rebuild with `--features rustysynth` to enable it."
    );
}

#[cfg(feature = "rustysynth")]
mod cli {
    use anyhow::{bail, Context, Result};
    use clap::{Parser, Subcommand};
    use serde::Serialize;
    use std::io;
    use std::path::{Path, PathBuf};
    use tracing::{info, warn};
    use tracing_subscriber::EnvFilter;

    use fmidi::host::{ItemHandle, MemoryHost, PlaylistHandle, META_FILETYPE, META_URI};
    use fmidi::{
        Decoder, DecoderConfig, DecoderHints, InitOutcome, RustyFactory, BYTES_PER_FRAME,
    };

    /// Frames requested from the decoder per read call
    const RENDER_CHUNK_FRAMES: usize = 1024;

    #[derive(Parser)]
    #[command(name = "fmidi", version)]
    #[command(about = "Probe and render MIDI files through the fmidi decoder plugin")]
    struct Args {
        /// Instrument bank (overrides the configuration file)
        #[arg(long, global = true)]
        soundfont: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long, global = true)]
        config: Option<PathBuf>,

        /// Log every decoder step
        #[arg(short, long, global = true)]
        verbose: bool,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Add files to a playlist and print the resulting entries
        List {
            /// MIDI files to add
            #[arg(required = true)]
            files: Vec<PathBuf>,

            /// Print CSV instead of a table
            #[arg(long)]
            csv: bool,
        },
        /// Play one file through the decoder into a 16-bit stereo WAV file
        Render {
            /// MIDI file to play
            file: PathBuf,

            /// Output WAV file
            #[arg(short, long)]
            output: PathBuf,

            /// Stop after this many seconds
            #[arg(long)]
            max_seconds: Option<f32>,
        },
    }

    #[derive(Serialize)]
    struct Row {
        path: String,
        filetype: String,
        duration_seconds: Option<f32>,
    }

    pub fn run() -> Result<()> {
        let args = Args::parse();
        init_logging(args.verbose);

        let mut config = match &args.config {
            Some(path) => DecoderConfig::from_json_file(path)?,
            None => DecoderConfig::default(),
        };
        if let Some(soundfont) = args.soundfont {
            config = config.with_soundfont(soundfont);
        }

        let decoder = Decoder::new(RustyFactory::new(config.sample_rate), config);
        decoder.start()?;
        let result = match args.command {
            Command::List { files, csv } => list(&decoder, &files, csv),
            Command::Render {
                file,
                output,
                max_seconds,
            } => render(&decoder, &file, &output, max_seconds),
        };
        decoder.stop()?;
        result
    }

    fn init_logging(verbose: bool) {
        let filter = if verbose {
            EnvFilter::new("fmidi=trace")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fmidi=info"))
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    fn insert_all(
        decoder: &Decoder<RustyFactory>,
        host: &MemoryHost,
        playlist: &PlaylistHandle,
        files: &[PathBuf],
    ) {
        let mut last: Option<ItemHandle> = None;
        for file in files {
            let fname = file.to_string_lossy();
            match decoder.insert(host, playlist, last.as_ref(), &fname) {
                Some(item) => last = Some(item),
                None => warn!("skipped '{}'", fname),
            }
        }
    }

    fn list(decoder: &Decoder<RustyFactory>, files: &[PathBuf], csv: bool) -> Result<()> {
        let host = MemoryHost::new();
        let playlist = host.new_playlist();
        insert_all(decoder, &host, &playlist, files);

        let rows: Vec<Row> = host
            .playlist_items(&playlist)
            .iter()
            .map(|item| Row {
                path: host.meta(item, META_URI).unwrap_or_default(),
                filetype: host.meta(item, META_FILETYPE).unwrap_or_default(),
                duration_seconds: host.duration(item),
            })
            .collect();

        if csv {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        } else {
            println!("{:<48} {:<4} {:>9}", "FILE", "TYPE", "DURATION");
            for row in &rows {
                println!(
                    "{:<48} {:<4} {:>9}",
                    row.path,
                    row.filetype,
                    format_duration(row.duration_seconds)
                );
            }
        }
        Ok(())
    }

    fn format_duration(seconds: Option<f32>) -> String {
        match seconds {
            Some(secs) => {
                let total = secs.round() as u64;
                format!("{}:{:02}", total / 60, total % 60)
            }
            None => "-".to_string(),
        }
    }

    fn render(
        decoder: &Decoder<RustyFactory>,
        file: &Path,
        output: &Path,
        max_seconds: Option<f32>,
    ) -> Result<()> {
        let host = MemoryHost::new();
        let playlist = host.new_playlist();
        let fname = file.to_string_lossy();
        let Some(item) = decoder.insert(&host, &playlist, None, &fname) else {
            bail!("'{}' is not a playable MIDI file", file.display());
        };

        let mut session = decoder.open(DecoderHints::SIXTEEN_BIT);
        let outcome = decoder
            .init(&mut session, &host, &item)
            .with_context(|| format!("failed to start playback of '{}'", file.display()))?;
        if outcome == InitOutcome::Degraded {
            warn!("no instrument bank loaded, output will be silent");
        }

        let format = session.format();
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec)
            .with_context(|| format!("failed to create '{}'", output.display()))?;

        let frame_limit =
            max_seconds.map(|secs| (secs.max(0.0) * format.sample_rate as f32) as usize);
        let mut buffer = vec![0u8; RENDER_CHUNK_FRAMES * BYTES_PER_FRAME];
        let mut frames = 0usize;

        loop {
            let written = decoder.read(&mut session, &mut buffer)?;
            if written == 0 {
                break;
            }
            for bytes in buffer[..written].chunks_exact(2) {
                writer.write_sample(i16::from_ne_bytes([bytes[0], bytes[1]]))?;
            }
            frames += written / BYTES_PER_FRAME;
            if frame_limit.is_some_and(|limit| frames >= limit) {
                break;
            }
        }

        writer.finalize().context("failed to finalize WAV file")?;
        decoder.free(&mut session)?;

        info!(
            "rendered {:.2}s to '{}'",
            session.read_position(),
            output.display()
        );
        Ok(())
    }
}

#[cfg(feature = "rustysynth")]
fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
