mod cli;
use cli::Cli;

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};

use clap::Parser;
use env_logger::{Builder, Target};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;

/// The wire shape a finished segment is written out as. `trajseg::OutputSegment`
/// itself isn't `Serialize` (it keeps its message list and resume tail
/// private); this is the thin boundary layer that owns picking a wire format,
/// matching the crate's scope split between the core engine and its I/O.
#[derive(Serialize)]
struct OutputRecord<'a> {
    id: &'a str,
    ssvid: &'a str,
    variant: trajseg::SegmentVariant,
    msg_count: usize,
    messages: &'a [trajseg::AnnotatedMessage],
}

fn open_input(path: &Option<String>, gzip: bool) -> std::io::Result<Box<dyn BufRead>> {
    let raw: Box<dyn Read> = match path {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(std::io::stdin()),
    };
    let raw: Box<dyn Read> = if gzip { Box::new(GzDecoder::new(raw)) } else { raw };
    Ok(Box::new(BufReader::new(raw)))
}

fn open_output(path: &Option<String>, gzip: bool) -> std::io::Result<Box<dyn Write>> {
    let raw: Box<dyn Write> = match path {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout()),
    };
    Ok(if gzip {
        Box::new(GzEncoder::new(raw, Compression::default()))
    } else {
        raw
    })
}

/// Parse one NDJSON message per non-blank line. A line that fails to parse is
/// logged and skipped rather than aborting the run — malformed wire records
/// are this crate's concern, not the engine's; the engine only ever sees
/// messages that parsed cleanly.
fn read_messages(reader: Box<dyn BufRead>) -> impl Iterator<Item = trajseg::Message> {
    reader.lines().filter_map(|line| {
        let line = line.expect("failed to read a line of input");
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<trajseg::Message>(line) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::error!("skipping unparseable input line: {e}");
                None
            }
        }
    })
}

fn read_resume_states(path: &str) -> Vec<trajseg::SegmentState> {
    let file = File::open(path).unwrap_or_else(|e| panic!("failed to open resume file {path}: {e}"));
    BufReader::new(file)
        .lines()
        .filter_map(|line| {
            let line = line.expect("failed to read a line of the resume file");
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            Some(serde_json::from_str::<trajseg::SegmentState>(line).expect("invalid resume-state line"))
        })
        .collect()
}

fn write_segment(writer: &mut dyn Write, segment: &trajseg::OutputSegment) {
    let record = OutputRecord {
        id: &segment.id,
        ssvid: &segment.ssvid,
        variant: segment.variant,
        msg_count: segment.msg_count(),
        messages: segment.messages(),
    };
    let line = serde_json::to_string(&record).expect("an output segment always serializes");
    writeln!(writer, "{line}").expect("failed to write output");
}

pub fn main() {
    Builder::from_default_env()
        .target(Target::Stderr)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    let reader = open_input(&cli.input, cli.gzip_input).unwrap_or_else(|e| {
        log::error!("failed to open input: {e}");
        std::process::exit(1);
    });
    let mut writer = open_output(&cli.output, cli.gzip_output).unwrap_or_else(|e| {
        log::error!("failed to open output: {e}");
        std::process::exit(1);
    });

    let messages = read_messages(reader);

    let segmenter: Box<dyn Iterator<Item = Result<trajseg::OutputSegment, trajseg::InputError>>> =
        match &cli.resume_from {
            Some(path) => Box::new(trajseg::Segmenter::from_states(messages, config, read_resume_states(path))),
            None => Box::new(trajseg::Segmenter::new(messages, config)),
        };

    for segment in segmenter {
        match segment {
            Ok(segment) => write_segment(&mut writer, &segment),
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        }
    }
}
