// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::collections::HashMap;
use std::process::ExitCode;

use bunnymux_backends::test_codecs::{PcmDecoder, PcmEncoder, RawVideoDecoder, RawVideoEncoder};
use bunnymux_backends::{CodecBackendRegistry, MuxerAdapter, PacketSource};
use bunnymux_cli::cli::{Cli, Commands};
use bunnymux_cli::{cli, config, container, logging};
use bunnymux_core::{CodecId, TrackParams, TrimRequest};
use bunnymux_engine::{ConversionController, ConversionRequest, OutputCapabilities, TrackOverrides};
use clap::Parser;
use tracing::{error, info};

fn build_registry(source: &dyn PacketSource, convert: &config::ConvertConfig) -> CodecBackendRegistry {
    let mut registry = CodecBackendRegistry::new();

    let audio_track = source.tracks().iter().find_map(|t| match t.params {
        TrackParams::Audio { sample_rate, channels } => Some((sample_rate, channels)),
        _ => None,
    });
    let (decode_sample_rate, decode_channels) = audio_track.unwrap_or((convert.sample_rate, convert.channels));
    let encode_sample_rate = convert.sample_rate;
    let encode_channels = convert.channels;

    let pcm = CodecId::new("pcm_f32le");
    registry.register_decoder(&pcm, move || Box::new(PcmDecoder::new(decode_sample_rate, decode_channels)));
    registry.register_encoder(&pcm, move || {
        let _ = (encode_sample_rate, encode_channels);
        Box::new(PcmEncoder::new())
    });

    let video_track = source.tracks().iter().find_map(|t| match t.params {
        TrackParams::Video { width, height, .. } => Some((width, height)),
        _ => None,
    });
    if let Some((width, height)) = video_track {
        let rawvideo = CodecId::new("rawvideo");
        registry.register_decoder(&rawvideo, move || Box::new(RawVideoDecoder::new(width, height)));
        registry.register_encoder(&rawvideo, || Box::new(RawVideoEncoder::new()));
    }

    registry
}

fn output_capabilities(convert: &config::ConvertConfig) -> OutputCapabilities {
    OutputCapabilities {
        video_codecs: vec![CodecId::new(&convert.video_codec)],
        audio_codecs: vec![CodecId::new(&convert.audio_codec)],
        preferred_video_codec: CodecId::new(&convert.video_codec),
        preferred_audio_codec: CodecId::new(&convert.audio_codec),
    }
}

/// Builds one blanket [`TrackOverrides`] from the flat CLI flags, applied uniformly to
/// every probed track of the matching kind (`spec.md` §6 "User-facing surface": a batch
/// CLI has no per-track addressing scheme, unlike a programmatic caller keying overrides
/// by `TrackId`).
fn overrides_from_args(source: &dyn PacketSource, args: &cli::ConvertArgs) -> HashMap<bunnymux_core::TrackId, TrackOverrides> {
    let mut overrides = HashMap::new();
    for track in source.tracks() {
        let is_video = matches!(track.params, TrackParams::Video { .. });
        let is_audio = matches!(track.params, TrackParams::Audio { .. });

        let discard = (is_video && args.discard_video) || (is_audio && args.discard_audio);
        let codec = if is_video {
            args.video_codec.clone().map(CodecId::new)
        } else {
            args.audio_codec.clone().map(CodecId::new)
        };

        overrides.insert(
            track.id,
            TrackOverrides {
                discard,
                codec,
                bitrate: None,
                width: if is_video { args.width } else { None },
                height: if is_video { args.height } else { None },
                frame_rate: None,
                sample_rate: if is_audio { args.sample_rate } else { None },
                channels: if is_audio { args.channels } else { None },
            },
        );
    }
    overrides
}

async fn run_convert(
    args: cli::ConvertArgs,
    convert_cfg: &config::ConvertConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = container::load_source(&args.input)?;
    let registry = build_registry(&source, convert_cfg);
    let overrides = overrides_from_args(&source, &args);
    let caps = output_capabilities(convert_cfg);

    let trim = (args.trim_start.is_some() || args.trim_end.is_some())
        .then_some(TrimRequest { start_secs: args.trim_start, end_secs: args.trim_end });

    let muxer: Box<dyn MuxerAdapter> = Box::new(container::FileMuxer::new(args.output.clone()));
    let request = ConversionRequest { trim, overrides };

    let mut controller =
        ConversionController::init(Box::new(source), muxer, &caps, registry, request).await?;

    controller.on_progress(Box::new(|fraction| {
        print!("\rconverting... {:>5.1}%", fraction * 100.0);
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }));

    controller.execute().await?;
    println!();
    info!(output = %args.output.display(), "conversion finished");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Config(command) = &cli.command {
        return cli::handle_config_command(command);
    }

    let load_result = match config::load(&cli.config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return ExitCode::FAILURE;
        },
    };
    logging::init_logging(&load_result.config.log);
    if let Some(missing) = &load_result.file_missing {
        info!(path = %missing, "config file not found, using defaults");
    }

    let Commands::Convert(args) = cli.command else { unreachable!("Config handled above") };

    if let Err(e) = run_convert(args, &load_result.config.convert).await {
        error!(error = %e, "conversion failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
