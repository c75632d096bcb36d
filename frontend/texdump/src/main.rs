#![warn(clippy::all)]

mod config;
mod logging;
mod preview;

use clap::Parser;
use hires_core::gpu::{
    engine_3d::TextureParams,
    vram::{VramSnapshot, VramSource, TEXTURE_LEN, TEX_PAL_LEN},
};
use hires_texture::{
    codec,
    dump::TextureDumper,
    hash::content_hash,
    image::{DecodeError, DecodedTexture},
    ReplacementCache, Signature,
};
use slog::{debug, info};
use std::{
    fmt, fs, io,
    num::ParseIntError,
    path::{Path, PathBuf},
    process::ExitCode,
};

fn parse_hex_u32(value: &str) -> Result<u32, ParseIntError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
}

fn parse_hex_u16(value: &str) -> Result<u16, String> {
    let value = parse_hex_u32(value).map_err(|err| err.to_string())?;
    u16::try_from(value).map_err(|_| format!("{value:#X} doesn't fit in 16 bits"))
}

/// Decodes a texture out of raw VRAM dumps and checks it against the replacement assets.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Texture VRAM dump (up to 512 KiB, loaded at address 0)
    #[arg(long)]
    texture: PathBuf,
    /// Texture palette VRAM dump (up to 128 KiB, loaded at address 0)
    #[arg(long)]
    palette: Option<PathBuf>,
    /// Texture parameters (TEXIMAGE_PARAM), in hex
    #[arg(long, value_parser = parse_hex_u32)]
    params: u32,
    /// Palette base (PLTT_BASE), in hex
    #[arg(long, value_parser = parse_hex_u16, default_value = "0")]
    palette_base: u16,
    /// JSON config file; missing files use the defaults
    #[arg(long, default_value = "hires-texdump.json")]
    config: PathBuf,
    /// Write the decoded texture to the dump directory
    #[arg(long)]
    dump: bool,
    /// Look the texture up in the replacement mod directory
    #[arg(long)]
    check_replacement: bool,
    /// Render the texture on a full-screen quad and save the 256x192 capture as PNG
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Overrides the configured render scale factor for --preview
    #[arg(long)]
    scale_factor: Option<u8>,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug)]
enum Error {
    Config(config::FileError),
    Read(PathBuf, io::Error),
    Decode(DecodeError),
    Preview(preview::Error),
    Save(PathBuf, codec::SaveError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "couldn't load config: {err}"),
            Error::Read(path, err) => write!(f, "couldn't read {}: {err}", path.display()),
            Error::Decode(err) => write!(f, "couldn't decode texture: {err}"),
            Error::Preview(err) => write!(f, "couldn't render preview: {err}"),
            Error::Save(path, err) => write!(f, "couldn't save {}: {err}", path.display()),
        }
    }
}

fn read_dump(path: &Path, max_len: usize, logger: &slog::Logger) -> Result<Vec<u8>, Error> {
    let mut data = fs::read(path).map_err(|err| Error::Read(path.to_path_buf(), err))?;
    if data.len() > max_len {
        slog::warn!(
            logger,
            "Dump is larger than VRAM, truncating";
            "path" => %path.display(),
            "len" => data.len(),
            "max_len" => max_len
        );
        data.truncate(max_len);
    }
    Ok(data)
}

fn load_vram(args: &Args, logger: &slog::Logger) -> Result<VramSnapshot, Error> {
    let mut vram = VramSnapshot::new();
    vram.write_texture(0, &read_dump(&args.texture, TEXTURE_LEN, logger)?);
    if let Some(path) = &args.palette {
        vram.write_tex_pal(0, &read_dump(path, TEX_PAL_LEN, logger)?);
    }
    let dirty = vram.derive_state();
    vram.make_coherent(dirty);
    Ok(vram)
}

fn run(args: &Args, logger: &slog::Logger) -> Result<(), Error> {
    let mut config = config::File::<config::Config>::read(&args.config, true)
        .map_err(Error::Config)?
        .contents;
    if let Some(scale_factor) = args.scale_factor {
        config.render.scale_factor = scale_factor;
    }
    config.replacement.apply();
    debug!(logger, "Loaded config"; "path" => %args.config.display());

    let mut vram = load_vram(args, logger)?;
    let params = TextureParams(args.params);
    let texture =
        DecodedTexture::decode(vram.flat(), params, args.palette_base).map_err(Error::Decode)?;
    let signature = Signature {
        hash: content_hash(&texture.rgba, texture.width, texture.height),
        format: texture.format,
        width: texture.width,
        height: texture.height,
    };
    info!(logger, "Decoded texture {}", signature);
    println!("{}", signature.file_name());

    if args.dump {
        let dump_dir = config.replacement.dump_dir();
        if TextureDumper::new(&dump_dir, logger.clone()).dump(signature, &texture.rgba) {
            info!(
                logger,
                "Dumped to {}",
                dump_dir.join(signature.file_name()).display()
            );
        }
    }

    if args.check_replacement {
        let mod_dir = config.replacement.mod_dir();
        match ReplacementCache::with_mod_dir(&mod_dir, logger.clone()).lookup_or_load(signature) {
            Some(image) => {
                let [scale_x, scale_y] = image.scale();
                info!(
                    logger,
                    "Replacement found: {}x{} ({}x, {}x)",
                    image.width(),
                    image.height(),
                    scale_x,
                    scale_y
                );
            }
            None => info!(
                logger,
                "No replacement at {}",
                mod_dir.join(signature.file_name()).display()
            ),
        }
    }

    if let Some(path) = &args.preview {
        let rgba = preview::render(
            &mut vram,
            params,
            args.palette_base,
            config.render,
            &config.replacement,
            logger,
        )
        .map_err(Error::Preview)?;
        codec::save_png(
            path,
            hires_core::gpu::SCREEN_WIDTH as u32,
            hires_core::gpu::SCREEN_HEIGHT as u32,
            &rgba,
        )
        .map_err(|err| Error::Save(path.clone(), err))?;
        info!(logger, "Saved preview to {}", path.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let logger = logging::init(args.verbose);
    let result = run(&args, &logger);
    // Flush the async drain before exiting
    drop(logger);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hires_core::gpu::vram::TextureMemory;
    use std::ffi::OsStr;

    #[test]
    fn hex_arguments() {
        assert_eq!(parse_hex_u32("1C900100"), Ok(0x1C90_0100));
        assert_eq!(parse_hex_u32("0x7f"), Ok(0x7F));
        assert!(parse_hex_u32("zz").is_err());
        assert_eq!(parse_hex_u16("0X1A2B"), Ok(0x1A2B));
        assert!(parse_hex_u16("10000").is_err());
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "hires-texdump",
            "--texture",
            "tex.bin",
            "--params",
            "0x1C900000",
            "--dump",
        ])
        .unwrap();
        assert_eq!(args.params, 0x1C90_0000);
        assert_eq!(args.palette_base, 0);
        assert!(args.dump && !args.check_replacement);
        assert_eq!(args.config, Path::new("hires-texdump.json"));
    }

    #[test]
    fn dumps_are_loaded_at_address_zero() {
        let dir = tempfile::tempdir().unwrap();
        let texture = dir.path().join("texture.bin");
        let palette = dir.path().join("palette.bin");
        fs::write(&texture, [0x34, 0x12]).unwrap();
        fs::write(&palette, [0xCD, 0xAB]).unwrap();
        let args = Args::try_parse_from([
            OsStr::new("hires-texdump"),
            OsStr::new("--texture"),
            texture.as_os_str(),
            OsStr::new("--palette"),
            palette.as_os_str(),
            OsStr::new("--params"),
            OsStr::new("0"),
        ])
        .unwrap();
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let vram = load_vram(&args, &logger).unwrap();
        assert_eq!(vram.flat().read_texture_u16(0), 0x1234);
        assert_eq!(vram.flat().read_palette_u16(0), 0xABCD);
    }
}
