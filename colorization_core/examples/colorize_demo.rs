//! Colorizes one grayscale image end to end.
//!
//! Usage: cargo run --example colorize_demo -- [--lab] [palette.json] [image.png]
//!
//! The palette file is a JSON array of 313 `[a, b]` pairs, normalized to
//! [-1, 1] by default. With `--lab` the pairs are read in true a*/b* units,
//! which is the form of the standard quantized gamut `pts_in_hull.npy`
//! shipped with the `richzhang/colorization` models. Convert it once with
//!
//! ```text
//! python -c "import json, numpy; print(json.dumps(numpy.load('pts_in_hull.npy').tolist()))" > pts_in_hull.json
//! ```
//!
//! Without a palette file a synthetic 313-entry gamut is used, which only
//! exercises the pipeline and does not produce meaningful colors. Without an
//! image a synthetic gradient is colorized. Set `RUST_LOG=debug` for
//! per-iteration progress.

use std::path::PathBuf;

use anyhow::Context;
use colorization_core::{
    prepare, render_baseline, render_refined, ChromaPalette, ColorizationContext,
    ColorizerConfig, GrayscaleImage, PriorOptimizer, UniformPredictor, PALETTE_BINS,
};
use ndarray::Array2;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1).peekable();
    let lab_units = args.next_if(|arg| arg == "--lab").is_some();
    let palette = match args.next() {
        Some(path) if lab_units => ChromaPalette::load_lab_json(&path)
            .with_context(|| format!("loading Lab palette from {path}"))?,
        Some(path) => ChromaPalette::load_json(&path)
            .with_context(|| format!("loading palette from {path}"))?,
        None => {
            tracing::warn!("no palette file given, using a synthetic gamut");
            synthetic_palette()?
        }
    };
    let image = match args.next() {
        Some(path) => {
            let luma = image::open(&path)
                .with_context(|| format!("opening {path}"))?
                .to_luma8();
            GrayscaleImage::from_luma(&luma)?
        }
        None => GrayscaleImage::from_plane(Array2::from_shape_fn((192, 256), |(r, c)| {
            ((r + c) as f32 / 448.0 * 255.0).min(255.0)
        }))?,
    };

    let config = load_config();
    tracing::info!(
        high_res = config.geometry.high_res,
        low_res = config.geometry.low_res,
        num_iter = config.schedule.num_iter,
        "loaded config"
    );

    let predictor = UniformPredictor::new(&config.geometry);
    let ctx = ColorizationContext::new(config, palette, predictor)?;
    let prepared = prepare(&ctx, &image)?;

    render_baseline(&ctx, &prepared).to_png(PathBuf::from("out/baseline.png"))?;

    let outcome = PriorOptimizer::new(&ctx, &prepared)?.run()?;
    render_refined(&ctx, &prepared, &outcome)?.to_png(PathBuf::from("out/refined.png"))?;

    println!(
        "Colorization complete after {} iterations (re-projections at {:?}). Final loss {:.6}",
        outcome.iterations(),
        outcome.reprojections,
        outcome.final_loss().unwrap_or(f32::NAN)
    );
    Ok(())
}

fn load_config() -> ColorizerConfig {
    ColorizerConfig::load_from_file("config/colorizer.toml").unwrap_or_else(|err| {
        eprintln!("Falling back to default config: {err}");
        ColorizerConfig::default()
    })
}

/// Entries spread over the normalized disc along a golden-angle spiral.
fn synthetic_palette() -> anyhow::Result<ChromaPalette> {
    let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
    let pairs = (0..PALETTE_BINS)
        .map(|i| {
            let radius = 0.9 * ((i as f32 + 0.5) / PALETTE_BINS as f32).sqrt();
            let angle = i as f32 * golden;
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect();
    Ok(ChromaPalette::from_pairs(pairs)?)
}
