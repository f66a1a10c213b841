use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glance_core::Overlay;
use glance_imaging::{
    compose, encode, load_font, normalize_with, LabelVocabulary, NormalizeOptions, RasterSurface,
};
use glance_pipeline::{Config, OnnxClassifier, Pipeline, ReplayRecognizer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "glance", about = "Overlay recognition results on captured photos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run detectors on a photo and render the annotated view
    Annotate(AnnotateArgs),
    /// Write the classifier input tensor for a photo as raw bytes
    Encode {
        photo: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        /// Square input resolution (default from GLANCE_CLASSIFIER_INPUT)
        #[arg(long)]
        size: Option<u32>,
    },
    /// Orient and fit a photo to the view
    Normalize {
        photo: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, value_parser = parse_size)]
        view: Option<(u32, u32)>,
        /// Center-crop to at most this long/short side ratio
        #[arg(long, value_parser = parse_aspect)]
        max_aspect: Option<f32>,
    },
}

#[derive(Args)]
struct AnnotateArgs {
    /// Captured photo
    photo: PathBuf,
    /// Replay recognition results from a JSON file (repeatable)
    #[arg(long)]
    replay: Vec<PathBuf>,
    /// Classify the photo with the ONNX model in GLANCE_MODEL_DIR
    #[arg(long)]
    classify: bool,
    /// Output PNG
    #[arg(short, long, default_value = "overlay.png")]
    out: PathBuf,
    /// View size as WIDTHxHEIGHT (default from GLANCE_VIEW_WIDTH/HEIGHT)
    #[arg(long, value_parser = parse_size)]
    view: Option<(u32, u32)>,
    /// Caption font (TTF/OTF)
    #[arg(long)]
    font: Option<PathBuf>,
    /// Center-crop to at most this long/short side ratio
    #[arg(long, value_parser = parse_aspect)]
    max_aspect: Option<f32>,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let h = h.trim().parse::<u32>().map_err(|e| format!("height: {e}"))?;
    if w == 0 || h == 0 {
        return Err("view dimensions must be positive".into());
    }
    Ok((w, h))
}

fn parse_aspect(s: &str) -> Result<f32, String> {
    let ratio = s.trim().parse::<f32>().map_err(|e| format!("aspect ratio: {e}"))?;
    if !ratio.is_finite() || ratio < 1.0 {
        return Err("aspect ratio must be at least 1.0".into());
    }
    Ok(ratio)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Annotate(args) => annotate(&config, args).await?,
        Commands::Encode { photo, out, size } => {
            let size = size.unwrap_or(config.classifier_input);
            let image = image::open(&photo)
                .with_context(|| format!("failed to decode {}", photo.display()))?;
            let tensor = encode(&image, size, size);
            std::fs::write(&out, tensor.as_bytes())
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {} bytes, shape {:?}", tensor.len(), tensor.shape());
        }
        Commands::Normalize {
            photo,
            out,
            view,
            max_aspect,
        } => {
            let (w, h) = view.unwrap_or((config.view_width, config.view_height));
            let image = normalize_with(&photo, w, h, &NormalizeOptions { max_aspect })?;
            image
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {}x{} to {}", image.width(), image.height(), out.display());
        }
    }

    Ok(())
}

async fn annotate(config: &Config, args: AnnotateArgs) -> Result<()> {
    let (view_width, view_height) = args.view.unwrap_or((config.view_width, config.view_height));
    let font_path = args.font.or_else(|| config.font_path.clone());

    let overlay = Arc::new(Overlay::with_redraw_hook(|| tracing::trace!("redraw requested")));
    let (mut pipeline, mut notices) = Pipeline::new(overlay.clone());

    for path in &args.replay {
        pipeline.register(ReplayRecognizer::load(path)?)?;
    }
    if args.classify {
        let vocabulary = LabelVocabulary::load(&config.labels_path)?;
        let classifier =
            OnnxClassifier::load(&config.classifier_model_path(), vocabulary, config.classifier_input)?;
        pipeline.register(classifier)?;
    }
    if pipeline.detectors().is_empty() {
        bail!("no detectors configured; pass --replay <results.json> or --classify");
    }

    let font = font_path.map(|p| load_font(&p)).transpose()?;

    // A photo that cannot be decoded aborts before the overlay is touched.
    let options = NormalizeOptions {
        max_aspect: args.max_aspect,
    };
    let image = normalize_with(&args.photo, view_width, view_height, &options)?;
    let (photo_width, photo_height) = image.dimensions();

    let capture = pipeline.begin_capture(photo_width, photo_height);
    let (mut canvas, origin) = compose(&image, view_width, view_height);
    overlay.translate(origin.x, origin.y);

    let timeout = Duration::from_secs(config.submit_timeout_secs);
    for submission in pipeline.submit(capture, Arc::new(image)).await? {
        let kind = submission.kind;
        match submission.wait_timeout(timeout).await {
            Ok(state) => tracing::info!(%kind, ?state, "detector finished"),
            Err(err) => eprintln!("{err}"),
        }
    }
    while let Ok(notice) = notices.try_recv() {
        println!("{notice}");
    }

    let drawn = {
        let mut surface =
            RasterSurface::new(&mut canvas).with_region(overlay.origin(), photo_width, photo_height);
        if let Some(font) = &font {
            surface = surface.with_font(font);
        }
        overlay.render_surface(&mut surface)
    };

    let out = &args.out;
    canvas
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("{drawn} annotation(s) drawn to {}", out.display());
    Ok(())
}
