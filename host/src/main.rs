use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use image::io::Reader as ImageReader;
use image::RgbaImage;
use log::info;
use mosaic_core::engine::{MosaicEngine, VerificationResult};
use mosaic_core::pipeline::MosaicPipeline;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Input file path to the image to pixelate.
    #[clap(short, long, value_parser, value_hint = clap::ValueHint::FilePath)]
    image: PathBuf,

    /// Block side length, in pixels, for intra-block averaging. Zero leaves
    /// every pixel as its own block.
    #[clap(short, long, value_parser, default_value_t = 2)]
    granularity: u32,

    /// Output file path to save the mosaic image.
    #[clap(short, long, value_parser, default_value = "./mosaic.png", value_hint = clap::ValueHint::FilePath)]
    output: PathBuf,

    /// Output file path to save the receipt bytes for inspection.
    #[clap(short, long, value_parser, value_hint = clap::ValueHint::FilePath)]
    receipt: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    // Decode the user image into the RGBA8 layout the pipeline works in.
    let img = ImageReader::open(&args.image)?.decode()?.into_rgba8();
    let (width, height) = img.dimensions();
    println!(
        "Read image at {} with size: {} x {}",
        args.image.display(),
        width,
        height
    );

    let mut pipeline = MosaicPipeline::new();
    pipeline.attach_engine(MosaicEngine::init());
    let generation = pipeline.submit_image(img.into_raw(), width, height, args.granularity)?;
    info!("image accepted as generation {}", generation);

    let started = Instant::now();
    let output = pipeline.compute_mosaic()?;
    println!(
        "Computed {} x {} mosaic at granularity {} in {:?}",
        output.width(),
        output.height(),
        args.granularity,
        started.elapsed()
    );

    let mosaic_img = RgbaImage::from_raw(output.width(), output.height(), output.as_bytes().to_vec())
        .ok_or("failed to load the mosaic bytes into an image")?;
    mosaic_img.save(&args.output)?;
    println!("Saved mosaic to {}", args.output.display());

    // Show the mosaic in the terminal so the user sees what the proof is for.
    let viuer_config = viuer::Config {
        absolute_offset: false,
        ..Default::default()
    };
    viuer::print_from_file(&args.output, &viuer_config)?;

    let started = Instant::now();
    let receipt = pipeline.generate_proof()?;
    println!(
        "Generated a {} byte receipt in {:?}",
        receipt.len(),
        started.elapsed()
    );
    if let Some(path) = &args.receipt {
        fs::write(path, receipt)?;
        println!("Saved receipt to {}", path.display());
    }

    let started = Instant::now();
    match pipeline.verify()? {
        VerificationResult::Valid => println!(
            "Verified in {:?}: the displayed mosaic was derived from the committed image.",
            started.elapsed()
        ),
        VerificationResult::Invalid(reason) => println!("Verification failed: {}", reason),
    }

    Ok(())
}
