use clap::{ Arg, App };
use tracing::{ error, info, warn };
use tracing_subscriber::EnvFilter;

use std::error::Error;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Instant;

use lpr_vn::{ annotate, config, Lpr, PipelineConfig, Recognition };

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = App::new("lpr")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("Detect and read Vietnamese license plates")
                    .arg(Arg::with_name("INPUT")
                        .help("image file, or a directory of images")
                        .required(true)
                        .index(1))
                    .arg(Arg::with_name("detect-model")
                        .long("detect-model")
                        .takes_value(true)
                        .default_value("./models/detect.pb")
                        .help("frozen plate detection graph"))
                    .arg(Arg::with_name("ocr-model")
                        .long("ocr-model")
                        .takes_value(true)
                        .default_value("./models/ocr_plate.pb")
                        .help("frozen plate OCR graph"))
                    .arg(Arg::with_name("font")
                        .long("font")
                        .takes_value(true)
                        .help("TrueType font for plate labels"))
                    .arg(Arg::with_name("conf")
                        .long("conf")
                        .takes_value(true)
                        .help("minimum detection confidence"))
                    .arg(Arg::with_name("iou")
                        .long("iou")
                        .takes_value(true)
                        .help("overlap above which detections are merged"))
                    .arg(Arg::with_name("output-dir")
                        .long("output-dir")
                        .takes_value(true)
                        .default_value("test_results")
                        .help("where annotated images are written"))
                    .arg(Arg::with_name("debug")
                        .long("debug")
                        .help("also write every plate crop and its binary image"))
                    .get_matches();

    let input = matches.value_of("INPUT").ok_or("image is required")?;
    let confidence = match matches.value_of("conf") {
        Some(v) => v.parse::<f32>()?,
        None => config::DETECTION_CONFIDENCE,
    };
    let iou = match matches.value_of("iou") {
        Some(v) => v.parse::<f32>()?,
        None => config::DETECTION_IOU,
    };
    let output_dir = PathBuf::from(matches.value_of("output-dir").unwrap_or("test_results"));
    let debug = matches.is_present("debug");

    let pipeline_config = PipelineConfig::default().with_thresholds(confidence, iou);
    let detect_model = matches.value_of("detect-model").unwrap_or("./models/detect.pb");
    let ocr_model = matches.value_of("ocr-model").unwrap_or("./models/ocr_plate.pb");
    // models load before any image is touched, a failure here ends the run
    let mut lpr = match Lpr::from_models(detect_model, ocr_model, pipeline_config) {
        Ok(lpr) => lpr,
        Err(e) => {
            error!(error = %e, "could not load models");
            return Err(e.into());
        }
    };
    if let Some(font) = matches.value_of("font") {
        lpr = lpr.with_font(annotate::load_font(font)?);
    }

    fs::create_dir_all(&output_dir)?;
    let input = Path::new(input);
    if input.is_dir() {
        recognize_dir(&lpr, input, &output_dir, debug)
    } else {
        recognize_file(&lpr, input, &output_dir, debug).map(|_| ())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// File names for a plate crop and its binary image.
fn debug_file_names(stem: &str, index: usize, text: &str) -> (String, String) {
    let base = format!("{}_plate_{}", stem, index);
    let text = text.replace('-', "_").replace('/', "");
    (format!("{}_ocr_{}.png", base, text), format!("{}_binary.png", base))
}

fn recognize_file(lpr: &Lpr, path: &Path, output_dir: &Path, debug: bool) -> Result<Recognition, Box<dyn Error>> {
    info!(file = %path.display(), "processing image");
    let img = image::open(path)?;
    let res = lpr.recognize(&img)?;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("image.png");
    let stem = path.file_stem().and_then(|n| n.to_str()).unwrap_or("image");

    if res.plates.is_empty() {
        warn!(file = %path.display(), "no plate detected");
    }
    for (i, plate) in res.plates.iter().enumerate() {
        println!("Plate {}: {} (confidence: {:.2})", i + 1, plate.record.text, plate.record.confidence);
        if debug {
            let (plate_name, binary_name) = debug_file_names(stem, i, &plate.record.text);
            plate.record.plate.save(output_dir.join(plate_name))?;
            plate.record.binary.save(output_dir.join(binary_name))?;
        }
    }

    let result_path = output_dir.join(format!("result_{}", file_name));
    res.annotated.save(&result_path)?;
    info!(path = %result_path.display(), "annotated image written");

    #[cfg(feature = "display-window")]
    {
        let (width, height) = res.annotated.dimensions();
        let rgba = image::DynamicImage::ImageRgb8(res.annotated.clone()).to_rgba8();
        imageproc::window::display_image("res", &rgba, width.min(700), height.min(700));
    }

    Ok(res)
}

fn recognize_dir(lpr: &Lpr, dir: &Path, output_dir: &Path, debug: bool) -> Result<(), Box<dyn Error>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    paths.sort();

    let mut total_amount = 0;
    let mut success = 0;
    let mut scores = Vec::new();
    let mut millis = Vec::new();
    for path in paths {
        let before = Instant::now();
        let res = match recognize_file(lpr, &path, output_dir, debug) {
            Ok(res) => res,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping image");
                continue;
            }
        };
        millis.push(before.elapsed().as_millis());
        total_amount += 1;
        if let Some(first) = res.plates.first() {
            scores.push(first.record.confidence);
            success += 1;
        }
    }

    println!("{}", summary_line(total_amount, success, &scores, &millis));
    Ok(())
}

fn summary_line(total_amount: usize, success: usize, scores: &[f32], millis: &[u128]) -> String {
    let average_score = if scores.is_empty() { 0.0 } else { scores.iter().sum::<f32>() / scores.len() as f32 };
    let average_speed = if millis.is_empty() { 0 } else { millis.iter().sum::<u128>() / millis.len() as u128 };
    format!("total_amount: {}, success: {}, average_score: {:.2}, average_speed: {}ms",
        total_amount, success, average_score, average_speed)
}
