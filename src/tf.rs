//! Frozen TensorFlow graphs behind the [`Detector`] and [`Recognizer`] seams.

use image::{ DynamicImage, GenericImageView, GrayImage };
use tensorflow::{ Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor, TensorType };
use tracing::info;

use std::fs;
use std::path::Path;

use crate::detection::{ self, BoundingBox, Detector };
use crate::error::LprError;
use crate::recognition::{ Recognizer, TextFragment };
use crate::utils::{ self, OcrLayout };

/// Classes emitted by the plate OCR graph, blank last.
pub const PLATE_CHARSET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M',
    'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// A loaded graph with its session.
struct FrozenGraph {
    graph: Graph,
    session: Session,
}

impl FrozenGraph {

    fn load(pb_file: impl AsRef<Path>) -> Result<Self, LprError> {
        let path = pb_file.as_ref();
        let pb = fs::read(path)?;
        let mut graph = Graph::new();
        graph.import_graph_def(&pb, &ImportGraphDefOptions::new())
            .map_err(|e| LprError::model_load(format!("{}: {}", path.display(), e)))?;
        let session = Session::new(&SessionOptions::new(), &graph)?;
        info!(model = %path.display(), "loaded frozen graph");
        Ok(Self { graph, session })
    }

    fn run<I: TensorType>(&self, input_name: &str, input: &Tensor<I>, output_names: &[&str]) -> Result<Vec<Tensor<f32>>, LprError> {
        let mut args = SessionRunArgs::new();
        args.add_feed(&self.graph.operation_by_name_required(input_name)?, 0, input);
        let tokens = output_names.iter()
            .map(|name| Ok(args.request_fetch(&self.graph.operation_by_name_required(name)?, 0)))
            .collect::<Result<Vec<_>, LprError>>()?;
        self.session.run(&mut args)?;
        tokens.into_iter()
            .map(|token| Ok(args.fetch::<f32>(token)?))
            .collect()
    }
}

/// SSD style detector: `image_tensor` in, normalized
/// `[ymin, xmin, ymax, xmax]` boxes and scores out.
pub struct TfDetector {
    graph: FrozenGraph,
}

impl TfDetector {
    const INPUT: &'static str = "image_tensor";
    const BOXES: &'static str = "detection_boxes";
    const SCORES: &'static str = "detection_scores";

    pub fn new(pb_file: impl AsRef<Path>) -> Result<Self, LprError> {
        Ok(Self { graph: FrozenGraph::load(pb_file)? })
    }
}

impl Detector for TfDetector {
    fn detect(&self, frame: &DynamicImage, confidence: f32, iou: f32) -> Result<Vec<BoundingBox>, LprError> {
        let (width, height) = frame.dimensions();
        let data = frame.to_rgb8().into_raw();
        let input = Tensor::new(&[1, height as u64, width as u64, 3]).with_values(&data)?;

        let outputs = self.graph.run(Self::INPUT, &input, &[Self::BOXES, Self::SCORES])?;
        let (boxes, scores) = (&outputs[0], &outputs[1]);

        let candidates = boxes.chunks(4).zip(scores.iter()).filter_map(|(v, score)| {
            BoundingBox::clipped(
                v[1] * width as f32,
                v[0] * height as f32,
                v[3] * width as f32,
                v[2] * height as f32,
                *score,
                width,
                height,
            )
        }).collect();
        Ok(detection::filter_detections(candidates, confidence, iou))
    }
}

/// CTC plate reader: a float image laid out by [`OcrLayout`] in, per-step
/// class probabilities out.
pub struct TfRecognizer {
    graph: FrozenGraph,
    input_name: String,
    output_name: String,
    layout: OcrLayout,
}

impl TfRecognizer {
    pub const INPUT: &'static str = "input_1";
    pub const OUTPUT: &'static str = "dense_2/truediv";
    /// the plate graph reads a transposed 164×48 plate as `[1, 164, 48, 3]`
    pub const LAYOUT: OcrLayout = OcrLayout { rows: 164, cols: 48, transposed: true };

    pub fn new(pb_file: impl AsRef<Path>, input_name: &str, output_name: &str, layout: OcrLayout) -> Result<Self, LprError> {
        Ok(Self {
            graph: FrozenGraph::load(pb_file)?,
            input_name: input_name.to_string(),
            output_name: output_name.to_string(),
            layout,
        })
    }

    /// The plate OCR graph with its stock tensor names and layout.
    pub fn plate_ocr(pb_file: impl AsRef<Path>) -> Result<Self, LprError> {
        Self::new(pb_file, Self::INPUT, Self::OUTPUT, Self::LAYOUT)
    }
}

impl Recognizer for TfRecognizer {
    fn read(&self, image: &GrayImage) -> Result<Vec<TextFragment>, LprError> {
        let data = utils::ocr_input(image, &self.layout);
        let input = Tensor::new(&self.layout.tensor_shape()).with_values(&data)?;

        let outputs = self.graph.run(&self.input_name, &input, &[self.output_name.as_str()])?;
        let probs = &outputs[0];
        let dims = probs.dims();
        if dims.len() < 2 {
            return Err(LprError::recognizer(format!("unexpected output shape {:?}", dims)));
        }
        let shape = [dims[dims.len() - 2] as usize, dims[dims.len() - 1] as usize];
        let (text, confidence) = utils::ctc_greedy_decode(probs, shape, &PLATE_CHARSET);
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let (width, height) = image.dimensions();
        Ok(vec![TextFragment::from_rect(0.0, 0.0, width as f32, height as f32, text, confidence)])
    }
}
