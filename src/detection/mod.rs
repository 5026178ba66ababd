pub mod annotate;
pub mod contours;
pub mod preprocessing;
pub mod steps;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::classifier::{Classifier, CrackScorer};
use crate::config::{self, Settings};
use crate::error::Result;
use crate::models::{Analysis, CrackRegion, Outcome, Severity};
use crate::pipeline::MaskPipeline;
use crate::storage::{sanitize_stem, ImageStore};

use annotate::{label_for, Annotator};
use steps::{AdaptiveThresholdStep, MorphCloseStep};

/// In-memory result of annotating one image
#[derive(Debug, Clone)]
pub struct Annotated {
    pub image: RgbImage,
    pub regions: Vec<CrackRegion>,
    pub outcome: Outcome,
}

/// Locates crack-like regions and writes the annotated image.
pub struct RegionExtractor {
    pipeline: MaskPipeline,
    min_region_area: f64,
    annotator: Annotator,
    store: ImageStore,
}

impl RegionExtractor {
    /// Extractor with the standard mask pipeline, writing into `store`.
    pub fn new(store: ImageStore) -> Self {
        Self {
            pipeline: build_standard_pipeline(
                config::default_threshold_block_size(),
                config::default_threshold_offset(),
                config::default_close_iterations(),
            ),
            min_region_area: config::default_min_region_area(),
            annotator: Annotator::load(None),
            store,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let detection = &settings.detection;
        let mut extractor = Self {
            pipeline: build_standard_pipeline(
                detection.threshold_block_size,
                detection.threshold_offset,
                detection.close_iterations,
            ),
            min_region_area: detection.min_region_area,
            annotator: Annotator::load(settings.annotation.font_path.as_deref()),
            store: ImageStore::new(&settings.storage.output_dir, settings.storage.jpeg_quality),
        };

        if let Some(debug_dir) = &settings.debug_dir {
            extractor = extractor.with_debug(debug_dir.clone())?;
        }
        Ok(extractor)
    }

    /// Save intermediate masks under `debug_dir` (must be empty or absent).
    pub fn with_debug(mut self, debug_dir: PathBuf) -> Result<Self> {
        self.pipeline = self.pipeline.with_debug(debug_dir)?;
        Ok(self)
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_min_region_area(mut self, min_region_area: f64) -> Self {
        self.min_region_area = min_region_area;
        self
    }

    pub fn output_dir(&self) -> &Path {
        self.store.output_dir()
    }

    /// Threshold, close and trace `image`, keeping regions above the area limit.
    pub fn extract_regions(&self, image: &DynamicImage) -> Result<Vec<CrackRegion>> {
        self.extract_regions_named(image, "image")
    }

    fn extract_regions_named(&self, image: &DynamicImage, run_name: &str) -> Result<Vec<CrackRegion>> {
        let mask = self.pipeline.run(image, run_name)?;
        let all = contours::find_external_contours(&mask);
        let total = all.len();
        let regions = contours::filter_by_area(all, self.min_region_area);

        debug!(
            contours = total,
            kept = regions.len(),
            min_area = self.min_region_area,
            "filtered crack contours"
        );
        Ok(regions)
    }

    /// Draw the annotation for `probability` without touching the filesystem
    /// (apart from debug masks when debug mode is on).
    pub fn annotate(
        &self,
        image: &DynamicImage,
        probability: f64,
        confidence_threshold: f64,
    ) -> Result<Annotated> {
        self.annotate_named(image, probability, confidence_threshold, "image")
    }

    fn annotate_named(
        &self,
        image: &DynamicImage,
        probability: f64,
        confidence_threshold: f64,
        run_name: &str,
    ) -> Result<Annotated> {
        let outcome = Outcome::decide(probability, confidence_threshold);
        let mut canvas = image.to_rgb8();

        let regions = match outcome {
            Outcome::Crack => {
                let regions = self.extract_regions_named(image, run_name)?;
                self.annotator.draw_regions(&mut canvas, &regions);
                regions
            }
            Outcome::NoCrack => Vec::new(),
        };
        self.annotator
            .draw_label(&mut canvas, &label_for(outcome, probability));

        Ok(Annotated {
            image: canvas,
            regions,
            outcome,
        })
    }

    /// Annotate the image at `image_path` and persist it as JPEG.
    ///
    /// `probability >= confidence_threshold` draws the crack regions; anything
    /// lower only gets the "No Crack" label. The source file is never touched.
    pub fn analyze_and_save(
        &self,
        image_path: &Path,
        probability: f64,
        confidence_threshold: f64,
    ) -> Result<Analysis> {
        let image = preprocessing::load_image(image_path)?;

        let run_name = image_path
            .file_stem()
            .map(|s| sanitize_stem(&s.to_string_lossy()))
            .unwrap_or_else(|| "image".to_string());
        let annotated = self.annotate_named(&image, probability, confidence_threshold, &run_name)?;
        drop(image);

        let output_path = self.store.save(&annotated.image, image_path, probability)?;

        info!(
            source = %image_path.display(),
            output = %output_path.display(),
            probability,
            outcome = ?annotated.outcome,
            regions = annotated.regions.len(),
            "analyzed image"
        );

        Ok(Analysis {
            source: image_path.to_path_buf(),
            output_path,
            probability,
            confidence_threshold,
            outcome: annotated.outcome,
            severity: Severity::from_probability(probability),
            regions: annotated.regions,
        })
    }
}

/// Build the standard mask pipeline: adaptive threshold, then close.
pub fn build_standard_pipeline(block_size: u32, offset: i16, close_iterations: u8) -> MaskPipeline {
    MaskPipeline::new()
        .add_step(Arc::new(AdaptiveThresholdStep { block_size, offset }))
        .add_step(Arc::new(MorphCloseStep {
            iterations: close_iterations,
        }))
}

/// Classifier and region extractor run back to back on each image.
pub struct Detector<S = Classifier> {
    scorer: S,
    extractor: RegionExtractor,
    confidence_threshold: f64,
}

impl Detector<Classifier> {
    /// Load the configured model once and set up the extractor.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let classifier = Classifier::new(settings.model_path()?)?;
        let extractor = RegionExtractor::from_settings(settings)?;
        Ok(Self::new(
            classifier,
            extractor,
            settings.detection.confidence_threshold,
        ))
    }
}

impl<S: CrackScorer> Detector<S> {
    pub fn new(scorer: S, extractor: RegionExtractor, confidence_threshold: f64) -> Self {
        Self {
            scorer,
            extractor,
            confidence_threshold,
        }
    }

    pub fn predict(&self, image_path: &Path) -> Result<f64> {
        self.scorer.predict(image_path)
    }

    /// Score the image once, then annotate and save it.
    pub fn analyze_and_save(&self, image_path: &Path, confidence_threshold: f64) -> Result<Analysis> {
        let probability = self.scorer.predict(image_path)?;
        self.extractor
            .analyze_and_save(image_path, probability, confidence_threshold)
    }

    /// [`Detector::analyze_and_save`] with the configured threshold.
    pub fn detect(&self, image_path: &Path) -> Result<Analysis> {
        self.analyze_and_save(image_path, self.confidence_threshold)
    }
}
