//! Admission checks for user-selected images.
//!
//! Rules run in a fixed order (basic, metadata, dimensions, aspect ratio,
//! security) and only stop early when metadata cannot be obtained. Errors reject
//! the file, warnings are advisory, suggestions are always computed.

use crate::codec::ImageCodec;
use crate::image::exif;
use crate::metadata::ImageMetadata;
use agentdesk_core::constants::{
    ASPECT_RATIO_TOLERANCE, COMMON_ASPECT_RATIOS, LARGE_JPEG_THRESHOLD_BYTES,
    LARGE_PNG_THRESHOLD_BYTES, OPTIMIZE_SIZE_THRESHOLD_BYTES, SCAN_WINDOW_BYTES,
    SUSPICIOUSLY_SMALL_BYTES, WEB_OPTIMAL_HEIGHT, WEB_OPTIMAL_WIDTH,
};
use agentdesk_core::{ImageType, SourceFile, ValidationError, ValidationOptions, ValidationWarning};
use regex::RegexSet;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

const SCRIPT_PATTERNS: [(&str, &str); 6] = [
    (r"(?i)<script", "script tag"),
    (r"(?i)javascript:", "javascript URL"),
    (r"(?i)<iframe", "iframe tag"),
    (r"(?i)\bon(load|error)\s*=", "inline event handler"),
    (r"(?i)\beval\s*\(", "eval call"),
    (r"(?i)<\?php", "PHP tag"),
];

static SCRIPT_PATTERN_SET: LazyLock<Option<RegexSet>> = LazyLock::new(|| {
    RegexSet::new(SCRIPT_PATTERNS.iter().map(|(pattern, _)| *pattern))
        .map_err(|e| tracing::error!(error = %e, "Failed to compile script patterns"))
        .ok()
});

/// Outcome of validating one file
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub admitted: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub metadata: Option<ImageMetadata>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }
}

/// Image validator
///
/// Holds a metadata cache keyed by [`SourceFile::fingerprint`], so repeated
/// validation of the same file probes it once.
pub struct ImageValidator {
    codec: Arc<dyn ImageCodec>,
    metadata_cache: Mutex<HashMap<String, ImageMetadata>>,
}

impl ImageValidator {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            codec,
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn validate(&self, file: &SourceFile, options: &ValidationOptions) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let declared = file.declared_type();

        Self::check_basic(file, declared, options, &mut errors, &mut warnings);
        if !errors.is_empty() {
            return Self::finish(file, declared, errors, warnings, None);
        }

        let metadata = match self.extract_metadata(file) {
            Ok(metadata) => metadata,
            Err(e) => {
                errors.push(e);
                return Self::finish(file, declared, errors, warnings, None);
            }
        };

        Self::check_dimensions(&metadata, options, &mut errors, &mut warnings);
        Self::check_aspect_ratio(&metadata, options, &mut errors, &mut warnings);

        if options.check_for_malware {
            Self::check_security(file, declared, &mut errors, &mut warnings);
        }

        Self::finish(file, declared, errors, warnings, Some(metadata))
    }

    /// Probe dimensions and EXIF facts, memoized per file fingerprint.
    pub fn extract_metadata(&self, file: &SourceFile) -> Result<ImageMetadata, ValidationError> {
        let key = file.fingerprint();
        if let Some(cached) = self
            .metadata_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&key).cloned())
        {
            return Ok(cached);
        }

        let info = self
            .codec
            .probe(&file.data)
            .map_err(|e| ValidationError::Undecodable(e.to_string()))?;

        let has_exif = exif::has_exif(&file.data);
        let orientation = if has_exif {
            exif::read_orientation(&file.data)
        } else {
            1
        };

        let metadata = ImageMetadata::new(
            info.width,
            info.height,
            file.size(),
            file.content_type.clone(),
            info.format.or_else(|| ImageType::detect(&file.data)),
            has_exif,
            orientation,
        );

        tracing::debug!(
            file = %file.name,
            width = metadata.width,
            height = metadata.height,
            has_exif = metadata.has_exif,
            orientation = metadata.exif_orientation,
            "Extracted image metadata"
        );

        if let Ok(mut cache) = self.metadata_cache.lock() {
            cache.insert(key, metadata.clone());
        }

        Ok(metadata)
    }

    fn check_basic(
        file: &SourceFile,
        declared: Option<ImageType>,
        options: &ValidationOptions,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let size = file.size();
        if size == 0 {
            errors.push(ValidationError::EmptyFile);
        } else if size > options.max_file_size {
            errors.push(ValidationError::FileTooLarge {
                size,
                max: options.max_file_size,
            });
        }

        match declared {
            Some(t) if options.allowed_types.contains(&t) => {}
            _ => errors.push(ValidationError::UnsupportedType {
                content_type: file.content_type.clone(),
                allowed: options.allowed_types.clone(),
            }),
        }

        if let Some(extension) = file.extension() {
            if declared.is_some() && ImageType::from_extension(&extension) != declared {
                tracing::debug!(
                    extension = %extension,
                    content_type = %file.content_type,
                    "Extension does not match content type"
                );
                warnings.push(ValidationWarning::ExtensionMismatch {
                    extension,
                    content_type: file.content_type.clone(),
                });
            }
        }
    }

    fn check_dimensions(
        metadata: &ImageMetadata,
        options: &ValidationOptions,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let (width, height) = (metadata.width, metadata.height);
        let (min, max) = (options.min_dimensions, options.max_dimensions);

        if width < min.width || height < min.height {
            errors.push(ValidationError::DimensionsTooSmall {
                width,
                height,
                min_width: min.width,
                min_height: min.height,
            });
        }

        if width > max.width || height > max.height {
            errors.push(ValidationError::DimensionsTooLarge {
                width,
                height,
                max_width: max.width,
                max_height: max.height,
            });
        } else if width > WEB_OPTIMAL_WIDTH * 2 || height > WEB_OPTIMAL_HEIGHT * 2 {
            warnings.push(ValidationWarning::OversizedForWeb { width, height });
        }
    }

    fn check_aspect_ratio(
        metadata: &ImageMetadata,
        options: &ValidationOptions,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let ratio = metadata.aspect_ratio;
        let range = options.allowed_aspect_ratios;

        if !range.contains(ratio) {
            errors.push(ValidationError::AspectRatioOutOfRange {
                ratio,
                min: range.min,
                max: range.max,
            });
        } else if !COMMON_ASPECT_RATIOS
            .iter()
            .any(|common| (ratio - common).abs() <= ASPECT_RATIO_TOLERANCE)
        {
            warnings.push(ValidationWarning::UncommonAspectRatio { ratio });
        }
    }

    fn check_security(
        file: &SourceFile,
        declared: Option<ImageType>,
        errors: &mut Vec<ValidationError>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        if let Some(declared) = declared {
            if !declared.matches_signature(&file.data) {
                let detected = ImageType::detect(&file.data);
                tracing::warn!(
                    file = %file.name,
                    declared = %declared,
                    detected = ?detected,
                    "File signature does not match declared type"
                );
                errors.push(ValidationError::SignatureMismatch { declared, detected });
            }
        }

        if file.size() < SUSPICIOUSLY_SMALL_BYTES {
            warnings.push(ValidationWarning::SuspiciouslySmall { size: file.size() });
        }

        // Best-effort heuristic; embedded scripts are reported, never rejected
        let Some(patterns) = SCRIPT_PATTERN_SET.as_ref() else {
            return;
        };
        let window = &file.data[..file.data.len().min(SCAN_WINDOW_BYTES)];
        let text = String::from_utf8_lossy(window);
        for index in patterns.matches(&text).iter() {
            let (_, label) = SCRIPT_PATTERNS[index];
            tracing::warn!(file = %file.name, pattern = label, "Suspicious content in image");
            warnings.push(ValidationWarning::SuspiciousContent {
                pattern: label.to_string(),
            });
        }
    }

    fn suggestions(
        file: &SourceFile,
        declared: Option<ImageType>,
        metadata: Option<&ImageMetadata>,
    ) -> Vec<String> {
        let size = file.size();
        let mut suggestions = Vec::new();

        if size > OPTIMIZE_SIZE_THRESHOLD_BYTES {
            suggestions.push("Compress the image to reduce its file size below 2 MB".to_string());
        }
        if declared == Some(ImageType::Png) && size > LARGE_PNG_THRESHOLD_BYTES {
            suggestions.push("Convert this PNG to JPEG or WebP for smaller files".to_string());
        }
        if let Some(meta) = metadata {
            if meta.width > WEB_OPTIMAL_WIDTH || meta.height > WEB_OPTIMAL_HEIGHT {
                suggestions.push(format!(
                    "Resize to {}x{} or smaller for web display",
                    WEB_OPTIMAL_WIDTH, WEB_OPTIMAL_HEIGHT
                ));
            }
            if meta.has_exif {
                suggestions.push("Strip EXIF metadata to protect location privacy".to_string());
            }
        }
        if declared == Some(ImageType::Jpeg) && size > LARGE_JPEG_THRESHOLD_BYTES {
            suggestions.push("Consider WebP for better compression".to_string());
        }

        suggestions
    }

    fn finish(
        file: &SourceFile,
        declared: Option<ImageType>,
        errors: Vec<ValidationError>,
        warnings: Vec<ValidationWarning>,
        metadata: Option<ImageMetadata>,
    ) -> ValidationResult {
        let suggestions = Self::suggestions(file, declared, metadata.as_ref());

        if !errors.is_empty() {
            tracing::debug!(
                file = %file.name,
                errors = errors.len(),
                warnings = warnings.len(),
                "Image rejected"
            );
        }

        ValidationResult {
            admitted: errors.is_empty(),
            errors,
            warnings,
            metadata,
            suggestions,
        }
    }
}
