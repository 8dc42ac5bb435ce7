//! Crop extractor
//!
//! Turns a frame plus crop JSON into table crops. Deterministic, no network
//! or database access:
//!
//! 1. rotated-bbox corners → axis-aligned bounding rectangle
//! 2. clamp to the frame; reject slivers under 8 px
//! 3. slice the region and re-encode in the frame's format
//!
//! Rotation-aware cropping would be an enhancement; the axis-aligned
//! rectangle already covers the rotated box.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use shared::models::{CropJson, RotatedBbox};
use thiserror::Error;

/// Minimum usable crop edge in pixels
pub const MIN_CROP_DIM: u32 = 8;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum CropError {
    #[error("frame decode failed: {0}")]
    Decode(String),

    #[error("crop encode failed: {0}")]
    Encode(String),
}

/// One extracted table crop, encoded in the frame's format
#[derive(Debug, Clone)]
pub struct TableCrop {
    pub json_table_id: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// A table entry that produced no crop, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct CropWarning {
    pub json_table_id: String,
    pub reason: &'static str,
}

/// Axis-aligned integer rectangle `(x0, y0, x1, y1)`, half-open on the
/// right/bottom. None when the box is degenerate after clamping.
fn axis_aligned_rect(bbox: &RotatedBbox, frame_w: u32, frame_h: u32) -> Option<(u32, u32, u32, u32)> {
    let (min_x, max_x, min_y, max_y) = match &bbox.corners {
        Some(corners) if !corners.is_empty() => {
            let xs = corners.iter().map(|c| c[0]);
            let ys = corners.iter().map(|c| c[1]);
            (
                xs.clone().fold(f64::INFINITY, f64::min),
                xs.fold(f64::NEG_INFINITY, f64::max),
                ys.clone().fold(f64::INFINITY, f64::min),
                ys.fold(f64::NEG_INFINITY, f64::max),
            )
        }
        _ => {
            let [cx, cy] = bbox.center;
            let [w, h] = bbox.size;
            (cx - w / 2.0, cx + w / 2.0, cy - h / 2.0, cy + h / 2.0)
        }
    };

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(frame_w);
    let y1 = (max_y.ceil().max(0.0) as u32).min(frame_h);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1, y1))
}

fn encode(view: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CropError> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            view.write_with_encoder(encoder)
                .map_err(|e| CropError::Encode(e.to_string()))?;
        }
        other => {
            view.write_to(&mut out, other)
                .map_err(|e| CropError::Encode(e.to_string()))?;
        }
    }
    Ok(out.into_inner())
}

/// Extract every table crop described by `crop_json` from the frame.
///
/// Entries with degenerate or sub-minimum boxes are skipped and reported as
/// warnings so the worker can log them without aborting the frame.
pub fn extract_crops(
    frame_bytes: &[u8],
    frame_format: ImageFormat,
    crop_json: &CropJson,
) -> Result<(Vec<TableCrop>, Vec<CropWarning>), CropError> {
    let frame = image::load_from_memory(frame_bytes)
        .map_err(|e| CropError::Decode(e.to_string()))?;

    let (actual_w, actual_h) = frame.dimensions();
    let frame_w = crop_json.frame_width.unwrap_or(actual_w);
    let frame_h = crop_json.frame_height.unwrap_or(actual_h);
    // Boxes are expressed against the declared frame size; clamp against
    // the smaller of declared and actual so slicing never goes out of range
    let clamp_w = frame_w.min(actual_w);
    let clamp_h = frame_h.min(actual_h);

    let mut crops = Vec::new();
    let mut warnings = Vec::new();

    for table in &crop_json.tables {
        let key = table.id.as_key();

        let Some((x0, y0, x1, y1)) = axis_aligned_rect(&table.rotated_bbox, clamp_w, clamp_h)
        else {
            warnings.push(CropWarning { json_table_id: key, reason: "invalid crop" });
            continue;
        };

        let (w, h) = (x1 - x0, y1 - y0);
        if w < MIN_CROP_DIM || h < MIN_CROP_DIM {
            warnings.push(CropWarning { json_table_id: key, reason: "invalid crop" });
            continue;
        }

        let view = frame.crop_imm(x0, y0, w, h);
        let bytes = encode(&view, frame_format)?;
        crops.push(TableCrop {
            json_table_id: key,
            bytes,
            width: w,
            height: h,
            format: frame_format,
        });
    }

    Ok((crops, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{CropTable, JsonTableId};

    fn frame_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn bbox_from_corners(corners: Vec<[f64; 2]>) -> RotatedBbox {
        RotatedBbox { center: [0.0, 0.0], size: [0.0, 0.0], angle: 0.0, corners: Some(corners) }
    }

    fn table(id: i64, bbox: RotatedBbox) -> CropTable {
        CropTable {
            id: JsonTableId::Int(id),
            rotated_bbox: bbox,
            crop_file: None,
            crop_size: None,
            extra: serde_json::Map::new(),
        }
    }

    fn doc(w: u32, h: u32, tables: Vec<CropTable>) -> CropJson {
        CropJson {
            frame_width: Some(w),
            frame_height: Some(h),
            video_name: None,
            tables,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn extracts_axis_aligned_crop_from_rotated_corners() {
        let frame = frame_png(200, 100);
        // Rotated box whose AABB is [20,10] .. [80,50]
        let crop_json = doc(
            200,
            100,
            vec![table(
                1,
                bbox_from_corners(vec![[50.0, 10.0], [80.0, 30.0], [50.0, 50.0], [20.0, 30.0]]),
            )],
        );

        let (crops, warnings) = extract_crops(&frame, ImageFormat::Png, &crop_json).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].json_table_id, "1");
        assert_eq!((crops[0].width, crops[0].height), (60, 40));
        // Output decodes in the same format as the input frame
        assert_eq!(image::guess_format(&crops[0].bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn clamps_boxes_that_overflow_the_frame() {
        let frame = frame_png(100, 100);
        let crop_json = doc(
            100,
            100,
            vec![table(
                2,
                bbox_from_corners(vec![[-20.0, -10.0], [60.0, -10.0], [60.0, 40.0], [-20.0, 40.0]]),
            )],
        );

        let (crops, warnings) = extract_crops(&frame, ImageFormat::Png, &crop_json).unwrap();
        assert!(warnings.is_empty());
        assert_eq!((crops[0].width, crops[0].height), (60, 40));
    }

    #[test]
    fn sub_minimum_crops_are_skipped_with_warning() {
        let frame = frame_png(100, 100);
        let crop_json = doc(
            100,
            100,
            vec![
                table(3, bbox_from_corners(vec![[10.0, 10.0], [14.0, 10.0], [14.0, 40.0], [10.0, 40.0]])),
                table(4, bbox_from_corners(vec![[200.0, 200.0], [300.0, 200.0], [300.0, 300.0], [200.0, 300.0]])),
            ],
        );

        let (crops, warnings) = extract_crops(&frame, ImageFormat::Png, &crop_json).unwrap();
        assert!(crops.is_empty());
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.reason == "invalid crop"));
    }

    #[test]
    fn falls_back_to_center_size_without_corners() {
        let frame = frame_png(100, 100);
        let bbox = RotatedBbox { center: [50.0, 50.0], size: [20.0, 10.0], angle: 0.0, corners: None };
        let crop_json = doc(100, 100, vec![table(5, bbox)]);

        let (crops, warnings) = extract_crops(&frame, ImageFormat::Png, &crop_json).unwrap();
        assert!(warnings.is_empty());
        assert_eq!((crops[0].width, crops[0].height), (20, 10));
    }
}
