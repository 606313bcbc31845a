//! Detector output types.

use serde::{Deserialize, Serialize};

/// COCO class id for "dog".
pub const DOG_CLASS_ID: usize = 16;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Look up the COCO label for a class id.
pub fn class_name(class_id: usize) -> Option<&'static str> {
    COCO_CLASSES.get(class_id).copied()
}

/// Axis-aligned box in pixel coordinates (corner format).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Clamp the box to the bounds of a `width` x `height` image.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            xmin: self.xmin.clamp(0.0, w),
            ymin: self.ymin.clamp(0.0, h),
            xmax: self.xmax.clamp(0.0, w),
            ymax: self.ymax.clamp(0.0, h),
        }
    }

    /// Integer crop rectangle `(x, y, width, height)` inside the image.
    ///
    /// Coordinates are truncated toward zero after clipping. Returns `None`
    /// when the clipped box has no area.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clipped = self.clip(width, height);
        let x0 = clipped.xmin as u32;
        let y0 = clipped.ymin as u32;
        let x1 = clipped.xmax as u32;
        let y1 = clipped.ymax as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = self.xmax.min(other.xmax);
        let y2 = self.ymax.min(other.ymax);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// A single detector output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// COCO class id (16 = dog)
    pub class_id: usize,
    /// Detection confidence [0, 1]
    pub confidence: f32,
    /// Bounding box in pixels
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }

    pub fn is_dog(&self) -> bool {
        self.class_id == DOG_CLASS_ID
    }

    /// Whether this detection counts toward a subject verdict.
    ///
    /// Confidence must be strictly greater than the threshold.
    pub fn qualifies(&self, target_class: usize, confidence_threshold: f32) -> bool {
        self.class_id == target_class && self.confidence > confidence_threshold
    }
}
