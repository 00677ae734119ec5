//! Minimal pixel buffers and the preprocessing applied to each face before
//! classification.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;
use crate::inference::FaceTensor;

/// Face region in pixel coordinates, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// 8-bit, 3-channel image in `bgr8` layout, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgrImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// 8-bit single-channel image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BgrImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ActionError> {
        let image = Self {
            width,
            height,
            data,
        };
        image.validate()?;
        Ok(image)
    }

    pub fn validate(&self) -> Result<(), ActionError> {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| {
                ActionError::InvalidGoal(format!(
                    "image dimensions {}x{} are too large",
                    self.width, self.height
                ))
            })?;
        if self.data.len() != expected {
            return Err(ActionError::InvalidGoal(format!(
                "image is {}x{} but carries {} bytes, expected {expected}",
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Luma conversion with ITU-R 601 weights (`0.299 R + 0.587 G + 0.114 B`).
    pub fn to_gray(&self) -> Result<GrayImage, ActionError> {
        self.validate()?;
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let (b, g, r) = (f32::from(px[0]), f32::from(px[1]), f32::from(px[2]));
                (0.299 * r + 0.587 * g + 0.114 * b).round() as u8
            })
            .collect();
        Ok(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

impl GrayImage {
    fn pixel(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Copy out the region covered by `bbox`.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<GrayImage, ActionError> {
        if bbox.width == 0 || bbox.height == 0 {
            return Err(ActionError::InvalidGoal(format!("empty bounding box {bbox:?}")));
        }
        let right = bbox.x.checked_add(bbox.width);
        let bottom = bbox.y.checked_add(bbox.height);
        match (right, bottom) {
            (Some(r), Some(b)) if r <= self.width && b <= self.height => {}
            _ => {
                return Err(ActionError::InvalidGoal(format!(
                    "bounding box {bbox:?} exceeds {}x{} image",
                    self.width, self.height
                )));
            }
        }

        let mut data = Vec::with_capacity(bbox.width as usize * bbox.height as usize);
        for y in bbox.y..bbox.y + bbox.height {
            let start = y as usize * self.width as usize + bbox.x as usize;
            data.extend_from_slice(&self.data[start..start + bbox.width as usize]);
        }
        Ok(GrayImage {
            width: bbox.width,
            height: bbox.height,
            data,
        })
    }

    /// Bilinear resize sampling at pixel centres, edges clamped.
    pub fn resize(&self, width: u32, height: u32) -> GrayImage {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        if self.width == 0 || self.height == 0 {
            data.resize(width as usize * height as usize, 0);
            return GrayImage {
                width,
                height,
                data,
            };
        }

        let scale_x = self.width as f32 / width as f32;
        let scale_y = self.height as f32 / height as f32;
        for y in 0..height {
            let (y0, y1, fy) = sample(y, scale_y, self.height);
            for x in 0..width {
                let (x0, x1, fx) = sample(x, scale_x, self.width);
                let top = lerp(self.pixel(x0, y0), self.pixel(x1, y0), fx);
                let bottom = lerp(self.pixel(x0, y1), self.pixel(x1, y1), fx);
                let value = top * (1.0 - fy) + bottom * fy;
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
        GrayImage {
            width,
            height,
            data,
        }
    }

    /// Pixels scaled to `[0, 1]`, shaped rows × columns × 1 channel.
    pub fn normalized(&self) -> FaceTensor {
        self.data
            .chunks_exact(self.width.max(1) as usize)
            .map(|row| row.iter().map(|&p| [f32::from(p) / 255.0]).collect())
            .collect()
    }
}

// Neighbouring source indices and the weight of the second one.
fn sample(dst: u32, scale: f32, len: u32) -> (u32, u32, f32) {
    let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
    let i0 = (src.floor() as u32).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    (i0, i1, (src - i0 as f32).clamp(0.0, 1.0))
}

fn lerp(a: u8, b: u8, t: f32) -> f32 {
    f32::from(a) * (1.0 - t) + f32::from(b) * t
}
