//! Face expressions for the robot's display.
//!
//! [`FaceExpression`] is the closed keyword vocabulary accepted by the `face`
//! command.  A [`FaceRenderer`] turns an expression into a 128x64 bitmap;
//! the caller halves it with [`FaceImage::even_rows`] before pushing it to the
//! 128x32 display.
//!
//! [`EyeBoxRenderer`] is a deliberately plain renderer: two filled boxes
//! scaled and opened per expression.

use rcbridge_types::{BridgeError, FaceImage};

/// Rendered face width in pixels.
pub const FACE_WIDTH: u32 = 128;
/// Rendered face height in pixels, before halving for the display.
pub const FACE_HEIGHT: u32 = 64;

/// Keywords understood by the `face` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceExpression {
    #[default]
    Normal,
    Happy,
    Sad,
    Wink,
    Surprise,
    Lonely,
    Laugh,
    Sleepy,
    Angry,
}

impl FaceExpression {
    /// Parse a keyword.  Unknown or missing keywords fall back to
    /// [`FaceExpression::Normal`].
    pub fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some("happy") => FaceExpression::Happy,
            Some("sad") => FaceExpression::Sad,
            Some("wink") => FaceExpression::Wink,
            Some("surprise") => FaceExpression::Surprise,
            // Clients send the historical spelling.
            Some("lonly") | Some("lonely") => FaceExpression::Lonely,
            Some("laugh") => FaceExpression::Laugh,
            Some("sleepy") => FaceExpression::Sleepy,
            Some("angry") => FaceExpression::Angry,
            _ => FaceExpression::Normal,
        }
    }

    /// Eye geometry for this expression.
    pub fn params(self) -> FaceParams {
        let base = FaceParams::default();
        match self {
            FaceExpression::Normal => base,
            FaceExpression::Happy => FaceParams { left_open: 0.6, right_open: 0.6, ..base },
            FaceExpression::Sad => FaceParams { left_open: 0.5, right_open: 0.5, ..base },
            FaceExpression::Wink => FaceParams { right_open: 0.1, ..base },
            FaceExpression::Surprise => FaceParams { scale_y: 1.5, ..base },
            FaceExpression::Lonely => FaceParams { scale_x: 0.2, scale_y: 0.2, ..base },
            FaceExpression::Laugh => FaceParams { left_open: 0.5, right_open: 0.5, ..base },
            FaceExpression::Sleepy => FaceParams { scale_y: 0.1, ..base },
            FaceExpression::Angry => FaceParams { left_open: 0.7, right_open: 0.7, ..base },
        }
    }
}

/// Scale and openness of the two eyes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceParams {
    pub scale_x: f32,
    pub scale_y: f32,
    /// Fraction of the eye height left visible, 0.0 to 1.0.
    pub left_open: f32,
    pub right_open: f32,
}

impl Default for FaceParams {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            left_open: 1.0,
            right_open: 1.0,
        }
    }
}

/// Produces face bitmaps.
pub trait FaceRenderer: Send + Sync {
    /// Render `expression` at [`FACE_WIDTH`] x [`FACE_HEIGHT`].
    fn render(&self, expression: FaceExpression) -> Result<FaceImage, BridgeError>;
}

/// Draws each eye as a filled box.
#[derive(Debug, Default, Clone, Copy)]
pub struct EyeBoxRenderer;

const EYE_WIDTH: f32 = 28.0;
const EYE_HEIGHT: f32 = 40.0;
const EYE_CENTERS_X: [f32; 2] = [40.0, 88.0];

impl FaceRenderer for EyeBoxRenderer {
    fn render(&self, expression: FaceExpression) -> Result<FaceImage, BridgeError> {
        let p = expression.params();
        let mut pixels = vec![0u8; (FACE_WIDTH * FACE_HEIGHT) as usize];
        let center_y = FACE_HEIGHT as f32 / 2.0;

        for (eye, &cx) in EYE_CENTERS_X.iter().enumerate() {
            let open = if eye == 0 { p.left_open } else { p.right_open };
            let half_w = EYE_WIDTH * p.scale_x / 2.0;
            let full_h = EYE_HEIGHT * p.scale_y;
            // Lids close from the top down.
            let bottom = center_y + full_h / 2.0;
            let top = bottom - full_h * open.clamp(0.0, 1.0);

            let x0 = (cx - half_w).max(0.0) as u32;
            let x1 = ((cx + half_w).min(FACE_WIDTH as f32)) as u32;
            let y0 = top.max(0.0) as u32;
            let y1 = bottom.min(FACE_HEIGHT as f32) as u32;
            for y in y0..y1 {
                let row = (y * FACE_WIDTH) as usize;
                pixels[row + x0 as usize..row + x1 as usize].fill(255);
            }
        }

        Ok(FaceImage {
            width: FACE_WIDTH,
            height: FACE_HEIGHT,
            pixels,
        })
    }
}
