//! Recorded drawing and rasterization.
//!
//! Rendering happens in two phases: the view tree records a linear
//! command list into a [`Canvas`], and [`rasterize`] replays the list
//! into an RGBA image. Text rendering is approximate by design (a block
//! per glyph); pixel-exact platform text is a non-goal.

use image::RgbaImage;

/// One recorded drawing command. Coordinates are local to the current
/// translation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Translate(i32, i32),
    /// Sets the current ARGB color.
    Color(u32),
    Rect {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
    RoundRect {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
        radius: i32,
    },
    Text {
        x: i32,
        baseline: i32,
        text: String,
        size: i32,
    },
}

/// The recording surface handed to the view tree.
#[derive(Debug, Default)]
pub struct Canvas {
    commands: Vec<DrawCommand>,
}

impl Canvas {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self) {
        self.commands.push(DrawCommand::Save);
    }

    pub fn restore(&mut self) {
        self.commands.push(DrawCommand::Restore);
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.commands.push(DrawCommand::Translate(dx, dy));
    }

    pub fn set_color(&mut self, color: u32) {
        self.commands.push(DrawCommand::Color(color));
    }

    pub fn fill_rect(&mut self, left: i32, top: i32, right: i32, bottom: i32) {
        self.commands.push(DrawCommand::Rect {
            left,
            top,
            right,
            bottom,
        });
    }

    pub fn fill_round_rect(&mut self, left: i32, top: i32, right: i32, bottom: i32, radius: i32) {
        self.commands.push(DrawCommand::RoundRect {
            left,
            top,
            right,
            bottom,
            radius,
        });
    }

    pub fn draw_text(&mut self, x: i32, baseline: i32, text: &str, size: i32) {
        self.commands.push(DrawCommand::Text {
            x,
            baseline,
            text: text.to_string(),
            size,
        });
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }
}

/// Replays a command list into an image of the given dimensions. The
/// background starts opaque white.
#[must_use]
pub fn rasterize(commands: &[DrawCommand], width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));

    let mut origin = (0i32, 0i32);
    let mut stack: Vec<(i32, i32)> = Vec::new();
    let mut color = 0xff00_0000u32;

    for command in commands {
        match command {
            DrawCommand::Save => stack.push(origin),
            DrawCommand::Restore => {
                if let Some(prev) = stack.pop() {
                    origin = prev;
                } else {
                    log::warn!("restore without a matching save");
                }
            }
            DrawCommand::Translate(dx, dy) => {
                origin.0 += dx;
                origin.1 += dy;
            }
            DrawCommand::Color(c) => color = *c,
            DrawCommand::Rect {
                left,
                top,
                right,
                bottom,
            }
            | DrawCommand::RoundRect {
                left,
                top,
                right,
                bottom,
                ..
            } => {
                blend_rect(
                    &mut image,
                    origin.0 + left,
                    origin.1 + top,
                    origin.0 + right,
                    origin.1 + bottom,
                    color,
                );
            }
            DrawCommand::Text {
                x,
                baseline,
                text,
                size,
            } => {
                // A block per glyph, advancing by the approximate text
                // metrics.
                let advance = crate::widget::char_advance(*size);
                let top = origin.1 + baseline - size;
                let mut cx = origin.0 + x;
                for ch in text.chars() {
                    if !ch.is_whitespace() {
                        blend_rect(
                            &mut image,
                            cx,
                            top,
                            cx + advance - 1,
                            top + size,
                            color,
                        );
                    }
                    cx += advance;
                }
            }
        }
    }

    image
}

fn blend_rect(image: &mut RgbaImage, left: i32, top: i32, right: i32, bottom: i32, color: u32) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x0 = left.clamp(0, w);
    let x1 = right.clamp(0, w);
    let y0 = top.clamp(0, h);
    let y1 = bottom.clamp(0, h);

    let alpha = ((color >> 24) & 0xff) as u32;
    let src = [
        ((color >> 16) & 0xff) as u32,
        ((color >> 8) & 0xff) as u32,
        (color & 0xff) as u32,
    ];

    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for (i, s) in src.iter().enumerate() {
                let dst = u32::from(pixel.0[i]);
                pixel.0[i] = ((s * alpha + dst * (255 - alpha)) / 255) as u8;
            }
            pixel.0[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_preserves_order() {
        let mut canvas = Canvas::new();
        canvas.save();
        canvas.translate(10, 20);
        canvas.set_color(0xffff_0000);
        canvas.fill_rect(0, 0, 5, 5);
        canvas.restore();

        let commands = canvas.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], DrawCommand::Save);
        assert_eq!(commands[1], DrawCommand::Translate(10, 20));
        assert_eq!(commands[4], DrawCommand::Restore);
    }

    #[test]
    fn rasterizes_a_translated_rect() {
        let mut canvas = Canvas::new();
        canvas.save();
        canvas.translate(2, 2);
        canvas.set_color(0xff00_00ff);
        canvas.fill_rect(0, 0, 2, 2);
        canvas.restore();
        canvas.set_color(0xffff_0000);
        canvas.fill_rect(0, 0, 1, 1);

        let image = rasterize(canvas.commands(), 6, 6);
        // Blue square at (2,2)..(4,4).
        assert_eq!(image.get_pixel(2, 2).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(3, 3).0, [0, 0, 255, 255]);
        // Red pixel at origin, drawn after the restore.
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        // Untouched background stays white.
        assert_eq!(image.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn clipping_is_safe_at_the_edges() {
        let mut canvas = Canvas::new();
        canvas.set_color(0xff00_ff00);
        canvas.fill_rect(-10, -10, 100, 100);
        let image = rasterize(canvas.commands(), 4, 4);
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(3, 3).0, [0, 255, 0, 255]);
    }
}
