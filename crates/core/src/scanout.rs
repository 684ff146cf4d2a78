//! Video sink: rebuilds the visible frame from the external video bus.
//!
//! Watches `rgb`, `de` and `vs` the way a display receiver would, sampling
//! them on each rising edge of the pixel clock. `vs` homes the cursor to the
//! top-left corner, every sample with `de` high plots one pixel and advances
//! the column, and a falling `de` edge moves to the start of the next line.
//! The result is an RGBA framebuffer sized for the tallest active window.

use crate::palette::Rgb;

pub struct Scanout {
    pub framebuffer: Vec<u8>,
    width: usize,
    height: usize,
    col: usize,
    row: usize,
    prev_clk: bool,
    prev_de: bool,
    /// Lines written since the last `vs`.
    lines: usize,
    /// Line count of the last complete frame.
    pub frame_lines: usize,
    /// Frames started (`vs` pulses seen).
    pub frames: u64,
    /// Whether the framebuffer changed since the flag was last cleared.
    pub dirty: bool,
}

impl Scanout {
    pub fn new(width: usize, height: usize) -> Self {
        let mut framebuffer = vec![0; width * height * 4];
        for px in framebuffer.chunks_exact_mut(4) {
            px[3] = 0xFF;
        }
        Scanout {
            framebuffer,
            width,
            height,
            col: 0,
            row: 0,
            prev_clk: false,
            prev_de: false,
            lines: 0,
            frame_lines: 0,
            frames: 0,
            dirty: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Scanout::new(self.width, self.height);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Feed one reference tick of the video bus.
    #[inline]
    pub fn feed(&mut self, pixel_clk: bool, rgb: Rgb, de: bool, vs: bool) {
        let rising = pixel_clk && !self.prev_clk;
        self.prev_clk = pixel_clk;
        if !rising {
            return;
        }

        if vs {
            if self.lines > 0 {
                self.frame_lines = self.lines;
            }
            self.frames += 1;
            self.row = 0;
            self.col = 0;
            self.lines = 0;
        }

        if de {
            self.plot(self.col, self.row, rgb);
            self.col += 1;
        } else if self.prev_de {
            self.row += 1;
            self.col = 0;
            self.lines += 1;
        }
        self.prev_de = de;
    }

    fn plot(&mut self, x: usize, y: usize, rgb: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = (y * self.width + x) * 4;
        self.framebuffer[offset] = rgb.r;
        self.framebuffer[offset + 1] = rgb.g;
        self.framebuffer[offset + 2] = rgb.b;
        self.framebuffer[offset + 3] = 0xFF;
        self.dirty = true;
    }

    /// Pixel at (`x`, `y`), black when out of range.
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        if x >= self.width || y >= self.height {
            return Rgb::BLACK;
        }
        let offset = (y * self.width + x) * 4;
        Rgb::new(self.framebuffer[offset], self.framebuffer[offset + 1], self.framebuffer[offset + 2])
    }

    /// Convert framebuffer to u32 pixel array (0xRRGGBB format for minifb)
    pub fn as_pixel_buffer(&self) -> Vec<u32> {
        self.framebuffer
            .chunks_exact(4)
            .map(|px| Rgb::new(px[0], px[1], px[2]).to_u32())
            .collect()
    }
}
