//! Reads animated GIFs into full-canvas RGBA frames

use crate::error::ConvResult;
use crate::timing::delay_to_ms;
use gif::Decoder;
use imgref::ImgVec;
use rgb::RGBA8;
use std::io::Read;

/// One composited GIF frame
pub struct DecodedFrame {
    pub image: ImgVec<RGBA8>,
    /// How long the frame is displayed, in ms. Zero-delay frames get 100ms.
    pub delay_ms: u32,
}

pub struct GifSource<R: Read> {
    decoder: Decoder<R>,
    screen: gif_dispose::Screen,
}

impl<R: Read> GifSource<R> {
    pub fn new(input: R) -> ConvResult<Self> {
        let mut gif_opts = gif::DecodeOptions::new();
        // Important:
        gif_opts.set_color_output(gif::ColorOutput::Indexed);

        let decoder = gif_opts.read_info(input)?;
        let screen = gif_dispose::Screen::new_decoder(&decoder);

        Ok(Self { decoder, screen })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u16 {
        self.decoder.width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u16 {
        self.decoder.height()
    }

    /// Decodes the next frame, with disposal of previous frames applied
    pub fn next_frame(&mut self) -> ConvResult<Option<DecodedFrame>> {
        let Some(frame) = self.decoder.read_next_frame()? else {
            return Ok(None);
        };
        let delay_ms = delay_to_ms(frame.delay);
        self.screen.blit_frame(frame)?;
        let image = self.screen.pixels_rgba().map_buf(|b| b.to_owned());
        Ok(Some(DecodedFrame { image, delay_ms }))
    }
}
