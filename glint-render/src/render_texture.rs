//! Render-to-texture with an optional persistent double buffer.
//!
//! ## Swap cycle
//!
//! ```text
//!            draw / draw_bundled
//!                    │
//!   persistent? ─────┼──► swap(active, buffer)    handles only, no pixels
//!                    ▼
//!   push state ► projection = active size ► clip = own rect
//!                    ▼
//!   bind active ► clear transparent ► composite buffer (if ready)
//!                    ▼
//!   client block (DrawSession::draw × N)
//!                    ▼
//!   finalize: finish batch ► next frame ► unbind ► pop clip ► pop state
//! ```
//!
//! Some drivers discard render target contents whenever a target is bound,
//! so a persistent texture never draws on top of its own pixels: each cycle
//! starts from a cleared texture and copies the previous frame back in from
//! the other one.

use glint_core::{
    BlendMode, DisplayObject, Image, Matrix, Painter, Rect, RenderError, Smoothing, Texture, TextureDescriptor,
    TextureFormat,
};
use log::{debug, trace, warn};

/// Construction options for a [`RenderTexture`].
#[derive(Clone, Debug)]
pub struct RenderTextureConfig {
    /// Keep content between draw calls.
    pub persistent: bool,
    /// Device pixels per point; `None` uses the backend's content scale.
    pub scale: Option<f32>,
    pub format: TextureFormat,
    pub repeat: bool,
}

impl Default for RenderTextureConfig {
    fn default() -> Self {
        Self {
            persistent: true,
            scale: None,
            format: TextureFormat::Rgba8,
            repeat: false,
        }
    }
}

pub struct RenderTexture {
    active: Texture,
    buffer: Option<Texture>,
    /// Shows `buffer` when compositing the previous frame.
    helper: Option<Image>,
    /// Shows `active`; retargeted on every swap.
    image: Image,
    width: f32,
    height: f32,
    persistent: bool,
    buffer_ready: bool,
    drawing: bool,
    disposed: bool,
}

impl RenderTexture {
    /// Create the texture(s). Without non-power-of-two support both are
    /// enlarged to the next power of two; `width()`/`height()` still report
    /// the requested size.
    pub fn new(painter: &mut Painter, width: f32, height: f32, config: RenderTextureConfig) -> Result<Self, RenderError> {
        let scale = config.scale.unwrap_or_else(|| painter.content_scale_factor());
        let (legal_width, legal_height) = legal_size(width, height, scale, painter.capabilities().non_power_of_two);

        let mut desc = TextureDescriptor::new(legal_width, legal_height, scale)
            .with_format(config.format)
            .as_render_target()
            .with_label("render_texture");
        desc.repeat = config.repeat;

        let active = painter.create_texture(&desc)?;
        let (buffer, helper) = if config.persistent {
            let buffer = match painter.create_texture(&desc) {
                Ok(texture) => texture,
                Err(e) => {
                    painter.dispose_texture(&active);
                    return Err(e);
                }
            };
            let mut helper = Image::new(buffer.clone());
            helper.smoothing = Smoothing::None;
            helper.blend_mode = BlendMode::Normal;
            (Some(buffer), Some(helper))
        } else {
            (None, None)
        };

        debug!(
            "Created {}render texture {width}×{height} ({legal_width}×{legal_height} @{scale}x)",
            if config.persistent { "persistent " } else { "" }
        );

        Ok(Self {
            image: Image::new(active.clone()),
            active,
            buffer,
            helper,
            width,
            height,
            persistent: config.persistent,
            buffer_ready: false,
            drawing: false,
            disposed: false,
        })
    }

    /// The texture holding the current content. On persistent surfaces this
    /// alternates between two textures, so fetch it after each draw.
    pub fn texture(&self) -> &Texture {
        &self.active
    }

    /// Display object that always shows the current content.
    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn is_buffer_ready(&self) -> bool {
        self.buffer_ready
    }

    /// Render one object in its own swap cycle. With `matrix` the object is
    /// placed by that matrix instead of its own transformation.
    pub fn draw(
        &mut self,
        painter: &mut Painter,
        object: &mut dyn DisplayObject,
        matrix: Option<&Matrix>,
        alpha: f32,
        anti_alias: u32,
    ) -> Result<(), RenderError> {
        self.draw_bundled(painter, anti_alias, |session| session.draw(object, matrix, alpha))
    }

    /// Run `block` inside one swap cycle; every [`DrawSession::draw`] in it
    /// lands on the same texture. The pipeline is finalized on every exit,
    /// including errors and panics inside `block`.
    ///
    /// Fails with [`RenderError::MissingContext`] without a context; does
    /// nothing while the context is lost.
    pub fn draw_bundled<F>(&mut self, painter: &mut Painter, anti_alias: u32, block: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut DrawSession<'_>) -> Result<(), RenderError>,
    {
        if !painter.is_available() {
            return Err(RenderError::MissingContext);
        }
        if !painter.is_context_valid() {
            trace!("Render texture draw skipped: context lost");
            return Ok(());
        }
        if self.disposed {
            return Err(RenderError::UnknownTexture(self.active.id));
        }

        if let Some(buffer) = self.buffer.as_mut() {
            std::mem::swap(&mut self.active, buffer);
            if let Some(helper) = self.helper.as_mut() {
                helper.set_texture(buffer.clone());
            }
            self.image.set_texture(self.active.clone());
            trace!("Swapped render texture buffers, active is now {}", self.active.id);
        }

        painter.push_state();
        let mut session = DrawSession {
            painter,
            drawing: &mut self.drawing,
            clip_pushed: false,
            finished: false,
        };
        session.begin(&self.active, self.width, self.height, anti_alias)?;

        match self.helper.as_mut() {
            Some(helper) if self.persistent && self.buffer_ready => {
                session.painter.load_identity();
                helper.render(session.painter, 1.0)?;
            }
            _ => self.buffer_ready = true,
        }

        *session.drawing = true;
        let result = block(&mut session);
        let finalized = session.finish();
        result.and(finalized)
    }

    /// Fill the current content with `rgb` at `alpha`. The buffer texture
    /// is left alone.
    pub fn clear(&mut self, painter: &mut Painter, rgb: u32, alpha: f32) -> Result<(), RenderError> {
        if !painter.is_available() {
            return Err(RenderError::MissingContext);
        }
        if !painter.is_context_valid() {
            return Ok(());
        }
        clear_texture(painter, &self.active, rgb, alpha)
    }

    /// Context-restore hook: both textures lost their pixels, start over
    /// from transparent.
    pub fn restore(&mut self, painter: &mut Painter) -> Result<(), RenderError> {
        if !painter.is_available() {
            return Err(RenderError::MissingContext);
        }
        if !painter.is_context_valid() {
            return Ok(());
        }
        clear_texture(painter, &self.active, 0, 0.0)?;
        if let Some(buffer) = &self.buffer {
            clear_texture(painter, buffer, 0, 0.0)?;
        }
        debug!("Restored render texture {}", self.active.id);
        Ok(())
    }

    /// Release both textures. Safe to call twice.
    pub fn dispose(&mut self, painter: &mut Painter) {
        if self.disposed {
            return;
        }
        painter.dispose_texture(&self.active);
        if let Some(buffer) = self.buffer.take() {
            painter.dispose_texture(&buffer);
        }
        self.helper = None;
        self.disposed = true;
    }
}

/// Scoped access to the painter while a [`RenderTexture`] is bound.
pub struct DrawSession<'a> {
    painter: &'a mut Painter,
    drawing: &'a mut bool,
    clip_pushed: bool,
    finished: bool,
}

impl DrawSession<'_> {
    fn begin(&mut self, active: &Texture, width: f32, height: f32, anti_alias: u32) -> Result<(), RenderError> {
        self.painter.set_projection(active.width, active.height)?;
        self.painter.push_clip_rect(Rect::new(0.0, 0.0, width, height))?;
        self.clip_pushed = true;
        self.painter.set_render_target(Some(active), anti_alias)?;
        self.painter.clear(0, 0.0)
    }

    /// Render `object` onto the bound texture. Its blend mode applies
    /// unless it is `Auto`.
    pub fn draw(&mut self, object: &mut dyn DisplayObject, matrix: Option<&Matrix>, alpha: f32) -> Result<(), RenderError> {
        let painter = &mut *self.painter;
        painter.push_state();
        painter.load_identity();
        painter.set_blend_mode(object.blend_mode());
        match matrix {
            Some(m) => painter.prepend_matrix(m),
            None => painter.transform_matrix(&*object),
        }
        let result = object.render(painter, alpha);
        result.and(painter.pop_state())
    }

    pub fn painter(&mut self) -> &mut Painter {
        self.painter
    }

    fn finish(mut self) -> Result<(), RenderError> {
        self.finished = true;
        self.finalize()
    }

    /// Every step runs even if an earlier one fails; the first error wins.
    fn finalize(&mut self) -> Result<(), RenderError> {
        *self.drawing = false;
        let mut result = self.painter.finish_quad_batch();
        self.painter.next_frame();
        result = result.and(self.painter.set_render_target(None, 0));
        if self.clip_pushed {
            result = result.and(self.painter.pop_clip_rect());
        }
        result = result.and(self.painter.pop_state());
        trace!("Render texture bundle finalized");
        result
    }
}

impl Drop for DrawSession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finalize() {
                warn!("Finalizing an aborted render texture bundle failed: {e}");
            }
        }
    }
}

fn clear_texture(painter: &mut Painter, texture: &Texture, rgb: u32, alpha: f32) -> Result<(), RenderError> {
    painter.push_state();
    let result = painter
        .set_render_target(Some(texture), 0)
        .and_then(|()| painter.clear(rgb, alpha));
    result.and(painter.pop_state())
}

/// Texture size in points the backend accepts.
fn legal_size(width: f32, height: f32, scale: f32, non_power_of_two: bool) -> (f32, f32) {
    if non_power_of_two {
        return (width, height);
    }
    let (native_width, native_height) = TextureDescriptor::new(width, height, scale).native_size();
    (
        native_width.next_power_of_two() as f32 / scale,
        native_height.next_power_of_two() as f32 / scale,
    )
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_size_keeps_npot() {
        assert_eq!(legal_size(100.0, 50.0, 1.0, true), (100.0, 50.0));
    }

    #[test]
    fn test_legal_size_rounds_up_to_power_of_two() {
        assert_eq!(legal_size(100.0, 50.0, 1.0, false), (128.0, 64.0));
        assert_eq!(legal_size(64.0, 64.0, 1.0, false), (64.0, 64.0));
        // 150 device pixels → 256.
        assert_eq!(legal_size(75.0, 10.0, 2.0, false), (128.0, 16.0));
    }

    #[test]
    fn test_legal_size_round_trips_through_native_size() {
        let (w, h) = legal_size(100.0, 7.0, 3.0, false);
        assert_eq!(TextureDescriptor::new(w, h, 3.0).native_size(), (512, 32));
    }
}
