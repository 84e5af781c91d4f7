//! The text field display object.
//!
//! ## Content regeneration
//!
//! ```text
//!  setter (value changed) ──► Dirty
//!                               │  render / text_bounds / bounds / redraw
//!                               ▼
//!          ┌──── is_rendered_text? ────┐
//!          ▼                           ▼
//!   rasterize into Pixmap       lay out bitmap glyphs
//!   upload → Image (texture)    into QuadBatch (font texture)
//!          └─────────────┬─────────────┘
//!                        ▼
//!                  update border ──► Clean
//! ```
//!
//! A field owns exactly one visual child at a time. Switching between the
//! two paths releases the other path's GPU resources first.

use std::rc::Rc;

use glint_core::{
    BlendMode, DisplayObject, Image, Matrix, Painter, Pixmap, Point, Quad, QuadBatch, Rect, RenderError,
    TextureDescriptor, Transform2D,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::context::{SharedTextContext, TextContext};
use crate::error::TextError;
use crate::filter::{filter_offset, Filter};
use crate::layout::{
    auto_scale, auto_sized_extent, h_offset, resolve_layout_box, v_offset, AutoSize, HAlign, VAlign,
    AUTO_SIZE_PADDING_X, AUTO_SIZE_PADDING_Y, LEADING_INSET,
};
use crate::rasterizer::{FontSpec, RasterRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentState {
    /// Content matches every property.
    Clean,
    /// A property changed since the last regeneration.
    Dirty,
}

/// What a text field currently displays.
#[derive(Debug)]
pub enum VisualChild {
    /// Rasterized text in a texture the field owns.
    Raster(Image),
    /// Bitmap-font glyphs referencing the font's texture.
    Composed(QuadBatch),
}

/// Hairline outline of the hit area, drawn in the text color.
#[derive(Debug)]
pub struct Border {
    batch: QuadBatch,
}

impl Border {
    fn new() -> Self {
        Self { batch: QuadBatch::new() }
    }

    fn update(&mut self, width: f32, height: f32, color: u32) {
        self.batch.reset();
        self.batch.add_quad(Quad::solid(0.0, 0.0, width, 1.0, color));
        self.batch.add_quad(Quad::solid(0.0, height - 1.0, width, 1.0, color));
        self.batch.add_quad(Quad::solid(0.0, 0.0, 1.0, height, color));
        self.batch.add_quad(Quad::solid(width - 1.0, 0.0, 1.0, height, color));
    }

    pub fn quads(&self) -> &[Quad] {
        self.batch.quads()
    }

    fn dispose(&mut self, painter: &mut Painter) {
        self.batch.dispose(painter);
    }
}

/// Everything needed to style a text field in one go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFormat {
    pub font_name: String,
    pub font_size: f32,
    pub color: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub h_align: HAlign,
    pub v_align: VAlign,
    pub kerning: bool,
    pub auto_scale: bool,
    pub auto_size: AutoSize,
    pub batchable: bool,
    pub border: bool,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            font_name: "Verdana".to_string(),
            font_size: 12.0,
            color: 0x000000,
            bold: false,
            italic: false,
            underline: false,
            h_align: HAlign::Center,
            v_align: VAlign::Center,
            kerning: true,
            auto_scale: false,
            auto_size: AutoSize::None,
            batchable: false,
            border: false,
        }
    }
}

/// Assign `value` and mark dirty only if it differs.
fn update<T: PartialEq>(slot: &mut T, value: T, state: &mut ContentState) {
    if *slot != value {
        *slot = value;
        *state = ContentState::Dirty;
    }
}

pub struct TextField {
    context: SharedTextContext,
    text: String,
    font_name: String,
    font_size: f32,
    color: u32,
    h_align: HAlign,
    v_align: VAlign,
    bold: bool,
    italic: bool,
    underline: bool,
    kerning: bool,
    auto_scale: bool,
    auto_size: AutoSize,
    batchable: bool,
    hit_area: Rect,
    state: ContentState,
    is_rendered_text: bool,
    content: Option<VisualChild>,
    text_bounds: Option<Rect>,
    border: Option<Border>,
    filters: Vec<Filter>,
    pub transform: Transform2D,
    pub alpha: f32,
    pub blend_mode: BlendMode,
    pub visible: bool,
    pub touchable: bool,
}

impl TextField {
    /// Field styled with the context's default font and size.
    pub fn new(context: SharedTextContext, width: f32, height: f32, text: impl Into<String>) -> Self {
        let format = {
            let ctx = context.borrow();
            TextFormat {
                font_name: ctx.config.default_font_name.clone(),
                font_size: ctx.config.default_font_size,
                ..TextFormat::default()
            }
        };
        Self::with_format(context, width, height, text, &format)
    }

    pub fn with_format(
        context: SharedTextContext,
        width: f32,
        height: f32,
        text: impl Into<String>,
        format: &TextFormat,
    ) -> Self {
        let is_rendered_text = !context.borrow().fonts.contains(&format.font_name);
        Self {
            context,
            text: text.into(),
            font_name: format.font_name.clone(),
            font_size: format.font_size,
            color: format.color,
            h_align: format.h_align,
            v_align: format.v_align,
            bold: format.bold,
            italic: format.italic,
            underline: format.underline,
            kerning: format.kerning,
            auto_scale: format.auto_scale,
            auto_size: format.auto_size,
            batchable: format.batchable,
            hit_area: Rect::new(0.0, 0.0, width, height),
            state: ContentState::Dirty,
            is_rendered_text,
            content: None,
            text_bounds: None,
            border: format.border.then(Border::new),
            filters: Vec::new(),
            transform: Transform2D::default(),
            alpha: 1.0,
            blend_mode: BlendMode::Auto,
            visible: true,
            touchable: true,
        }
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        update(&mut self.text, text.into(), &mut self.state);
    }

    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    /// Also decides between bitmap-font and rasterized rendering.
    pub fn set_font_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.font_name != name {
            self.is_rendered_text = !self.context.borrow().fonts.contains(&name);
            self.font_name = name;
            self.state = ContentState::Dirty;
        }
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn set_font_size(&mut self, size: f32) {
        update(&mut self.font_size, size, &mut self.state);
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    pub fn set_color(&mut self, color: u32) {
        update(&mut self.color, color, &mut self.state);
    }

    pub fn h_align(&self) -> HAlign {
        self.h_align
    }

    pub fn set_h_align(&mut self, align: HAlign) {
        update(&mut self.h_align, align, &mut self.state);
    }

    pub fn v_align(&self) -> VAlign {
        self.v_align
    }

    pub fn set_v_align(&mut self, align: VAlign) {
        update(&mut self.v_align, align, &mut self.state);
    }

    pub fn bold(&self) -> bool {
        self.bold
    }

    pub fn set_bold(&mut self, bold: bool) {
        update(&mut self.bold, bold, &mut self.state);
    }

    pub fn italic(&self) -> bool {
        self.italic
    }

    pub fn set_italic(&mut self, italic: bool) {
        update(&mut self.italic, italic, &mut self.state);
    }

    pub fn underline(&self) -> bool {
        self.underline
    }

    pub fn set_underline(&mut self, underline: bool) {
        update(&mut self.underline, underline, &mut self.state);
    }

    pub fn kerning(&self) -> bool {
        self.kerning
    }

    pub fn set_kerning(&mut self, kerning: bool) {
        update(&mut self.kerning, kerning, &mut self.state);
    }

    pub fn auto_scale(&self) -> bool {
        self.auto_scale
    }

    pub fn set_auto_scale(&mut self, auto_scale: bool) {
        update(&mut self.auto_scale, auto_scale, &mut self.state);
    }

    pub fn auto_size(&self) -> AutoSize {
        self.auto_size
    }

    pub fn set_auto_size(&mut self, auto_size: AutoSize) {
        update(&mut self.auto_size, auto_size, &mut self.state);
    }

    pub fn batchable(&self) -> bool {
        self.batchable
    }

    /// Takes effect immediately; the content stays clean.
    pub fn set_batchable(&mut self, batchable: bool) {
        self.batchable = batchable;
        if let Some(VisualChild::Composed(batch)) = &mut self.content {
            batch.batchable = batchable;
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Native filters only exist for rasterized text.
    pub fn set_filters(&mut self, filters: Vec<Filter>) -> Result<(), TextError> {
        if !self.is_rendered_text {
            return Err(TextError::UnsupportedOperation("native filters cannot be used on bitmap fonts"));
        }
        update(&mut self.filters, filters, &mut self.state);
        Ok(())
    }

    pub fn border(&self) -> Option<&Border> {
        self.border.as_ref()
    }

    /// Show or hide the hit-area outline.
    pub fn set_border(&mut self, enabled: bool) {
        if enabled && self.border.is_none() {
            let mut border = Border::new();
            border.update(self.hit_area.width, self.hit_area.height, self.color);
            self.border = Some(border);
        } else if !enabled {
            self.border = None;
        }
    }

    /// Width in the parent's space. Resizing changes the layout box, not
    /// the scale.
    pub fn width(&self) -> f32 {
        self.hit_area.width * self.transform.scale_x
    }

    pub fn set_width(&mut self, width: f32) {
        let scale = if self.transform.scale_x != 0.0 { self.transform.scale_x } else { 1.0 };
        update(&mut self.hit_area.width, width / scale, &mut self.state);
    }

    pub fn height(&self) -> f32 {
        self.hit_area.height * self.transform.scale_y
    }

    pub fn set_height(&mut self, height: f32) {
        let scale = if self.transform.scale_y != 0.0 { self.transform.scale_y } else { 1.0 };
        update(&mut self.hit_area.height, height / scale, &mut self.state);
    }

    pub fn hit_area(&self) -> Rect {
        self.hit_area
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == ContentState::Dirty
    }

    pub fn is_rendered_text(&self) -> bool {
        self.is_rendered_text
    }

    pub fn content(&self) -> Option<&VisualChild> {
        self.content.as_ref()
    }

    pub fn context(&self) -> &SharedTextContext {
        &self.context
    }

    // ---------------------------------------------------------------
    // Regeneration
    // ---------------------------------------------------------------

    /// Regenerate the content if any property changed since the last call.
    pub fn redraw(&mut self, painter: &mut Painter) -> Result<(), TextError> {
        if self.state == ContentState::Clean {
            return Ok(());
        }
        if self.is_rendered_text {
            self.create_rendered_contents(painter)?;
        } else {
            self.create_composed_contents(painter)?;
        }
        self.update_border();
        self.state = ContentState::Clean;
        Ok(())
    }

    /// Alias of [`redraw`](Self::redraw).
    pub fn materialize(&mut self, painter: &mut Painter) -> Result<(), TextError> {
        self.redraw(painter)
    }

    fn create_rendered_contents(&mut self, painter: &mut Painter) -> Result<(), TextError> {
        if let Some(VisualChild::Composed(mut batch)) = self.take_content_if(|c| matches!(c, VisualChild::Composed(_))) {
            batch.dispose(painter);
        }

        let scale = painter.content_scale_factor();
        let context = Rc::clone(&self.context);
        let mut ctx = context.borrow_mut();
        let (pixmap, text_bounds) = self.render_text(&mut ctx, scale);

        self.hit_area.width = pixmap.width() as f32 / scale;
        self.hit_area.height = pixmap.height() as f32 / scale;

        let desc = TextureDescriptor::new(self.hit_area.width, self.hit_area.height, scale)
            .with_format(ctx.config.texture_format)
            .with_label("text field");
        let texture = painter.texture_from_pixmap(&pixmap, &desc)?;

        match &mut self.content {
            Some(VisualChild::Raster(image)) => {
                let previous = image.texture().clone();
                image.set_texture(texture);
                painter.dispose_texture(&previous);
            }
            _ => self.content = Some(VisualChild::Raster(Image::new(texture))),
        }
        self.text_bounds = Some(text_bounds);
        Ok(())
    }

    /// Rasterize into a new pixmap and report the text bounds in points.
    fn render_text(&self, ctx: &mut TextContext, scale: f32) -> (Pixmap, Rect) {
        let layout = resolve_layout_box(
            self.hit_area.width * scale,
            self.hit_area.height * scale,
            self.h_align,
            self.v_align,
            self.auto_size,
        );
        let mut request = RasterRequest {
            text: &self.text,
            font: FontSpec {
                name: self.font_name.clone(),
                size: self.font_size * scale,
                color: self.color,
                bold: self.bold,
                italic: self.italic,
                underline: self.underline,
                kerning: self.kerning,
            },
            width: layout.width,
            height: layout.height,
            h_align: layout.h_align,
            filters: &self.filters,
            embed_fonts: true,
        };

        let rasterizer = ctx.rasterizer.as_mut();
        let mut metrics = rasterizer.measure(&request);
        if metrics.is_empty() {
            debug!("No embedded font '{}', falling back to system fonts", self.font_name);
            request.embed_fonts = false;
            metrics = rasterizer.measure(&request);
        }

        if self.auto_scale {
            let start = request.font.size;
            let outcome = auto_scale(layout.width, layout.height, start, metrics, |size| {
                request.font.size = size;
                rasterizer.measure(&request)
            });
            request.font.size = outcome.font_size;
            metrics = outcome.metrics;
            if outcome.steps > 0 {
                trace!("Auto-scaled '{}' from {start} to {} in {} steps", self.text, outcome.font_size, outcome.steps);
            }
        }

        let mut width = layout.width;
        let mut height = layout.height;
        if self.auto_size.horizontal() {
            width = auto_sized_extent(metrics.width, AUTO_SIZE_PADDING_X);
        }
        if self.auto_size.vertical() {
            height = auto_sized_extent(metrics.height, AUTO_SIZE_PADDING_Y);
        }
        width = width.max(1.0);
        height = height.max(1.0);

        let x_offset = h_offset(layout.h_align, width, metrics.width);
        let y_offset = v_offset(layout.v_align, height, metrics.height);
        let filter = filter_offset(&self.filters, layout.h_align, layout.v_align, metrics.width, metrics.height);

        request.width = width;
        request.height = height;
        let mut pixmap = Pixmap::new(width as u32, height as u32);
        let origin = (filter.x, filter.y + y_offset.trunc() - LEADING_INSET);
        rasterizer.rasterize(&request, origin, &mut pixmap);

        let bounds = Rect::new(
            (x_offset + filter.x) / scale,
            (y_offset + filter.y) / scale,
            metrics.width / scale,
            metrics.height / scale,
        );
        (pixmap, bounds)
    }

    fn create_composed_contents(&mut self, painter: &mut Painter) -> Result<(), TextError> {
        let context = Rc::clone(&self.context);
        let ctx = context.borrow();
        let font = ctx
            .fonts
            .lookup(&self.font_name)
            .ok_or_else(|| TextError::FontNotFound(self.font_name.clone()))?;

        if let Some(VisualChild::Raster(image)) = self.take_content_if(|c| matches!(c, VisualChild::Raster(_))) {
            painter.dispose_texture(image.texture());
        }
        if self.content.is_none() {
            self.content = Some(VisualChild::Composed(QuadBatch::new()));
        }
        let Some(VisualChild::Composed(batch)) = &mut self.content else {
            return Ok(());
        };
        batch.reset();
        batch.set_texture(Some(font.texture().clone()));

        let layout = resolve_layout_box(
            self.hit_area.width,
            self.hit_area.height,
            self.h_align,
            self.v_align,
            self.auto_size,
        );
        font.fill_quad_batch(
            batch,
            layout.width,
            layout.height,
            &self.text,
            self.font_size,
            self.color,
            layout.h_align,
            layout.v_align,
            self.auto_scale,
            self.kerning,
        )?;
        batch.batchable = self.batchable;

        if self.auto_size != AutoSize::None {
            let bounds = batch.bounds();
            self.text_bounds = Some(bounds);
            if self.auto_size.horizontal() {
                self.hit_area.width = bounds.x + bounds.width;
            }
            if self.auto_size.vertical() {
                self.hit_area.height = bounds.y + bounds.height;
            }
        } else {
            self.text_bounds = None;
        }
        Ok(())
    }

    fn take_content_if(&mut self, pred: impl FnOnce(&VisualChild) -> bool) -> Option<VisualChild> {
        if self.content.as_ref().is_some_and(pred) {
            self.content.take()
        } else {
            None
        }
    }

    fn update_border(&mut self) {
        if let Some(border) = &mut self.border {
            border.update(self.hit_area.width, self.hit_area.height, self.color);
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Area actually covered by text, in local coordinates.
    pub fn text_bounds(&mut self, painter: &mut Painter) -> Result<Rect, TextError> {
        self.redraw(painter)?;
        if self.text_bounds.is_none() {
            if let Some(VisualChild::Composed(batch)) = &self.content {
                self.text_bounds = Some(batch.bounds());
            }
        }
        Ok(self.text_bounds.unwrap_or_default())
    }

    /// Hit area transformed by `target`, the matrix from local space into
    /// the space the bounds are wanted in.
    pub fn bounds(&mut self, painter: &mut Painter, target: &Matrix) -> Result<Rect, TextError> {
        self.redraw(painter)?;
        Ok(target.transform_rect_bounds(&self.hit_area))
    }

    /// `point` is in local coordinates.
    pub fn hit_test(&self, point: Point, for_touch: bool) -> bool {
        if for_touch && (!self.visible || !self.touchable) {
            return false;
        }
        self.hit_area.contains_point(point)
    }

    // ---------------------------------------------------------------
    // Context loss and disposal
    // ---------------------------------------------------------------

    /// Re-render rasterized text into its existing texture after the render
    /// context was restored.
    pub fn restore(&mut self, painter: &mut Painter) -> Result<(), TextError> {
        let Some(VisualChild::Raster(image)) = &self.content else {
            return Ok(());
        };
        let texture = image.texture().clone();
        let scale = painter.content_scale_factor();
        let context = Rc::clone(&self.context);
        let (pixmap, bounds) = self.render_text(&mut context.borrow_mut(), scale);
        if (pixmap.width(), pixmap.height()) == (texture.native_width(), texture.native_height()) {
            painter.upload_pixels(&texture, &pixmap)?;
            self.text_bounds = Some(bounds);
            Ok(())
        } else {
            self.state = ContentState::Dirty;
            self.redraw(painter)
        }
    }

    /// Release the visual child's GPU resources and the border.
    pub fn dispose(&mut self, painter: &mut Painter) {
        match self.content.take() {
            Some(VisualChild::Raster(image)) => painter.dispose_texture(image.texture()),
            Some(VisualChild::Composed(mut batch)) => batch.dispose(painter),
            None => {}
        }
        if let Some(border) = &mut self.border {
            border.dispose(painter);
        }
        self.text_bounds = None;
        self.state = ContentState::Dirty;
    }
}

impl DisplayObject for TextField {
    fn transform(&self) -> Transform2D {
        self.transform
    }

    fn alpha(&self) -> f32 {
        self.alpha
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    fn visible(&self) -> bool {
        self.visible
    }

    fn render(&mut self, painter: &mut Painter, parent_alpha: f32) -> Result<(), RenderError> {
        if !self.visible {
            return Ok(());
        }
        self.redraw(painter)?;
        let alpha = parent_alpha * self.alpha;
        match &mut self.content {
            Some(VisualChild::Raster(image)) => image.render(painter, alpha)?,
            Some(VisualChild::Composed(batch)) => batch.render(painter, alpha)?,
            None => {}
        }
        if let Some(border) = &self.border {
            border.batch.render(painter, alpha)?;
        }
        Ok(())
    }
}

// ===================================================================
// Tests
// ===================================================================
