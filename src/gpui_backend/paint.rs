use gpui::{
    App, BorderStyle, Bounds, ContentMask, Corners, Edges, PathBuilder, Pixels, TextRun, Window,
    font, point, px, quad,
};

use crate::geom::{ScreenPoint, ScreenRect};
use crate::render::{Color, LineStyle, MarkerShape, MarkerStyle, RectStyle, RenderCommand, TextStyle};
use crate::surface::{Layer, LayerEntry};

/// Paint every retained entry of `layer`, offset by `origin`.
pub(crate) fn paint_layer(layer: &Layer, origin: ScreenPoint, window: &mut Window, cx: &mut App) {
    let mut clip_stack: Vec<ContentMask<Pixels>> = Vec::new();
    let entries = layer.entries();
    let mut index = 0;
    while index < entries.len() {
        let entry = &entries[index];
        match &entry.command {
            RenderCommand::ClipRect(rect) => {
                clip_stack.push(ContentMask {
                    bounds: to_bounds(*rect, origin),
                });
            }
            RenderCommand::ClipEnd => {
                clip_stack.pop();
            }
            RenderCommand::Line { style, .. } => {
                // Consecutive segments sharing style and opacity form one path.
                let run = line_run(&entries[index..], *style, entry.opacity);
                with_clip(window, &clip_stack, |window| {
                    paint_lines(window, &entries[index..index + run], origin);
                });
                index += run;
                continue;
            }
            RenderCommand::Marker { point, style } => {
                with_clip(window, &clip_stack, |window| {
                    paint_marker(window, offset(*point, origin), *style, entry.opacity);
                });
            }
            RenderCommand::Rect { rect, style } => {
                with_clip(window, &clip_stack, |window| {
                    paint_rect(window, *rect, origin, *style, entry.opacity);
                });
            }
            RenderCommand::Text {
                position,
                text,
                style,
            } => {
                with_clip(window, &clip_stack, |window| {
                    paint_text(window, cx, offset(*position, origin), text, style, entry.opacity);
                });
            }
            // Layers resolve fills when they are drawn.
            RenderCommand::Fill { .. } => {}
        }
        index += 1;
    }
}

fn line_run(entries: &[LayerEntry], style: LineStyle, opacity: f32) -> usize {
    entries
        .iter()
        .take_while(|entry| {
            entry.opacity == opacity
                && matches!(&entry.command, RenderCommand::Line { style: s, .. } if *s == style)
        })
        .count()
        .max(1)
}

fn paint_lines(window: &mut Window, entries: &[LayerEntry], origin: ScreenPoint) {
    let Some(first) = entries.first() else {
        return;
    };
    let RenderCommand::Line { style, .. } = &first.command else {
        return;
    };
    let width = style.width.max(0.5);
    let mut builder = PathBuilder::stroke(px(width));
    for entry in entries {
        if let RenderCommand::Line { segment, .. } = &entry.command {
            let start = offset(segment.start, origin);
            let end = offset(segment.end, origin);
            builder.move_to(point(px(start.x), px(start.y)));
            builder.line_to(point(px(end.x), px(end.y)));
        }
    }
    if let Ok(path) = builder.build() {
        window.paint_path(path, to_rgba(style.color.faded(first.opacity)));
    }
}

fn paint_marker(window: &mut Window, pt: ScreenPoint, style: MarkerStyle, opacity: f32) {
    let size = style.size.max(2.0);
    let half = size * 0.5;
    let color = to_rgba(style.color.faded(opacity));
    match style.shape {
        MarkerShape::Circle | MarkerShape::Square => {
            let radius = if style.shape == MarkerShape::Circle {
                half
            } else {
                0.0
            };
            let bounds = Bounds::from_corners(
                point(px(pt.x - half), px(pt.y - half)),
                point(px(pt.x + half), px(pt.y + half)),
            );
            window.paint_quad(quad(
                bounds,
                Corners::all(px(radius)),
                color,
                Edges::all(px(0.0)),
                color,
                BorderStyle::default(),
            ));
        }
        MarkerShape::Cross => {
            let mut builder = PathBuilder::stroke(px(1.0));
            builder.move_to(point(px(pt.x - half), px(pt.y)));
            builder.line_to(point(px(pt.x + half), px(pt.y)));
            builder.move_to(point(px(pt.x), px(pt.y - half)));
            builder.line_to(point(px(pt.x), px(pt.y + half)));
            if let Ok(path) = builder.build() {
                window.paint_path(path, color);
            }
        }
    }
}

fn paint_rect(
    window: &mut Window,
    rect: ScreenRect,
    origin: ScreenPoint,
    style: RectStyle,
    opacity: f32,
) {
    window.paint_quad(quad(
        to_bounds(rect, origin),
        Corners::all(px(0.0)),
        to_rgba(style.fill.faded(opacity)),
        Edges::all(px(style.stroke_width)),
        to_rgba(style.stroke.faded(opacity)),
        BorderStyle::default(),
    ));
}

fn paint_text(
    window: &mut Window,
    cx: &mut App,
    position: ScreenPoint,
    text: &str,
    style: &TextStyle,
    opacity: f32,
) {
    if text.is_empty() {
        return;
    }
    let run = TextRun {
        len: text.len(),
        font: font(".SystemUIFont"),
        color: to_hsla(style.color.faded(opacity)),
        background_color: None,
        underline: None,
        strikethrough: None,
    };
    let shaped = window
        .text_system()
        .shape_line(text.to_string().into(), px(style.size), &[run], None);
    let line_height = shaped.ascent + shaped.descent;
    let _ = shaped.paint(point(px(position.x), px(position.y)), line_height, window, cx);
}

fn offset(pt: ScreenPoint, origin: ScreenPoint) -> ScreenPoint {
    ScreenPoint::new(pt.x + origin.x, pt.y + origin.y)
}

fn to_rgba(color: Color) -> gpui::Rgba {
    gpui::Rgba {
        r: color.r,
        g: color.g,
        b: color.b,
        a: color.a,
    }
}

pub(crate) fn to_hsla(color: Color) -> gpui::Hsla {
    gpui::Hsla::from(to_rgba(color))
}

fn to_bounds(rect: ScreenRect, origin: ScreenPoint) -> Bounds<Pixels> {
    let min = offset(rect.min, origin);
    let max = offset(rect.max, origin);
    Bounds::from_corners(point(px(min.x), px(min.y)), point(px(max.x), px(max.y)))
}

fn with_clip(window: &mut Window, stack: &[ContentMask<Pixels>], f: impl FnOnce(&mut Window)) {
    if let Some(mask) = stack.last() {
        window.with_content_mask(Some(mask.clone()), f);
    } else {
        f(window);
    }
}
