use std::time::Duration;

use gpui::{
    AppContext, Application, AsyncWindowContext, Bounds, Timer, WindowBounds, WindowOptions, px,
    size,
};

use gpui_livecanvas::{
    Background, Color, Compositor, CompositorConfig, GpuiCanvasView, Layer, LineStyle,
    MarkerShape, MarkerStyle, Point, PointSeries, Range, Sample, ScreenRect, Shape, Trace,
    TraceStyle, View, Viewport,
};

fn main() {
    Application::new().run(|cx| {
        let options = WindowOptions {
            window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                None,
                size(px(900.0), px(600.0)),
                cx,
            ))),
            ..Default::default()
        };

        cx.open_window(options, |window, cx| {
            let config = CompositorConfig {
                background: Background::Color(Color::new(0.08, 0.08, 0.1, 1.0)),
                alpha: 0.25,
                size: (900, 600),
                ..CompositorConfig::default()
            };
            let compositor = Compositor::with_config(Layer::new(900, 600), config)
                .expect("valid compositor config");

            let series = PointSeries::shared(4096);
            let style = TraceStyle {
                line: LineStyle {
                    color: Color::new(0.2, 0.8, 0.9, 1.0),
                    width: 2.0,
                },
                ..TraceStyle::default()
            };
            let viewport = Viewport::new(Range::new(0.0, 4096.0), Range::new(-1.2, 1.2));
            let mut view = View::new("sensor", viewport, ScreenRect::from_size(900.0, 600.0));
            view.scene_mut().add(Box::new(Trace::with_style(&series, style)));
            let probe = view.scene_mut().add(Box::new(Shape::marker(
                Point::new(0.0, 0.0),
                MarkerStyle {
                    color: Color::new(0.95, 0.55, 0.2, 1.0),
                    size: 10.0,
                    shape: MarkerShape::Circle,
                },
                20.0,
            )));

            let canvas_view = GpuiCanvasView::new(compositor);
            let shared = canvas_view.compositor();
            let view_id = shared.borrow_mut().add_view(view);
            let view_handle = cx.new(|_| canvas_view);

            let view_for_task = view_handle.clone();
            window
                .spawn(cx, move |cx: &mut AsyncWindowContext| {
                    let mut cx = cx.clone();
                    async move {
                        let mut tick = 0_u64;
                        loop {
                            Timer::after(Duration::from_millis(16)).await;
                            tick += 1;
                            let phase = tick as f64 * 0.05;
                            {
                                let mut series = series.borrow_mut();
                                // Sweep display: start over at the left edge.
                                if !series.is_empty() && series.end_index() % 4096 == 0 {
                                    series.reset();
                                }
                                let x = series.end_index() as f64 % 4096.0;
                                // A new run every 256 samples shows the gap rendering.
                                let run = series.end_index() / 256;
                                series.append(Sample::with_sequence(
                                    Point::new(x, phase.sin()),
                                    run,
                                    0,
                                ));
                            }
                            if let Some(view) = shared.borrow_mut().view_mut(view_id) {
                                let position = Point::new(
                                    2048.0 + 1500.0 * phase.cos(),
                                    0.8 * (phase * 1.7).sin(),
                                );
                                view.scene_mut().update(probe, |shape| {
                                    let _ = shape.set_position(position);
                                });
                            }
                            cx.update(|_, cx| {
                                view_for_task.update(cx, |_, view_cx| view_cx.notify());
                            })
                            .ok();
                        }
                    }
                })
                .detach();

            view_handle
        })
        .unwrap();
    });
}
