#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use image::{Rgb, RgbImage};
use ndarray::{Array4, ArrayD, Axis, IxDyn};
use stylize::{ImageBuffer, StyleModel};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn solid(width: u32, height: u32, color: [u8; 3]) -> ImageBuffer {
    ImageBuffer::from_rgb8(&RgbImage::from_pixel(width, height, Rgb(color))).unwrap()
}

/// Shared view into what a [`StubModel`] saw, kept by the test after the model
/// moved into the gate.
#[derive(Clone, Default)]
pub struct Recorder {
    in_flight: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
    panic_next: Arc<AtomicBool>,
    style_shapes: Arc<Mutex<Vec<Vec<usize>>>>,
    content_shapes: Arc<Mutex<Vec<Vec<usize>>>>,
}

impl Recorder {
    /// Number of model calls so far (style predictions and transforms).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls that started while another call was still running.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn style_shapes(&self) -> Vec<Vec<usize>> {
        self.style_shapes.lock().unwrap().clone()
    }

    pub fn content_shapes(&self) -> Vec<Vec<usize>> {
        self.content_shapes.lock().unwrap().clone()
    }

    fn enter(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    fn check_faults(&self) -> Result<(), StubError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            self.exit();
            panic!("stub engine panicked");
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StubError("out of memory".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("stub engine failure: {0}")]
pub struct StubError(String);

/// A deterministic stand-in for a style network.
///
/// The bottleneck is the mean color of the style image, and the output is the
/// content averaged with that color. Every call sleeps for `delay` so that
/// overlapping calls would be caught by the recorder.
pub struct StubModel {
    recorder: Recorder,
    delay: Duration,
    unbatched: bool,
}

impl StubModel {
    pub fn new(recorder: &Recorder) -> Self {
        Self {
            recorder: recorder.clone(),
            delay: Duration::ZERO,
            unbatched: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Return `[H, W, 3]` outputs instead of `[1, H, W, 3]`.
    pub fn unbatched(mut self) -> Self {
        self.unbatched = true;
        self
    }

    fn run<T>(&self, f: impl FnOnce() -> T) -> Result<T, StubError> {
        self.recorder.enter();
        thread::sleep(self.delay);
        let result = self.recorder.check_faults().map(|_| f());
        self.recorder.exit();
        result
    }
}

impl StyleModel for StubModel {
    type Error = StubError;

    fn predict_style(&mut self, style: Array4<f32>) -> Result<ArrayD<f32>, Self::Error> {
        self.recorder
            .style_shapes
            .lock()
            .unwrap()
            .push(style.shape().to_vec());
        self.run(|| {
            let pixels = (style.len() / 3) as f32;
            let mut sums = [0.0f32; 3];
            for (i, v) in style.iter().enumerate() {
                sums[i % 3] += v;
            }
            let means = sums.iter().map(|s| s / pixels).collect();
            ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 3]), means).unwrap()
        })
    }

    fn transform(
        &mut self,
        content: Array4<f32>,
        bottleneck: ArrayD<f32>,
    ) -> Result<ArrayD<f32>, Self::Error> {
        self.recorder
            .content_shapes
            .lock()
            .unwrap()
            .push(content.shape().to_vec());
        let unbatched = self.unbatched;
        self.run(move || {
            let color: Vec<f32> = bottleneck.iter().copied().collect();
            let mut output = content.into_dyn();
            for (i, v) in output.iter_mut().enumerate() {
                *v = 0.5 * *v + 0.5 * color[i % 3];
            }
            if unbatched {
                output.index_axis_move(Axis(0), 0)
            } else {
                output
            }
        })
    }
}
