use crate::{Animation, Curve, Keyframe};

impl Animation {
    /// Samples the curve at `time`, holding the first and last key outside the keyed range.
    pub fn sample(&self, time: f32) -> Option<f32> {
        sample_keys(self.keys(), time)
    }
}

pub(crate) fn sample_keys(keys: &[Keyframe], time: f32) -> Option<f32> {
    let first = keys.first()?;
    let index = keys.partition_point(|k| k.time <= time);
    if index == 0 {
        return Some(first.value);
    }
    if index >= keys.len() {
        return Some(keys[keys.len() - 1].value);
    }
    let prev = &keys[index - 1];
    let next = &keys[index];
    Some(curve_value(
        prev.curve, time, prev.time, prev.value, next.time, next.value,
    ))
}

fn curve_value(curve: Curve, time: f32, time1: f32, value1: f32, time2: f32, value2: f32) -> f32 {
    let denom = time2 - time1;
    if denom.abs() <= 1.0e-12 {
        return value2;
    }

    match curve {
        Curve::Linear => {
            let t = (time - time1) / denom;
            value1 + (value2 - value1) * t
        }
        Curve::Stepped => value1,
        Curve::Bezier { cx1, cy1, cx2, cy2 } => {
            bezier_value(time, time1, value1, cx1, cy1, cx2, cy2, time2, value2)
        }
    }
}

// Forward-differenced cubic, flattened into BEZIER_SIZE / 2 line segments.
#[allow(clippy::too_many_arguments)]
fn bezier_value(
    time: f32,
    time1: f32,
    value1: f32,
    cx1: f32,
    cy1: f32,
    cx2: f32,
    cy2: f32,
    time2: f32,
    value2: f32,
) -> f32 {
    const BEZIER_SIZE: usize = 18;

    let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
    let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
    let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
    let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
    let mut ddx = tmpx * 2.0 + dddx;
    let mut ddy = tmpy * 2.0 + dddy;
    let mut dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.16666667;
    let mut dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.16666667;

    let mut x = time1 + dx;
    let mut y = value1 + dy;

    let mut points = [0.0f32; BEZIER_SIZE];
    for i in (0..BEZIER_SIZE).step_by(2) {
        points[i] = x;
        points[i + 1] = y;
        dx += ddx;
        dy += ddy;
        ddx += dddx;
        ddy += dddy;
        x += dx;
        y += dy;
    }

    if points[0] > time {
        return lerp_segment(time, time1, value1, points[0], points[1]);
    }

    for i in (2..BEZIER_SIZE).step_by(2) {
        if points[i] >= time {
            return lerp_segment(time, points[i - 2], points[i - 1], points[i], points[i + 1]);
        }
    }

    lerp_segment(
        time,
        points[BEZIER_SIZE - 2],
        points[BEZIER_SIZE - 1],
        time2,
        value2,
    )
}

fn lerp_segment(time: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let denom = x2 - x1;
    if denom.abs() <= 1.0e-12 {
        return y1;
    }
    y1 + (time - x1) / denom * (y2 - y1)
}
