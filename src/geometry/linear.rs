//! Planar distance and linear referencing along polylines.

use geo::{
    Coord, Distance, Euclidean, Length, LineInterpolatePoint, LineLocatePoint, LineString, Point,
    Polygon,
};

use crate::models::AoiShape;

pub fn line_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

/// Shortest planar distance from `p` to the polyline.
pub fn distance_to_line(p: Point<f64>, line: &LineString<f64>) -> f64 {
    match line.0.as_slice() {
        [] => f64::INFINITY,
        [only] => Euclidean.distance(p, Point(*only)),
        _ => Euclidean.distance(&p, line),
    }
}

/// Zero inside the polygon or on its boundary, otherwise the distance to the nearest ring.
pub fn distance_to_polygon(p: Point<f64>, polygon: &Polygon<f64>) -> f64 {
    Euclidean.distance(&p, polygon)
}

pub fn distance_to_aoi(p: Point<f64>, shape: &AoiShape) -> f64 {
    match shape {
        AoiShape::Polygon(polygon) => distance_to_polygon(p, polygon),
        AoiShape::Point(q) => distance_to_point(p, *q),
    }
}

pub fn distance_to_point(p: Point<f64>, q: Point<f64>) -> f64 {
    Euclidean.distance(p, q)
}

/// Distance along the polyline to the point nearest `p`.
pub fn locate_point(line: &LineString<f64>, p: Point<f64>) -> f64 {
    line.line_locate_point(&p)
        .map_or(0.0, |fraction| fraction * line_length(line))
}

/// Point `distance` meters along the polyline, clamped to its ends.
pub fn interpolate(line: &LineString<f64>, distance: f64) -> Option<Coord<f64>> {
    let first = *line.0.first()?;
    let total = line_length(line);
    if distance <= 0.0 || total == 0.0 {
        return Some(first);
    }
    if distance >= total {
        return line.0.last().copied();
    }
    line.line_interpolate_point(distance / total).map(|p| p.0)
}

/// Coordinates of the part of `line` between two distances along it.
///
/// Negative distances count back from the end. Distances are clamped to the
/// line; `start > end` yields the reversed part and `start == end` a single
/// coordinate.
pub fn substring(line: &LineString<f64>, start: f64, end: f64) -> Vec<Coord<f64>> {
    let total = line_length(line);
    let normalize = |d: f64| {
        let d = if d < 0.0 { total + d } else { d };
        d.clamp(0.0, total)
    };
    let (start, end) = (normalize(start), normalize(end));

    if start > end {
        let mut coords = forward_substring(line, end, start);
        coords.reverse();
        return coords;
    }
    forward_substring(line, start, end)
}

fn forward_substring(line: &LineString<f64>, start: f64, end: f64) -> Vec<Coord<f64>> {
    let Some(first) = interpolate(line, start) else {
        return Vec::new();
    };
    if start == end {
        return vec![first];
    }

    let mut coords = vec![first];
    let mut travelled = 0.0;
    for segment in line.lines() {
        travelled += Euclidean.length(&segment);
        if travelled > start && travelled < end {
            coords.push(segment.end);
        }
    }
    if let Some(last) = interpolate(line, end) {
        coords.push(last);
    }
    coords
}
