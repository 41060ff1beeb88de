//! Route geometry reconstruction.
//!
//! A routing result names roads (driving) or lane traversals (walking). The
//! travelled polyline is rebuilt from their geometry, trimmed at the ends of
//! the route to the requested start and end positions.

use std::borrow::Cow;

use geo::{Coord, LineString};
use geojson::{Feature, JsonObject, Value};

use super::export::feature;
use super::MapEngine;
use crate::error::{MapError, Result};
use crate::geometry::linear;
use crate::models::{
    DrivingJourney, EntityKind, Journey, JourneyType, Lane, MovingDirection, Position, Road,
    RouteRequest, RouteResponse, RouteType, WalkingJourney, WalkingRouteSegment,
};

/// Part of a line travelled by a route.
struct Piece<'a> {
    line: Cow<'a, LineString<f64>>,
    /// Distances along `line`; `None` for the whole line
    range: Option<(f64, f64)>,
}

impl<'a> Piece<'a> {
    fn whole(line: Cow<'a, LineString<f64>>) -> Self {
        Self { line, range: None }
    }

    fn between(line: Cow<'a, LineString<f64>>, start: f64, end: f64) -> Self {
        Self {
            line,
            range: Some((start, end)),
        }
    }

    fn from_s(line: Cow<'a, LineString<f64>>, start: f64) -> Self {
        let end = linear::line_length(&line);
        Self::between(line, start, end)
    }

    fn to_s(line: Cow<'a, LineString<f64>>, end: f64) -> Self {
        Self::between(line, 0.0, end)
    }

    fn append_to(&self, coords: &mut Vec<Coord<f64>>) {
        match self.range {
            Some((start, end)) => coords.extend(linear::substring(&self.line, start, end)),
            None => coords.extend(self.line.0.iter().copied()),
        }
    }
}

/// A walking segment's lane, oriented in the direction of travel.
struct OrientedLane<'a> {
    lane_id: i64,
    line: Cow<'a, LineString<f64>>,
    backward: bool,
}

fn expected_journey_type(route_type: RouteType) -> Result<JourneyType> {
    match route_type {
        RouteType::Driving => Ok(JourneyType::Driving),
        RouteType::Walking => Ok(JourneyType::Walking),
        other => Err(MapError::unsupported("route type", other)),
    }
}

fn check_journey_type(index: usize, journey: &Journey, expected: JourneyType) -> Result<()> {
    if journey.journey_type != expected {
        return Err(MapError::DataConsistency(format!(
            "journey {} is {} in a {} route",
            index, journey.journey_type, expected
        )));
    }
    Ok(())
}

impl MapEngine {
    fn lane_or_err(&self, id: i64) -> Result<&Lane> {
        self.data
            .lanes
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Lane, id))
    }

    fn road_or_err(&self, id: i64) -> Result<&Road> {
        self.data
            .roads
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Road, id))
    }

    fn road_line(&self, id: i64) -> Result<&LineString<f64>> {
        Ok(&self.road_or_err(id)?.geometry()?.shape_xy)
    }

    fn aoi_centroid(&self, id: i64) -> Result<Coord<f64>> {
        let aoi = self
            .data
            .aois
            .get(&id)
            .ok_or(MapError::unknown(EntityKind::Aoi, id))?;
        aoi.shape_xy
            .centroid()
            .map(|p| p.0)
            .ok_or_else(|| MapError::DataConsistency(format!("aoi {} has a degenerate shape", id)))
    }

    /// The unique access point of an AOI satisfying `on_lane`.
    fn aoi_access_point(
        &self,
        aoi_id: i64,
        on_lane: impl Fn(i64) -> bool,
        what: &str,
    ) -> Result<(i64, f64)> {
        let aoi = self
            .data
            .aois
            .get(&aoi_id)
            .ok_or(MapError::unknown(EntityKind::Aoi, aoi_id))?;
        let mut matches = aoi.access_points().filter(|p| on_lane(p.lane_id));
        match (matches.next(), matches.next()) {
            (Some(p), None) => Ok((p.lane_id, p.s)),
            (None, _) => Err(MapError::DataConsistency(format!(
                "aoi {} has no access point on {}",
                aoi_id, what
            ))),
            (Some(_), Some(_)) => Err(MapError::DataConsistency(format!(
                "aoi {} has more than one access point on {}",
                aoi_id, what
            ))),
        }
    }

    /// The driving lane of `road_id` a position lies on, with its `s`.
    fn resolve_on_road(&self, road_id: i64, position: &Position) -> Result<(&Lane, f64)> {
        let road = self.road_or_err(road_id)?;
        let on_road = |lane_id: i64| road.driving_lane_ids.contains(&lane_id);
        let (lane_id, s) = match position {
            Position::AoiPosition(p) => {
                self.aoi_access_point(p.aoi_id, on_road, &format!("road {}", road_id))?
            }
            Position::LanePosition(p) if on_road(p.lane_id) => (p.lane_id, p.s),
            Position::LanePosition(p) => {
                return Err(MapError::DataConsistency(format!(
                    "lane {} is not a driving lane of road {}",
                    p.lane_id, road_id
                )))
            }
        };
        Ok((self.lane_or_err(lane_id)?, s))
    }

    /// `s` of a position on a walking segment, measured in the direction of travel.
    fn resolve_on_segment(&self, segment: &OrientedLane<'_>, position: &Position) -> Result<f64> {
        let lane_id = segment.lane_id;
        let s = match position {
            Position::AoiPosition(p) => {
                self.aoi_access_point(p.aoi_id, |id| id == lane_id, &format!("lane {}", lane_id))?
                    .1
            }
            Position::LanePosition(p) if p.lane_id == lane_id => p.s,
            Position::LanePosition(p) => {
                return Err(MapError::DataConsistency(format!(
                    "position on lane {} does not match walking segment on lane {}",
                    p.lane_id, lane_id
                )))
            }
        };
        if segment.backward {
            Ok(linear::line_length(&segment.line) - s)
        } else {
            Ok(s)
        }
    }

    fn oriented_lane(&self, segment: &WalkingRouteSegment) -> Result<OrientedLane<'_>> {
        let lane = self.lane_or_err(segment.lane_id)?;
        let backward = segment.moving_direction == MovingDirection::Backward;
        let line = if backward {
            let mut coords = lane.shape_xy.0.clone();
            coords.reverse();
            Cow::Owned(LineString::new(coords))
        } else {
            Cow::Borrowed(&lane.shape_xy)
        };
        Ok(OrientedLane {
            lane_id: lane.id,
            line,
            backward,
        })
    }

    fn driving_pieces(
        &self,
        journey: &DrivingJourney,
        start: Option<&Position>,
        end: Option<&Position>,
    ) -> Result<Vec<Piece<'_>>> {
        let road_ids = &journey.road_ids;
        let (Some(&first_id), Some(&last_id)) = (road_ids.first(), road_ids.last()) else {
            return Err(MapError::DataConsistency(
                "driving journey has no roads".to_string(),
            ));
        };
        let start = start.map(|p| self.resolve_on_road(first_id, p)).transpose()?;
        let end = end.map(|p| self.resolve_on_road(last_id, p)).transpose()?;

        if road_ids.len() == 1 {
            return Ok(match (start, end) {
                (Some((a, s)), Some((b, e))) if a.id == b.id => {
                    vec![Piece::between(Cow::Borrowed(&a.shape_xy), s, e)]
                }
                (Some((a, s)), Some((b, e))) => {
                    vec![
                        Piece::from_s(Cow::Borrowed(&a.shape_xy), s),
                        Piece::to_s(Cow::Borrowed(&b.shape_xy), e),
                    ]
                }
                (Some((a, s)), None) => vec![Piece::from_s(Cow::Borrowed(&a.shape_xy), s)],
                (None, Some((b, e))) => vec![Piece::to_s(Cow::Borrowed(&b.shape_xy), e)],
                (None, None) => vec![Piece::whole(Cow::Borrowed(self.road_line(first_id)?))],
            });
        }

        let mut pieces = Vec::with_capacity(road_ids.len());
        pieces.push(match start {
            Some((lane, s)) => Piece::from_s(Cow::Borrowed(&lane.shape_xy), s),
            None => Piece::whole(Cow::Borrowed(self.road_line(first_id)?)),
        });
        for &road_id in &road_ids[1..road_ids.len() - 1] {
            pieces.push(Piece::whole(Cow::Borrowed(self.road_line(road_id)?)));
        }
        pieces.push(match end {
            Some((lane, e)) => Piece::to_s(Cow::Borrowed(&lane.shape_xy), e),
            None => Piece::whole(Cow::Borrowed(self.road_line(last_id)?)),
        });
        Ok(pieces)
    }

    fn walking_pieces(
        &self,
        journey: &WalkingJourney,
        start: Option<&Position>,
        end: Option<&Position>,
    ) -> Result<Vec<Piece<'_>>> {
        let mut segments = journey
            .route
            .iter()
            .map(|segment| self.oriented_lane(segment))
            .collect::<Result<Vec<_>>>()?;
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            return Err(MapError::DataConsistency(
                "walking journey has no segments".to_string(),
            ));
        };
        let start = start.map(|p| self.resolve_on_segment(first, p)).transpose()?;
        let end = end.map(|p| self.resolve_on_segment(last, p)).transpose()?;

        if segments.len() == 1 {
            let only = segments.remove(0).line;
            return Ok(vec![match (start, end) {
                (None, None) => Piece::whole(only),
                (start, Some(e)) => Piece::between(only, start.unwrap_or(0.0), e),
                (Some(s), None) => Piece::from_s(only, s),
            }]);
        }

        let count = segments.len();
        let mut pieces = Vec::with_capacity(count);
        for (i, segment) in segments.into_iter().enumerate() {
            let trim_start = if i == 0 { start } else { None };
            let trim_end = if i + 1 == count { end } else { None };
            pieces.push(match (trim_start, trim_end) {
                (Some(s), _) => Piece::from_s(segment.line, s),
                (None, Some(e)) => Piece::to_s(segment.line, e),
                (None, None) => Piece::whole(segment.line),
            });
        }
        Ok(pieces)
    }

    /// Planar coordinates of the travelled route.
    ///
    /// Only the first journey is trimmed at the request's start and only the
    /// last at its end. An AOI start (end) adds the AOI centroid before
    /// (after) the network geometry.
    pub fn route_to_xy(&self, req: &RouteRequest, res: &RouteResponse) -> Result<Vec<Coord<f64>>> {
        let expected = expected_journey_type(req.route_type)?;
        if res.journeys.is_empty() {
            return Err(MapError::DataConsistency(
                "route has no journeys".to_string(),
            ));
        }

        let mut coords = Vec::new();
        if let Some(aoi_id) = req.start.aoi_id() {
            coords.push(self.aoi_centroid(aoi_id)?);
        }

        let last = res.journeys.len() - 1;
        for (i, journey) in res.journeys.iter().enumerate() {
            check_journey_type(i, journey, expected)?;
            let start = (i == 0).then_some(&req.start);
            let end = (i == last).then_some(&req.end);
            let pieces = match expected {
                JourneyType::Driving => {
                    let driving = journey.driving.as_ref().ok_or_else(|| {
                        MapError::DataConsistency(format!("journey {} has no driving leg", i))
                    })?;
                    self.driving_pieces(driving, start, end)?
                }
                _ => {
                    let walking = journey.walking.as_ref().ok_or_else(|| {
                        MapError::DataConsistency(format!("journey {} has no walking leg", i))
                    })?;
                    self.walking_pieces(walking, start, end)?
                }
            };
            for piece in &pieces {
                piece.append_to(&mut coords);
            }
        }

        if let Some(aoi_id) = req.end.aoi_id() {
            coords.push(self.aoi_centroid(aoi_id)?);
        }
        Ok(coords)
    }

    /// The route as a LineString feature in geographic coordinates.
    pub fn export_route_as_geojson(
        &self,
        req: &RouteRequest,
        res: &RouteResponse,
        properties: JsonObject,
    ) -> Result<Feature> {
        let xy = self.route_to_xy(req, res)?;
        let lnglat = self.data.projector.unproject_many(&xy);
        Ok(feature(
            None,
            Value::from(&LineString::new(lnglat)),
            properties,
        ))
    }

    /// Seconds, as the sum of the routing service's per-journey estimates.
    pub fn estimate_route_time(&self, req: &RouteRequest, res: &RouteResponse) -> Result<f64> {
        let eta = match expected_journey_type(req.route_type)? {
            JourneyType::Driving => res
                .journeys
                .iter()
                .map(|j| j.driving.as_ref().map_or(0.0, |d| d.eta))
                .sum(),
            _ => res
                .journeys
                .iter()
                .map(|j| j.walking.as_ref().map_or(0.0, |w| w.eta))
                .sum(),
        };
        Ok(eta)
    }
}
