//! Route sequencing
//!
//! Applies the waypoint order chosen by the directions provider to the
//! user's stop list. Origin and destination never move.

use crate::error::RouteError;
use crate::types::{DirectionsResult, Route, SequencedRoute};

/// Reorder the interior stops of `route` as described by
/// `directions.waypoint_order`.
pub fn sequence(route: &Route, directions: &DirectionsResult) -> Result<SequencedRoute, RouteError> {
    let (origin, destination) = match (route.origin(), route.destination()) {
        (Some(origin), Some(destination)) => (origin, destination),
        _ => {
            return Err(RouteError::InsufficientStops {
                found: route.stops.len(),
            })
        }
    };

    let interior = route.interior();
    let order = &directions.waypoint_order;
    if order.len() != interior.len() {
        return Err(RouteError::SequencingInconsistency(format!(
            "expected {} waypoint indices, provider returned {}",
            interior.len(),
            order.len()
        )));
    }

    let mut used = vec![false; interior.len()];
    let mut stops = Vec::with_capacity(route.stops.len());
    stops.push(origin.clone());

    for &index in order {
        match used.get_mut(index) {
            Some(seen) if !*seen => {
                *seen = true;
                stops.push(interior[index].clone());
            }
            Some(_) => {
                return Err(RouteError::SequencingInconsistency(format!(
                    "waypoint index {} appears more than once",
                    index
                )))
            }
            None => {
                return Err(RouteError::SequencingInconsistency(format!(
                    "waypoint index {} is out of range for {} interior stops",
                    index,
                    interior.len()
                )))
            }
        }
    }

    stops.push(destination.clone());

    Ok(SequencedRoute {
        name: route.name.clone(),
        stops,
    })
}
