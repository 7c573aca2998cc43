//! Shareable Google Maps directions link

use crate::error::RouteError;

const MAPS_DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/?api=1";

/// Driving directions link through `addresses` in the given order.
/// First and last address are origin and destination.
pub fn build_directions_link(addresses: &[String]) -> Result<String, RouteError> {
    let (origin, destination) = match addresses {
        [first, .., last] => (first, last),
        _ => {
            return Err(RouteError::InsufficientStops {
                found: addresses.len(),
            })
        }
    };

    let mut url = format!(
        "{}&origin={}&destination={}",
        MAPS_DIRECTIONS_URL,
        urlencoding::encode(origin),
        urlencoding::encode(destination)
    );

    let waypoints = &addresses[1..addresses.len() - 1];
    if !waypoints.is_empty() {
        let joined: Vec<_> = waypoints.iter().map(|a| urlencoding::encode(a)).collect();
        url.push_str("&waypoints=");
        url.push_str(&joined.join("|"));
    }

    url.push_str("&travelmode=driving");
    Ok(url)
}
