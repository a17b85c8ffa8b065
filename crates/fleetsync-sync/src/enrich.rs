//! Nearest-facility enrichment of vehicle positions.

use fleetsync_core::{Facility, GeoPoint, Vehicle};

#[derive(Debug, Clone, PartialEq)]
pub struct NearestFacility {
    pub code: String,
    pub name: String,
    pub distance_km: f64,
}

/// Closest facility to `point` among those with a parseable coordinate.
///
/// Ties keep the earlier facility in `facilities` order.
#[must_use]
pub fn nearest_facility(point: GeoPoint, facilities: &[Facility]) -> Option<NearestFacility> {
    let sited: Vec<(&Facility, GeoPoint)> = facilities
        .iter()
        .filter_map(|f| f.position().map(|p| (f, p)))
        .collect();
    nearest_sited(point, &sited)
}

fn nearest_sited(point: GeoPoint, sited: &[(&Facility, GeoPoint)]) -> Option<NearestFacility> {
    let mut best: Option<(&Facility, f64)> = None;
    for &(facility, position) in sited {
        let distance = point.distance_km(position);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((facility, distance)),
        }
    }
    best.map(|(facility, distance_km)| NearestFacility {
        code: facility.code.clone(),
        name: facility.name.clone(),
        distance_km,
    })
}

/// Sets the nearest-facility fields on every vehicle; vehicles without a
/// position, or a snapshot without sited facilities, end up with none.
/// Returns the number of vehicles enriched.
pub fn enrich_vehicles(vehicles: &mut [Vehicle], facilities: &[Facility]) -> usize {
    let sited: Vec<(&Facility, GeoPoint)> = facilities
        .iter()
        .filter_map(|f| f.position().map(|p| (f, p)))
        .collect();

    let mut enriched = 0;
    for vehicle in vehicles.iter_mut() {
        let nearest = vehicle
            .position()
            .and_then(|point| nearest_sited(point, &sited));
        match nearest {
            Some(n) => {
                vehicle.nearest_facility_code = Some(n.code);
                vehicle.nearest_facility_name = Some(n.name);
                vehicle.distance_to_nearest_facility_km = Some(n.distance_km);
                enriched += 1;
            }
            None => {
                vehicle.nearest_facility_code = None;
                vehicle.nearest_facility_name = None;
                vehicle.distance_to_nearest_facility_km = None;
            }
        }
    }
    enriched
}
