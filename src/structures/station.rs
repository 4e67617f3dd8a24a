use async_graphql::SimpleObject;

use crate::structures::LatLng;

#[derive(Debug, SimpleObject, Clone)]
pub struct Station {
    pub name: String,
    pub lat_lng: LatLng,
}
