//! Paginated SensorThings feed ingestion.
//!
//! Builds the datastream query, fetches one page at a time and turns each
//! datastream into a [`StationRecord`](aqmon_common::StationRecord).

pub mod types;
pub mod parser;
pub mod fetcher;

pub use fetcher::{HttpPageFetcher, Page, PageFetcher};
pub use parser::parse_page;

/// Build the first-page URL for a full sync.
///
/// The query expands each datastream's Thing (name, properties), its first
/// location and its most recent observation.
pub fn build_initial_url(base_url: &str, parameter: &str, page_size: u32) -> String {
    let filter = urlencoding::encode(&format!("name eq '{}'", parameter)).into_owned();
    format!(
        "{}/Datastreams?$top={}\
         &$expand=Thing($select=name,properties),\
         Thing/Locations($select=location/coordinates),\
         Observations($orderby=phenomenonTime%20desc;$top=1;$select=result,phenomenonTime)\
         &$filter={}",
        base_url.trim_end_matches('/'),
        page_size,
        filter
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_initial_url() {
        let url = build_initial_url("https://example.org/v1.0/", "PM2.5", 2000);
        assert_eq!(
            url,
            "https://example.org/v1.0/Datastreams?$top=2000\
             &$expand=Thing($select=name,properties),Thing/Locations($select=location/coordinates),\
             Observations($orderby=phenomenonTime%20desc;$top=1;$select=result,phenomenonTime)\
             &$filter=name%20eq%20%27PM2.5%27"
        );
    }
}
