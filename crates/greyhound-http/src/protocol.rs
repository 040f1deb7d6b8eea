//! Greyhound endpoints and query parameters

use greyhound_loader::cloud::DimensionDescriptor;
use greyhound_loader::core::types::Result;
use greyhound_loader::streaming::{FetchQuery, WriteRequest};
use greyhound_loader::wire::schema_json;

fn endpoint(resource: &str, name: &str) -> String {
    format!("{}/{}", resource.trim_end_matches('/'), name)
}

/// `GET {resource}/info`
pub fn info_url(resource: &str) -> String {
    endpoint(resource, "info")
}

/// `GET {resource}/read`
pub fn read_url(resource: &str) -> String {
    endpoint(resource, "read")
}

/// `PUT {resource}/write`
pub fn write_url(resource: &str) -> String {
    endpoint(resource, "write")
}

/// Query string of a read request. Responses are always requested uncompressed.
pub fn read_params(query: &FetchQuery, schema: &[DimensionDescriptor]) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("bounds", query.bounds.to_query()),
        ("depthBegin", query.depth_begin.to_string()),
        ("depthEnd", query.depth_end.to_string()),
        ("schema", schema_json(schema)?),
        ("compress", "false".to_string()),
    ])
}

/// Query string of a write request.
pub fn write_params(request: &WriteRequest) -> Result<Vec<(&'static str, String)>> {
    Ok(vec![
        ("name", request.name.clone()),
        ("bounds", request.bounds.to_query()),
        ("schema", schema_json(&request.schema)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use greyhound_loader::math::Bounds;

    #[test]
    fn test_endpoints() {
        assert_eq!(info_url("http://h:8080/resource/autzen"), "http://h:8080/resource/autzen/info");
        assert_eq!(read_url("http://h:8080/resource/autzen/"), "http://h:8080/resource/autzen/read");
        assert_eq!(write_url("http://h/resource/a"), "http://h/resource/a/write");
    }

    #[test]
    fn test_read_params() {
        let bounds = Bounds::new_2d(0.0, 0.0, 10.5, 10.0).unwrap();
        let query = FetchQuery::at_depth("http://h/resource/a", vec!["X".into()], bounds, 8).unwrap();
        let schema = vec![DimensionDescriptor::floating("X", 8)];

        let params = read_params(&query, &schema).unwrap();
        assert_eq!(params[0], ("bounds", "[0,0,10.5,10]".to_string()));
        assert_eq!(params[1], ("depthBegin", "8".to_string()));
        assert_eq!(params[2], ("depthEnd", "9".to_string()));
        assert_eq!(params[3], ("schema", r#"[{"name":"X","type":"floating","size":8}]"#.to_string()));
        assert_eq!(params[4], ("compress", "false".to_string()));
    }

    #[test]
    fn test_write_params() {
        let request = WriteRequest {
            url: "http://h/resource/a".to_string(),
            name: "edits".to_string(),
            bounds: Bounds::new_2d(1.0, 2.0, 3.0, 4.0).unwrap(),
            schema: vec![DimensionDescriptor::unsigned("Classification", 1)],
            body: vec![2, 2],
            num_points: 2,
        };
        let params = write_params(&request).unwrap();
        assert_eq!(params[0], ("name", "edits".to_string()));
        assert_eq!(params[1], ("bounds", "[1,2,3,4]".to_string()));
        assert!(params[2].1.contains("Classification"));
    }
}
