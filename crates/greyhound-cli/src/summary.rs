//! JSON summaries printed by the CLI

use serde_json::{json, Value};

use greyhound_loader::core::types::Result;
use greyhound_loader::session::GreyhoundCloud;
use greyhound_loader::wire::ResourceInfo;

pub fn info_json(url: &str, info: &ResourceInfo) -> Value {
    json!({
        "url": url,
        "numPoints": info.num_points,
        "baseDepth": info.base_depth,
        "bounds": info.bounds.to_vec(),
        "boundsConforming": info.bounds_conforming.to_vec(),
        "srs": info.srs,
        "schema": info.schema,
    })
}

pub fn cloud_json(entry: &GreyhoundCloud) -> Result<Value> {
    let cloud = entry
        .cloud
        .read()
        .map_err(|_| greyhound_loader::core::Error::Worker("point cloud lock poisoned".to_string()))?;

    let shift = cloud.shift();
    let bbox = cloud.bounding_box().map(|(min, max)| {
        json!({ "min": [min.x, min.y, min.z], "max": [max.x, max.y, max.z] })
    });
    let fields: Vec<Value> = cloud
        .scalar_fields()
        .iter()
        .map(|sf| {
            json!({
                "name": sf.name(),
                "min": sf.min(),
                "max": sf.max(),
                "missing": sf.missing_count(),
            })
        })
        .collect();
    let report = entry.last_report.as_ref().map(|r| {
        json!({
            "itemsIssued": r.items_issued,
            "batchesConverted": r.batches_converted,
            "itemsPruned": r.items_pruned,
            "pointsAdded": r.points_added,
            "deepestDepth": r.deepest_depth,
            "cancelled": r.cancelled,
        })
    });

    Ok(json!({
        "name": cloud.name(),
        "url": entry.url,
        "bounds": entry.bounds.to_vec(),
        "points": cloud.len(),
        "shift": [shift.x, shift.y, shift.z],
        "boundingBox": bbox,
        "colors": cloud.has_colors(),
        "scalarFields": fields,
        "displayedField": cloud.displayed_field().map(|sf| sf.name().to_string()),
        "segments": cloud.segments().len(),
        "srs": entry.info.srs,
        "report": report,
        "error": entry.last_error,
    }))
}
