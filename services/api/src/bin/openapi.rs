//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document for the REST API to `openapi.json`, or to the
//! path given as the first argument.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "openapi.json".to_string());

    let api_doc = ApiDoc::openapi();
    std::fs::write(&path, api_doc.to_pretty_json()?)?;
    println!(
        "OpenAPI specification with {} paths generated at {}",
        api_doc.paths.paths.len(),
        path
    );
    Ok(())
}
