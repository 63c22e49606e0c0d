//! Capability listing served at `/`

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Serialize, Serializer};

use crate::http::AppState;

#[derive(Debug, Serialize)]
struct Capabilities {
    message: &'static str,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Serialize)]
struct Endpoint {
    method: &'static str,
    usage: &'static str,
    description: &'static str,
    /// Parameter name to description, in listing order
    #[serde(
        skip_serializing_if = "<[_]>::is_empty",
        serialize_with = "query_object"
    )]
    query: &'static [(&'static str, &'static str)],
}

fn query_object<S: Serializer>(
    params: &&'static [(&'static str, &'static str)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(params.iter().copied())
}

pub fn create_index_router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

/// List the endpoints this server offers
pub async fn index() -> impl IntoResponse {
    Json(Capabilities {
        message: "NekoProxy is ready🎉",
        endpoints: vec![
            Endpoint {
                method: "GET",
                usage: "/fetch",
                description: "Fetch a video stream from a URL",
                query: &[
                    ("url", "The URL of the video or image."),
                    ("ref", "The referrer URL"),
                ],
            },
            Endpoint {
                method: "GET",
                usage: "/fetch/segment",
                description: "Fetch a video segment from a URL",
                query: &[("url", "The URL of the video segment.")],
            },
            Endpoint {
                method: "GET",
                usage: "/health",
                description: "Check the health status of the server",
                query: &[],
            },
        ],
    })
}
