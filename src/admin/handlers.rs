use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::control::ServiceStatus;
use crate::throttle::{ProfileName, ThrottleProfile};

use super::AdminState;

#[derive(Serialize)]
pub struct ProfileEntry {
    pub name: ProfileName,
    #[serde(flatten)]
    pub profile: ThrottleProfile,
}

#[derive(Deserialize)]
pub struct SetProfileRequest {
    pub name: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<ServiceStatus> {
    Json(state.service.status())
}

pub async fn get_profiles() -> Json<Vec<ProfileEntry>> {
    Json(
        ProfileName::ALL
            .iter()
            .map(|&name| ProfileEntry {
                name,
                profile: name.profile(),
            })
            .collect(),
    )
}

pub async fn put_profile(
    State(state): State<AdminState>,
    Json(request): Json<SetProfileRequest>,
) -> Response {
    match request.name.parse::<ProfileName>() {
        Ok(name) => {
            state.service.set_named_profile(name);
            Json(state.service.status()).into_response()
        }
        Err(e) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

pub async fn post_start(State(state): State<AdminState>) -> Response {
    match state.service.start().await {
        Ok(port) => Json(json!({ "port": port })).into_response(),
        Err(e) => {
            let body = Json(json!({ "error": e.to_string() }));
            (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
        }
    }
}

pub async fn post_stop(State(state): State<AdminState>) -> Json<ServiceStatus> {
    state.service.stop().await;
    Json(state.service.status())
}
