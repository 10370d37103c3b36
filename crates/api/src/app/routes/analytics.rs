use axum::{
    extract::Extension,
    http::{HeaderMap, header},
    routing::post,
    Json, Router,
};
use serde_json::{Value as JsonValue, json};

use storefront_infra::Services;
use storefront_infra::integrations::{ConversionEvent, StandardEvent};

use crate::app::dto::AnalyticsEventRequest;
use crate::app::errors::{ApiError, ApiResult};

pub fn router() -> Router {
    Router::new().route("/events", post(track_event))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(str::to_string)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    header_str(headers, header::COOKIE.as_str())?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// Relay a browser event to the conversions API. Provider failures are
/// reported in the body with `success: false`.
pub async fn track_event(
    Extension(services): Extension<Services>,
    headers: HeaderMap,
    Json(body): Json<AnalyticsEventRequest>,
) -> ApiResult<Json<JsonValue>> {
    if body.event_name.trim().is_empty() {
        return Err(ApiError::bad_request("Event name is required"));
    }
    let event = StandardEvent::from_client(body.event_name.trim())
        .ok_or_else(|| ApiError::bad_request(format!("Unknown event: {}", body.event_name)))?;

    let mut user_data = body.user_data.unwrap_or_default();
    user_data.client_ip_address = client_ip(&headers);
    user_data.client_user_agent = header_str(&headers, header::USER_AGENT.as_str()).map(str::to_string);
    user_data.fbc = cookie(&headers, "_fbc");
    user_data.fbp = cookie(&headers, "_fbp");

    let event = ConversionEvent::new(event)
        .with_event_id(body.event_id)
        .with_user_data(user_data)
        .with_source_url(header_str(&headers, header::REFERER.as_str()).map(str::to_string))
        .with_client_data(body.custom_data.unwrap_or_default());
    let event_id = event.event_id.clone();

    match services.integrations.tracker.track(event).await {
        Ok(event_id) => Ok(Json(json!({ "success": true, "eventId": event_id }))),
        Err(e) => {
            tracing::debug!(error = %e, "conversion event not delivered");
            Ok(Json(json!({ "success": false, "eventId": event_id, "error": e.to_string() })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn facebook_cookies_are_picked_from_the_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session=abc; _fbp=fb.1.123.456; _fbc=fb.1.789.click"),
        );
        assert_eq!(cookie(&headers, "_fbp").as_deref(), Some("fb.1.123.456"));
        assert_eq!(cookie(&headers, "_fbc").as_deref(), Some("fb.1.789.click"));
        assert_eq!(cookie(&headers, "missing"), None);
    }
}
