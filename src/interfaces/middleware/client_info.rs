use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::application::dtos::user_dto::ClientInfo;
use crate::common::errors::AppError;
use crate::domain::services::secrets::hash_secret;

pub const DEVICE_FINGERPRINT_HEADER: &str = "x-device-fingerprint";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const MAX_FINGERPRINT_LEN: usize = 256;

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR_HEADER)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Resolves who is calling: first `X-Forwarded-For` hop, then the socket peer.
///
/// Without an explicit fingerprint header the user agent digest stands in,
/// so one browser keeps one identity across requests.
pub fn resolve_client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<ClientInfo> {
    let ip = forwarded_ip(headers)
        .or_else(|| peer.map(|addr| addr.ip()))?
        .to_canonical();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let device_fingerprint = headers
        .get(DEVICE_FINGERPRINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_FINGERPRINT_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| hash_secret(user_agent.as_deref().unwrap_or("unknown")));

    Some(ClientInfo {
        ip,
        user_agent,
        device_fingerprint,
    })
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        resolve_client_info(&parts.headers, peer)
            .ok_or_else(|| AppError::bad_request("Could not determine client address"))
    }
}
