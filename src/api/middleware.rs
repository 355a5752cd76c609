//! Bearer-token authentication and per-IP rate limiting for ticket routes.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::{
    collections::{HashMap, VecDeque},
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Access control for the HTTP API. Built from [`crate::config::Config`].
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// Token expected in `Authorization: Bearer <token>`. `None` disables auth.
    pub api_key: Option<String>,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
    pub rate_limiter: Option<RateLimiter>,
}

impl SecurityConfig {
    /// No auth, no rate limit, permissive CORS. Local development and tests.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Adds a limit of `max_requests` per minute per client IP.
    pub fn rate_limited(mut self, max_requests: u32) -> Self {
        self.rate_limiter = Some(RateLimiter::new(max_requests, RATE_WINDOW));
        self
    }
}

/// Sliding-window request counter keyed by client IP.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    requests: Arc<Mutex<HashMap<IpAddr, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records a request from `ip` and reports whether it is within the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let Ok(mut requests) = self.requests.lock() else {
            tracing::error!("Rate limiter lock poisoned, allowing request");
            return true;
        };

        // Drop idle clients so the map does not grow without bound.
        requests.retain(|_, hits| {
            while hits
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                hits.pop_front();
            }
            !hits.is_empty()
        });

        let hits = requests.entry(ip).or_default();
        if hits.len() < self.max_requests as usize {
            hits.push_back(now);
            true
        } else {
            false
        }
    }
}

pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    match bearer_token(request.headers()) {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Rejected request with invalid API key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Rejected request without bearer token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = client_ip(request.headers());
    if limiter.check(ip) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Rate limit exceeded for {}", ip);
        Err(StatusCode::TOO_MANY_REQUESTS)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Client address from proxy headers, or loopback when there are none.
fn client_ip(headers: &HeaderMap) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());
    let real_ip = headers.get("X-Real-IP").and_then(|v| v.to_str().ok());

    forwarded
        .into_iter()
        .chain(real_ip)
        .find_map(|v| v.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
