//! 请求提取器

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap, header};

/// 受信任的反向代理地址；只有来自这些地址的连接才读取转发头
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    pub fn new(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(proxies.into_iter().collect())
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }
}

/// 客户端 IP
///
/// 连接对端是受信任代理时，依次取 `Forwarded` 的 `for=`、`X-Forwarded-For`
/// 第一项、`X-Real-IP`；否则（或转发头无法解析）使用连接地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions, trusted: &TrustedProxies) -> Self {
        let peer = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded = peer
            .filter(|ip| trusted.contains(ip))
            .and_then(|_| {
                forwarded_for(headers)
                    .or_else(|| first_header_value(headers, "x-forwarded-for"))
                    .or_else(|| first_header_value(headers, "x-real-ip"))
            })
            .and_then(|raw| parse_ip(&raw));

        let ip = forwarded
            .or(peer)
            .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

        Self(ip)
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    TrustedProxies: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trusted = TrustedProxies::from_ref(state);
        Ok(Self::resolve(&parts.headers, &parts.extensions, &trusted))
    }
}

/// `Forwarded: for=192.0.2.60;proto=http, for=198.51.100.17`
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::FORWARDED)?.to_str().ok()?;
    let first = value.split(',').next()?;
    first
        .split(';')
        .map(str::trim)
        .find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            key.eq_ignore_ascii_case("for")
                .then(|| value.trim_matches('"').to_string())
        })
        .filter(|ip| !ip.is_empty())
}

fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 接受 `1.2.3.4`、`1.2.3.4:80`、`[2001:db8::1]:443`、`2001:db8::1`
fn parse_ip(raw: &str) -> Option<IpAddr> {
    raw.parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        .or_else(|| {
            raw.strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|s| s.parse().ok())
        })
}
