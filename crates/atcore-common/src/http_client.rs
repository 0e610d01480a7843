//! Minimal HTTP client abstraction shared across crates.
//!
//! Keeping the OAuth engine and credential session generic over `HttpClient`
//! (rather than hardwiring `reqwest`) is what lets tests substitute an
//! in-memory double for the authorization server and PDS.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// HTTP client trait for sending raw HTTP requests.
#[cfg_attr(not(target_arch = "wasm32"), trait_variant::make(Send))]
pub trait HttpClient {
    /// Error type returned by the HTTP client
    type Error: std::error::Error + Display + Send + Sync + 'static;

    /// Send an HTTP request and return the response.
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>>;
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for reqwest::Client {
    type Error = reqwest::Error;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        let (parts, body) = request.into_parts();

        let mut req = self.request(parts.method, parts.uri.to_string()).body(body);

        for (name, value) in parts.headers.iter() {
            req = req.header(name.as_str(), value.as_bytes());
        }

        let resp = req.send().await?;

        let mut builder = http::Response::builder().status(resp.status());

        for (name, value) in resp.headers().iter() {
            builder = builder.header(name.as_str(), value.as_bytes());
        }

        let body = resp.bytes().await?.to_vec();

        Ok(builder.body(body).expect("Failed to build response"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> + Send
    {
        self.as_ref().send_http(request)
    }
}

#[cfg(target_arch = "wasm32")]
impl<T: HttpClient> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> {
        self.as_ref().send_http(request)
    }
}

/// A credential for the `Authorization` header, covering both of the AT
/// Protocol's session kinds: DPoP-bound OAuth access tokens and legacy
/// app-password Bearer tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationToken<'t> {
    /// RFC 9449 DPoP-bound access token; must be paired with a DPoP proof.
    Dpop(crate::CowStr<'t>),
    /// Legacy `Authorization: Bearer` token from an app-password session.
    Bearer(crate::CowStr<'t>),
}

impl<'t> AuthorizationToken<'t> {
    /// The bare token value, without the scheme prefix.
    pub fn value(&self) -> &crate::CowStr<'t> {
        match self {
            Self::Dpop(t) | Self::Bearer(t) => t,
        }
    }

    /// The value to send in the `Authorization` header, e.g. `"DPoP <token>"`.
    pub fn header_value(&self) -> String {
        match self {
            Self::Dpop(t) => format!("DPoP {t}"),
            Self::Bearer(t) => format!("Bearer {t}"),
        }
    }
}

impl AsRef<str> for AuthorizationToken<'_> {
    fn as_ref(&self) -> &str {
        self.value().as_ref()
    }
}
