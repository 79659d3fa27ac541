use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy, Response};
use serde::Serialize;

/// Outbound client used for the payload generation call.
pub struct HttpClient {
    inner: Client,
    default_timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, proxy_url: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("webfuzzer/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = proxy_url {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            inner: builder.build()?,
            default_timeout: timeout,
        })
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &T,
    ) -> Result<Response, reqwest::Error> {
        let mut req = self.inner
            .post(url)
            .json(body)
            .timeout(self.default_timeout);

        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        req.send().await
    }
}
