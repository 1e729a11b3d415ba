use crate::base::neterror::NetError;
use crate::http::codec::{body_framing, BodyFraming, HttpCodec};
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::interceptor::{Chain, Interceptor};
use crate::socket::connectjob::ConnectJob;
use crate::socket::connection::Connection;
use futures::future::BoxFuture;
use http::{StatusCode, Version};
use std::time::Duration;

/// Last step: writes the request on the bound connection and reads the
/// response off it.
#[derive(Debug, Clone)]
pub struct CallServerInterceptor {
    job: ConnectJob,
    codec: HttpCodec,
    read_timeout: Option<Duration>,
}

impl CallServerInterceptor {
    pub fn new(job: ConnectJob, codec: HttpCodec, read_timeout: Option<Duration>) -> Self {
        Self {
            job,
            codec,
            read_timeout,
        }
    }

    async fn exchange(&self, conn: &mut Connection, request: &Request) -> Result<Response, NetError> {
        let stream = conn.send(&self.job, &self.codec, request).await?;

        // Interim responses carry no body; 101 ends the exchange.
        let (status, headers) = loop {
            let status = self.codec.read_status_line(stream).await?;
            let headers = self.codec.read_headers(stream).await?;
            if status.status.is_informational() && status.status != StatusCode::SWITCHING_PROTOCOLS {
                tracing::debug!(code = status.status.as_u16(), "skipping interim response");
                continue;
            }
            break (status, headers);
        };

        let framing = body_framing(request.method(), status.status, &headers)?;
        let body = self.codec.read_body(stream, framing).await?;

        let keep_alive = framing != BodyFraming::UntilClose
            && status.status != StatusCode::SWITCHING_PROTOCOLS
            && keep_alive(request, status.version, &headers);
        conn.touch();

        Ok(Response::builder()
            .version(status.version)
            .status(status.status)
            .reason(status.reason)
            .headers(headers)
            .body(body)
            .keep_alive(keep_alive)
            .build())
    }
}

/// `Connection: close` on either side wins, then `keep-alive`, then the
/// version default.
fn keep_alive(request: &Request, version: Version, headers: &Headers) -> bool {
    if request.headers().has_token("Connection", "close") || headers.has_token("Connection", "close") {
        return false;
    }
    if headers.has_token("Connection", "keep-alive") {
        return true;
    }
    version == Version::HTTP_11
}

impl Interceptor for CallServerInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
        Box::pin(async move {
            let call = chain.call();
            let request = chain.request().clone();
            let conn = chain.connection_mut().ok_or(NetError::SocketNotConnected)?;

            let exchange = async {
                match self.read_timeout {
                    Some(limit) => tokio::time::timeout(limit, self.exchange(conn, &request))
                        .await
                        .map_err(|_| NetError::ConnectionTimedOut)?,
                    None => self.exchange(conn, &request).await,
                }
            };

            tokio::select! {
                result = exchange => result,
                _ = call.canceled() => {
                    tracing::debug!(url = %request.url(), "call canceled mid-exchange");
                    Err(NetError::Canceled)
                }
            }
        })
    }
}
